//! JSON handlers for configured devices.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use minido_app::ports::{EventPublisher, HistoryStore, TransportBridge};
use minido_app::services::DeviceDetails;
use minido_domain::device::DeviceValue;
use minido_domain::error::{MinidoError, NotFoundError};
use minido_domain::id::DeviceId;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for commanding a device.
#[derive(Deserialize)]
pub struct SetValueRequest {
    pub value: DeviceValue,
}

#[derive(Debug, Serialize)]
pub struct ValueView {
    pub id: DeviceId,
    pub value: Option<DeviceValue>,
}

fn parse_id(raw: &str) -> Result<DeviceId, ApiError> {
    DeviceId::from_str(raw).map_err(|_| {
        ApiError::from(MinidoError::NotFound(NotFoundError {
            entity: "Device",
            id: raw.to_string(),
        }))
    })
}

/// `GET /api/devices`
pub async fn list<H, T, P>(
    State(state): State<AppState<H, T, P>>,
) -> Result<Json<Vec<DeviceDetails>>, ApiError>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    Ok(Json(state.bus_service.get_device_details()?))
}

/// `GET /api/devices/{id}/value`
pub async fn get_value<H, T, P>(
    State(state): State<AppState<H, T, P>>,
    Path(id): Path<String>,
) -> Result<Json<ValueView>, ApiError>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    let value = state.bus_service.get_device_value(id)?;
    Ok(Json(ValueView { id, value }))
}

/// `PUT /api/devices/{id}/value`
///
/// Shade commands wait for the settle delay when reversing direction, so the
/// response may take a few hundred milliseconds.
pub async fn set_value<H, T, P>(
    State(state): State<AppState<H, T, P>>,
    Path(id): Path<String>,
    Json(req): Json<SetValueRequest>,
) -> Result<Json<ValueView>, ApiError>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    let value = state.bus_service.set_device_value(id, req.value).await?;
    Ok(Json(ValueView { id, value }))
}
