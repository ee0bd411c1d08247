//! JSON handlers for output modules and their channels.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use minido_app::ports::{EventPublisher, HistoryStore, TransportBridge};
use minido_domain::address::LearnMode;
use minido_domain::error::{MinidoError, NotFoundError, ValidationError};
use minido_domain::output_module::{ModuleSnapshot, Sample};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for writing a channel.
#[derive(Deserialize)]
pub struct SetChannelRequest {
    pub value: u8,
}

/// Request body for learn mode.
#[derive(Deserialize)]
pub struct LearnRequest {
    pub mode: LearnMode,
}

/// One channel of one module.
#[derive(Debug, Serialize)]
pub struct ChannelView {
    pub module: u8,
    pub channel: u8,
    pub value: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct LearnView {
    pub mode: LearnMode,
    pub frames: usize,
}

/// Parse `{id}/channels/{channel}` path segments.
///
/// A module id that is not a number cannot name a module, so it answers
/// "not found" like any other unknown id.
fn parse_path(module: &str, channel: &str) -> Result<(u8, u8), ApiError> {
    let module_id = module.parse().map_err(|_| {
        MinidoError::NotFound(NotFoundError {
            entity: "Module",
            id: module.to_string(),
        })
    })?;
    let channel_id = channel
        .parse()
        .map_err(|_| MinidoError::from(ValidationError::MalformedChannel(channel.to_string())))?;
    Ok((module_id, channel_id))
}

/// Possible responses from the learn endpoint.
pub enum LearnResponse {
    Accepted(Json<LearnView>),
}

impl IntoResponse for LearnResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted(json) => (StatusCode::ACCEPTED, json).into_response(),
        }
    }
}

/// `GET /api/modules`
pub async fn list<H, T, P>(State(state): State<AppState<H, T, P>>) -> Json<Vec<ModuleSnapshot>>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    Json(state.bus_service.list_modules())
}

/// `GET /api/modules/{id}/channels/{channel}`
pub async fn get_channel<H, T, P>(
    State(state): State<AppState<H, T, P>>,
    Path((module, channel)): Path<(String, String)>,
) -> Result<Json<ChannelView>, ApiError>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let (module, channel) = parse_path(&module, &channel)?;
    let value = state.bus_service.get_output(module, channel)?;
    Ok(Json(ChannelView {
        module,
        channel,
        value,
    }))
}

/// `PUT /api/modules/{id}/channels/{channel}`
pub async fn set_channel<H, T, P>(
    State(state): State<AppState<H, T, P>>,
    Path((module, channel)): Path<(String, String)>,
    Json(req): Json<SetChannelRequest>,
) -> Result<Json<ChannelView>, ApiError>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let (module, channel) = parse_path(&module, &channel)?;
    let snapshot = state.bus_service.set_output(module, channel, req.value)?;
    Ok(Json(ChannelView {
        module,
        channel,
        value: snapshot.channels[usize::from(channel) - 1],
    }))
}

/// `GET /api/modules/{id}/channels/{channel}/history`
pub async fn history<H, T, P>(
    State(state): State<AppState<H, T, P>>,
    Path((module, channel)): Path<(String, String)>,
) -> Result<Json<Vec<Sample>>, ApiError>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let (module, channel) = parse_path(&module, &channel)?;
    Ok(Json(state.bus_service.channel_history(module, channel)?))
}

/// `POST /api/modules/{id}/channels/{channel}/learn`
pub async fn learn<H, T, P>(
    State(state): State<AppState<H, T, P>>,
    Path((module, channel)): Path<(String, String)>,
    Json(req): Json<LearnRequest>,
) -> Result<LearnResponse, ApiError>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let (module, channel) = parse_path(&module, &channel)?;
    let frames = state
        .bus_service
        .program_learn_mode(module, channel, req.mode)?;
    Ok(LearnResponse::Accepted(Json(LearnView {
        mode: req.mode,
        frames,
    })))
}
