//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod devices;
#[allow(clippy::missing_errors_doc)]
pub mod modules;
pub mod sse;

use axum::Router;
use axum::routing::{get, post};

use minido_app::ports::{EventPublisher, HistoryStore, TransportBridge};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<H, T, P>() -> Router<AppState<H, T, P>>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    Router::new()
        // Modules
        .route("/modules", get(modules::list::<H, T, P>))
        .route(
            "/modules/{id}/channels/{channel}",
            get(modules::get_channel::<H, T, P>).put(modules::set_channel::<H, T, P>),
        )
        .route(
            "/modules/{id}/channels/{channel}/history",
            get(modules::history::<H, T, P>),
        )
        .route(
            "/modules/{id}/channels/{channel}/learn",
            post(modules::learn::<H, T, P>),
        )
        // Devices
        .route("/devices", get(devices::list::<H, T, P>))
        .route(
            "/devices/{id}/value",
            get(devices::get_value::<H, T, P>).put(devices::set_value::<H, T, P>),
        )
        // Events
        .route("/events/stream", get(sse::stream::<H, T, P>))
}
