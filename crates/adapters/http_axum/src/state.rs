//! Shared application state for axum handlers.

use std::sync::Arc;

use minido_app::event_bus::InProcessEventBus;
use minido_app::ports::{EventPublisher, HistoryStore, TransportBridge};
use minido_app::services::BusService;

/// Application state shared across all axum handlers.
///
/// Generic over the history store, transport and event publisher of the
/// service to avoid dynamic dispatch. `Clone` is implemented manually so the
/// underlying types themselves do not need to be `Clone`; only the `Arc`
/// wrappers are cloned.
pub struct AppState<H, T, P> {
    /// Control-plane service over modules and devices.
    pub bus_service: Arc<BusService<H, T, P>>,
    /// Event bus feeding the SSE stream.
    pub event_bus: Arc<InProcessEventBus>,
}

impl<H, T, P> Clone for AppState<H, T, P> {
    fn clone(&self) -> Self {
        Self {
            bus_service: Arc::clone(&self.bus_service),
            event_bus: Arc::clone(&self.event_bus),
        }
    }
}

impl<H, T, P> AppState<H, T, P>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Create a new application state from pre-wrapped `Arc` values.
    ///
    /// The event bus is usually also the publisher `P` of the registry,
    /// hence it is shared rather than owned.
    pub fn new(bus_service: Arc<BusService<H, T, P>>, event_bus: Arc<InProcessEventBus>) -> Self {
        Self {
            bus_service,
            event_bus,
        }
    }
}
