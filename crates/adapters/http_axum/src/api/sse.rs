//! Server-Sent Events (SSE) stream of bus events.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use minido_app::ports::{EventPublisher, HistoryStore, TransportBridge};

use crate::state::AppState;

/// `GET /api/events/stream`: SSE stream of channel changes, button presses
/// and module presence.
///
/// Each event is sent as a JSON `data:` frame whose SSE event name is the
/// bus event type. A lagging client silently skips the events it missed.
pub async fn stream<H, T, P>(
    State(state): State<AppState<H, T, P>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let event_rx = state.event_bus.subscribe();
    let event_stream = BroadcastStream::new(event_rx).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().event(event.name()).data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to serialize bus event for SSE stream");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE subscriber lagged, some events were dropped");
            None
        }
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}
