//! Event bus port: publish/subscribe for bus events.

use minido_domain::event::BusEvent;

/// Publishes bus events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers. Having none is not an error.
    fn publish(&self, event: BusEvent);
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: BusEvent) {
        (**self).publish(event);
    }
}

/// Publisher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: BusEvent) {}
}
