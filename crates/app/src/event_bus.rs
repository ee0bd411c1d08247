//! In-process event bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use minido_domain::event::BusEvent;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped). Slow subscribers lose the oldest events
/// once `capacity` is exceeded.
pub struct InProcessEventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: BusEvent) {
        tracing::trace!(event = event.name(), "publishing");
        // Only fails when nobody is subscribed.
        let _ = self.sender.send(event);
    }
}
