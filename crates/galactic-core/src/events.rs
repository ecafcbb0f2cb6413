//! Broadcast bus for [`EngineEvent`]s.

use galactic_types::EngineEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the event channel.
///
/// If a subscriber falls behind by more than this many events it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest event.
pub const EVENT_CAPACITY: usize = 1024;

/// Fan-out of engine events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus with [`EVENT_CAPACITY`] slots.
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: EngineEvent) {
        let name = event.name();
        let receivers = self.tx.send(event).unwrap_or(0);
        trace!(event = name, receivers, "Engine event emitted");
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.emit(EngineEvent::Started);
        let mut rx = bus.subscribe();
        bus.emit(EngineEvent::Stopped);
        assert_eq!(rx.recv().await.unwrap(), EngineEvent::Stopped);
    }

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(EngineEvent::Initialized);
        bus.emit(EngineEvent::Started);
        assert_eq!(rx.recv().await.unwrap(), EngineEvent::Initialized);
        assert_eq!(rx.recv().await.unwrap(), EngineEvent::Started);
    }
}
