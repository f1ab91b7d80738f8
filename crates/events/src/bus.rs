//! Typed event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Used for three streams in a session: push-channel job events, user
//! notices, and the local "conversion completed" signal. Ordering between
//! publishers is not guaranteed and a subscriber may see the same logical
//! event more than once; subscribers must be idempotent.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

// ---------------------------------------------------------------------------
// LocalSignal
// ---------------------------------------------------------------------------

/// A signal published inside one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalSignal {
    /// Some conversion finished (successfully or not) or was just
    /// accepted; the processed-file listing should be reconciled.
    ConversionCompleted,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// Every [`Subscription`] independently receives every event published
/// after it was created. Dropping (or [`Subscription::unsubscribe`]-ing)
/// a subscription detaches it.
///
/// ```rust
/// use fileconv_events::{EventBus, LocalSignal};
///
/// let bus = EventBus::default();
/// let _sub = bus.subscribe();
///
/// bus.publish(LocalSignal::ConversionCompleted);
/// ```
pub struct EventBus<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed events are dropped;
    /// a slow subscriber skips them and keeps receiving newer ones.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers the event is silently dropped.
    pub fn publish(&self, event: T) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Receiving end of an [`EventBus`].
pub struct Subscription<T> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Wait for the next event.
    ///
    /// Returns `None` once the bus is dropped. Events lost to lag are
    /// skipped with a warning rather than surfaced as an error.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Detach from the bus.
    pub fn unsubscribe(self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use fileconv_core::job_events::JobEvent;

    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();

        bus.publish(LocalSignal::ConversionCompleted);

        let received = sub.recv().await.expect("should receive the signal");
        assert_eq!(received, LocalSignal::ConversionCompleted);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        bus.publish(JobEvent::JobFailed {
            job_id: "x".into(),
            error: "bad format".into(),
        });

        let e1 = sub1.recv().await.expect("subscriber 1 should receive");
        let e2 = sub2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1, e2);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(LocalSignal::ConversionCompleted);
    }

    #[test]
    fn unsubscribe_detaches() {
        let bus: EventBus<LocalSignal> = EventBus::default();
        let sub = bus.subscribe();
        assert_eq!(bus.sender.receiver_count(), 1);

        sub.unsubscribe();
        assert_eq!(bus.sender.receiver_count(), 0);
    }

    #[test]
    fn events_before_subscribing_are_not_delivered() {
        let bus = EventBus::default();
        bus.publish(LocalSignal::ConversionCompleted);

        let mut sub = bus.subscribe();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_newest() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for n in 0..5u32 {
            bus.publish(n);
        }

        assert_eq!(sub.recv().await, Some(3));
        assert_eq!(sub.recv().await, Some(4));
    }

    #[tokio::test]
    async fn recv_returns_none_after_bus_dropped() {
        let bus: EventBus<LocalSignal> = EventBus::default();
        let mut sub = bus.subscribe();
        drop(bus);

        assert!(sub.recv().await.is_none());
    }
}
