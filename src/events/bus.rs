/**
 * ============================================================================
 * EVENT BUS
 * ============================================================================
 *
 * PURPOSE: In-process fan-out of ServiceEvent to any number of subscribers
 *
 * DELIVERY:
 * - publish() never blocks and never fails for the publisher
 * - Each subscriber has its own bounded buffer; when it falls behind the
 *   oldest events are dropped for that subscriber only
 * - Events arrive in publish order
 * - Dropping an EventSubscription unsubscribes
 *
 * ============================================================================
 */

use crate::events::types::ServiceEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServiceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /**
     * Publish an event to every current subscriber
     * Having no subscribers is not an error
     */
    pub fn publish(&self, event: ServiceEvent) {
        match self.sender.send(event) {
            Ok(receivers) => log::trace!("Published event to {} subscribers", receivers),
            Err(_) => log::trace!("Published event with no subscribers"),
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            dropped: 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/**
 * Receive handle owned by one subscriber
 */
pub struct EventSubscription {
    receiver: broadcast::Receiver<ServiceEvent>,
    dropped: u64,
}

impl EventSubscription {
    /**
     * Wait for the next event
     * Returns None once the bus is gone
     */
    pub async fn recv(&mut self) -> Option<ServiceEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.note_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /**
     * Next buffered event without waiting
     */
    pub fn try_recv(&mut self) -> Option<ServiceEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.note_lag(skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /**
     * Everything currently buffered, oldest first
     */
    pub fn drain(&mut self) -> Vec<ServiceEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Events this subscriber lost to buffer overflow so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn note_lag(&mut self, skipped: u64) {
        self.dropped += skipped;
        log::warn!("Event subscriber fell behind, dropped {} oldest events", skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refreshed(count: usize) -> ServiceEvent {
        ServiceEvent::services_refreshed(count)
    }

    fn count_of(event: &ServiceEvent) -> usize {
        match event {
            ServiceEvent::ServicesRefreshed { count, .. } => *count,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(16);
        bus.publish(refreshed(1));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_are_independent_and_ordered() {
        let bus = EventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        for i in 0..3 {
            bus.publish(refreshed(i));
        }

        let a: Vec<_> = first.drain().iter().map(count_of).collect();
        let b: Vec<_> = second.drain().iter().map(count_of).collect();
        assert_eq!(a, vec![0, 1, 2]);
        assert_eq!(b, vec![0, 1, 2]);

        bus.publish(refreshed(9));
        assert_eq!(count_of(&first.recv().await.unwrap()), 9);
    }

    #[test]
    fn test_slow_subscriber_drops_oldest() {
        let bus = EventBus::new(4);
        let mut slow = bus.subscribe();

        for i in 0..10 {
            bus.publish(refreshed(i));
        }

        let got: Vec<_> = slow.drain().iter().map(count_of).collect();
        assert_eq!(got, vec![6, 7, 8, 9]);
        assert_eq!(slow.dropped(), 6);
    }

    #[test]
    fn test_dropping_handle_unsubscribes() {
        let bus = EventBus::new(4);
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
