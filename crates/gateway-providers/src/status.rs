//! Publish/subscribe channel for adapter status.
//!
//! An adapter owns one [`StatusPublisher`]. Consumers call
//! [`StatusPublisher::subscribe`] to receive every later transition and
//! detach by calling [`StatusSubscription::unsubscribe`] or dropping it.

use gateway_core::{AdapterState, AdapterStatus};
use tokio::sync::{broadcast, watch};
use tracing::warn;

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Owner side of an adapter's status.
pub struct StatusPublisher {
    current: watch::Sender<AdapterStatus>,
    events: broadcast::Sender<AdapterStatus>,
}

impl StatusPublisher {
    /// Create a publisher starting in `disconnected`.
    pub fn new() -> Self {
        let (current, _) = watch::channel(AdapterStatus::disconnected());
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self { current, events }
    }

    /// Replace the current status and notify subscribers.
    pub fn publish(&self, status: AdapterStatus) {
        self.current.send_replace(status.clone());
        // No subscribers is fine.
        let _ = self.events.send(status);
    }

    /// Publish a transition to `state` unless already there.
    pub fn transition(&self, state: AdapterState) {
        if self.current.borrow().state == state {
            return;
        }
        self.publish(AdapterStatus::new(state));
    }

    /// Copy of the latest status.
    pub fn current(&self) -> AdapterStatus {
        self.current.borrow().clone()
    }

    /// Receive all transitions published from now on.
    pub fn subscribe(&self) -> StatusSubscription {
        StatusSubscription {
            rx: self.events.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer side of an adapter's status.
#[must_use = "dropping a subscription detaches it"]
pub struct StatusSubscription {
    rx: broadcast::Receiver<AdapterStatus>,
}

impl StatusSubscription {
    /// Wait for the next transition. `None` once the adapter is gone.
    pub async fn recv(&mut self) -> Option<AdapterStatus> {
        loop {
            match self.rx.recv().await {
                Ok(status) => return Some(status),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Status subscriber lagged {} updates", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next transition if one is already waiting.
    pub fn try_recv(&mut self) -> Option<AdapterStatus> {
        loop {
            match self.rx.try_recv() {
                Ok(status) => return Some(status),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Stop receiving updates.
    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_sees_future_transitions() {
        let publisher = StatusPublisher::new();
        publisher.transition(AdapterState::Connecting);

        let mut sub = publisher.subscribe();
        publisher.transition(AdapterState::Connected);
        publisher.publish(AdapterStatus::error("boom"));

        assert_eq!(sub.recv().await.unwrap().state, AdapterState::Connected);
        let err = sub.recv().await.unwrap();
        assert_eq!(err.state, AdapterState::Error);
        assert_eq!(err.last_error.as_deref(), Some("boom"));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_unsubscribe_detaches() {
        let publisher = StatusPublisher::new();
        let sub = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(publisher.subscriber_count(), 0);
        publisher.transition(AdapterState::Connected);
        assert_eq!(publisher.current().state, AdapterState::Connected);
    }

    #[test]
    fn test_transition_to_same_state_is_silent() {
        let publisher = StatusPublisher::new();
        let mut sub = publisher.subscribe();
        publisher.transition(AdapterState::Disconnected);
        assert!(sub.try_recv().is_none());
    }
}
