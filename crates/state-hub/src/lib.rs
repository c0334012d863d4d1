//! Subscriber hub for state broadcasting.
//!
//! UI layers observe auth and session state through subscriptions rather
//! than polling. The hub fans a state snapshot out to every registered
//! subscriber in the order the snapshots were produced.
//!
//! # Design Principles
//!
//! - Subscribers receive the current snapshot immediately on subscribe,
//!   so a late subscriber is never stale
//! - Snapshots are delivered in production order, never coalesced
//! - Dropping a subscription unsubscribes; dead subscribers are pruned
//!   on the next broadcast

use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// A subscription to state snapshots from a [`StateHub`].
///
/// Dropping the subscription unregisters it; the hub removes the dead
/// sender on its next broadcast.
pub struct StateSubscription<S> {
    receiver: UnboundedReceiver<S>,
}

impl<S> StateSubscription<S> {
    fn new(receiver: UnboundedReceiver<S>) -> Self {
        Self { receiver }
    }

    /// Waits until the next snapshot is available.
    ///
    /// Returns None once the hub has been dropped and all buffered
    /// snapshots have been consumed.
    pub async fn recv(&mut self) -> Option<S> {
        self.receiver.recv().await
    }

    /// Attempts to take a buffered snapshot without waiting.
    ///
    /// Returns None when nothing is buffered. Useful for event loops and
    /// for tests asserting on exactly the states that were produced.
    pub fn try_recv(&mut self) -> Option<S> {
        self.receiver.try_recv().ok()
    }

    /// Blocks the current (non-async) thread until a snapshot arrives.
    ///
    /// For UI threads that live outside the runtime. Must not be called
    /// from an async context.
    pub fn blocking_recv(&mut self) -> Option<S> {
        self.receiver.blocking_recv()
    }

    /// Drains every buffered snapshot, returning the most recent one.
    ///
    /// For consumers that only render the latest state and do not care
    /// about intermediate snapshots.
    pub fn latest(&mut self) -> Option<S> {
        let mut last = None;
        while let Some(state) = self.try_recv() {
            last = Some(state);
        }
        last
    }
}

/// A hub that broadcasts state snapshots to all subscribers.
pub struct StateHub<S> {
    /// Registered subscriber channels, pruned on broadcast
    subscribers: Mutex<Vec<UnboundedSender<S>>>,
}

impl<S: Clone> StateHub<S> {
    /// Creates a new hub with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a subscriber and immediately delivers `current` to it.
    ///
    /// The snapshot is buffered on the subscription's channel, so the
    /// first `recv`/`try_recv` always yields the state as of the
    /// subscribe call, followed by every later broadcast in order.
    pub fn subscribe(&self, current: S) -> StateSubscription<S> {
        let (sender, receiver) = mpsc::unbounded_channel();

        // Seed the channel before registering so the snapshot precedes
        // any concurrent broadcast.
        let _ = sender.send(current);

        let mut subscribers = self.subscribers.lock().expect("lock poisoned");
        subscribers.push(sender);

        StateSubscription::new(receiver)
    }

    /// Broadcasts a snapshot to all subscribers.
    ///
    /// Sends a clone to each registered subscriber. Subscribers whose
    /// receiving end has been dropped are removed during the broadcast.
    pub fn notify(&self, state: &S) {
        let mut subscribers = self.subscribers.lock().expect("lock poisoned");
        subscribers.retain(|sender| sender.send(state.clone()).is_ok());
        trace!(subscribers = subscribers.len(), "state broadcast");
    }

    /// Returns the count of currently registered subscribers.
    ///
    /// May include dead subscribers that no broadcast has pruned yet.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("lock poisoned").len()
    }
}

impl<S: Clone> Default for StateHub<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_delivers_current_snapshot() {
        let hub = StateHub::new();

        let mut sub = hub.subscribe("initial".to_string());

        assert_eq!(sub.try_recv().unwrap(), "initial");
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn broadcast_reaches_subscriber_in_order() {
        let hub = StateHub::new();
        let mut sub = hub.subscribe(0u32);

        hub.notify(&1);
        hub.notify(&2);
        hub.notify(&3);

        assert_eq!(sub.try_recv(), Some(0));
        assert_eq!(sub.try_recv(), Some(1));
        assert_eq!(sub.try_recv(), Some(2));
        assert_eq!(sub.try_recv(), Some(3));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn multiple_subscribers() {
        let hub = StateHub::new();

        let mut sub1 = hub.subscribe("a".to_string());
        let mut sub2 = hub.subscribe("a".to_string());
        assert_eq!(hub.subscriber_count(), 2);

        hub.notify(&"b".to_string());

        assert_eq!(sub1.latest().unwrap(), "b");
        assert_eq!(sub2.latest().unwrap(), "b");
    }

    #[test]
    fn dead_subscriber_cleanup() {
        let hub = StateHub::new();

        // Create and drop a subscriber
        {
            let _sub = hub.subscribe(0u32);
            assert_eq!(hub.subscriber_count(), 1);
        }

        // The next broadcast prunes the dead channel
        hub.notify(&1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn drop_all_then_broadcast_reaches_nobody() {
        let hub = StateHub::new();

        let subs: Vec<_> = (0..4).map(|_| hub.subscribe(0u32)).collect();
        assert_eq!(hub.subscriber_count(), 4);
        drop(subs);

        hub.notify(&1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn async_recv_sees_broadcast() {
        let hub = StateHub::new();
        let mut sub = hub.subscribe(0u32);

        hub.notify(&7);

        assert_eq!(sub.recv().await, Some(0));
        assert_eq!(sub.recv().await, Some(7));
    }

    #[test]
    fn latest_drains_intermediate_snapshots() {
        let hub = StateHub::new();
        let mut sub = hub.subscribe(0u32);

        hub.notify(&1);
        hub.notify(&2);

        assert_eq!(sub.latest(), Some(2));
        assert!(sub.try_recv().is_none());
    }
}
