use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::hub::{HubError, Subscription};
use crate::models::Notification;

pub type SubscriberId = u64;

struct SubscriberHandle {
    tx: mpsc::Sender<Arc<Notification>>,
    overflowed: Arc<AtomicBool>,
}

/// Per-user set of active subscribers
#[derive(Default)]
pub(crate) struct Channel {
    subscribers: HashMap<SubscriberId, SubscriberHandle>,
}

pub(crate) struct HubInner {
    channels: DashMap<i32, Channel>,
    next_subscriber_id: AtomicU64,
    buffer: usize,
    shutdown: CancellationToken,
}

impl HubInner {
    /// Removes one subscriber, and the channel with it once empty, under a
    /// single shard lock.
    pub(crate) fn unsubscribe(&self, user_id: i32, subscriber_id: SubscriberId) {
        if let Entry::Occupied(mut entry) = self.channels.entry(user_id) {
            let removed = entry.get_mut().subscribers.remove(&subscriber_id).is_some();
            let remaining = entry.get().subscribers.len();
            if remaining == 0 {
                entry.remove();
            }
            if removed {
                debug!(user_id, subscriber_id, remaining, "Subscriber unregistered");
            }
        }
    }
}

/// In-process pub/sub of notifications keyed by user.
///
/// A channel exists for a user only while at least one subscriber is
/// registered: it is created by the first `subscribe` and removed when the
/// last subscription is dropped. Publishing never waits on a subscriber;
/// each one has a bounded queue and is disconnected when that queue is full.
///
/// Cloning is cheap and every clone shares the same registry.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    /// Creates a hub whose subscribers buffer at most `buffer` notifications.
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                channels: DashMap::new(),
                next_subscriber_id: AtomicU64::new(1),
                buffer: buffer.max(1),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.subscriber_buffer)
    }

    /// Returns the user's channel, creating it if absent.
    ///
    /// The entry API holds the shard lock across lookup and insert, so
    /// concurrent callers for one user always end up on the same channel.
    fn get_or_create_channel(&self, user_id: i32) -> RefMut<'_, i32, Channel> {
        self.inner.channels.entry(user_id).or_default()
    }

    /// Registers a new subscriber on the user's channel.
    ///
    /// # Errors
    /// `HubError::ShutDown` once [`BroadcastHub::shutdown`] has been called
    pub fn subscribe(&self, user_id: i32) -> Result<Subscription, HubError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(HubError::ShutDown);
        }

        let subscriber_id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        let overflowed = Arc::new(AtomicBool::new(false));

        let subscribers = {
            let mut channel = self.get_or_create_channel(user_id);
            channel.subscribers.insert(
                subscriber_id,
                SubscriberHandle {
                    tx,
                    overflowed: Arc::clone(&overflowed),
                },
            );
            channel.subscribers.len()
        };

        let subscription = Subscription::new(
            subscriber_id,
            user_id,
            rx,
            overflowed,
            Arc::downgrade(&self.inner),
        );

        // Lost a race with shutdown clearing the registry
        if self.inner.shutdown.is_cancelled() {
            return Err(HubError::ShutDown);
        }

        debug!(user_id, subscriber_id, subscribers, "Subscriber registered");
        Ok(subscription)
    }

    /// Deregisters a subscription. Equivalent to dropping it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Delivers a notification to every current subscriber of its user.
    ///
    /// Never blocks. A subscriber whose queue is full is removed and flagged
    /// so its next `receive` reports back-pressure; one whose receiver is
    /// gone is pruned. Neither affects the other subscribers.
    ///
    /// # Returns
    /// The number of subscribers the notification was queued for
    pub fn publish(&self, notification: Notification) -> usize {
        let user_id = notification.user_id;
        let notification_id = notification.id;
        let notification = Arc::new(notification);

        let Entry::Occupied(mut entry) = self.inner.channels.entry(user_id) else {
            trace!(user_id, notification_id, "No active channel, skipping live delivery");
            return 0;
        };

        let mut delivered = 0;
        entry.get_mut().subscribers.retain(|subscriber_id, handle| {
            match handle.tx.try_send(Arc::clone(&notification)) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    handle.overflowed.store(true, Ordering::Release);
                    warn!(
                        user_id,
                        subscriber_id = *subscriber_id,
                        notification_id,
                        "Subscriber buffer full, disconnecting"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        user_id,
                        subscriber_id = *subscriber_id,
                        "Pruning subscriber with closed receiver"
                    );
                    false
                }
            }
        });

        if entry.get().subscribers.is_empty() {
            entry.remove();
        }

        debug!(user_id, notification_id, delivered, "Notification published");
        delivered
    }

    /// Closes the hub. Every open subscription ends with `HubError::Closed`
    /// and later subscribes fail.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let channels = self.inner.channels.len();
        self.inner.channels.clear();
        info!(channels, "Broadcast hub shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Number of users with at least one subscriber
    pub fn channel_count(&self) -> usize {
        self.inner.channels.len()
    }

    pub fn subscriber_count(&self, user_id: i32) -> usize {
        self.inner
            .channels
            .get(&user_id)
            .map(|channel| channel.subscribers.len())
            .unwrap_or(0)
    }

    /// Subscribers across all channels
    pub fn total_subscribers(&self) -> usize {
        self.inner
            .channels
            .iter()
            .map(|channel| channel.subscribers.len())
            .sum()
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("channels", &self.channel_count())
            .field("buffer", &self.inner.buffer)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::Timestamp;
    use std::sync::Barrier;
    use std::time::Duration;

    fn notification(id: i64, user_id: i32) -> Notification {
        Notification {
            id,
            user_id,
            kind: "ORDER_UPDATE".to_string(),
            message: format!("notification {id}"),
            related_entity_type: None,
            related_entity_id: None,
            is_read: false,
            read_at: None,
            created_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_concurrent_subscribes_share_one_channel() {
        let hub = BroadcastHub::new(8);
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));

        let subscriptions: Vec<Subscription> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let hub = hub.clone();
                    let barrier = Arc::clone(&barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        hub.subscribe(7).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(hub.channel_count(), 1);
        assert_eq!(hub.subscriber_count(7), threads);
        drop(subscriptions);
        assert_eq!(hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_preserves_order() {
        let hub = BroadcastHub::new(16);
        let mut subscription = hub.subscribe(1).unwrap();

        for id in 1..=5 {
            assert_eq!(hub.publish(notification(id, 1)), 1);
        }

        for id in 1..=5 {
            assert_eq!(subscription.receive().await.unwrap().id, id);
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_once() {
        let hub = BroadcastHub::new(4);
        let mut first = hub.subscribe(1).unwrap();
        let mut second = hub.subscribe(1).unwrap();
        let mut other_user = hub.subscribe(2).unwrap();

        assert_eq!(hub.publish(notification(10, 1)), 2);

        assert_eq!(first.receive().await.unwrap().id, 10);
        assert_eq!(second.receive().await.unwrap().id, 10);
        let nothing = tokio::time::timeout(Duration::from_millis(20), other_user.receive()).await;
        assert!(nothing.is_err());
        let nothing = tokio::time::timeout(Duration::from_millis(20), first.receive()).await;
        assert!(nothing.is_err());
    }

    #[test]
    fn test_publish_without_channel_is_noop() {
        let hub = BroadcastHub::new(4);
        assert_eq!(hub.publish(notification(1, 99)), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_overflow_disconnects_only_slow_subscriber() {
        let hub = BroadcastHub::new(2);
        let mut slow = hub.subscribe(1).unwrap();
        let mut fast = hub.subscribe(1).unwrap();

        for id in 1..=2 {
            hub.publish(notification(id, 1));
            assert_eq!(fast.receive().await.unwrap().id, id);
        }
        // slow's queue is now full
        assert_eq!(hub.publish(notification(3, 1)), 1);
        assert_eq!(hub.subscriber_count(1), 1);
        assert_eq!(fast.receive().await.unwrap().id, 3);

        assert_eq!(slow.receive().await.unwrap().id, 1);
        assert_eq!(slow.receive().await.unwrap().id, 2);
        assert_eq!(
            slow.receive().await.unwrap_err(),
            HubError::Backpressure { user_id: 1 }
        );
    }

    #[test]
    fn test_last_drop_removes_channel() {
        let hub = BroadcastHub::new(4);
        let first = hub.subscribe(3).unwrap();
        let second = hub.subscribe(3).unwrap();

        hub.unsubscribe(first);
        assert_eq!(hub.channel_count(), 1);
        assert_eq!(hub.subscriber_count(3), 1);

        drop(second);
        assert_eq!(hub.channel_count(), 0);
        assert_eq!(hub.subscriber_count(3), 0);
    }

    #[test]
    fn test_publish_prunes_closed_receivers() {
        let hub = BroadcastHub::new(4);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        hub.get_or_create_channel(5).subscribers.insert(
            999,
            SubscriberHandle {
                tx,
                overflowed: Arc::new(AtomicBool::new(false)),
            },
        );

        assert_eq!(hub.publish(notification(1, 5)), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscriptions() {
        let hub = BroadcastHub::new(4);
        let mut subscription = hub.subscribe(1).unwrap();

        hub.shutdown();

        assert_eq!(subscription.receive().await.unwrap_err(), HubError::Closed);
        assert_eq!(hub.subscribe(1).unwrap_err(), HubError::ShutDown);
        assert_eq!(hub.channel_count(), 0);
        assert!(hub.is_shut_down());
    }

    #[test]
    fn test_total_subscribers() {
        let hub = BroadcastHub::new(4);
        let _a = hub.subscribe(1).unwrap();
        let _b = hub.subscribe(1).unwrap();
        let _c = hub.subscribe(2).unwrap();

        assert_eq!(hub.channel_count(), 2);
        assert_eq!(hub.total_subscribers(), 3);
    }
}
