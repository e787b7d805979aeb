//! Per-connection merge of the unread backlog with live notifications.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use futures::Stream;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::hub::{BroadcastHub, HubError, Subscription};
use crate::models::Notification;
use crate::repositories::NotificationStore;

/// Item produced by a stream session.
pub type StreamItem = Result<Arc<Notification>, HubError>;

/// Delivers one user's unseen notifications to one connection.
///
/// The session subscribes to the hub before reading the backlog, so nothing
/// created in between can be missed. A live entry is dropped only when the
/// same id was part of the backlog snapshot; live entries may arrive out of
/// id order and are never compared against each other.
pub struct StreamSession {
    subscription: Subscription,
    backlog: VecDeque<Arc<Notification>>,
    backlog_ids: HashSet<i64>,
    backlog_high_water: i64,
    delivered: u64,
}

impl StreamSession {
    /// Subscribes `user_id` and snapshots its unread backlog.
    ///
    /// Dropping the returned future before it resolves releases the
    /// subscription without emitting anything.
    pub async fn open(
        user_id: i32,
        store: &dyn NotificationStore,
        hub: &BroadcastHub,
    ) -> AppResult<Self> {
        let subscription = hub.subscribe(user_id)?;
        let backlog = store
            .find_unread_by_user(user_id)
            .await?
            .into_iter()
            .map(Arc::new)
            .collect();
        let session = Self::with_backlog(subscription, backlog);

        info!(
            user_id,
            subscriber_id = session.subscription.id(),
            backlog = session.backlog.len(),
            backlog_high_water = session.backlog_high_water(),
            "Stream session opened"
        );

        Ok(session)
    }

    fn with_backlog(subscription: Subscription, backlog: VecDeque<Arc<Notification>>) -> Self {
        let backlog_ids: HashSet<i64> = backlog.iter().map(|n| n.id).collect();
        Self {
            subscription,
            backlog_high_water: backlog_ids.iter().copied().max().unwrap_or(0),
            backlog,
            backlog_ids,
            delivered: 0,
        }
    }

    pub fn user_id(&self) -> i32 {
        self.subscription.user_id()
    }

    /// Highest id in the backlog snapshot, 0 when it was empty
    pub fn backlog_high_water(&self) -> i64 {
        self.backlog_high_water
    }

    /// Backlog entries not yet emitted
    pub fn pending_backlog(&self) -> usize {
        self.backlog.len()
    }

    /// Next notification for the client, backlog first.
    ///
    /// Returns `None` once the hub has shut down. A back-pressure
    /// disconnect is returned as an error item; the session should be
    /// dropped after it.
    pub async fn next(&mut self) -> Option<StreamItem> {
        if let Some(notification) = self.backlog.pop_front() {
            return Some(Ok(self.emit(notification)));
        }

        loop {
            match self.subscription.receive().await {
                // A publish reaches a subscription at most once, so the id can go
                Ok(notification)
                    if notification.id <= self.backlog_high_water
                        && self.backlog_ids.remove(&notification.id) =>
                {
                    debug!(
                        user_id = self.user_id(),
                        notification_id = notification.id,
                        "Skipping live notification already delivered from backlog"
                    );
                }
                Ok(notification) => return Some(Ok(self.emit(notification))),
                Err(HubError::Closed) => return None,
                Err(error) => return Some(Err(error)),
            }
        }
    }

    fn emit(&mut self, notification: Arc<Notification>) -> Arc<Notification> {
        self.delivered += 1;
        notification
    }

    /// Turns the session into a stream that ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = StreamItem> + Send + 'static {
        futures::stream::unfold(Some(self), |state| async move {
            let mut session = state?;
            match session.next().await? {
                Ok(notification) => Some((Ok(notification), Some(session))),
                Err(error) => Some((Err(error), None)),
            }
        })
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        info!(
            user_id = self.user_id(),
            subscriber_id = self.subscription.id(),
            delivered = self.delivered,
            "Stream session closed"
        );
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("subscription", &self.subscription)
            .field("pending_backlog", &self.backlog.len())
            .field("delivered", &self.delivered)
            .finish()
    }
}
