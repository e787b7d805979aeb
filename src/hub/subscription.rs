use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use tokio::sync::mpsc;

use crate::hub::HubError;
use crate::hub::broadcast::{HubInner, SubscriberId};
use crate::models::Notification;

/// A live registration on one user's channel.
///
/// Yields notifications published after registration, in publish order.
/// Dropping the subscription removes it from the hub, and removes the
/// channel too when it was the last subscriber.
pub struct Subscription {
    id: SubscriberId,
    user_id: i32,
    receiver: mpsc::Receiver<Arc<Notification>>,
    overflowed: Arc<AtomicBool>,
    hub: Weak<HubInner>,
    registered_at: Instant,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        user_id: i32,
        receiver: mpsc::Receiver<Arc<Notification>>,
        overflowed: Arc<AtomicBool>,
        hub: Weak<HubInner>,
    ) -> Self {
        Self {
            id,
            user_id,
            receiver,
            overflowed,
            hub,
            registered_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn user_id(&self) -> i32 {
        self.user_id
    }

    pub fn registered_at(&self) -> Instant {
        self.registered_at
    }

    /// Waits for the next published notification.
    ///
    /// Notifications buffered before an overflow are still returned; the
    /// error is reported once the buffer is drained.
    ///
    /// # Errors
    /// - `HubError::Backpressure` if the hub dropped this subscriber for falling behind
    /// - `HubError::Closed` if the hub shut down
    pub async fn receive(&mut self) -> Result<Arc<Notification>, HubError> {
        match self.receiver.recv().await {
            Some(notification) => Ok(notification),
            None if self.overflowed.load(Ordering::Acquire) => Err(HubError::Backpressure {
                user_id: self.user_id,
            }),
            None => Err(HubError::Closed),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.user_id, self.id);
        }
    }
}
