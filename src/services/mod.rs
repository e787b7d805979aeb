//! Service layer for business logic operations.
//!
//! Services encapsulate business logic and coordinate between
//! the notification store, the broadcast hub and the handlers.

pub mod notifications;

pub use notifications::{
    NotificationQuery, NotificationService, Requester, StreamItem, StreamSession,
};

use crate::hub::BroadcastHub;
use crate::repositories::SharedNotificationStore;

/// Aggregates all services for convenient access.
///
/// This struct is designed to be used as Axum application state.
/// Cloning is cheap since the store and hub are shared behind `Arc`.
#[derive(Clone)]
pub struct Services {
    pub notifications: NotificationService,
}

impl Services {
    /// Creates a new Services instance over a store and a hub.
    pub fn new(store: SharedNotificationStore, hub: BroadcastHub) -> Self {
        Self {
            notifications: NotificationService::new(store, hub),
        }
    }
}
