//! Application state for Axum web framework.
//!
//! Contains shared services and resources that are accessible
//! across all request handlers.

use std::sync::Arc;

use crate::config::{JwtConfig, StreamConfig};
use crate::db::AsyncDbPool;
use crate::hub::BroadcastHub;
use crate::repositories::{MemoryNotificationStore, SharedNotificationStore};
use crate::services::Services;

/// Application state containing all shared services and resources.
///
/// This struct is designed to be used with Axum's State extractor.
/// Cloning is cheap since every member is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// All business logic services
    pub services: Services,
    /// Live fan-out registry, also shut down by the server on exit
    pub hub: BroadcastHub,
    /// Database connection pool, absent for the in-memory backend
    pub db_pool: Option<AsyncDbPool>,
    /// JWT configuration for token validation
    pub jwt_config: JwtConfig,
    /// Stream keep-alive and buffering settings
    pub stream_config: StreamConfig,
}

impl AppState {
    /// Creates a new AppState over a notification store and a hub.
    ///
    /// # Arguments
    /// * `store` - Notification persistence
    /// * `hub` - Broadcast hub shared with the notification service
    /// * `db_pool` - The pool behind `store`, when it is PostgreSQL
    /// * `jwt_config` - JWT configuration for authentication
    /// * `stream_config` - Stream settings
    pub fn new(
        store: SharedNotificationStore,
        hub: BroadcastHub,
        db_pool: Option<AsyncDbPool>,
        jwt_config: JwtConfig,
        stream_config: StreamConfig,
    ) -> Self {
        let services = Services::new(store, hub.clone());
        Self {
            services,
            hub,
            db_pool,
            jwt_config,
            stream_config,
        }
    }

    /// State backed by a fresh in-memory store.
    pub fn in_memory(jwt_config: JwtConfig, stream_config: StreamConfig) -> Self {
        let hub = BroadcastHub::from_config(&stream_config);
        Self::new(
            Arc::new(MemoryNotificationStore::new()),
            hub,
            None,
            jwt_config,
            stream_config,
        )
    }
}
