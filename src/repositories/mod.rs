//! Persistence layer for notifications.
//!
//! `NotificationStore` is the seam between the service and storage. The
//! PostgreSQL implementation backs production; the in-memory one backs tests
//! and `database.backend = "memory"`.

mod memory_store;
mod notification_repo;

pub use memory_store::MemoryNotificationStore;
pub use notification_repo::PgNotificationStore;

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{AppError, AppResult};
use crate::models::{NewNotification, Notification, NotificationChanges, NotificationFilter};

/// CRUD and filtered queries over persisted notifications.
///
/// Implementations hold no concurrency logic of their own beyond what the
/// backing storage provides; every call is a single-record or
/// single-filter operation.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persists a new notification and returns it with its assigned id.
    async fn create(&self, new: NewNotification) -> AppResult<Notification>;

    /// All unread notifications of a user, ordered by id ascending.
    async fn find_unread_by_user(&self, user_id: i32) -> AppResult<Vec<Notification>>;

    async fn find_one(&self, id: i64) -> AppResult<Option<Notification>>;

    /// One page of notifications matching `filter`, newest first, plus the
    /// total number of matches.
    async fn find_page(
        &self,
        filter: NotificationFilter,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Notification>, i64)>;

    /// Applies `changes` and returns the updated record.
    ///
    /// Marking read never replaces an existing `read_at`; the check and the
    /// write happen in one atomic step, so concurrent callers agree on the
    /// first stamp.
    ///
    /// # Errors
    /// `AppError::NotFound` when no notification has this id.
    async fn update(&self, id: i64, changes: NotificationChanges) -> AppResult<Notification>;

    /// Deletes the notification and returns what was removed.
    ///
    /// # Errors
    /// `AppError::NotFound` when no notification has this id.
    async fn delete(&self, id: i64) -> AppResult<Notification>;

    /// Marks every unread notification of `user_id` read at `read_at`.
    ///
    /// # Returns
    /// The number of notifications that changed state
    async fn mark_all_read(&self, user_id: i32, read_at: Timestamp) -> AppResult<usize>;
}

/// Store handle shared between the service and the HTTP state.
pub type SharedNotificationStore = Arc<dyn NotificationStore>;

pub(crate) fn notification_not_found(id: i64) -> AppError {
    AppError::NotFound {
        entity: "Notification".to_string(),
        field: "id".to_string(),
        value: id.to_string(),
    }
}
