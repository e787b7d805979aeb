//! In-process notification store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{AppError, AppResult};
use crate::models::{NewNotification, Notification, NotificationChanges, NotificationFilter};
use crate::repositories::{NotificationStore, notification_not_found};

#[derive(Default)]
struct MemoryState {
    last_id: i64,
    rows: BTreeMap<i64, Notification>,
}

/// Notification store held in a mutex-guarded `BTreeMap`.
///
/// Ids are assigned from a counter under the same lock as the insert, so they
/// are strictly increasing in commit order.
#[derive(Default)]
pub struct MemoryNotificationStore {
    state: Mutex<MemoryState>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|e| AppError::Internal {
            source: anyhow::anyhow!("notification store lock poisoned: {}", e),
        })
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, new: NewNotification) -> AppResult<Notification> {
        let mut state = self.lock()?;
        state.last_id += 1;

        let notification = Notification {
            id: state.last_id,
            user_id: new.user_id,
            kind: new.kind,
            message: new.message,
            related_entity_type: new.related_entity_type,
            related_entity_id: new.related_entity_id,
            is_read: new.is_read,
            read_at: new.read_at,
            created_at: Timestamp::now(),
        };
        state.rows.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn find_unread_by_user(&self, user_id: i32) -> AppResult<Vec<Notification>> {
        let state = self.lock()?;
        Ok(state
            .rows
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .cloned()
            .collect())
    }

    async fn find_one(&self, id: i64) -> AppResult<Option<Notification>> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    async fn find_page(
        &self,
        filter: NotificationFilter,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let state = self.lock()?;
        let matching: Vec<&Notification> = state
            .rows
            .values()
            .rev()
            .filter(|n| filter.matches(n))
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn update(&self, id: i64, changes: NotificationChanges) -> AppResult<Notification> {
        let mut state = self.lock()?;
        let notification = state
            .rows
            .get_mut(&id)
            .ok_or_else(|| notification_not_found(id))?;
        notification.apply(&changes);
        Ok(notification.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<Notification> {
        self.lock()?
            .rows
            .remove(&id)
            .ok_or_else(|| notification_not_found(id))
    }

    async fn mark_all_read(&self, user_id: i32, read_at: Timestamp) -> AppResult<usize> {
        let mut state = self.lock()?;
        let mut updated = 0;
        for notification in state
            .rows
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            notification.read_at = Some(read_at);
            updated += 1;
        }
        Ok(updated)
    }
}
