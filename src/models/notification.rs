//! Notification models.
//!
//! `Notification` is the domain record shared by the stores, the hub and the
//! stream sessions. The `*Row` / `*Changeset` types are the diesel mappings
//! for the `notifications` table.

use diesel::prelude::*;
use jiff::Timestamp;
use jiff_diesel::ToDiesel;

// ============================================================================
// Domain types
// ============================================================================

/// A persisted notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: i64,
    pub user_id: i32,
    pub kind: String,
    pub message: String,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<i32>,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Notification {
    /// Applies a changeset in place. Used by stores that do not go through SQL.
    pub fn apply(&mut self, changes: &NotificationChanges) {
        if let Some(kind) = &changes.kind {
            self.kind = kind.clone();
        }
        if let Some(message) = &changes.message {
            self.message = message.clone();
        }
        if let Some(related_entity_type) = &changes.related_entity_type {
            self.related_entity_type = Some(related_entity_type.clone());
        }
        if let Some(related_entity_id) = changes.related_entity_id {
            self.related_entity_id = Some(related_entity_id);
        }
        if let Some(is_read) = changes.is_read {
            self.is_read = is_read;
        }
        match (changes.is_read, changes.read_at) {
            (Some(true), Some(read_at)) => {
                self.read_at = self.read_at.or(read_at);
            }
            (_, Some(read_at)) => self.read_at = read_at,
            _ => {}
        }
    }
}

/// Input for creating a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: i32,
    pub kind: String,
    pub message: String,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<i32>,
    pub is_read: bool,
    /// Stamped by the service when the notification is created already read
    pub read_at: Option<Timestamp>,
}

/// Partial update for a notification. `None` leaves the column untouched.
///
/// With `is_read: Some(true)`, `read_at` is only a candidate stamp: the store
/// keeps an existing `read_at` and writes the candidate only when the column
/// is empty. Otherwise `Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationChanges {
    pub kind: Option<String>,
    pub message: Option<String>,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<i32>,
    pub is_read: Option<bool>,
    pub read_at: Option<Option<Timestamp>>,
}

impl NotificationChanges {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.message.is_none()
            && self.related_entity_type.is_none()
            && self.related_entity_id.is_none()
            && self.is_read.is_none()
            && self.read_at.is_none()
    }
}

/// Query filter for listing notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub user_id: Option<i32>,
    pub is_read: Option<bool>,
}

impl NotificationFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        self.user_id.is_none_or(|user_id| notification.user_id == user_id)
            && self.is_read.is_none_or(|is_read| notification.is_read == is_read)
    }
}

// ============================================================================
// Diesel mappings
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i32,
    pub notification_type: String,
    pub message: String,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<i32>,
    pub is_read: bool,
    pub read_at: Option<jiff_diesel::Timestamp>,
    pub created_at: jiff_diesel::Timestamp,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            kind: row.notification_type,
            message: row.message,
            related_entity_type: row.related_entity_type,
            related_entity_id: row.related_entity_id,
            is_read: row.is_read,
            read_at: row.read_at.map(|ts| ts.to_jiff()),
            created_at: row.created_at.to_jiff(),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotificationRow {
    pub user_id: i32,
    pub notification_type: String,
    pub message: String,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<i32>,
    pub is_read: bool,
    pub read_at: Option<jiff_diesel::Timestamp>,
}

impl From<NewNotification> for NewNotificationRow {
    fn from(new: NewNotification) -> Self {
        Self {
            user_id: new.user_id,
            notification_type: new.kind,
            message: new.message,
            related_entity_type: new.related_entity_type,
            related_entity_id: new.related_entity_id,
            is_read: new.is_read,
            read_at: new.read_at.map(|ts| ts.to_diesel()),
        }
    }
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NotificationChangeset {
    pub notification_type: Option<String>,
    pub message: Option<String>,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<i32>,
    pub is_read: Option<bool>,
    pub read_at: Option<Option<jiff_diesel::Timestamp>>,
}

impl From<NotificationChanges> for NotificationChangeset {
    fn from(changes: NotificationChanges) -> Self {
        Self {
            notification_type: changes.kind,
            message: changes.message,
            related_entity_type: changes.related_entity_type,
            related_entity_id: changes.related_entity_id,
            is_read: changes.is_read,
            read_at: changes.read_at.map(|read_at| read_at.map(|ts| ts.to_diesel())),
        }
    }
}
