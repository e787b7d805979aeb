//! Notification service for business logic.
//!
//! Enforces who may see and change which notifications, writes through the
//! store and feeds newly created notifications to the broadcast hub.

use jiff::Timestamp;
use tracing::{debug, info};

use super::stream_session::StreamSession;
use crate::error::{AppError, AppResult};
use crate::hub::BroadcastHub;
use crate::models::{NewNotification, Notification, NotificationChanges, NotificationFilter, Role};
use crate::repositories::{SharedNotificationStore, notification_not_found};

const MAX_TYPE_LENGTH: usize = 100;
const MAX_MESSAGE_LENGTH: usize = 2000;
const MAX_ENTITY_TYPE_LENGTH: usize = 100;

/// The authenticated caller of a service operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: i32,
    pub role: Role,
}

impl Requester {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }

    fn can_access(&self, notification: &Notification) -> bool {
        self.is_privileged() || notification.user_id == self.user_id
    }
}

/// Listing parameters for [`NotificationService::list_for`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationQuery {
    pub user_id: Option<i32>,
    pub is_read: Option<bool>,
    pub offset: i64,
    pub limit: i64,
}

/// Notification service composing the store with the broadcast hub
#[derive(Clone)]
pub struct NotificationService {
    store: SharedNotificationStore,
    hub: BroadcastHub,
}

impl NotificationService {
    /// Creates a new NotificationService
    ///
    /// # Arguments
    /// * `store` - Persistence for notifications
    /// * `hub` - Live fan-out for newly created notifications
    pub fn new(store: SharedNotificationStore, hub: BroadcastHub) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Creates a notification and pushes it to the recipient's open streams.
    ///
    /// Only administrators may create notifications. A notification created
    /// already read gets `read_at` stamped and is not pushed, since streams
    /// carry unread notifications only.
    ///
    /// # Errors
    /// - `AppError::Forbidden` if the requester is not privileged
    /// - `AppError::Validation` for a non-positive user id, blank or overlong text
    pub async fn create(
        &self,
        mut new: NewNotification,
        requester: Requester,
    ) -> AppResult<Notification> {
        if !requester.is_privileged() {
            return Err(AppError::Forbidden {
                message: "Only administrators can create notifications".to_string(),
            });
        }
        validate_new(&new)?;

        new.read_at = new.is_read.then(Timestamp::now);
        let created = self.store.create(new).await?;

        if created.is_read {
            info!(
                notification_id = created.id,
                user_id = created.user_id,
                "Notification created already read, skipping live delivery"
            );
        } else {
            let notification_id = created.id;
            let user_id = created.user_id;
            let delivered = self.hub.publish(created.clone());
            info!(notification_id, user_id, delivered, "Notification created");
        }

        Ok(created)
    }

    /// Lists notifications visible to the requester, newest first.
    ///
    /// Administrators see every user's notifications unless `query.user_id`
    /// narrows it down. Everyone else sees their own only.
    ///
    /// # Returns
    /// Tuple of (notifications, total matching)
    pub async fn list_for(
        &self,
        query: NotificationQuery,
        requester: Requester,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let user_id = if requester.is_privileged() {
            query.user_id
        } else {
            match query.user_id {
                Some(user_id) if user_id != requester.user_id => {
                    return Err(AppError::Forbidden {
                        message: "You can only list your own notifications".to_string(),
                    });
                }
                _ => Some(requester.user_id),
            }
        };

        let filter = NotificationFilter {
            user_id,
            is_read: query.is_read,
        };
        self.store.find_page(filter, query.offset, query.limit).await
    }

    /// Gets a notification by id.
    ///
    /// # Errors
    /// - `AppError::NotFound` if it does not exist
    /// - `AppError::Forbidden` if the requester is neither owner nor administrator
    pub async fn get(&self, id: i64, requester: Requester) -> AppResult<Notification> {
        let notification = self
            .store
            .find_one(id)
            .await?
            .ok_or_else(|| notification_not_found(id))?;

        if !requester.can_access(&notification) {
            return Err(forbidden());
        }

        Ok(notification)
    }

    /// Patches a notification.
    ///
    /// `read_at` is derived, never taken from the caller: it is stamped on
    /// the unread to read transition, kept while the notification stays
    /// read, and cleared when it is marked unread again. The store decides
    /// whether the stamp lands, so concurrent read marks keep the first one.
    pub async fn update(
        &self,
        id: i64,
        mut changes: NotificationChanges,
        requester: Requester,
    ) -> AppResult<Notification> {
        self.get(id, requester).await?;
        validate_changes(&changes)?;

        changes.read_at = changes
            .is_read
            .map(|is_read| is_read.then(Timestamp::now));

        let updated = self.store.update(id, changes).await?;
        debug!(notification_id = id, is_read = updated.is_read, "Notification updated");
        Ok(updated)
    }

    /// Deletes a notification and returns it.
    pub async fn remove(&self, id: i64, requester: Requester) -> AppResult<Notification> {
        self.get(id, requester).await?;
        let deleted = self.store.delete(id).await?;
        info!(notification_id = id, user_id = deleted.user_id, "Notification deleted");
        Ok(deleted)
    }

    /// Marks one notification read. Repeating it keeps the first `read_at`.
    pub async fn mark_read(&self, id: i64, requester: Requester) -> AppResult<Notification> {
        let changes = NotificationChanges {
            is_read: Some(true),
            ..Default::default()
        };
        self.update(id, changes, requester).await
    }

    /// Marks every unread notification of `user_id` read.
    ///
    /// No live event is published; clients re-fetch or reconnect.
    ///
    /// # Returns
    /// The number of notifications that changed
    pub async fn mark_all_read(&self, user_id: i32) -> AppResult<usize> {
        let updated = self.store.mark_all_read(user_id, Timestamp::now()).await?;
        info!(user_id, updated, "Marked all notifications read");
        Ok(updated)
    }

    /// Opens a stream of the user's unread and future notifications.
    pub async fn open_stream(&self, user_id: i32) -> AppResult<StreamSession> {
        StreamSession::open(user_id, self.store.as_ref(), &self.hub).await
    }
}

fn forbidden() -> AppError {
    AppError::Forbidden {
        message: "You do not have permission to access this notification".to_string(),
    }
}

fn validate_new(new: &NewNotification) -> AppResult<()> {
    if new.user_id <= 0 {
        return Err(AppError::Validation {
            field: "userId".to_string(),
            reason: "User ID must be a positive integer".to_string(),
        });
    }
    validate_text("type", &new.kind, MAX_TYPE_LENGTH)?;
    validate_text("message", &new.message, MAX_MESSAGE_LENGTH)?;
    if let Some(entity_type) = &new.related_entity_type {
        validate_length("relatedEntityType", entity_type, MAX_ENTITY_TYPE_LENGTH)?;
    }
    Ok(())
}

fn validate_changes(changes: &NotificationChanges) -> AppResult<()> {
    if let Some(kind) = &changes.kind {
        validate_text("type", kind, MAX_TYPE_LENGTH)?;
    }
    if let Some(message) = &changes.message {
        validate_text("message", message, MAX_MESSAGE_LENGTH)?;
    }
    if let Some(entity_type) = &changes.related_entity_type {
        validate_length("relatedEntityType", entity_type, MAX_ENTITY_TYPE_LENGTH)?;
    }
    Ok(())
}

fn validate_text(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation {
            field: field.to_string(),
            reason: "must not be blank".to_string(),
        });
    }
    validate_length(field, value, max)
}

fn validate_length(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::Validation {
            field: field.to_string(),
            reason: format!("must be at most {} characters", max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryNotificationStore;
    use std::sync::Arc;
    use std::time::Duration;

    const ADMIN: Requester = Requester {
        user_id: 1,
        role: Role::Admin,
    };
    const ALICE: Requester = Requester {
        user_id: 10,
        role: Role::User,
    };
    const BOB: Requester = Requester {
        user_id: 20,
        role: Role::User,
    };

    fn service() -> NotificationService {
        NotificationService::new(Arc::new(MemoryNotificationStore::new()), BroadcastHub::new(16))
    }

    fn new_for(user_id: i32, message: &str) -> NewNotification {
        NewNotification {
            user_id,
            kind: "ORDER_CONFIRMATION".to_string(),
            message: message.to_string(),
            related_entity_type: Some("ORDER".to_string()),
            related_entity_id: Some(7),
            is_read: false,
            read_at: None,
        }
    }

    async fn next_id(session: &mut StreamSession) -> i64 {
        tokio::time::timeout(Duration::from_secs(1), session.next())
            .await
            .expect("session stalled")
            .expect("session ended")
            .expect("session errored")
            .id
    }

    async fn drain_ids(session: &mut StreamSession) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Ok(Some(Ok(notification))) =
            tokio::time::timeout(Duration::from_millis(30), session.next()).await
        {
            ids.push(notification.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_create_requires_admin() {
        let service = service();

        let result = service.create(new_for(ALICE.user_id, "hi"), ALICE).await;

        match result {
            Err(AppError::Forbidden { message }) => {
                assert_eq!(message, "Only administrators can create notifications")
            }
            other => panic!("Expected Forbidden, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let service = service();

        let bad_user = service.create(new_for(0, "hi"), ADMIN).await;
        assert!(matches!(bad_user, Err(AppError::Validation { field, .. }) if field == "userId"));

        let blank = service.create(new_for(5, "   "), ADMIN).await;
        assert!(matches!(blank, Err(AppError::Validation { field, .. }) if field == "message"));

        let mut long_type = new_for(5, "hi");
        long_type.kind = "X".repeat(MAX_TYPE_LENGTH + 1);
        let long_type = service.create(long_type, ADMIN).await;
        assert!(matches!(long_type, Err(AppError::Validation { field, .. }) if field == "type"));
    }

    #[tokio::test]
    async fn test_create_publishes_unread_to_open_stream() {
        let service = service();
        let mut session = service.open_stream(ALICE.user_id).await.unwrap();

        let created = service.create(new_for(ALICE.user_id, "live"), ADMIN).await.unwrap();

        assert_eq!(next_id(&mut session).await, created.id);
    }

    #[tokio::test]
    async fn test_create_read_stamps_read_at_and_skips_publish() {
        let service = service();
        let mut session = service.open_stream(ALICE.user_id).await.unwrap();

        let mut new = new_for(ALICE.user_id, "already seen");
        new.is_read = true;
        let created = service.create(new, ADMIN).await.unwrap();

        assert!(created.read_at.is_some());
        assert!(drain_ids(&mut session).await.is_empty());
    }

    #[tokio::test]
    async fn test_get_not_found_then_forbidden() {
        let service = service();
        let created = service.create(new_for(ALICE.user_id, "mine"), ADMIN).await.unwrap();

        let missing = service.get(999, ALICE).await;
        assert!(matches!(missing, Err(AppError::NotFound { value, .. }) if value == "999"));

        assert!(matches!(
            service.get(created.id, BOB).await,
            Err(AppError::Forbidden { .. })
        ));
        assert_eq!(service.get(created.id, ALICE).await.unwrap(), created);
        assert_eq!(service.get(created.id, ADMIN).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_access_matrix_for_mutations() {
        let service = service();
        let created = service.create(new_for(ALICE.user_id, "mine"), ADMIN).await.unwrap();

        assert!(matches!(
            service.mark_read(created.id, BOB).await,
            Err(AppError::Forbidden { .. })
        ));
        assert!(matches!(
            service
                .update(created.id, NotificationChanges::default(), BOB)
                .await,
            Err(AppError::Forbidden { .. })
        ));
        assert!(matches!(
            service.remove(created.id, BOB).await,
            Err(AppError::Forbidden { .. })
        ));

        assert!(service.mark_read(created.id, ALICE).await.is_ok());
        assert_eq!(service.remove(created.id, ADMIN).await.unwrap().id, created.id);
        assert!(matches!(
            service.remove(created.id, ADMIN).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let service = service();
        let created = service.create(new_for(ALICE.user_id, "read me"), ADMIN).await.unwrap();

        let first = service.mark_read(created.id, ALICE).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = service.mark_read(created.id, ALICE).await.unwrap();

        assert!(first.is_read);
        assert!(first.read_at.is_some());
        assert_eq!(first.read_at, second.read_at);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mark_read_keeps_one_read_at() {
        for _ in 0..50 {
            let service = service();
            let created = service.create(new_for(ALICE.user_id, "race"), ADMIN).await.unwrap();

            let (first, second) = tokio::join!(
                tokio::spawn({
                    let service = service.clone();
                    async move { service.mark_read(created.id, ALICE).await }
                }),
                tokio::spawn({
                    let service = service.clone();
                    async move { service.mark_read(created.id, ADMIN).await }
                }),
            );
            let first = first.unwrap().unwrap();
            let second = second.unwrap().unwrap();
            let stored = service.get(created.id, ALICE).await.unwrap();

            assert!(stored.read_at.is_some());
            assert_eq!(first.read_at, stored.read_at);
            assert_eq!(second.read_at, stored.read_at);
        }
    }

    #[tokio::test]
    async fn test_update_read_at_rules() {
        let service = service();
        let created = service.create(new_for(ALICE.user_id, "toggle"), ADMIN).await.unwrap();

        let read = service
            .update(
                created.id,
                NotificationChanges {
                    is_read: Some(true),
                    // Ignored: read_at is derived
                    read_at: Some(Some(Timestamp::UNIX_EPOCH)),
                    ..Default::default()
                },
                ALICE,
            )
            .await
            .unwrap();
        assert!(read.read_at.is_some());
        assert_ne!(read.read_at, Some(Timestamp::UNIX_EPOCH));

        let renamed = service
            .update(
                created.id,
                NotificationChanges {
                    message: Some("renamed".to_string()),
                    ..Default::default()
                },
                ALICE,
            )
            .await
            .unwrap();
        assert_eq!(renamed.message, "renamed");
        assert_eq!(renamed.read_at, read.read_at);

        let unread = service
            .update(
                created.id,
                NotificationChanges {
                    is_read: Some(false),
                    ..Default::default()
                },
                ALICE,
            )
            .await
            .unwrap();
        assert!(!unread.is_read);
        assert_eq!(unread.read_at, None);
    }

    #[tokio::test]
    async fn test_list_for_scoping() {
        let service = service();
        for i in 0..3 {
            service.create(new_for(ALICE.user_id, &format!("a{i}")), ADMIN).await.unwrap();
        }
        service.create(new_for(BOB.user_id, "b"), ADMIN).await.unwrap();

        let query = NotificationQuery {
            limit: 10,
            ..Default::default()
        };

        let (own, total) = service.list_for(query, ALICE).await.unwrap();
        assert_eq!(total, 3);
        assert!(own.iter().all(|n| n.user_id == ALICE.user_id));
        assert!(own.windows(2).all(|w| w[0].id > w[1].id));

        let (all, total) = service.list_for(query, ADMIN).await.unwrap();
        assert_eq!((all.len(), total), (4, 4));

        let bob_only = NotificationQuery {
            user_id: Some(BOB.user_id),
            ..query
        };
        let (bobs, _) = service.list_for(bob_only, ADMIN).await.unwrap();
        assert_eq!(bobs.len(), 1);

        assert!(matches!(
            service.list_for(bob_only, ALICE).await,
            Err(AppError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_for_read_filter_and_paging() {
        let service = service();
        for i in 0..5 {
            service.create(new_for(ALICE.user_id, &format!("a{i}")), ADMIN).await.unwrap();
        }
        service.mark_read(1, ALICE).await.unwrap();

        let unread = NotificationQuery {
            is_read: Some(false),
            offset: 0,
            limit: 2,
            ..Default::default()
        };
        let (page, total) = service.list_for(unread, ALICE).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(page.iter().map(|n| n.id).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[tokio::test]
    async fn test_mark_all_read_counts_and_does_not_publish() {
        let service = service();
        service.create(new_for(ALICE.user_id, "a"), ADMIN).await.unwrap();
        service.create(new_for(ALICE.user_id, "b"), ADMIN).await.unwrap();
        let mut session = service.open_stream(ALICE.user_id).await.unwrap();
        assert_eq!(drain_ids(&mut session).await, vec![1, 2]);

        assert_eq!(service.mark_all_read(ALICE.user_id).await.unwrap(), 2);
        assert_eq!(service.mark_all_read(ALICE.user_id).await.unwrap(), 0);
        assert!(drain_ids(&mut session).await.is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_after_read_and_live() {
        let service = service();
        for i in 1..=3 {
            service.create(new_for(ALICE.user_id, &format!("n{i}")), ADMIN).await.unwrap();
        }

        let mut first = service.open_stream(ALICE.user_id).await.unwrap();
        assert_eq!(drain_ids(&mut first).await, vec![1, 2, 3]);

        service.create(new_for(ALICE.user_id, "n4"), ADMIN).await.unwrap();
        assert_eq!(next_id(&mut first).await, 4);

        service.mark_read(2, ALICE).await.unwrap();
        drop(first);

        let mut second = service.open_stream(ALICE.user_id).await.unwrap();
        assert_eq!(drain_ids(&mut second).await, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn test_two_connections_each_receive_once() {
        let service = service();
        let mut first = service.open_stream(ALICE.user_id).await.unwrap();
        let mut second = service.open_stream(ALICE.user_id).await.unwrap();

        let created = service.create(new_for(ALICE.user_id, "both"), ADMIN).await.unwrap();

        assert_eq!(drain_ids(&mut first).await, vec![created.id]);
        assert_eq!(drain_ids(&mut second).await, vec![created.id]);
    }

    #[tokio::test]
    async fn test_notifications_created_while_offline_arrive_on_reconnect() {
        let service = service();
        let session = service.open_stream(ALICE.user_id).await.unwrap();
        drop(session);
        assert_eq!(service.hub().channel_count(), 0);

        service.create(new_for(ALICE.user_id, "offline"), ADMIN).await.unwrap();

        let mut session = service.open_stream(ALICE.user_id).await.unwrap();
        assert_eq!(drain_ids(&mut session).await, vec![1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_and_connect_deliver_exactly_once() {
        for _ in 0..20 {
            let service = service();
            service.create(new_for(ALICE.user_id, "before"), ADMIN).await.unwrap();

            let writer = {
                let service = service.clone();
                tokio::spawn(async move {
                    for i in 0..10 {
                        service
                            .create(new_for(ALICE.user_id, &format!("w{i}")), ADMIN)
                            .await
                            .unwrap();
                    }
                })
            };
            let mut session = service.open_stream(ALICE.user_id).await.unwrap();
            writer.await.unwrap();

            let ids = drain_ids(&mut session).await;
            assert_eq!(ids, (1..=11).collect::<Vec<i64>>());
        }
    }

    mod backlog_properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn backlog_is_complete_and_ordered(
                owners in prop::collection::vec(prop_oneof![Just(10), Just(20)], 0..30),
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();

                let (delivered, expected) = runtime.block_on(async {
                    let service = service();
                    let mut expected = Vec::new();
                    for owner in &owners {
                        let created = service.create(new_for(*owner, "p"), ADMIN).await.unwrap();
                        if *owner == ALICE.user_id {
                            expected.push(created.id);
                        }
                    }
                    let mut session = service.open_stream(ALICE.user_id).await.unwrap();
                    (drain_ids(&mut session).await, expected)
                });

                prop_assert_eq!(delivered, expected);
            }
        }
    }
}
