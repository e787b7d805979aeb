//! PostgreSQL notification store.

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::{Nullable, Timestamptz};
use diesel_async::RunQueryDsl;
use jiff::Timestamp;
use jiff_diesel::ToDiesel;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult, DatabaseErrorConverter};
use crate::models::{
    NewNotification, NewNotificationRow, Notification, NotificationChanges, NotificationChangeset,
    NotificationFilter, NotificationRow,
};
use crate::repositories::{NotificationStore, notification_not_found};
use crate::schema::notifications;

/// Notification store backed by the `notifications` table
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: AsyncDbPool,
}

impl PgNotificationStore {
    /// Creates a new PgNotificationStore with the given connection pool.
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    fn filtered(filter: NotificationFilter) -> notifications::BoxedQuery<'static, Pg> {
        let mut query = notifications::table.into_boxed();
        if let Some(uid) = filter.user_id {
            query = query.filter(notifications::user_id.eq(uid));
        }
        if let Some(read) = filter.is_read {
            query = query.filter(notifications::is_read.eq(read));
        }
        query
    }
}

fn db_error(operation: &'static str) -> impl FnOnce(diesel::result::Error) -> AppError {
    move |e| DatabaseErrorConverter::convert_diesel_error(e, operation)
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, new: NewNotification) -> AppResult<Notification> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::insert_into(notifications::table)
            .values(NewNotificationRow::from(new))
            .returning(NotificationRow::as_returning())
            .get_result(&mut conn)
            .await
            .map(Notification::from)
            .map_err(db_error("insert notification"))
    }

    async fn find_unread_by_user(&self, user_id: i32) -> AppResult<Vec<Notification>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let rows = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false))
            .order(notifications::id.asc())
            .select(NotificationRow::as_select())
            .load(&mut conn)
            .await
            .map_err(db_error("load unread notifications"))?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn find_one(&self, id: i64) -> AppResult<Option<Notification>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let row = notifications::table
            .find(id)
            .select(NotificationRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(db_error("find notification"))?;

        Ok(row.map(Notification::from))
    }

    async fn find_page(
        &self,
        filter: NotificationFilter,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let rows = Self::filtered(filter)
            .order(notifications::id.desc())
            .offset(offset)
            .limit(limit)
            .select(NotificationRow::as_select())
            .load(&mut conn)
            .await
            .map_err(db_error("list notifications"))?;

        let total = Self::filtered(filter)
            .count()
            .get_result::<i64>(&mut conn)
            .await
            .map_err(db_error("count notifications"))?;

        Ok((rows.into_iter().map(Notification::from).collect(), total))
    }

    async fn update(&self, id: i64, mut changes: NotificationChanges) -> AppResult<Notification> {
        // An empty changeset is rejected by diesel at query build time
        if changes.is_empty() {
            return self.find_one(id).await?.ok_or_else(|| notification_not_found(id));
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let target = notifications::table.find(id);
        let updated = match (changes.is_read, changes.read_at.take()) {
            (Some(true), Some(Some(read_at))) => {
                // COALESCE is evaluated against the row version that holds the
                // row lock, so a concurrent stamp is never overwritten.
                let stamp = sql::<Nullable<Timestamptz>>("COALESCE(read_at, ")
                    .bind::<Timestamptz, _>(read_at.to_diesel())
                    .sql(")");
                diesel::update(target)
                    .set((
                        NotificationChangeset::from(changes),
                        notifications::read_at.eq(stamp),
                    ))
                    .returning(NotificationRow::as_returning())
                    .get_result(&mut conn)
                    .await
            }
            (_, read_at) => {
                changes.read_at = read_at;
                diesel::update(target)
                    .set(NotificationChangeset::from(changes))
                    .returning(NotificationRow::as_returning())
                    .get_result(&mut conn)
                    .await
            }
        };

        updated
            .optional()
            .map_err(db_error("update notification"))?
            .map(Notification::from)
            .ok_or_else(|| notification_not_found(id))
    }

    async fn delete(&self, id: i64) -> AppResult<Notification> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::delete(notifications::table.find(id))
            .returning(NotificationRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(db_error("delete notification"))?
            .map(Notification::from)
            .ok_or_else(|| notification_not_found(id))
    }

    async fn mark_all_read(&self, user_id: i32, read_at: Timestamp) -> AppResult<usize> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set((
            notifications::is_read.eq(true),
            notifications::read_at.eq(read_at.to_diesel()),
        ))
        .execute(&mut conn)
        .await
        .map_err(db_error("mark all notifications read"))
    }
}
