//! Notification API handlers.
//!
//! CRUD and read-state endpoints for notifications. The live stream lives in
//! `stream.rs` and is mounted on the same router.

use crate::api::doc::NOTIFICATION_TAG;
use crate::api::dto::{
    CreateNotificationRequest, ErrorResponse, MarkAllReadResponse, NotificationListParams,
    NotificationResponse, PagedResponse, PaginationParams, UpdateNotificationRequest,
};
use crate::api::handlers::stream;
use crate::api::middleware::AuthUser;
use crate::error::AppResult;
use crate::services::NotificationQuery;
use crate::state::AppState;
use crate::utils::validate::{ValidatedJson, ValidatedQuery};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

/// Creates notification-related routes.
///
/// Routes:
/// - POST /                - Create notification (administrators)
/// - GET /                 - List notifications
/// - GET /stream           - Live event stream
/// - PATCH /mark-all-read  - Mark all of the caller's notifications read
/// - GET /{id}             - Get notification
/// - PATCH /{id}           - Update notification
/// - DELETE /{id}          - Delete notification
/// - PATCH /{id}/read      - Mark one notification read
pub fn notification_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_notification, list_notifications))
        .routes(routes!(stream::notification_stream))
        .routes(routes!(mark_all_read))
        .routes(routes!(get_notification, update_notification, delete_notification))
        .routes(routes!(mark_read))
}

/// POST /api/notifications - Create notification
///
/// Persists the notification and pushes it to the recipient's open streams.
#[utoipa::path(
    post,
    path = "/",
    tag = NOTIFICATION_TAG,
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = NotificationResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Caller is not an administrator", body = ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
async fn create_notification(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<CreateNotificationRequest>,
) -> AppResult<(StatusCode, Json<NotificationResponse>)> {
    let notification = state
        .services
        .notifications
        .create(payload.into(), auth_user.requester())
        .await?;
    Ok((StatusCode::CREATED, Json(notification.into())))
}

/// GET /api/notifications - List notifications
///
/// Newest first. Non-administrators only see their own notifications.
#[utoipa::path(
    get,
    path = "/",
    tag = NOTIFICATION_TAG,
    params(NotificationListParams, PaginationParams),
    responses(
        (status = 200, description = "Paginated list of notifications", body = PagedResponse<NotificationResponse>),
        (status = 403, description = "Listing another user's notifications", body = ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ValidatedQuery(filter): ValidatedQuery<NotificationListParams>,
    ValidatedQuery(params): ValidatedQuery<PaginationParams>,
) -> AppResult<Json<PagedResponse<NotificationResponse>>> {
    let query = NotificationQuery {
        user_id: filter.user_id,
        is_read: filter.is_read,
        offset: params.offset(),
        limit: i64::from(params.limit()),
    };

    let (notifications, total) = state
        .services
        .notifications
        .list_for(query, auth_user.requester())
        .await?;

    let data = notifications
        .into_iter()
        .map(NotificationResponse::from)
        .collect();
    Ok(Json(PagedResponse::new(data, &params, total as u64)))
}

/// GET /api/notifications/{id} - Get notification
#[utoipa::path(
    get,
    path = "/{id}",
    tag = NOTIFICATION_TAG,
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification found", body = NotificationResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
async fn get_notification(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<NotificationResponse>> {
    let notification = state
        .services
        .notifications
        .get(id, auth_user.requester())
        .await?;
    Ok(Json(notification.into()))
}

/// PATCH /api/notifications/{id} - Update notification
///
/// `readAt` is stamped the first time the notification becomes read and
/// cleared when it is marked unread.
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = NOTIFICATION_TAG,
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    request_body = UpdateNotificationRequest,
    responses(
        (status = 200, description = "Notification updated", body = NotificationResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
async fn update_notification(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateNotificationRequest>,
) -> AppResult<Json<NotificationResponse>> {
    let notification = state
        .services
        .notifications
        .update(id, payload.into(), auth_user.requester())
        .await?;
    Ok(Json(notification.into()))
}

/// DELETE /api/notifications/{id} - Delete notification
///
/// Returns the deleted record.
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = NOTIFICATION_TAG,
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification deleted", body = NotificationResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<NotificationResponse>> {
    let notification = state
        .services
        .notifications
        .remove(id, auth_user.requester())
        .await?;
    Ok(Json(notification.into()))
}

/// PATCH /api/notifications/{id}/read - Mark notification read
///
/// Idempotent: marking an already read notification keeps its `readAt`.
#[utoipa::path(
    patch,
    path = "/{id}/read",
    tag = NOTIFICATION_TAG,
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
async fn mark_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<NotificationResponse>> {
    let notification = state
        .services
        .notifications
        .mark_read(id, auth_user.requester())
        .await?;
    Ok(Json(notification.into()))
}

/// PATCH /api/notifications/mark-all-read - Mark all read
///
/// Applies to the caller's own notifications. Open streams are not notified.
#[utoipa::path(
    patch,
    path = "/mark-all-read",
    tag = NOTIFICATION_TAG,
    responses(
        (status = 200, description = "Notifications marked read", body = MarkAllReadResponse)
    ),
    security(("bearerAuth" = []))
)]
async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<MarkAllReadResponse>> {
    let updated = state
        .services
        .notifications
        .mark_all_read(auth_user.user_id)
        .await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
