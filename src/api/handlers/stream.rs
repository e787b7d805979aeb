//! Server-sent event stream of a user's notifications.
//!
//! The stream starts with the caller's unread backlog, oldest first, and then
//! follows live notifications. Each item is an `event: notification` frame
//! whose `id` is the notification id. A client that falls behind receives a
//! single `event: disconnect` frame and should reconnect.

use std::convert::Infallible;

use axum::{
    Extension,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use tracing::warn;

use crate::api::doc::NOTIFICATION_TAG;
use crate::api::dto::{ErrorResponse, NotificationResponse, StreamDisconnect};
use crate::api::middleware::AuthUser;
use crate::error::AppResult;
use crate::hub::HubError;
use crate::services::StreamItem;
use crate::state::AppState;

pub const NOTIFICATION_EVENT: &str = "notification";
pub const DISCONNECT_EVENT: &str = "disconnect";

/// GET /api/notifications/stream - Live notification stream
#[utoipa::path(
    get,
    path = "/stream",
    tag = NOTIFICATION_TAG,
    responses(
        (status = 200, description = "Event stream of `notification` events, ending with `disconnect` on back-pressure",
            content_type = "text/event-stream", body = NotificationResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 503, description = "Server is shutting down", body = ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn notification_stream(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session = state
        .services
        .notifications
        .open_stream(auth_user.user_id)
        .await?;

    let events = session
        .into_stream()
        .filter_map(|item| async move { to_event(item).map(Ok) });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.stream_config.keep_alive())))
}

fn to_event(item: StreamItem) -> Option<Event> {
    match item {
        Ok(notification) => {
            let payload = NotificationResponse::from(notification.as_ref());
            Event::default()
                .event(NOTIFICATION_EVENT)
                .id(notification.id.to_string())
                .json_data(payload)
                .map_err(|err| {
                    warn!(notification_id = notification.id, error = %err, "Failed to encode stream event");
                })
                .ok()
        }
        Err(error) => {
            let disconnect = StreamDisconnect {
                reason: disconnect_reason(&error).to_string(),
            };
            Event::default()
                .event(DISCONNECT_EVENT)
                .json_data(disconnect)
                .ok()
        }
    }
}

fn disconnect_reason(error: &HubError) -> &'static str {
    match error {
        HubError::Backpressure { .. } => "backpressure",
        HubError::ShutDown => "shutdown",
        HubError::Closed => "closed",
    }
}
