//! Notification DTOs for API requests, responses and stream events.
//!
//! Field names are camelCase on the wire; the notification kind travels as
//! `type`.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::models::{NewNotification, Notification, NotificationChanges};

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

/// Request to create a notification
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "userId": 42,
    "type": "ORDER_CONFIRMATION",
    "message": "Your order #1001 has been confirmed",
    "relatedEntityType": "ORDER",
    "relatedEntityId": 1001
}))]
pub struct CreateNotificationRequest {
    /// Recipient user ID
    #[validate(range(min = 1, message = "userId must be a positive integer"))]
    pub user_id: i32,

    /// Notification kind, e.g. ORDER_CONFIRMATION (1-100 characters)
    #[serde(rename = "type")]
    #[schema(rename = "type")]
    #[validate(
        length(min = 1, max = 100, message = "type must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    pub kind: String,

    /// Human-readable text (1-2000 characters)
    #[validate(
        length(min = 1, max = 2000, message = "message must be 1-2000 characters"),
        custom(function = "not_blank")
    )]
    pub message: String,

    #[validate(length(max = 100, message = "relatedEntityType must be at most 100 characters"))]
    pub related_entity_type: Option<String>,

    pub related_entity_id: Option<i32>,

    /// Create the notification already read
    #[serde(default)]
    pub is_read: bool,
}

impl From<CreateNotificationRequest> for NewNotification {
    fn from(request: CreateNotificationRequest) -> Self {
        Self {
            user_id: request.user_id,
            kind: request.kind,
            message: request.message,
            related_entity_type: request.related_entity_type,
            related_entity_id: request.related_entity_id,
            is_read: request.is_read,
            read_at: None,
        }
    }
}

/// Partial update of a notification. The recipient cannot be changed.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotificationRequest {
    #[serde(rename = "type")]
    #[schema(rename = "type")]
    #[validate(
        length(min = 1, max = 100, message = "type must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    pub kind: Option<String>,

    #[validate(
        length(min = 1, max = 2000, message = "message must be 1-2000 characters"),
        custom(function = "not_blank")
    )]
    pub message: Option<String>,

    #[validate(length(max = 100, message = "relatedEntityType must be at most 100 characters"))]
    pub related_entity_type: Option<String>,

    pub related_entity_id: Option<i32>,

    /// Read state; `readAt` follows it automatically
    pub is_read: Option<bool>,
}

impl From<UpdateNotificationRequest> for NotificationChanges {
    fn from(request: UpdateNotificationRequest) -> Self {
        Self {
            kind: request.kind,
            message: request.message,
            related_entity_type: request.related_entity_type,
            related_entity_id: request.related_entity_id,
            is_read: request.is_read,
            read_at: None,
        }
    }
}

/// Filters for listing notifications
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct NotificationListParams {
    /// Recipient to list; administrators only when it is not the caller
    #[validate(range(min = 1, message = "user_id must be a positive integer"))]
    pub user_id: Option<i32>,

    /// Only read (`true`) or unread (`false`) notifications
    pub is_read: Option<bool>,
}

/// A notification as returned by the API and pushed on the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    #[schema(example = 17)]
    pub id: i64,
    #[schema(example = 42)]
    pub user_id: i32,
    #[serde(rename = "type")]
    #[schema(rename = "type", example = "ORDER_CONFIRMATION")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_entity_id: Option<i32>,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub read_at: Option<Timestamp>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            user_id: notification.user_id,
            kind: notification.kind,
            message: notification.message,
            related_entity_type: notification.related_entity_type,
            related_entity_id: notification.related_entity_id,
            is_read: notification.is_read,
            read_at: notification.read_at,
            created_at: notification.created_at,
        }
    }
}

impl From<&Notification> for NotificationResponse {
    fn from(notification: &Notification) -> Self {
        Self::from(notification.clone())
    }
}

/// Result of marking all notifications read
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponse {
    /// Number of notifications that changed from unread to read
    #[schema(example = 3)]
    pub updated: usize,
}

/// Payload of the final `disconnect` stream event
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StreamDisconnect {
    #[schema(example = "backpressure")]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Notification {
        Notification {
            id: 17,
            user_id: 42,
            kind: "ORDER_CONFIRMATION".to_string(),
            message: "Confirmed".to_string(),
            related_entity_type: None,
            related_entity_id: None,
            is_read: false,
            read_at: None,
            created_at: "2025-01-15T10:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_response_wire_format() {
        let json = serde_json::to_value(NotificationResponse::from(sample())).unwrap();

        assert_eq!(
            json,
            json!({
                "id": 17,
                "userId": 42,
                "type": "ORDER_CONFIRMATION",
                "message": "Confirmed",
                "isRead": false,
                "createdAt": "2025-01-15T10:00:00Z"
            })
        );
    }

    #[test]
    fn test_response_includes_optional_fields_when_set() {
        let mut notification = sample();
        notification.related_entity_type = Some("ORDER".to_string());
        notification.related_entity_id = Some(1001);
        notification.is_read = true;
        notification.read_at = Some("2025-01-15T11:30:00Z".parse().unwrap());

        let json = serde_json::to_value(NotificationResponse::from(&notification)).unwrap();

        assert_eq!(json["relatedEntityType"], "ORDER");
        assert_eq!(json["relatedEntityId"], 1001);
        assert_eq!(json["readAt"], "2025-01-15T11:30:00Z");
    }

    #[test]
    fn test_create_request_reads_type_field() {
        let request: CreateNotificationRequest = serde_json::from_value(json!({
            "userId": 42,
            "type": "PROMO",
            "message": "Sale"
        }))
        .unwrap();

        assert!(request.validate().is_ok());
        let new = NewNotification::from(request);
        assert_eq!(new.kind, "PROMO");
        assert!(!new.is_read);
    }

    #[test]
    fn test_create_request_rejects_blank_message() {
        let request: CreateNotificationRequest = serde_json::from_value(json!({
            "userId": 0,
            "type": "PROMO",
            "message": "   "
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("message"));
        assert!(fields.contains_key("user_id"));
    }

    #[test]
    fn test_update_request_maps_to_changes() {
        let request: UpdateNotificationRequest =
            serde_json::from_value(json!({ "isRead": true, "type": "SHIPPING" })).unwrap();

        assert!(request.validate().is_ok());
        let changes = NotificationChanges::from(request);
        assert_eq!(changes.is_read, Some(true));
        assert_eq!(changes.kind.as_deref(), Some("SHIPPING"));
        assert_eq!(changes.read_at, None);
    }

    #[test]
    fn test_update_request_ignores_user_id() {
        let request: UpdateNotificationRequest =
            serde_json::from_value(json!({ "userId": 99 })).unwrap();
        assert!(NotificationChanges::from(request).is_empty());
    }
}
