//! Data Transfer Objects for API requests and responses.
//!
//! DTOs are organized by domain:
//! - `notification` - Notification request/response and stream DTOs
//! - `health` - Health check DTOs
//! - `error` - Common error response DTOs
//! - `pagination` - Pagination-related DTOs

mod error;
mod health;
mod notification;
mod pagination;

pub use error::ErrorResponse;
pub use health::{ComponentHealth, HealthResponse, HealthStatus, HubStats};
pub use notification::{
    CreateNotificationRequest, MarkAllReadResponse, NotificationListParams, NotificationResponse,
    StreamDisconnect, UpdateNotificationRequest,
};
pub use pagination::{PagedResponse, PaginationMeta, PaginationParams};
