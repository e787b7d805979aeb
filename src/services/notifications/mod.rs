//! Notification delivery: the service facade and per-connection stream sessions.

pub mod notification_service;
pub mod stream_session;

pub use notification_service::{NotificationQuery, NotificationService, Requester};
pub use stream_session::{StreamItem, StreamSession};
