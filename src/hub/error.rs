use thiserror::Error;

use crate::error::AppError;

/// Errors surfaced by the broadcast hub and its subscriptions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// The subscriber's buffer filled up and it was dropped from its channel
    #[error("Subscriber for user {user_id} fell behind and was disconnected")]
    Backpressure { user_id: i32 },

    /// The subscription was removed from the hub (hub shutdown)
    #[error("Subscription closed")]
    Closed,

    /// The hub no longer accepts subscriptions
    #[error("Broadcast hub is shut down")]
    ShutDown,
}

impl From<HubError> for AppError {
    fn from(error: HubError) -> Self {
        AppError::Unavailable {
            message: error.to_string(),
        }
    }
}
