//! Per-user live fan-out of newly created notifications.

mod broadcast;
mod error;
mod subscription;

pub use broadcast::{BroadcastHub, SubscriberId};
pub use error::HubError;
pub use subscription::Subscription;
