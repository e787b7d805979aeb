mod notification;
mod role;

pub use notification::{
    NewNotification, NewNotificationRow, Notification, NotificationChanges, NotificationChangeset,
    NotificationFilter, NotificationRow,
};
pub use role::Role;
