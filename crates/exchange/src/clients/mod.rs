//! Fire-and-forget side-effect clients

pub mod activity;
pub mod notifications;

pub use activity::{ActivityAction, ActivityLogClient, ActivityRecord, MockActivityLogClient};
pub use notifications::{
    MockNotificationClient, Notification, NotificationClient, NotificationKind,
};
