pub mod store;
pub mod types;

pub use store::{
    create_shared_notification_store, NotificationStore, PollHandle, RefreshOutcome,
    SharedNotificationStore,
};
pub use types::{format_time_ago, Notification};
