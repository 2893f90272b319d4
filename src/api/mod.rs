//! HTTP access to the task-management backend

pub mod client;
pub mod types;

pub use client::{create_shared_api_client, ApiClient, NotificationApi, OtpApi, SharedApiClient};
pub use types::{ChannelStatus, ChannelStatuses, OtpResponse, ResponseStatus};
