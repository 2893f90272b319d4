//! Client-side session logic for the task-management app: OTP verification
//! of email and mobile, and the notification list with its unread badge.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod messages;
pub mod notifications;
pub mod presenter;
pub mod verification;

#[cfg(test)]
mod testing;
