//! Wire types for the OTP and notification endpoints

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::verification::VerificationChannel;

/// `status` field shared by the OTP endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Body returned by `/api/otp/generate/` and `/api/otp/verify/`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtpResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Phrases the backend uses when asking the user to wait before retrying
const RATE_LIMIT_MARKERS: &[&str] = &["please wait", "rate limit", "too many"];

impl OtpResponse {
    pub fn success() -> Self {
        Self {
            status: ResponseStatus::Success,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: Some(message.into()),
        }
    }

    /// The server gives no dedicated code for throttling, only the message text
    pub fn is_rate_limited(&self) -> bool {
        self.status == ResponseStatus::Error
            && self.message.as_deref().is_some_and(|m| {
                let lower = m.to_lowercase();
                RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
            })
    }

    /// Convert into the error taxonomy, using `fallback` when the server sent no message
    pub fn into_result(self, fallback: &str) -> Result<(), SessionError> {
        if self.status == ResponseStatus::Success {
            return Ok(());
        }
        let rate_limited = self.is_rate_limited();
        let message = self
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        if rate_limited {
            Err(SessionError::RateLimited { message })
        } else {
            Err(SessionError::Server { message })
        }
    }
}

/// Per-channel verification flag
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelStatus {
    pub verified: bool,
}

/// `data` object from `/api/otp/status/`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelStatuses {
    #[serde(default)]
    pub email: ChannelStatus,
    #[serde(default)]
    pub mobile: ChannelStatus,
}

impl ChannelStatuses {
    pub fn is_verified(&self, channel: VerificationChannel) -> bool {
        match channel {
            VerificationChannel::Email => self.email.verified,
            VerificationChannel::Mobile => self.mobile.verified,
        }
    }

    pub fn set_verified(&mut self, channel: VerificationChannel, verified: bool) {
        match channel {
            VerificationChannel::Email => self.email.verified = verified,
            VerificationChannel::Mobile => self.mobile.verified = verified,
        }
    }
}

/// Full body of `/api/otp/status/`
#[derive(Debug, Clone, Deserialize)]
pub struct OtpStatusResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub data: Option<ChannelStatuses>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body for `/api/notifications/create/`
#[derive(Debug, Clone, Serialize)]
pub struct CreateNotificationRequest<'a> {
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
}
