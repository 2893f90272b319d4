use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SessionError};
use crate::verification::VerificationChannel;

/// Client configuration for one page session against the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Backend origin (e.g., "http://localhost:8000")
    pub base_url: String,

    /// CSRF token sent as `X-CSRFToken` on mutating requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,

    /// Raw `Cookie` header value (session id, csrftoken)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,

    /// Contact destinations from the user's profile
    #[serde(default)]
    pub profile: UserProfile,

    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u32,

    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// How long the code request guard stays held after a request completes
    #[serde(default = "default_request_cooldown_millis")]
    pub request_cooldown_millis: u64,

    #[serde(default = "default_toast_duration_millis")]
    pub toast_duration_millis: u64,
}

fn default_countdown_seconds() -> u32 {
    60
}

fn default_poll_interval_seconds() -> u64 {
    60
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_request_cooldown_millis() -> u64 {
    1000
}

fn default_toast_duration_millis() -> u64 {
    3000
}

/// Contact destinations a verification channel resolves to
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UserProfile {
    /// Destination for a channel, if present and non-empty
    pub fn destination(&self, channel: VerificationChannel) -> Option<&str> {
        let value = match channel {
            VerificationChannel::Email => self.email.as_deref(),
            VerificationChannel::Mobile => self.phone.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            csrf_token: None,
            session_cookie: None,
            profile: UserProfile::default(),
            countdown_seconds: default_countdown_seconds(),
            poll_interval_seconds: default_poll_interval_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
            request_cooldown_millis: default_request_cooldown_millis(),
            toast_duration_millis: default_toast_duration_millis(),
        }
    }
}

impl SessionConfig {
    /// Load from a JSON file
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SessionError::ConfigLoad {
            path: path.to_string(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| SessionError::ConfigParse {
            path: path.to_string(),
            source: e,
        })
    }

    /// Build the effective config: optional file, then environment overrides
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `SYNERGY_*` overrides from a key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SYNERGY_BASE_URL") {
            self.base_url = url;
        }
        if let Some(token) = lookup("SYNERGY_CSRF_TOKEN") {
            self.csrf_token = Some(token);
        }
        if let Some(cookie) = lookup("SYNERGY_SESSION_COOKIE") {
            self.session_cookie = Some(cookie);
        }
        if let Some(email) = lookup("SYNERGY_EMAIL") {
            self.profile.email = Some(email);
        }
        if let Some(phone) = lookup("SYNERGY_PHONE") {
            self.profile.phone = Some(phone);
        }
        if let Some(interval) = lookup("SYNERGY_POLL_INTERVAL").and_then(|v| v.parse().ok()) {
            self.poll_interval_seconds = interval;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(SessionError::ConfigValidation {
                message: "base_url must not be empty".to_string(),
            });
        }
        if self.countdown_seconds == 0 {
            return Err(SessionError::ConfigValidation {
                message: "countdown_seconds must be greater than zero".to_string(),
            });
        }
        if self.poll_interval_seconds == 0 || self.request_timeout_seconds == 0 {
            return Err(SessionError::ConfigValidation {
                message: "poll and request intervals must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// CSRF token: explicit setting first, then the `csrftoken` cookie
    pub fn effective_csrf_token(&self) -> Option<String> {
        if let Some(token) = self.csrf_token.as_ref().filter(|t| !t.is_empty()) {
            return Some(token.clone());
        }
        self.session_cookie.as_deref().and_then(|cookie| {
            cookie.split(';').find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name == "csrftoken" && !value.is_empty()).then(|| value.to_string())
            })
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn request_cooldown(&self) -> Duration {
        Duration::from_millis(self.request_cooldown_millis)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_minimal_config() {
        let json = r#"{"base_url": "https://tasks.example.com"}"#;

        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_url, "https://tasks.example.com");
        assert_eq!(config.countdown_seconds, 60);
        assert_eq!(config.poll_interval_seconds, 60);
        assert_eq!(config.request_cooldown_millis, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SYNERGY_BASE_URL", "http://backend:9000"),
            ("SYNERGY_EMAIL", "user@example.com"),
            ("SYNERGY_POLL_INTERVAL", "15"),
            ("SYNERGY_POLL_INTERVAL_BOGUS", "x"),
        ]
        .into_iter()
        .collect();

        let mut config = SessionConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.base_url, "http://backend:9000");
        assert_eq!(config.profile.email.as_deref(), Some("user@example.com"));
        assert_eq!(config.poll_interval_seconds, 15);
        assert_eq!(config.profile.phone, None);
    }

    #[test]
    fn test_rejects_zero_countdown() {
        let config = SessionConfig {
            countdown_seconds: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_csrf_token_from_cookie() {
        let config = SessionConfig {
            session_cookie: Some("sessionid=abc; csrftoken=tok123".to_string()),
            ..SessionConfig::default()
        };
        assert_eq!(config.effective_csrf_token().as_deref(), Some("tok123"));

        let explicit = SessionConfig {
            csrf_token: Some("explicit".to_string()),
            ..config
        };
        assert_eq!(explicit.effective_csrf_token().as_deref(), Some("explicit"));
    }

    #[test]
    fn test_profile_destination_ignores_blank() {
        let profile = UserProfile {
            email: Some("   ".to_string()),
            phone: Some("5551234567".to_string()),
        };
        assert_eq!(profile.destination(VerificationChannel::Email), None);
        assert_eq!(
            profile.destination(VerificationChannel::Mobile),
            Some("5551234567")
        );
    }
}
