//! Reqwest-backed client for the backend's REST-like endpoints
//!
//! Every non-GET request carries the `X-CSRFToken` header. The configured
//! cookie string is forwarded on every request so the backend sees the
//! logged-in session.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{CreateNotificationRequest, OtpResponse, OtpStatusResponse, ResponseStatus};
use super::ChannelStatuses;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::notifications::Notification;
use crate::verification::VerificationChannel;

const CSRF_HEADER: &str = "X-CSRFToken";

/// OTP endpoints used by the verification controller
#[async_trait]
pub trait OtpApi: Send + Sync {
    /// `POST /api/otp/generate/`
    async fn generate(&self, channel: VerificationChannel) -> Result<OtpResponse>;

    /// `POST /api/otp/verify/`
    async fn verify(&self, channel: VerificationChannel, otp: &str) -> Result<OtpResponse>;

    /// `GET /api/otp/status/`
    async fn status(&self) -> Result<ChannelStatuses>;
}

/// Notification endpoints used by the notification store
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Notification>>;
    async fn mark_read(&self, id: i64) -> Result<()>;
    async fn mark_all_read(&self) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    async fn create(&self, message: &str, task_id: Option<i64>) -> Result<Notification>;
}

pub struct ApiClient {
    http: Client,
    base_url: Url,
    csrf_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| SessionError::ConfigValidation {
            message: format!("invalid base_url '{}': {}", config.base_url, e),
        })?;

        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value =
                HeaderValue::from_str(cookie).map_err(|e| SessionError::ConfigValidation {
                    message: format!("invalid session cookie: {}", e),
                })?;
            headers.insert(COOKIE, value);
        }

        let http = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()?;

        let csrf_token = config.effective_csrf_token();
        if csrf_token.is_none() {
            warn!("No CSRF token configured; mutating requests will likely be rejected");
        }

        Ok(Self {
            http,
            base_url,
            csrf_token,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SessionError::ConfigValidation {
                message: format!("invalid endpoint path '{}': {}", path, e),
            })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path)?;
        debug!("{} {}", method, url);
        let mut builder = self.http.request(method.clone(), url);
        if method != Method::GET {
            if let Some(token) = &self.csrf_token {
                builder = builder.header(CSRF_HEADER, token);
            }
        }
        Ok(builder)
    }

    async fn read_otp_response(response: Response) -> Result<OtpResponse> {
        let status = response.status();
        let body = response.text().await?;
        Self::parse_otp_body(status, &body)
    }

    /// OTP endpoints answer with a JSON status body even on 4xx
    fn parse_otp_body(status: StatusCode, body: &str) -> Result<OtpResponse> {
        match serde_json::from_str::<OtpResponse>(body) {
            Ok(parsed) if status == StatusCode::TOO_MANY_REQUESTS => {
                Err(SessionError::RateLimited {
                    message: parsed
                        .message
                        .unwrap_or_else(|| "Please wait before trying again".to_string()),
                })
            }
            Ok(parsed) => Ok(parsed),
            Err(_) if status == StatusCode::TOO_MANY_REQUESTS => Err(SessionError::RateLimited {
                message: "Please wait before trying again".to_string(),
            }),
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(SessionError::server(format!("Server returned {}", status))),
        }
    }

    fn ensure_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(SessionError::server(format!("Server returned {}", status)))
        }
    }
}

#[async_trait]
impl OtpApi for ApiClient {
    async fn generate(&self, channel: VerificationChannel) -> Result<OtpResponse> {
        let response = self
            .request(Method::POST, "/api/otp/generate/")?
            .form(&[("type", channel.as_str())])
            .send()
            .await?;
        Self::read_otp_response(response).await
    }

    async fn verify(&self, channel: VerificationChannel, otp: &str) -> Result<OtpResponse> {
        let response = self
            .request(Method::POST, "/api/otp/verify/")?
            .form(&[("type", channel.as_str()), ("otp", otp)])
            .send()
            .await?;
        Self::read_otp_response(response).await
    }

    async fn status(&self) -> Result<ChannelStatuses> {
        let response = self.request(Method::GET, "/api/otp/status/")?.send().await?;
        let body: OtpStatusResponse = Self::ensure_success(response)?.json().await?;

        match (body.status, body.data) {
            (ResponseStatus::Success, Some(data)) => Ok(data),
            _ => Err(SessionError::server(
                body.message
                    .unwrap_or_else(|| "Could not load verification status".to_string()),
            )),
        }
    }
}

#[async_trait]
impl NotificationApi for ApiClient {
    async fn list(&self) -> Result<Vec<Notification>> {
        let response = self
            .request(Method::GET, "/api/notifications/")?
            .send()
            .await?;
        Ok(Self::ensure_success(response)?.json().await?)
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        let path = format!("/api/notifications/mark-read/{}/", id);
        let response = self.request(Method::POST, &path)?.send().await?;
        Self::ensure_success(response).map(|_| ())
    }

    async fn mark_all_read(&self) -> Result<()> {
        let response = self
            .request(Method::POST, "/api/notifications/mark-all-read/")?
            .send()
            .await?;
        Self::ensure_success(response).map(|_| ())
    }

    async fn clear(&self) -> Result<()> {
        let response = self
            .request(Method::DELETE, "/api/notifications/clear/")?
            .send()
            .await?;
        Self::ensure_success(response).map(|_| ())
    }

    async fn create(&self, message: &str, task_id: Option<i64>) -> Result<Notification> {
        let response = self
            .request(Method::POST, "/api/notifications/create/")?
            .json(&CreateNotificationRequest { message, task_id })
            .send()
            .await?;
        Ok(Self::ensure_success(response)?.json().await?)
    }
}

pub type SharedApiClient = Arc<ApiClient>;

pub fn create_shared_api_client(config: &SessionConfig) -> Result<SharedApiClient> {
    Ok(Arc::new(ApiClient::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls_join_base() {
        let config = SessionConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..SessionConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(
            client.url("/api/notifications/mark-read/7/").unwrap().as_str(),
            "http://localhost:8000/api/notifications/mark-read/7/"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = SessionConfig {
            base_url: "not a url".to_string(),
            ..SessionConfig::default()
        };
        assert!(matches!(
            ApiClient::new(&config),
            Err(SessionError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_too_many_requests_is_rate_limited() {
        let body = r#"{"status": "error", "message": "Please wait 30 seconds"}"#;
        match ApiClient::parse_otp_body(StatusCode::TOO_MANY_REQUESTS, body) {
            Err(SessionError::RateLimited { message }) => {
                assert_eq!(message, "Please wait 30 seconds")
            }
            other => panic!("expected rate limit, got {:?}", other),
        }

        match ApiClient::parse_otp_body(StatusCode::TOO_MANY_REQUESTS, "<html>") {
            Err(SessionError::RateLimited { message }) => {
                assert_eq!(message, "Please wait before trying again")
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_otp_body_parsed_on_client_errors() {
        let body = r#"{"status": "error", "message": "Invalid OTP"}"#;
        let parsed = ApiClient::parse_otp_body(StatusCode::BAD_REQUEST, body).unwrap();
        assert_eq!(parsed.status, ResponseStatus::Error);
        assert_eq!(parsed.message.as_deref(), Some("Invalid OTP"));

        assert!(matches!(
            ApiClient::parse_otp_body(StatusCode::INTERNAL_SERVER_ERROR, "oops"),
            Err(SessionError::Server { .. })
        ));
        assert!(matches!(
            ApiClient::parse_otp_body(StatusCode::OK, "oops"),
            Err(SessionError::Decode { .. })
        ));
    }

    #[test]
    fn test_csrf_header_only_on_mutating_requests() {
        let config = SessionConfig {
            csrf_token: Some("tok".to_string()),
            ..SessionConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();

        let get = client
            .request(Method::GET, "/api/notifications/")
            .unwrap()
            .build()
            .unwrap();
        assert!(get.headers().get(CSRF_HEADER).is_none());

        let post = client
            .request(Method::POST, "/api/notifications/mark-all-read/")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(post.headers().get(CSRF_HEADER).unwrap(), "tok");
    }
}
