//! In-memory stand-ins for the backend, used by unit tests

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::api::{ChannelStatuses, NotificationApi, OtpApi, OtpResponse};
use crate::error::{Result, SessionError};
use crate::notifications::Notification;
use crate::verification::VerificationChannel;

/// OTP backend that answers from queued responses, defaulting to success
#[derive(Default)]
pub struct FakeOtpApi {
    pub status: Mutex<ChannelStatuses>,
    generate_responses: Mutex<VecDeque<OtpResponse>>,
    /// Returned from `generate` before any queued response
    generate_errors: Mutex<VecDeque<SessionError>>,
    verify_responses: Mutex<VecDeque<OtpResponse>>,
    verified: Mutex<Vec<(VerificationChannel, String)>>,
    generate_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    delay: Duration,
    verify_delay: Duration,
}

impl FakeOtpApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = delay;
        self
    }

    pub fn push_generate_error(&self, err: SessionError) {
        self.generate_errors.lock().push_back(err);
    }

    pub fn push_generate(&self, response: OtpResponse) {
        self.generate_responses.lock().push_back(response);
    }

    pub fn push_verify(&self, response: OtpResponse) {
        self.verify_responses.lock().push_back(response);
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn verified_codes(&self) -> Vec<(VerificationChannel, String)> {
        self.verified.lock().clone()
    }
}

#[async_trait]
impl OtpApi for FakeOtpApi {
    async fn generate(&self, _channel: VerificationChannel) -> Result<OtpResponse> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let injected = self.generate_errors.lock().pop_front();
        if let Some(err) = injected {
            return Err(err);
        }
        let queued = self.generate_responses.lock().pop_front();
        Ok(queued.unwrap_or_else(OtpResponse::success))
    }

    async fn verify(&self, channel: VerificationChannel, otp: &str) -> Result<OtpResponse> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verified.lock().push((channel, otp.to_string()));
        if !self.verify_delay.is_zero() {
            tokio::time::sleep(self.verify_delay).await;
        }
        let queued = self.verify_responses.lock().pop_front();
        Ok(queued.unwrap_or_else(OtpResponse::success))
    }

    async fn status(&self) -> Result<ChannelStatuses> {
        Ok(*self.status.lock())
    }
}

/// A notification created `minutes_ago` minutes before now
pub fn notification(id: i64, read: bool, minutes_ago: i64) -> Notification {
    Notification {
        id,
        message: format!("Notification {}", id),
        created_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
        read,
        task_id: None,
    }
}

/// Notification backend holding its own list as server truth
#[derive(Default)]
pub struct FakeNotificationApi {
    pub server: Mutex<Vec<Notification>>,
    pub fail_mutations: AtomicBool,
    /// When queued, each `list` call waits for the next gate instead of reading `server`
    list_gates: Mutex<VecDeque<oneshot::Receiver<Vec<Notification>>>>,
    list_delay: Mutex<Duration>,
    mutation_delay: Mutex<Duration>,
    list_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
}

impl FakeNotificationApi {
    pub fn with_items(items: Vec<Notification>) -> Self {
        Self {
            server: Mutex::new(items),
            ..Self::default()
        }
    }

    /// Queue a gate; send on the returned sender to complete the matching `list`
    pub fn gate_next_list(&self) -> oneshot::Sender<Vec<Notification>> {
        let (tx, rx) = oneshot::channel();
        self.list_gates.lock().push_back(rx);
        tx
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock() = delay;
    }

    pub fn set_mutation_delay(&self, delay: Duration) {
        *self.mutation_delay.lock() = delay;
    }

    pub fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    async fn mutation(&self) -> Result<()> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.mutation_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(SessionError::server("Server returned 500 Internal Server Error"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NotificationApi for FakeNotificationApi {
    async fn list(&self) -> Result<Vec<Notification>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gates.lock().pop_front();
        if let Some(gate) = gate {
            return gate
                .await
                .map_err(|_| SessionError::server("list gate dropped"));
        }
        let delay = *self.list_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.server.lock().clone())
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        self.mutation().await?;
        let mut server = self.server.lock();
        match server.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                Ok(())
            }
            None => Err(SessionError::server("Server returned 404 Not Found")),
        }
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.mutation().await?;
        self.server.lock().iter_mut().for_each(|n| n.read = true);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.mutation().await?;
        self.server.lock().clear();
        Ok(())
    }

    async fn create(&self, message: &str, task_id: Option<i64>) -> Result<Notification> {
        self.mutation().await?;
        let mut server = self.server.lock();
        let id = server.iter().map(|n| n.id).max().unwrap_or(0) + 1;
        let created = Notification {
            id,
            message: message.to_string(),
            created_at: Utc::now(),
            read: false,
            task_id,
        };
        server.push(created.clone());
        Ok(created)
    }
}
