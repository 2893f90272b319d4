use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::transaction::{TransactionSnapshot, VerificationTransaction};
use super::types::{
    mask_destination, RequestOutcome, ResendState, SubmitOutcome, VerificationChannel,
    VerificationState,
};
use crate::api::{ChannelStatuses, OtpApi};
use crate::config::{SessionConfig, UserProfile};
use crate::error::{Result, SessionError};
use crate::messages;
use crate::presenter::SharedPresenter;

const CODE_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Requesting(VerificationChannel),
    AwaitingInput,
    Validating,
    Verified(VerificationChannel),
    Failed(String),
}

struct SessionInner {
    phase: Phase,
    /// Last known server verification flags
    status: ChannelStatuses,
    transaction: Option<VerificationTransaction>,
    next_transaction_id: u64,
    /// Bumped by `close` and by every new code request
    epoch: u64,
}

/// Re-entrancy guard for code generation requests
///
/// Releasing the guard waits out the cooldown before another request may start.
struct RequestGuard {
    flag: Arc<AtomicBool>,
    cooldown: Duration,
}

impl RequestGuard {
    fn acquire(flag: &Arc<AtomicBool>, cooldown: Duration) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                flag: flag.clone(),
                cooldown,
            })
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let flag = self.flag.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if !self.cooldown.is_zero() => {
                let cooldown = self.cooldown;
                handle.spawn(async move {
                    tokio::time::sleep(cooldown).await;
                    flag.store(false, Ordering::SeqCst);
                });
            }
            _ => flag.store(false, Ordering::SeqCst),
        }
    }
}

/// Drives one-time-code verification of the user's contact channels
pub struct VerificationManager {
    api: Arc<dyn OtpApi>,
    presenter: SharedPresenter,
    profile: UserProfile,
    countdown_seconds: u32,
    request_cooldown: Duration,
    inner: Arc<Mutex<SessionInner>>,
    requesting: Arc<AtomicBool>,
}

impl VerificationManager {
    pub fn new(api: Arc<dyn OtpApi>, presenter: SharedPresenter, config: &SessionConfig) -> Self {
        Self {
            api,
            presenter,
            profile: config.profile.clone(),
            countdown_seconds: config.countdown_seconds,
            request_cooldown: config.request_cooldown(),
            inner: Arc::new(Mutex::new(SessionInner {
                phase: Phase::Idle,
                status: ChannelStatuses::default(),
                transaction: None,
                next_transaction_id: 0,
                epoch: 0,
            })),
            requesting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fetch the server's verification flags and replace the local copy
    pub async fn load_status(&self) -> Result<ChannelStatuses> {
        match self.api.status().await {
            Ok(status) => {
                self.inner.lock().status = status;
                debug!(
                    "Verification status: email={}, mobile={}",
                    status.email.verified, status.mobile.verified
                );
                Ok(status)
            }
            Err(e) => {
                warn!("Error checking verification status: {}", e);
                Err(e)
            }
        }
    }

    /// Ask the server to send a code to the channel's destination
    pub async fn request_code(&self, channel: VerificationChannel) -> Result<RequestOutcome> {
        let destination = match self.profile.destination(channel) {
            Some(d) => mask_destination(channel, d),
            None => {
                let err = SessionError::validation(messages::missing_destination_message(channel));
                self.presenter.error(&err.user_message());
                return Err(err);
            }
        };

        if self.inner.lock().status.is_verified(channel) {
            info!("{} already verified, not requesting a code", channel);
            self.presenter.info(&messages::already_verified_message(channel));
            return Ok(RequestOutcome::AlreadyVerified);
        }

        let Some(_guard) = RequestGuard::acquire(&self.requesting, self.request_cooldown) else {
            debug!("OTP generation already in progress");
            return Ok(RequestOutcome::Suppressed);
        };

        // A new request supersedes whatever transaction is live
        let (epoch, previous) = {
            let mut inner = self.inner.lock();
            inner.epoch += 1;
            inner.phase = Phase::Requesting(channel);
            (inner.epoch, inner.transaction.take())
        };
        if let Some(previous) = previous {
            previous.into_timer().cancel();
        }

        debug!("Starting OTP generation for {}", channel);
        let result = match self.api.generate(channel).await {
            Ok(response) => response.into_result(messages::GENERATE_FAILED),
            Err(e) => Err(e),
        };

        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            debug!("Verification closed while requesting a code for {}", channel);
            return Ok(RequestOutcome::Cancelled);
        }

        match result {
            Ok(()) => {
                inner.next_transaction_id += 1;
                let mut transaction = VerificationTransaction::new(
                    inner.next_transaction_id,
                    channel,
                    self.countdown_seconds,
                );
                self.start_countdown(&mut transaction);
                inner.transaction = Some(transaction);
                inner.phase = Phase::AwaitingInput;
                drop(inner);

                info!("OTP sent via {}", channel);
                self.presenter
                    .success(&messages::code_sent_message(&destination));
                Ok(RequestOutcome::CodeSent { destination })
            }
            Err(err) => {
                inner.phase = Phase::Idle;
                drop(inner);

                if matches!(err, SessionError::RateLimited { .. }) {
                    warn!("OTP generation rate limited: {}", err);
                } else {
                    warn!("Error generating OTP: {}", err);
                }
                self.presenter.error(&err.user_message());
                Err(err)
            }
        }
    }

    fn start_countdown(&self, transaction: &mut VerificationTransaction) {
        let id = transaction.id;

        let tick_inner = self.inner.clone();
        let tick_presenter = self.presenter.clone();
        let complete_inner = self.inner.clone();
        let complete_presenter = self.presenter.clone();

        transaction.timer_mut().start(
            self.countdown_seconds,
            move |remaining| {
                let current = match tick_inner.lock().transaction.as_mut() {
                    Some(tx) if tx.id == id => {
                        tx.remaining_seconds = remaining;
                        true
                    }
                    _ => false,
                };
                if current {
                    tick_presenter.countdown(remaining);
                }
            },
            move || {
                let available = match complete_inner.lock().transaction.as_mut() {
                    Some(tx) if tx.id == id => {
                        tx.countdown_finished = true;
                        tx.resend_state() == ResendState::Available
                    }
                    _ => false,
                };
                if available {
                    complete_presenter.resend_available();
                }
            },
        );
    }

    /// Submit the code the user typed; exactly six characters, taken as-is
    pub async fn submit_code(&self, raw_input: &str) -> Result<SubmitOutcome> {
        if raw_input.chars().count() != CODE_LENGTH {
            self.presenter.error(messages::INCOMPLETE_CODE);
            return Err(SessionError::validation("incomplete code"));
        }

        let (channel, id) = {
            let mut inner = self.inner.lock();
            let Some((channel, id)) = inner.transaction.as_ref().map(|tx| (tx.channel, tx.id))
            else {
                return Err(SessionError::NoActiveTransaction);
            };
            match inner.phase {
                Phase::AwaitingInput | Phase::Failed(_) => {}
                Phase::Validating => return Ok(SubmitOutcome::Suppressed),
                _ => return Err(SessionError::NoActiveTransaction),
            }
            inner.phase = Phase::Validating;
            (channel, id)
        };

        let result = match self.api.verify(channel, raw_input).await {
            Ok(response) => response.into_result(messages::VERIFY_FAILED),
            Err(e) => Err(e),
        };

        let mut inner = self.inner.lock();
        let current = inner.transaction.as_ref().is_some_and(|tx| tx.id == id);

        match result {
            Ok(()) => {
                inner.status.set_verified(channel, true);
                let timer = if current {
                    inner.phase = Phase::Verified(channel);
                    inner
                        .transaction
                        .take()
                        .map(VerificationTransaction::into_timer)
                } else {
                    None
                };
                drop(inner);

                if let Some(mut timer) = timer {
                    timer.cancel();
                }
                info!("{} verified", channel);
                self.presenter.success(messages::VERIFY_SUCCESS);
                Ok(SubmitOutcome::Verified)
            }
            Err(err) => {
                if current {
                    inner.phase = Phase::Failed(err.user_message());
                }
                drop(inner);

                warn!("Verification error for {}: {}", channel, err);
                self.presenter.error(&err.user_message());
                Err(err)
            }
        }
    }

    /// Send the code again, once per transaction and only after the countdown.
    /// Returns `Ok(false)` without side effects when resending is not allowed.
    pub async fn resend(&self) -> Result<bool> {
        let (channel, _guard) = {
            let mut inner = self.inner.lock();
            if !matches!(inner.phase, Phase::AwaitingInput | Phase::Failed(_)) {
                return Ok(false);
            }
            let Some(transaction) = inner.transaction.as_mut() else {
                return Ok(false);
            };
            if transaction.resend_state() != ResendState::Available {
                debug!("Resend not available for this transaction");
                return Ok(false);
            }
            let Some(guard) = RequestGuard::acquire(&self.requesting, self.request_cooldown)
            else {
                debug!("OTP request in flight, ignoring resend");
                return Ok(false);
            };
            transaction.use_resend();
            (transaction.channel, guard)
        };

        self.presenter.info(messages::RESEND_SENDING);
        let result = match self.api.generate(channel).await {
            Ok(response) => response.into_result(messages::GENERATE_FAILED),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("OTP resent via {}", channel);
                self.presenter.success(messages::RESEND_SENT);
                Ok(true)
            }
            Err(err) => {
                warn!("Error resending OTP: {}", err);
                self.presenter.error(&err.user_message());
                Err(err)
            }
        }
    }

    /// Discard the live transaction and return to idle; safe from any state
    pub fn close(&self) {
        let timer = {
            let mut inner = self.inner.lock();
            inner.epoch += 1;
            inner.phase = Phase::Idle;
            inner
                .transaction
                .take()
                .map(VerificationTransaction::into_timer)
        };
        if let Some(mut timer) = timer {
            timer.cancel();
            debug!("Verification transaction closed");
        }
    }

    pub fn state(&self) -> VerificationState {
        let inner = self.inner.lock();
        match (&inner.phase, inner.transaction.as_ref()) {
            (Phase::Idle, _) => VerificationState::Idle,
            (Phase::Requesting(channel), _) => VerificationState::Requesting { channel: *channel },
            (Phase::Verified(channel), _) => VerificationState::Verified { channel: *channel },
            (Phase::AwaitingInput, Some(tx)) => VerificationState::AwaitingInput {
                channel: tx.channel,
                resend: tx.resend_state(),
            },
            (Phase::Validating, Some(tx)) => VerificationState::Validating {
                channel: tx.channel,
            },
            (Phase::Failed(message), Some(tx)) => VerificationState::Failed {
                channel: tx.channel,
                message: message.clone(),
                resend: tx.resend_state(),
            },
            (_, None) => VerificationState::Idle,
        }
    }

    pub fn transaction(&self) -> Option<TransactionSnapshot> {
        self.inner
            .lock()
            .transaction
            .as_ref()
            .map(VerificationTransaction::snapshot)
    }

    pub fn status(&self) -> ChannelStatuses {
        self.inner.lock().status
    }

    pub fn is_verified(&self, channel: VerificationChannel) -> bool {
        self.inner.lock().status.is_verified(channel)
    }

    pub fn countdown_seconds(&self) -> u32 {
        self.countdown_seconds
    }
}

/// Shared verification manager type
pub type SharedVerificationManager = Arc<VerificationManager>;

pub fn create_shared_verification_manager(
    api: Arc<dyn OtpApi>,
    presenter: SharedPresenter,
    config: &SessionConfig,
) -> SharedVerificationManager {
    Arc::new(VerificationManager::new(api, presenter, config))
}
