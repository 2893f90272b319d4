use chrono::{DateTime, Utc};

use super::timer::CountdownTimer;
use super::types::{ResendState, VerificationChannel};

/// One user-initiated attempt to verify a channel
///
/// The transaction owns its countdown. Ending the transaction means taking
/// the timer out and cancelling it.
pub struct VerificationTransaction {
    /// Fences timer callbacks that outlive a replaced transaction
    pub id: u64,
    pub channel: VerificationChannel,
    pub resend_used: bool,
    /// Countdown completed; meaningful only while `resend_used` is false
    pub countdown_finished: bool,
    pub remaining_seconds: u32,
    pub created_at: DateTime<Utc>,
    timer: CountdownTimer,
}

/// Read-only view of the live transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionSnapshot {
    pub channel: VerificationChannel,
    pub resend_used: bool,
    pub resend: ResendState,
    pub remaining_seconds: u32,
    pub created_at: DateTime<Utc>,
}

impl VerificationTransaction {
    pub fn new(id: u64, channel: VerificationChannel, countdown_seconds: u32) -> Self {
        Self {
            id,
            channel,
            resend_used: false,
            countdown_finished: false,
            remaining_seconds: countdown_seconds,
            created_at: Utc::now(),
            timer: CountdownTimer::new(),
        }
    }

    pub fn timer_mut(&mut self) -> &mut CountdownTimer {
        &mut self.timer
    }

    pub fn resend_state(&self) -> ResendState {
        if self.countdown_finished && !self.resend_used {
            ResendState::Available
        } else {
            ResendState::Locked
        }
    }

    /// Consume the single resend; false if it is not available
    pub fn use_resend(&mut self) -> bool {
        if self.resend_state() != ResendState::Available {
            return false;
        }
        self.resend_used = true;
        true
    }

    /// End the transaction, handing back the timer so the caller can cancel
    /// it outside any lock the timer callbacks take
    pub fn into_timer(self) -> CountdownTimer {
        self.timer
    }

    pub fn snapshot(&self) -> TransactionSnapshot {
        TransactionSnapshot {
            channel: self.channel,
            resend_used: self.resend_used,
            resend: self.resend_state(),
            remaining_seconds: self.remaining_seconds,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resend_locked_until_countdown_finishes() {
        let mut tx = VerificationTransaction::new(1, VerificationChannel::Email, 60);
        assert_eq!(tx.resend_state(), ResendState::Locked);
        assert!(!tx.use_resend());
        assert!(!tx.resend_used);

        tx.countdown_finished = true;
        assert_eq!(tx.resend_state(), ResendState::Available);
        assert!(tx.use_resend());
        assert!(tx.resend_used);
    }

    #[test]
    fn test_resend_only_once() {
        let mut tx = VerificationTransaction::new(1, VerificationChannel::Mobile, 60);
        tx.countdown_finished = true;
        assert!(tx.use_resend());
        assert!(!tx.use_resend());
        assert_eq!(tx.resend_state(), ResendState::Locked);
        assert!(tx.resend_used);
    }
}
