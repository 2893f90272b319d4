use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Contact channel a one-time code is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationChannel {
    Email,
    Mobile,
}

impl VerificationChannel {
    /// Value of the `type` form field
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationChannel::Email => "email",
            VerificationChannel::Mobile => "mobile",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VerificationChannel::Email => "Email",
            VerificationChannel::Mobile => "Mobile",
        }
    }
}

impl fmt::Display for VerificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(VerificationChannel::Email),
            "mobile" | "phone" => Ok(VerificationChannel::Mobile),
            other => Err(format!("unknown verification channel '{}'", other)),
        }
    }
}

/// Whether the single resend of a transaction can be used right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendState {
    /// Countdown running, or the resend was already used
    Locked,
    Available,
}

/// Observable state of the verification session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Idle,
    Requesting {
        channel: VerificationChannel,
    },
    AwaitingInput {
        channel: VerificationChannel,
        resend: ResendState,
    },
    Validating {
        channel: VerificationChannel,
    },
    Verified {
        channel: VerificationChannel,
    },
    /// Last submission was rejected; another submission is allowed
    Failed {
        channel: VerificationChannel,
        message: String,
        resend: ResendState,
    },
}

impl VerificationState {
    pub fn channel(&self) -> Option<VerificationChannel> {
        match self {
            VerificationState::Idle => None,
            VerificationState::Requesting { channel }
            | VerificationState::AwaitingInput { channel, .. }
            | VerificationState::Validating { channel }
            | VerificationState::Verified { channel }
            | VerificationState::Failed { channel, .. } => Some(*channel),
        }
    }

    pub fn accepts_code(&self) -> bool {
        matches!(
            self,
            VerificationState::AwaitingInput { .. } | VerificationState::Failed { .. }
        )
    }
}

/// Result of asking the server for a code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Code sent; holds the destination as displayed to the user
    CodeSent { destination: String },
    AlreadyVerified,
    /// Another code request is still in flight or cooling down
    Suppressed,
    /// The session was closed before the server answered
    Cancelled,
}

/// Result of a code submission that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Verified,
    /// A submission is already being validated
    Suppressed,
}

/// Display form of a destination: phones show only the last four digits
pub fn mask_destination(channel: VerificationChannel, destination: &str) -> String {
    match channel {
        VerificationChannel::Email => destination.to_string(),
        VerificationChannel::Mobile => {
            let chars: Vec<char> = destination.chars().collect();
            let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
            format!("****-{}", tail)
        }
    }
}
