use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::verification::{
    RequestOutcome, SharedVerificationManager, SubmitOutcome, VerificationChannel,
};

/// Print the server's verification flags
pub async fn run_status(manager: &SharedVerificationManager) -> Result<()> {
    let status = manager.load_status().await?;
    for channel in [VerificationChannel::Email, VerificationChannel::Mobile] {
        let label = if status.is_verified(channel) {
            "verified"
        } else {
            "not verified"
        };
        println!("{:<7} {}", channel.label(), label);
    }
    Ok(())
}

/// Interactive verification: request a code, then read input lines until
/// the code is accepted or the user closes the session
pub async fn run_verify(
    manager: &SharedVerificationManager,
    channel: VerificationChannel,
) -> Result<()> {
    if let Err(e) = manager.load_status().await {
        warn!("Continuing without server verification status: {}", e);
    }

    match manager.request_code(channel).await? {
        RequestOutcome::CodeSent { .. } => {}
        RequestOutcome::AlreadyVerified => return Ok(()),
        RequestOutcome::Suppressed | RequestOutcome::Cancelled => {
            bail!("Code request did not complete")
        }
    }

    println!(
        "Enter the 6-digit code ({}s), or `resend` / `close`:",
        manager.countdown_seconds()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut verified = false;
    while let Some(line) = lines.next_line().await? {
        match line.as_str() {
            "close" | "quit" => break,
            "resend" => {
                if let Ok(false) = manager.resend().await {
                    println!("Resend is not available right now.");
                }
            }
            code => {
                if !manager.state().accepts_code() {
                    println!("Not expecting a code right now.");
                    continue;
                }
                match manager.submit_code(code).await {
                    Ok(SubmitOutcome::Verified) => {
                        verified = true;
                        break;
                    }
                    Ok(SubmitOutcome::Suppressed) => {}
                    // Already shown as a toast
                    Err(e) if e.is_local() => {}
                    Err(_) => {
                        if let Some(channel) = manager.state().channel() {
                            println!(
                                "Enter the {} code again, or `resend` once the countdown ends.",
                                channel
                            );
                        }
                    }
                }
            }
        }
    }

    manager.close();
    if !verified {
        bail!("{} was not verified", channel.label());
    }
    Ok(())
}
