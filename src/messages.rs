// src/messages.rs
use crate::verification::VerificationChannel;

pub const INCOMPLETE_CODE: &str = "Please enter complete OTP";
pub const GENERATE_FAILED: &str = "Failed to generate OTP";
pub const VERIFY_FAILED: &str = "Verification failed";
pub const VERIFY_SUCCESS: &str = "Verification successful!";
pub const RESEND_SENDING: &str = "Sending...";
pub const RESEND_SENT: &str = "OTP Sent";

pub fn code_sent_message(destination: &str) -> String {
    format!("Please enter the One Time Password sent to {}", destination)
}

pub fn already_verified_message(channel: VerificationChannel) -> String {
    format!("{} is already verified", channel.label())
}

pub fn missing_destination_message(channel: VerificationChannel) -> String {
    match channel {
        VerificationChannel::Email => "Add an email address to your profile first".to_string(),
        VerificationChannel::Mobile => "Add a mobile number to your profile first".to_string(),
    }
}

pub fn countdown_message(remaining: u32) -> String {
    format!("{}s", remaining)
}
