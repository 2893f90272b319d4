//! CLI command handlers and the terminal presenter they report through

pub mod notifications;
pub mod verify;

use std::sync::Arc;

use crate::messages;
use crate::presenter::{Presenter, PresenterEvent, SharedToastBuffer, ToastKind};

pub use notifications::{run_notifications, NotificationCommand};
pub use verify::{run_status, run_verify};

/// Prints presenter events as they happen and records them in a toast buffer
pub struct TerminalPresenter {
    buffer: SharedToastBuffer,
    json: bool,
}

impl TerminalPresenter {
    pub fn new(buffer: SharedToastBuffer, json: bool) -> Self {
        Self { buffer, json }
    }
}

impl Presenter for TerminalPresenter {
    fn toast(&self, kind: ToastKind, message: &str) {
        let toast = self.buffer.make_toast(kind, message);
        if self.json {
            println!("{}", toast.to_json());
        } else {
            println!("{}", toast.format());
        }
        self.buffer.push(PresenterEvent::Toast(toast));
    }

    fn countdown(&self, remaining: u32) {
        self.buffer.countdown(remaining);
        if !self.json && (remaining % 10 == 0 || remaining <= 5) {
            println!("  {}", messages::countdown_message(remaining));
        }
    }

    fn resend_available(&self) {
        self.buffer.resend_available();
        if !self.json {
            println!("  Didn't get it? Type `resend` to send the code again.");
        }
    }

    fn unread_count(&self, count: usize) {
        self.buffer.unread_count(count);
    }
}

pub fn create_terminal_presenter(buffer: SharedToastBuffer, json: bool) -> Arc<TerminalPresenter> {
    Arc::new(TerminalPresenter::new(buffer, json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::create_toast_buffer;
    use std::time::Duration;

    #[test]
    fn test_terminal_presenter_records_events() {
        let buffer = create_toast_buffer(10, Duration::from_secs(3));
        let presenter = TerminalPresenter::new(buffer.clone(), true);

        presenter.error("Verification failed");
        presenter.countdown(42);
        presenter.unread_count(3);

        let toasts = buffer.recent_toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].kind, ToastKind::Error);
        assert_eq!(buffer.get_recent(10).len(), 3);
    }
}
