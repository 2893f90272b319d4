//! Presentation contract for toasts, the OTP countdown and the unread badge.
//!
//! The session components never touch the UI directly; they report through
//! [`Presenter`]. [`ToastBuffer`] is the bundled implementation: it keeps the
//! most recent events in memory and broadcasts new ones to subscribers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

impl ToastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToastKind::Success => "success",
            ToastKind::Error => "error",
            ToastKind::Info => "info",
        }
    }
}

/// A transient user-facing message
#[derive(Debug, Clone)]
pub struct Toast {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub kind: ToastKind,
    pub message: String,
    pub duration: Duration,
}

impl Toast {
    /// Format as a string for display
    pub fn format(&self) -> String {
        format!(
            "{} [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.kind.as_str(),
            self.message
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "type": self.kind.as_str(),
            "message": self.message,
            "duration_ms": self.duration.as_millis() as u64,
        })
        .to_string()
    }
}

/// Everything a presenter can be asked to show
#[derive(Debug, Clone)]
pub enum PresenterEvent {
    Toast(Toast),
    Countdown { remaining: u32 },
    ResendAvailable,
    UnreadCount(usize),
}

pub trait Presenter: Send + Sync {
    fn toast(&self, kind: ToastKind, message: &str);

    fn countdown(&self, _remaining: u32) {}

    fn resend_available(&self) {}

    fn unread_count(&self, _count: usize) {}

    fn success(&self, message: &str) {
        self.toast(ToastKind::Success, message);
    }

    fn error(&self, message: &str) {
        self.toast(ToastKind::Error, message);
    }

    fn info(&self, message: &str) {
        self.toast(ToastKind::Info, message);
    }
}

pub type SharedPresenter = Arc<dyn Presenter>;

/// Buffer that stores recent presenter events and broadcasts new ones
pub struct ToastBuffer {
    tx: broadcast::Sender<PresenterEvent>,
    recent: parking_lot::RwLock<Vec<PresenterEvent>>,
    max_entries: usize,
    toast_duration: Duration,
}

impl ToastBuffer {
    pub fn new(max_entries: usize, toast_duration: Duration) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            tx,
            recent: parking_lot::RwLock::new(Vec::with_capacity(max_entries)),
            max_entries,
            toast_duration,
        }
    }

    pub fn push(&self, event: PresenterEvent) {
        {
            let mut recent = self.recent.write();
            if recent.len() >= self.max_entries {
                recent.remove(0);
            }
            recent.push(event.clone());
        }

        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn get_recent(&self, count: usize) -> Vec<PresenterEvent> {
        let recent = self.recent.read();
        let start = recent.len().saturating_sub(count);
        recent[start..].to_vec()
    }

    /// Recent toasts only, oldest first
    pub fn recent_toasts(&self) -> Vec<Toast> {
        self.recent
            .read()
            .iter()
            .filter_map(|e| match e {
                PresenterEvent::Toast(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenterEvent> {
        self.tx.subscribe()
    }

    /// Build a toast stamped now with this buffer's display duration
    pub fn make_toast(&self, kind: ToastKind, message: &str) -> Toast {
        Toast {
            timestamp: chrono::Utc::now(),
            kind,
            message: message.to_string(),
            duration: self.toast_duration,
        }
    }
}

impl Presenter for ToastBuffer {
    fn toast(&self, kind: ToastKind, message: &str) {
        self.push(PresenterEvent::Toast(self.make_toast(kind, message)));
    }

    fn countdown(&self, remaining: u32) {
        self.push(PresenterEvent::Countdown { remaining });
    }

    fn resend_available(&self) {
        self.push(PresenterEvent::ResendAvailable);
    }

    fn unread_count(&self, count: usize) {
        self.push(PresenterEvent::UnreadCount(count));
    }
}

pub type SharedToastBuffer = Arc<ToastBuffer>;

pub fn create_toast_buffer(max_entries: usize, toast_duration: Duration) -> SharedToastBuffer {
    Arc::new(ToastBuffer::new(max_entries, toast_duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_buffer() {
        let buffer = create_toast_buffer(3, Duration::from_secs(3));

        buffer.success("Verification successful!");
        buffer.countdown(59);
        buffer.error("Verification failed");

        let toasts = buffer.recent_toasts();
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].kind, ToastKind::Success);
        assert_eq!(toasts[1].message, "Verification failed");
        assert_eq!(toasts[1].duration, Duration::from_secs(3));
    }

    #[test]
    fn test_toast_buffer_overflow() {
        let buffer = create_toast_buffer(2, Duration::from_secs(3));

        for i in 1..=5 {
            buffer.info(&format!("Message {}", i));
        }

        let toasts = buffer.recent_toasts();
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].message, "Message 4");
        assert_eq!(toasts[1].message, "Message 5");
    }

    #[tokio::test]
    async fn test_subscribers_receive_new_events() {
        let buffer = create_toast_buffer(10, Duration::from_secs(3));
        let mut rx = buffer.subscribe();

        buffer.unread_count(4);

        match rx.recv().await.unwrap() {
            PresenterEvent::UnreadCount(count) => assert_eq!(count, 4),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_toast_json_shape() {
        let buffer = create_toast_buffer(1, Duration::from_millis(1500));
        buffer.error("Please wait 30 seconds");
        let json: serde_json::Value =
            serde_json::from_str(&buffer.recent_toasts()[0].to_json()).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["duration_ms"], 1500);
    }
}
