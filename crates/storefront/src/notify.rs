//! Transient user-visible notifications.
//!
//! Stores never surface errors to their callers' UI directly; they publish a
//! [`Notice`] instead. Any number of front ends can subscribe. Every notice
//! is also logged and recorded as a Sentry breadcrumb.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::add_breadcrumb;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 64;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    /// Recoverable problem; stale data is being shown.
    Warning,
    Error,
}

/// A short transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// In-process fan-out of notices.
///
/// Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notice>,
}

impl Notifier {
    /// Create a notifier with a specific channel capacity.
    ///
    /// Slow subscribers lose the oldest notices once the buffer is full.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notice to all current subscribers.
    pub fn notify(&self, notice: Notice) {
        let level = match notice.level {
            NoticeLevel::Success => {
                info!(message = %notice.message, "Notice");
                sentry::Level::Info
            }
            NoticeLevel::Warning => {
                warn!(message = %notice.message, "Notice");
                sentry::Level::Warning
            }
            NoticeLevel::Error => {
                warn!(message = %notice.message, "Notice");
                sentry::Level::Error
            }
        };
        add_breadcrumb("notice", &notice.message, level, None);

        // A send error only means nobody is listening.
        let _ = self.sender.send(notice);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Notice::success(message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(Notice::warning(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Notice::error(message));
    }

    /// Subscribe to every notice published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Drain every notice currently buffered for `receiver`.
#[must_use]
pub fn drain(receiver: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(notice) => notices.push(notice),
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => return notices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_receive_notices_in_order() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        notifier.success("Quantity updated!");
        notifier.warning("Failed to fetch cart.");

        let notices = drain(&mut rx);
        assert_eq!(
            notices,
            vec![
                Notice::success("Quantity updated!"),
                Notice::warning("Failed to fetch cart.")
            ]
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = Notifier::default();
        notifier.error("Failed to clear cart.");
    }

    #[test]
    fn test_clones_share_channel() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();
        notifier.clone().success("Cart cleared.");
        assert_eq!(drain(&mut rx).len(), 1);
    }
}
