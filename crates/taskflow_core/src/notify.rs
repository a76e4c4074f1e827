//! User-facing notifications raised by services.
//!
//! Services report transport failures and per-record failures through a
//! `Notifier`; the view layer decides how to render them (toasts).

use log::{error, info, warn};
use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Sink for non-blocking user notifications.
pub trait Notifier {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => info!(
                "event=notice module=notify status=ok level=success message={}",
                notice.message
            ),
            NoticeLevel::Info => info!(
                "event=notice module=notify status=ok level=info message={}",
                notice.message
            ),
            NoticeLevel::Error => error!(
                "event=notice module=notify status=error level=error message={}",
                notice.message
            ),
        }
    }
}

/// Buffers notices until the view layer drains them.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    pending: RefCell<Vec<Notice>>,
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every pending notice, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

impl Notifier for NoticeQueue {
    fn notify(&self, notice: Notice) {
        if notice.level == NoticeLevel::Error {
            warn!(
                "event=notice module=notify status=error queued=true message={}",
                notice.message
            );
        }
        self.pending.borrow_mut().push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::{Notice, NoticeLevel, NoticeQueue, Notifier};

    #[test]
    fn queue_drains_in_arrival_order() {
        let queue = NoticeQueue::new();
        queue.notify(Notice::error("Failed to load tasks"));
        queue.notify(Notice::success("Task created successfully!"));
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained[0].level, NoticeLevel::Error);
        assert_eq!(drained[1].message, "Task created successfully!");
        assert!(queue.is_empty());
    }
}
