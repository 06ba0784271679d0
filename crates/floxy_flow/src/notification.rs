// SPDX-License-Identifier: MIT OR Apache-2.0
//! User-facing notifications.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{error, info, warn};

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational
    Info,
    /// Operation succeeded
    Success,
    /// Something was refused
    Warning,
    /// Something failed
    Error,
}

/// A message shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text
    pub message: String,
}

/// Sink for user-facing messages
pub trait Notifier: fmt::Debug {
    /// Deliver a message
    fn notify(&self, level: NoticeLevel, message: &str);

    /// Informational message
    fn info(&self, message: &str) {
        self.notify(NoticeLevel::Info, message);
    }

    /// Success message
    fn success(&self, message: &str) {
        self.notify(NoticeLevel::Success, message);
    }

    /// Warning message
    fn warning(&self, message: &str) {
        self.notify(NoticeLevel::Warning, message);
    }

    /// Error message
    fn error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }
}

/// Notifier that writes to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => info!("{}", message),
            NoticeLevel::Warning => warn!("{}", message),
            NoticeLevel::Error => error!("{}", message),
        }
    }
}

/// Notifier that keeps every message in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl MemoryNotifier {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }

    /// Messages of one level
    pub fn messages(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .borrow()
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.message.clone())
            .collect()
    }

    /// Forget everything
    pub fn clear(&self) {
        self.notices.borrow_mut().clear();
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.borrow_mut().push(Notice {
            level,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_notifier_shares_buffer() {
        let notifier = MemoryNotifier::new();
        let handle = notifier.clone();
        notifier.warning("cycle");
        notifier.error("boom");
        assert_eq!(handle.messages(NoticeLevel::Warning), vec!["cycle".to_string()]);
        assert_eq!(handle.notices().len(), 2);
        handle.clear();
        assert!(notifier.notices().is_empty());
    }
}
