// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User-facing transient notices.
//!
//! Every failure in the presence workflow ends up here exactly once, so a UI
//! can show it as a snackbar/toast and tests can assert on it.

use crate::error::AppError;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A short message for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    /// Stable code (`"online"`, `"publish_failure"`, ...)
    pub kind: &'static str,
    pub message: String,
}

impl Notice {
    pub fn info(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(err: &AppError) -> Self {
        Self {
            level: NoticeLevel::Error,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Published location was accepted by the index.
    pub fn online() -> Self {
        Self::info("online", "You're online")
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Single reporting sink for user-visible notices.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);

    /// Report an error as a notice.
    fn report(&self, err: &AppError) {
        self.notify(Notice::from_error(err));
    }
}

/// Sink that only logs (headless runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNoticeSink;

impl NoticeSink for TracingNoticeSink {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => {
                tracing::info!(kind = notice.kind, message = %notice.message, "Notice")
            }
            NoticeLevel::Error => {
                tracing::warn!(kind = notice.kind, message = %notice.message, "Notice")
            }
        }
    }
}

/// Sink that forwards notices to a UI task.
#[derive(Debug, Clone)]
pub struct ChannelNoticeSink {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNoticeSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NoticeSink for ChannelNoticeSink {
    fn notify(&self, notice: Notice) {
        tracing::debug!(kind = notice.kind, message = %notice.message, "Notice");
        // The UI going away must not fail the workflow
        let _ = self.tx.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_notice_carries_kind_and_message() {
        let notice = Notice::from_error(&AppError::Resolution("no match".to_string()));
        assert!(notice.is_error());
        assert_eq!(notice.kind, "resolution_failure");
        assert_eq!(notice.message, "Could not resolve place: no match");
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelNoticeSink::new();
        sink.notify(Notice::online());
        sink.report(&AppError::PermissionDenied);

        assert_eq!(rx.try_recv().unwrap().message, "You're online");
        let err = rx.try_recv().unwrap();
        assert_eq!(err.kind, "permission_denied");
        assert!(rx.try_recv().is_err());
    }
}
