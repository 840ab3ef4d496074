//! Operator notifications.

use tracing::{error, info};

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    /// Routine progress.
    Info,
    /// A goal was reached.
    Success,
    /// Something needs attention.
    Error,
}

impl AlertLevel {
    /// Stable label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Fire-and-forget alert sink.
pub trait Notifier: Send + Sync {
    /// Emits an alert; delivery is not acknowledged.
    fn alert(&self, title: &str, message: &str, level: AlertLevel);
}

/// Notifier that writes alerts to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, title: &str, message: &str, level: AlertLevel) {
        match level {
            AlertLevel::Error => error!(title, level = level.as_str(), "{message}"),
            AlertLevel::Info | AlertLevel::Success => {
                info!(title, level = level.as_str(), "{message}");
            }
        }
    }
}
