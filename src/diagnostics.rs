// ABOUTME: Diagnostics accumulator for non-fatal problems in an application's lifecycle.
// ABOUTME: Listener failures and best-effort cleanup errors are recorded here instead of failing the caller.

use chrono::{DateTime, Utc};

/// Collects warnings that must not abort a lifecycle transition.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Warnings of one kind.
    pub fn of_kind(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }

    /// A lifecycle listener returned an error or panicked.
    pub fn listener_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ListenerFailed, message)
    }

    /// An auxiliary channel could not be closed cleanly.
    pub fn auxiliary_close(message: impl Into<String>) -> Self {
        Self::new(WarningKind::AuxiliaryClose, message)
    }

    /// Console output could not be pumped.
    pub fn console(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Console, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    ListenerFailed,
    AuxiliaryClose,
    Console,
}
