// ABOUTME: Failure classification for deferred resolution and bounded evaluation.
// ABOUTME: Unavailable separates retryable from fatal; EnsureError reports exhausted evaluations.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used as the root cause of an unavailable value.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a [`Deferred`](super::Deferred) could not produce a value.
#[derive(Debug, Error)]
pub enum Unavailable {
    /// The value is not available yet; a later attempt may succeed.
    #[error("{deferred} is temporarily unavailable{}", cause(.source))]
    Temporarily {
        deferred: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The value will never become available; retrying is pointless.
    #[error("{deferred} is permanently unavailable{}", cause(.source))]
    Permanently {
        deferred: String,
        #[source]
        source: Option<BoxError>,
    },
}

fn cause(source: &Option<BoxError>) -> String {
    match source {
        Some(e) => format!(": {e}"),
        None => String::new(),
    }
}

impl Unavailable {
    pub fn temporarily(deferred: impl fmt::Display) -> Self {
        Unavailable::Temporarily {
            deferred: deferred.to_string(),
            source: None,
        }
    }

    pub fn temporarily_because(deferred: impl fmt::Display, source: impl Into<BoxError>) -> Self {
        Unavailable::Temporarily {
            deferred: deferred.to_string(),
            source: Some(source.into()),
        }
    }

    pub fn permanently(deferred: impl fmt::Display) -> Self {
        Unavailable::Permanently {
            deferred: deferred.to_string(),
            source: None,
        }
    }

    pub fn permanently_because(deferred: impl fmt::Display, source: impl Into<BoxError>) -> Self {
        Unavailable::Permanently {
            deferred: deferred.to_string(),
            source: Some(source.into()),
        }
    }

    /// Whether retrying can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Unavailable::Permanently { .. })
    }

    /// Description of the deferred that failed.
    pub fn deferred(&self) -> &str {
        match self {
            Unavailable::Temporarily { deferred, .. } | Unavailable::Permanently { deferred, .. } => {
                deferred
            }
        }
    }
}

/// Failure of a bounded [`ensure`](super::ensure) evaluation.
#[derive(Debug, Error)]
pub enum EnsureError {
    /// No value was ever resolved before the deadline.
    #[error(
        "failed to resolve a value for [{deferred}] to evaluate with [{predicate}] after {attempts} attempt(s) in {elapsed:?}"
    )]
    Unresolved {
        deferred: String,
        predicate: String,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: Option<Unavailable>,
    },

    /// Values were resolved but none satisfied the predicate before the deadline.
    #[error(
        "[{predicate}] failed to match last resolved value [{last_value}] for [{deferred}] after {attempts} attempt(s) in {elapsed:?}"
    )]
    Mismatch {
        deferred: String,
        predicate: String,
        last_value: String,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: Option<Unavailable>,
    },

    /// The deferred reported it can never produce a value.
    #[error("[{deferred}] became permanently unavailable while evaluating [{predicate}]: {source}")]
    Permanent {
        deferred: String,
        predicate: String,
        last_value: Option<String>,
        attempts: u32,
        #[source]
        source: Unavailable,
    },

    /// The evaluation was interrupted; never retried.
    #[error("interrupted while waiting for [{deferred}]")]
    Interrupted {
        deferred: String,
        last_value: Option<String>,
    },
}

impl EnsureError {
    /// The last value observed before the evaluation gave up, if any.
    pub fn last_value(&self) -> Option<&str> {
        match self {
            EnsureError::Unresolved { .. } => None,
            EnsureError::Mismatch { last_value, .. } => Some(last_value),
            EnsureError::Permanent { last_value, .. } | EnsureError::Interrupted { last_value, .. } => {
                last_value.as_deref()
            }
        }
    }

    /// Number of resolution attempts made.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            EnsureError::Unresolved { attempts, .. }
            | EnsureError::Mismatch { attempts, .. }
            | EnsureError::Permanent { attempts, .. } => Some(*attempts),
            EnsureError::Interrupted { .. } => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, EnsureError::Interrupted { .. })
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, EnsureError::Permanent { .. })
    }
}
