// ABOUTME: Error types for process realization and control.
// ABOUTME: Interruption is fatal and never retried by callers.

use crate::ssh;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} of the process could not be captured")]
    StreamUnavailable(&'static str),

    #[error("interrupted while waiting for process {0}")]
    Interrupted(u64),

    #[error("remote process did not report its process id")]
    MissingProcessId,

    #[error("failed to create directory {path}: {source}")]
    MakeDirectories {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("remote execution failed: {0}")]
    Remote(#[from] ssh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ProcessError::Interrupted(_))
    }
}

pub type Result<T> = std::result::Result<T, ProcessError>;
