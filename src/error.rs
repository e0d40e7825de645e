// ABOUTME: Crate-level error type used by the foreman CLI.
// ABOUTME: Wraps module errors with thiserror so commands can use `?` throughout.

use crate::application::BuildError;
use crate::deferred::AssertionError;
use crate::process::ProcessError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("remote user unknown: pass --user or set USER")]
    MissingUser,

    #[error("{program} did not exit within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Assertion(#[from] AssertionError),

    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
