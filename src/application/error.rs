// ABOUTME: Errors raised while realizing an application, with SNAFU context selectors.
// ABOUTME: Each variant names the application and wraps the failing step's cause.

use super::deploy::DeployError;
use crate::process::ProcessError;
use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BuildError {
    #[snafu(display("failed to prepare {} for {application}: {source}", path.display()))]
    PrepareDirectory {
        application: String,
        path: PathBuf,
        source: ProcessError,
    },

    #[snafu(display("failed to deploy artifacts for {application}: {source}"))]
    Deploy { application: String, source: DeployError },

    #[snafu(display("failed to start {application} on {platform}: {source}"))]
    Start {
        application: String,
        platform: String,
        source: ProcessError,
    },
}

/// Which realization step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    PrepareDirectory,
    Deploy,
    Start,
}

impl BuildError {
    pub fn step(&self) -> BuildStep {
        match self {
            BuildError::PrepareDirectory { .. } => BuildStep::PrepareDirectory,
            BuildError::Deploy { .. } => BuildStep::Deploy,
            BuildError::Start { .. } => BuildStep::Start,
        }
    }

    pub fn application(&self) -> &str {
        match self {
            BuildError::PrepareDirectory { application, .. }
            | BuildError::Deploy { application, .. }
            | BuildError::Start { application, .. } => application,
        }
    }
}
