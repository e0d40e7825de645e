// ABOUTME: Failures of a rolling member restart.
// ABOUTME: Each variant names the member and the phase that gave up.

use crate::application::BuildError;
use crate::deferred::EnsureError;
use crate::types::MemberUid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("no member name starts with '{prefix}'")]
    NoCandidate { prefix: String },

    #[error("close precondition for {member} never held: {source}")]
    ClosePrecondition {
        member: String,
        #[source]
        source: EnsureError,
    },

    #[error("could not resolve the member uid of {member}: {source}")]
    MemberUid {
        member: String,
        #[source]
        source: EnsureError,
    },

    #[error("{member} could not be removed from the assembly")]
    RemovalFailed { member: String },

    #[error("{uid} of {member} is still part of the cluster: {source}")]
    OldMemberPresent {
        member: String,
        uid: MemberUid,
        #[source]
        source: EnsureError,
    },

    #[error("cluster did not stabilize before replacing {member}: {source}")]
    NewPrecondition {
        member: String,
        #[source]
        source: EnsureError,
    },

    #[error("assembly was closed before {member} could be replaced")]
    AssemblyClosed { member: String },

    #[error("failed to realize replacement {member}: {source}")]
    Realize {
        member: String,
        #[source]
        source: BuildError,
    },

    #[error("replacement {member} never joined the cluster: {source}")]
    Join {
        member: String,
        #[source]
        source: EnsureError,
    },

    #[error("replacement {member} was already part of the assembly")]
    AlreadyAdded { member: String },

    #[error("replacement {member} ({uid}) is not visible to every member: {source}")]
    NotVisible {
        member: String,
        uid: MemberUid,
        #[source]
        source: EnsureError,
    },
}

/// Restart phase a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPhase {
    Select,
    AwaitClosePrecondition,
    CloseOld,
    AwaitOldAbsent,
    AwaitNewPrecondition,
    RealizeNew,
    AwaitJoin,
    AddNew,
    AwaitVisible,
}

impl RestartError {
    pub fn phase(&self) -> RestartPhase {
        match self {
            RestartError::NoCandidate { .. } => RestartPhase::Select,
            RestartError::ClosePrecondition { .. } | RestartError::MemberUid { .. } => {
                RestartPhase::AwaitClosePrecondition
            }
            RestartError::RemovalFailed { .. } => RestartPhase::CloseOld,
            RestartError::OldMemberPresent { .. } => RestartPhase::AwaitOldAbsent,
            RestartError::NewPrecondition { .. } => RestartPhase::AwaitNewPrecondition,
            RestartError::AssemblyClosed { .. } | RestartError::Realize { .. } => RestartPhase::RealizeNew,
            RestartError::Join { .. } => RestartPhase::AwaitJoin,
            RestartError::AlreadyAdded { .. } => RestartPhase::AddNew,
            RestartError::NotVisible { .. } => RestartPhase::AwaitVisible,
        }
    }

    /// Whether the failure came from an interrupted wait.
    pub fn is_interrupted(&self) -> bool {
        match self {
            RestartError::ClosePrecondition { source, .. }
            | RestartError::MemberUid { source, .. }
            | RestartError::OldMemberPresent { source, .. }
            | RestartError::NewPrecondition { source, .. }
            | RestartError::Join { source, .. }
            | RestartError::NotVisible { source, .. } => source.is_interrupted(),
            _ => false,
        }
    }
}
