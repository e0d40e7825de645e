// ABOUTME: Rolling restart of one cluster member, replacing it under the same name.
// ABOUTME: Drives the typestate machine in transitions.rs and rolls back a replacement that never settled.

mod error;
mod state;
mod transitions;

pub use error::{RestartError, RestartPhase};
pub use state::{Added, CloseReady, Closed, Completed, Joined, Prepared, Realized, Selected, Vacated};
pub use transitions::{Restart, TransitionResult};

use crate::application::{ApplicationConsole, ApplicationSchema, AsApplication, TracingConsole};
use crate::assembly::Assembly;
use crate::cluster::ClusterMember;
use crate::deferred::{AsyncPredicate, TimeoutConstraint, Unavailable};
use crate::platform::Platform;
use crate::types::MemberUid;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Restarts the first member whose name starts with a prefix.
///
/// The old member is closed and gone from the cluster before its replacement
/// is realized, and the replacement is visible to every other member before
/// the action succeeds.
pub struct RestartMemberAction<S: ApplicationSchema> {
    pub(crate) prefix: String,
    pub(crate) schema: Arc<S>,
    pub(crate) platform: Arc<Platform>,
    pub(crate) console: Arc<dyn ApplicationConsole>,
    pub(crate) close_predicate: AsyncPredicate<S::Application>,
    pub(crate) constraint: TimeoutConstraint,
    pub(crate) interrupt: CancellationToken,
}

impl<S: ApplicationSchema> fmt::Debug for RestartMemberAction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestartMemberAction")
            .field("prefix", &self.prefix)
            .field("platform", &self.platform.name())
            .field("constraint", &self.constraint)
            .finish_non_exhaustive()
    }
}

impl<S> RestartMemberAction<S>
where
    S: ApplicationSchema,
    S::Application: ClusterMember,
{
    pub fn new(prefix: impl Into<String>, schema: Arc<S>, platform: Arc<Platform>) -> Self {
        Self {
            prefix: prefix.into(),
            schema,
            platform,
            console: Arc::new(TracingConsole),
            close_predicate: Arc::new(|_: Arc<S::Application>| async { Ok::<_, Unavailable>(true) }.boxed()),
            constraint: TimeoutConstraint::default(),
            interrupt: CancellationToken::new(),
        }
    }

    pub fn with_console(mut self, console: Arc<dyn ApplicationConsole>) -> Self {
        self.console = console;
        self
    }

    /// Must hold on the member about to be closed, and on the next one before
    /// the replacement is realized.
    pub fn with_close_predicate(mut self, predicate: AsyncPredicate<S::Application>) -> Self {
        self.close_predicate = predicate;
        self
    }

    /// Bounds every wait of the restart.
    pub fn with_constraint(mut self, constraint: TimeoutConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    /// Cancelling the token aborts any wait in progress.
    pub fn with_interrupt(mut self, interrupt: CancellationToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Replace one matching member of `assembly`.
    pub async fn run(&self, assembly: &Assembly<S::Application>) -> Result<RestartReport, RestartError> {
        let started_at = Utc::now();
        let started = Instant::now();

        let restart = Restart::select(self, assembly)?
            .await_close_precondition()
            .await?
            .close_old()
            .await?
            .await_old_absent()
            .await?
            .await_new_precondition()
            .await?
            .realize_new()
            .await?;

        let joined = match restart.await_join().await {
            Ok(joined) => joined,
            Err((realized, e)) => {
                realized.rollback().await;
                return Err(e);
            }
        };

        let added = match joined.add_new() {
            Ok(added) => added,
            Err((joined, e)) => {
                joined.rollback().await;
                return Err(e);
            }
        };

        let completed = added.await_visible().await?;

        let report = RestartReport {
            member: completed.member_name().to_string(),
            pid: completed.replacement().application().id(),
            old_uid: completed.old_uid().clone(),
            new_uid: completed.new_uid().clone(),
            cluster_size: completed.cluster_size(),
            started_at,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            member = %report.member,
            old_uid = %report.old_uid,
            new_uid = %report.new_uid,
            cluster_size = report.cluster_size,
            elapsed = ?report.elapsed,
            "Member restarted"
        );
        Ok(report)
    }
}

/// Outcome of a successful member restart.
#[derive(Debug, Clone, Serialize)]
pub struct RestartReport {
    pub member: String,
    /// Process id of the replacement.
    pub pid: u64,
    pub old_uid: MemberUid,
    pub new_uid: MemberUid,
    pub cluster_size: usize,
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}
