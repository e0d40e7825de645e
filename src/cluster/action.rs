// ABOUTME: Actions performed against an assembly, once or on a fixed schedule.
// ABOUTME: Failures are logged and swallowed so a schedule keeps running.

use super::ClusterMember;
use super::restart::RestartMemberAction;
use crate::application::ApplicationSchema;
use crate::assembly::Assembly;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Something that can be done to a running assembly.
#[async_trait]
pub trait ClusterAction<M: Send + Sync>: Send + Sync {
    /// Perform the action; failures are logged, never returned.
    async fn perform(&self, assembly: &Assembly<M>);
}

#[async_trait]
impl<S> ClusterAction<S::Application> for RestartMemberAction<S>
where
    S: ApplicationSchema,
    S::Application: ClusterMember,
{
    async fn perform(&self, assembly: &Assembly<S::Application>) {
        if let Err(e) = self.run(assembly).await {
            tracing::error!(
                prefix = %self.prefix(),
                phase = ?e.phase(),
                interrupted = e.is_interrupted(),
                error = %e,
                "Member restart failed"
            );
        }
    }
}

/// Shortest period a schedule runs at.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Perform `action` every `every` until `shutdown` fires or the assembly closes.
///
/// The first run happens one period after scheduling. Periods shorter than
/// [`MIN_PERIOD`] are raised to it.
pub fn schedule<M, A>(
    action: Arc<A>,
    assembly: Arc<Assembly<M>>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    M: Send + Sync + 'static,
    A: ClusterAction<M> + ?Sized + 'static,
{
    let every = if every < MIN_PERIOD {
        tracing::warn!(requested = ?every, period = ?MIN_PERIOD, "Schedule period too short, raising it");
        MIN_PERIOD
    } else {
        every
    };

    tokio::spawn(async move {
        let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticks.tick() => {}
            }
            if assembly.is_closed() {
                tracing::debug!("Assembly closed, stopping schedule");
                break;
            }
            action.perform(&assembly).await;
        }
    })
}
