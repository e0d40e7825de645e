// ABOUTME: State transition methods for a rolling member restart.
// ABOUTME: Each method consumes self and returns the next state; late failures hand self back for rollback.

use super::RestartMemberAction;
use super::error::RestartError;
use super::state::{Added, CloseReady, Closed, Completed, Joined, Prepared, Realized, Selected, Vacated};
use crate::application::{ApplicationSchema, AsApplication};
use crate::assembly::{Assembly, Rejected};
use crate::cluster::ClusterMember;
use crate::deferred::{Deferred, DeferredPredicate, EnsureError, Unavailable, ensure_interruptible, from_fn};
use crate::types::MemberUid;
use async_trait::async_trait;
use predicates::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A member restart in progress, parameterized by its current state.
pub struct Restart<'a, S: ApplicationSchema, St> {
    pub(crate) action: &'a RestartMemberAction<S>,
    pub(crate) assembly: &'a Assembly<S::Application>,
    /// Name of the member being replaced, reused by its replacement.
    pub(crate) name: String,
    pub(crate) state: St,
}

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<'a, S, T, St> = Result<Restart<'a, S, T>, (Restart<'a, S, St>, RestartError)>;

impl<'a, S: ApplicationSchema, St> Restart<'a, S, St> {
    pub fn member_name(&self) -> &str {
        &self.name
    }

    fn advance<T>(action: &'a RestartMemberAction<S>, assembly: &'a Assembly<S::Application>, name: String, state: T) -> Restart<'a, S, T> {
        Restart {
            action,
            assembly,
            name,
            state,
        }
    }

    async fn ensure<T, D, P>(&self, deferred: &D, predicate: &P) -> Result<T, EnsureError>
    where
        T: fmt::Debug + Send,
        D: Deferred<T> + ?Sized,
        P: Predicate<T> + ?Sized,
    {
        ensure_interruptible(deferred, predicate, &self.action.constraint, &self.action.interrupt).await
    }
}

fn member_uid_of<M: ClusterMember + 'static>(member: &Arc<M>) -> impl Deferred<MemberUid> + use<M> {
    let member = Arc::clone(member);
    let description = format!("{}.local_member_uid", member.application().name());
    from_fn(description, move || {
        let member = Arc::clone(&member);
        async move { member.local_member_uid().await }
    })
}

fn cluster_size_of<M: ClusterMember + 'static>(member: &Arc<M>) -> impl Deferred<usize> + use<M> {
    let member = Arc::clone(member);
    let description = format!("{}.cluster_size", member.application().name());
    from_fn(description, move || {
        let member = Arc::clone(&member);
        async move { member.cluster_size().await }
    })
}

fn member_uids_of<M: ClusterMember + 'static>(member: &Arc<M>) -> impl Deferred<BTreeSet<MemberUid>> + use<M> {
    let member = Arc::clone(member);
    let description = format!("{}.cluster_member_uids", member.application().name());
    from_fn(description, move || {
        let member = Arc::clone(&member);
        async move { member.cluster_member_uids().await }
    })
}

/// Membership as seen by the first live member of an assembly that answers.
struct MembershipView<'a, M> {
    assembly: &'a Assembly<M>,
}

impl<M> fmt::Display for MembershipView<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Assembly.cluster_member_uids")
    }
}

#[async_trait]
impl<M: ClusterMember + 'static> Deferred<BTreeSet<MemberUid>> for MembershipView<'_, M> {
    async fn get(&self) -> Result<BTreeSet<MemberUid>, Unavailable> {
        let mut last_failure = None;
        for member in self.assembly.snapshot() {
            match member.cluster_member_uids().await {
                Ok(uids) => return Ok(uids),
                Err(e) => last_failure = Some(e),
            }
        }
        match last_failure {
            None => Ok(BTreeSet::new()),
            Some(cause) => Err(Unavailable::temporarily_because(self, cause)),
        }
    }
}

// =============================================================================
// Select -> Selected
// =============================================================================

impl<'a, S> Restart<'a, S, Selected<S::Application>>
where
    S: ApplicationSchema,
    S::Application: ClusterMember,
{
    /// Pick the first member whose name starts with the action's prefix.
    pub fn select(action: &'a RestartMemberAction<S>, assembly: &'a Assembly<S::Application>) -> Result<Self, RestartError> {
        let candidate = assembly
            .get_all(&action.prefix)
            .into_iter()
            .next()
            .ok_or_else(|| RestartError::NoCandidate {
                prefix: action.prefix.clone(),
            })?;

        let name = candidate.application().name().to_string();
        tracing::info!(member = %name, "Selected member for restart");
        Ok(Self::advance(action, assembly, name, Selected { candidate }))
    }

    /// Wait for the close predicate to hold, then record the candidate's uid.
    pub async fn await_close_precondition(self) -> Result<Restart<'a, S, CloseReady<S::Application>>, RestartError> {
        let candidate = Arc::clone(&self.state.candidate);

        let ready = DeferredPredicate::new(
            format!("close {}", self.name),
            Arc::clone(&candidate),
            Arc::clone(&self.action.close_predicate),
        );
        self.ensure(&ready, &predicate::eq(true))
            .await
            .map_err(|source| RestartError::ClosePrecondition {
                member: self.name.clone(),
                source,
            })?;

        let old_uid = self
            .ensure(&member_uid_of(&candidate), &predicate::always())
            .await
            .map_err(|source| RestartError::MemberUid {
                member: self.name.clone(),
                source,
            })?;

        tracing::debug!(member = %self.name, uid = %old_uid, "Close precondition satisfied");
        Ok(Self::advance(self.action, self.assembly, self.name, CloseReady { candidate, old_uid }))
    }
}

// =============================================================================
// CloseReady -> Closed
// =============================================================================

impl<'a, S> Restart<'a, S, CloseReady<S::Application>>
where
    S: ApplicationSchema,
    S::Application: ClusterMember,
{
    /// Remove the candidate from the assembly, then close it.
    ///
    /// When removal fails the candidate is left running and untouched.
    pub async fn close_old(self) -> Result<Restart<'a, S, Closed>, RestartError> {
        let Restart {
            action,
            assembly,
            name,
            state: CloseReady { candidate, old_uid },
        } = self;

        if !assembly.remove(&candidate) {
            return Err(RestartError::RemovalFailed { member: name });
        }

        candidate.application().close().await;
        tracing::info!(member = %name, uid = %old_uid, "Closed member");
        Ok(Self::advance(action, assembly, name, Closed { old_uid }))
    }
}

// =============================================================================
// Closed -> Vacated -> Prepared
// =============================================================================

impl<'a, S> Restart<'a, S, Closed>
where
    S: ApplicationSchema,
    S::Application: ClusterMember,
{
    /// Wait until no remaining member reports the old uid.
    pub async fn await_old_absent(self) -> Result<Restart<'a, S, Vacated>, RestartError> {
        let old_uid = self.state.old_uid.clone();
        let gone = old_uid.clone();
        let excludes_old = predicate::function(move |uids: &BTreeSet<MemberUid>| !uids.contains(&gone))
            .fn_name("excludes_old_member");

        self.ensure(&MembershipView { assembly: self.assembly }, &excludes_old)
            .await
            .map_err(|source| RestartError::OldMemberPresent {
                member: self.name.clone(),
                uid: old_uid.clone(),
                source,
            })?;

        tracing::debug!(member = %self.name, uid = %old_uid, "Old member left the cluster");
        Ok(Self::advance(self.action, self.assembly, self.name, Vacated { old_uid }))
    }
}

impl<'a, S> Restart<'a, S, Vacated>
where
    S: ApplicationSchema,
    S::Application: ClusterMember,
{
    /// Wait for the close predicate to hold on the next member sharing the prefix, if any.
    pub async fn await_new_precondition(self) -> Result<Restart<'a, S, Prepared>, RestartError> {
        if let Some(next) = self.assembly.get_all(&self.action.prefix).into_iter().next() {
            let stable = DeferredPredicate::new(
                format!("stable {}", next.application().name()),
                next,
                Arc::clone(&self.action.close_predicate),
            );
            self.ensure(&stable, &predicate::eq(true))
                .await
                .map_err(|source| RestartError::NewPrecondition {
                    member: self.name.clone(),
                    source,
                })?;
        }

        let Restart {
            action,
            assembly,
            name,
            state: Vacated { old_uid },
        } = self;
        Ok(Self::advance(action, assembly, name, Prepared { old_uid }))
    }
}

// =============================================================================
// Prepared -> Realized (takes the assembly lock)
// =============================================================================

impl<'a, S> Restart<'a, S, Prepared>
where
    S: ApplicationSchema,
    S::Application: ClusterMember,
{
    /// Launch the replacement under the old member's name.
    pub async fn realize_new(self) -> Result<Restart<'a, S, Realized<'a, S::Application>>, RestartError> {
        let Restart {
            action,
            assembly,
            name,
            state: Prepared { old_uid },
        } = self;

        let guard = assembly.lock_exclusive().await;
        if assembly.is_closed() {
            return Err(RestartError::AssemblyClosed { member: name });
        }

        let replacement = action
            .platform
            .realize(
                action.schema.as_ref(),
                &name,
                Arc::clone(&action.console),
                assembly.options().clone(),
            )
            .await
            .map_err(|source| RestartError::Realize {
                member: name.clone(),
                source,
            })?;

        tracing::info!(member = %name, pid = replacement.application().id(), "Realized replacement");
        Ok(Self::advance(
            action,
            assembly,
            name,
            Realized {
                old_uid,
                replacement: Arc::new(replacement),
                guard,
            },
        ))
    }
}

// =============================================================================
// Realized -> Joined
// =============================================================================

impl<'a, S> Restart<'a, S, Realized<'a, S::Application>>
where
    S: ApplicationSchema,
    S::Application: ClusterMember,
{
    /// Wait until the replacement sees other members and reports its uid.
    pub async fn await_join(self) -> TransitionResult<'a, S, Joined<'a, S::Application>, Realized<'a, S::Application>> {
        let replacement = Arc::clone(&self.state.replacement);

        let joined = match self.ensure(&cluster_size_of(&replacement), &predicate::gt(1)).await {
            Ok(_) => self.ensure(&member_uid_of(&replacement), &predicate::always()).await,
            Err(e) => Err(e),
        };

        let new_uid = match joined {
            Ok(uid) => uid,
            Err(source) => {
                let member = self.name.clone();
                return Err((self, RestartError::Join { member, source }));
            }
        };

        tracing::info!(member = %self.name, uid = %new_uid, "Replacement joined the cluster");
        let Restart {
            action,
            assembly,
            name,
            state: Realized { old_uid, guard, .. },
        } = self;
        Ok(Self::advance(
            action,
            assembly,
            name,
            Joined {
                old_uid,
                replacement,
                new_uid,
                guard,
            },
        ))
    }

    /// Close the replacement and release the assembly lock.
    pub async fn rollback(self) {
        let Restart {
            name,
            state: Realized { replacement, guard, .. },
            ..
        } = self;
        replacement.application().close().await;
        drop(guard);
        tracing::warn!(member = %name, "Rolled back replacement");
    }
}

// =============================================================================
// Joined -> Added (releases the assembly lock)
// =============================================================================

impl<'a, S> Restart<'a, S, Joined<'a, S::Application>>
where
    S: ApplicationSchema,
    S::Application: ClusterMember,
{
    pub fn add_new(self) -> TransitionResult<'a, S, Added<S::Application>, Joined<'a, S::Application>> {
        if let Err(rejected) = self.assembly.try_add(Arc::clone(&self.state.replacement)) {
            let member = self.name.clone();
            let error = match rejected {
                Rejected::Closed => RestartError::AssemblyClosed { member },
                Rejected::AlreadyPresent => RestartError::AlreadyAdded { member },
            };
            return Err((self, error));
        }

        let Restart {
            action,
            assembly,
            name,
            state:
                Joined {
                    old_uid,
                    replacement,
                    new_uid,
                    guard,
                },
        } = self;
        drop(guard);

        tracing::debug!(member = %name, members = assembly.len(), "Added replacement to assembly");
        Ok(Self::advance(
            action,
            assembly,
            name,
            Added {
                old_uid,
                replacement,
                new_uid,
            },
        ))
    }

    /// Close the replacement and release the assembly lock.
    pub async fn rollback(self) {
        let Restart {
            name,
            state: Joined { replacement, guard, .. },
            ..
        } = self;
        replacement.application().close().await;
        drop(guard);
        tracing::warn!(member = %name, "Rolled back replacement");
    }
}

// =============================================================================
// Added -> Completed
// =============================================================================

impl<'a, S> Restart<'a, S, Added<S::Application>>
where
    S: ApplicationSchema,
    S::Application: ClusterMember,
{
    /// Wait until every other member's membership view contains the new uid.
    pub async fn await_visible(self) -> Result<Restart<'a, S, Completed<S::Application>>, RestartError> {
        let new_uid = self.state.new_uid.clone();

        for other in self.assembly.snapshot() {
            if Arc::ptr_eq(&other, &self.state.replacement) {
                continue;
            }
            let expected = new_uid.clone();
            let includes_new = predicate::function(move |uids: &BTreeSet<MemberUid>| uids.contains(&expected))
                .fn_name("includes_new_member");
            self.ensure(&member_uids_of(&other), &includes_new)
                .await
                .map_err(|source| RestartError::NotVisible {
                    member: self.name.clone(),
                    uid: new_uid.clone(),
                    source,
                })?;
        }

        let cluster_size = self.assembly.cluster_size().await;
        let Restart {
            action,
            assembly,
            name,
            state:
                Added {
                    old_uid,
                    replacement,
                    new_uid,
                },
        } = self;
        Ok(Self::advance(
            action,
            assembly,
            name,
            Completed {
                old_uid,
                replacement,
                new_uid,
                cluster_size,
            },
        ))
    }
}

impl<'a, S> Restart<'a, S, Completed<S::Application>>
where
    S: ApplicationSchema,
{
    pub fn old_uid(&self) -> &MemberUid {
        &self.state.old_uid
    }

    pub fn new_uid(&self) -> &MemberUid {
        &self.state.new_uid
    }

    pub fn replacement(&self) -> &Arc<S::Application> {
        &self.state.replacement
    }

    pub fn cluster_size(&self) -> usize {
        self.state.cluster_size
    }
}
