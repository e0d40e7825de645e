// ABOUTME: Restart state marker types for the typestate pattern.
// ABOUTME: Each state carries exactly the data that exists at that point of a member restart.

use crate::types::MemberUid;
use std::sync::Arc;
use tokio::sync::MutexGuard;

/// A member matching the prefix has been chosen.
/// Available actions: `await_close_precondition()`
#[derive(Debug)]
pub struct Selected<M> {
    pub(crate) candidate: Arc<M>,
}

/// The close predicate holds and the candidate's uid is known.
/// Available actions: `close_old()`
#[derive(Debug)]
pub struct CloseReady<M> {
    pub(crate) candidate: Arc<M>,
    pub(crate) old_uid: MemberUid,
}

/// The candidate was removed from the assembly and closed.
/// Available actions: `await_old_absent()`
#[derive(Debug)]
pub struct Closed {
    pub(crate) old_uid: MemberUid,
}

/// No remaining member sees the old uid any more.
/// Available actions: `await_new_precondition()`
#[derive(Debug)]
pub struct Vacated {
    pub(crate) old_uid: MemberUid,
}

/// The cluster is stable enough to grow again.
/// Available actions: `realize_new()`
#[derive(Debug)]
pub struct Prepared {
    pub(crate) old_uid: MemberUid,
}

/// The replacement is running; the assembly's exclusive lock is held.
/// Available actions: `await_join()`, `rollback()`
#[derive(Debug)]
pub struct Realized<'a, M> {
    pub(crate) old_uid: MemberUid,
    pub(crate) replacement: Arc<M>,
    pub(crate) guard: MutexGuard<'a, ()>,
}

/// The replacement sees other members and has a uid; the lock is still held.
/// Available actions: `add_new()`, `rollback()`
#[derive(Debug)]
pub struct Joined<'a, M> {
    pub(crate) old_uid: MemberUid,
    pub(crate) replacement: Arc<M>,
    pub(crate) new_uid: MemberUid,
    pub(crate) guard: MutexGuard<'a, ()>,
}

/// The replacement is part of the assembly; the lock has been released.
/// Available actions: `await_visible()`
#[derive(Debug)]
pub struct Added<M> {
    pub(crate) old_uid: MemberUid,
    pub(crate) replacement: Arc<M>,
    pub(crate) new_uid: MemberUid,
}

/// Every other member sees the replacement.
/// Available actions: `finish()`
#[derive(Debug)]
pub struct Completed<M> {
    pub(crate) old_uid: MemberUid,
    pub(crate) replacement: Arc<M>,
    pub(crate) new_uid: MemberUid,
    pub(crate) cluster_size: usize,
}
