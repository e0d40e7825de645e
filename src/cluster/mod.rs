// ABOUTME: Cluster members, membership queries over an assembly, and cluster actions.
// ABOUTME: The rolling member restart lives in the restart submodule as a typestate machine.

mod action;
mod member;
pub mod restart;

pub use crate::types::MemberUid;
pub use action::{ClusterAction, MIN_PERIOD, schedule};
pub use member::{
    ClusterMember, ClusterMemberSchema, ManagedMember, ManagementConnector, MemberAddress, MembershipAttributes,
};
pub use restart::{RestartError, RestartMemberAction, RestartReport};

use crate::assembly::Assembly;
use std::collections::BTreeSet;

impl<M: ClusterMember> Assembly<M> {
    /// Cluster size as seen by the first member that answers; 0 when none does.
    pub async fn cluster_size(&self) -> usize {
        for member in self.snapshot() {
            match member.cluster_size().await {
                Ok(size) => return size,
                Err(e) => tracing::debug!(member = %member.application().name(), error = %e, "Cluster size unavailable"),
            }
        }
        0
    }

    /// Member uids as seen by the first member that answers; empty when none does.
    pub async fn cluster_member_uids(&self) -> BTreeSet<MemberUid> {
        for member in self.snapshot() {
            match member.cluster_member_uids().await {
                Ok(uids) => return uids,
                Err(e) => tracing::debug!(member = %member.application().name(), error = %e, "Member uids unavailable"),
            }
        }
        BTreeSet::new()
    }
}
