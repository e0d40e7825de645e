// ABOUTME: Validated domain types shared across modules.
// ABOUTME: Member identities and environment assignments parsed from user input.

mod env_assignment;
mod member_uid;

pub use env_assignment::{EnvAssignment, EnvAssignmentError};
pub use member_uid::{MemberUid, MemberUidError};
