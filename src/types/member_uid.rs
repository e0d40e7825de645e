// ABOUTME: Opaque cluster member identity assigned by the managed application.
// ABOUTME: Compared across restarts to tell the old member from its replacement.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemberUidError {
    #[error("member uid cannot be empty")]
    Empty,

    #[error("member uid cannot contain whitespace")]
    Whitespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberUid(String);

impl MemberUid {
    pub fn new(value: &str) -> Result<Self, MemberUidError> {
        if value.is_empty() {
            return Err(MemberUidError::Empty);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(MemberUidError::Whitespace);
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MemberUid {
    type Error = MemberUidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<MemberUid> for String {
    fn from(uid: MemberUid) -> Self {
        uid.0
    }
}

impl fmt::Display for MemberUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_opaque_identifiers() {
        assert_eq!(MemberUid::new("0a0b0c-3").unwrap().as_str(), "0a0b0c-3");
    }

    #[test]
    fn rejects_whitespace() {
        assert_eq!(MemberUid::new("Member 3"), Err(MemberUidError::Whitespace));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(MemberUid::new(""), Err(MemberUidError::Empty));
    }

    #[test]
    fn deserializes_through_validation() {
        let uid: MemberUid = serde_json::from_str("\"abc-1\"").unwrap();
        assert_eq!(uid.to_string(), "abc-1");
        assert!(serde_json::from_str::<MemberUid>("\"\"").is_err());
    }
}
