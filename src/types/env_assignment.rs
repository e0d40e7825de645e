// ABOUTME: KEY=VALUE environment assignments as typed on the command line.
// ABOUTME: Keys must be valid POSIX shell variable names.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvAssignmentError {
    #[error("expected KEY=VALUE, got '{0}'")]
    MissingEquals(String),

    #[error("environment variable name cannot be empty")]
    EmptyKey,

    #[error("environment variable name cannot start with a digit: '{0}'")]
    LeadingDigit(String),

    #[error("invalid character in environment variable name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvAssignment {
    pub key: String,
    pub value: String,
}

impl FromStr for EnvAssignment {
    type Err = EnvAssignmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| EnvAssignmentError::MissingEquals(s.to_string()))?;

        if key.is_empty() {
            return Err(EnvAssignmentError::EmptyKey);
        }
        if key.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(EnvAssignmentError::LeadingDigit(key.to_string()));
        }
        if let Some(c) = key.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
            return Err(EnvAssignmentError::InvalidChar(c));
        }

        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl fmt::Display for EnvAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
