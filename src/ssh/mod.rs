// ABOUTME: SSH transport for remote terminals.
// ABOUTME: Sessions authenticate via key file or agent and expose exec, streaming channels and uploads.

mod client;
mod error;

pub use client::{CommandOutput, ExecChannel, Session, SessionConfig};
pub use error::{Error, Result};

/// Quote a word for a POSIX shell.
pub fn quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', "'\\''"))
}
