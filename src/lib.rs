// ABOUTME: Library root for foreman - launch, supervise and assert on local or remote processes.
// ABOUTME: The CLI binary is in main.rs; everything it uses is public here.

pub mod application;
pub mod assembly;
pub mod cluster;
pub mod config;
pub mod deferred;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod platform;
pub mod process;
pub mod ssh;
pub mod terminal;
pub mod types;

pub use application::{Application, ApplicationSchema, LaunchOptions, LaunchSchema};
pub use assembly::Assembly;
pub use platform::Platform;
