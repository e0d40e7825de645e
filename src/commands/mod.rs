// ABOUTME: Command module aggregator for the foreman CLI.
// ABOUTME: Re-exports the run and await handlers and the platform/schema helpers they share.

mod await_success;
mod run;

pub use await_success::await_success;
pub use run::run;

use crate::cli::RemoteArgs;
use foreman::config::Settings;
use foreman::error::{Error, Result};
use foreman::ssh::SessionConfig;
use foreman::{LaunchSchema, Platform};
use std::path::Path;
use std::sync::Arc;

/// This host, or the SSH host named by `--host`.
fn platform(remote: &RemoteArgs, settings: &Settings) -> Result<Arc<Platform>> {
    let platform = match &remote.host {
        None => Platform::local(),
        Some(host) => {
            let user = match &remote.user {
                Some(user) => user.clone(),
                None => std::env::var("USER").map_err(|_| Error::MissingUser)?,
            };
            let mut config = SessionConfig::new(host, user)
                .port(remote.port)
                .trust_on_first_use(remote.trust_on_first_use);
            if let Some(identity) = &remote.identity {
                config = config.key_path(identity);
            }
            Platform::remote(host.clone(), settings.session(config))
        }
    };
    Ok(Arc::new(platform.with_options(settings.builder.clone())))
}

/// Application name and launch schema for `program [args...]`.
fn schema(command: &[String]) -> Result<(String, LaunchSchema)> {
    let (program, arguments) = command
        .split_first()
        .ok_or_else(|| Error::InvalidConfig("no program given".to_string()))?;

    let name = Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.clone());

    Ok((name, LaunchSchema::new(program.clone()).args(arguments.iter().cloned())))
}
