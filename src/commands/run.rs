// ABOUTME: Run command implementation.
// ABOUTME: Launches one program locally or over SSH, streams its output and returns its exit code.

use super::{platform, schema};
use crate::cli::RunArgs;
use foreman::LaunchOptions;
use foreman::application::{ApplicationConsole, SystemConsole};
use foreman::config::Settings;
use foreman::error::{Error, Result};
use foreman::output::Output;
use foreman::types::EnvAssignment;
use std::sync::Arc;

/// Run the program to completion; returns its exit status.
pub async fn run(args: RunArgs, settings: Settings, output: &mut Output) -> Result<i32> {
    let platform = platform(&args.remote, &settings)?;
    let (name, schema) = schema(&args.command)?;

    let mut options = LaunchOptions::default().orphans_permitted(args.allow_orphans);
    for EnvAssignment { key, value } in args.env {
        options = options.env(key, value);
    }
    if let Some(dir) = args.workdir {
        options = options.working_directory(dir);
    }

    output.progress(&format!("  → Starting {name} on {}...", platform.hostname()));
    output.start_timer();

    let console: Arc<dyn ApplicationConsole> = Arc::new(SystemConsole);
    let application = platform.realize(&schema, &name, console, options).await?;
    tracing::debug!(application = %name, pid = application.id(), "Started");

    let status = match args.timeout {
        Some(timeout) => match application.wait_for(timeout).await {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                application.destroy().await;
                Err(Error::Timeout {
                    program: name.clone(),
                    timeout,
                })
            }
            Err(e) => Err(e.into()),
        },
        None => application.wait().await.map_err(Error::from),
    };

    application.close().await;
    for warning in application.diagnostics().warnings() {
        output.warning(&warning.message);
    }

    let status = status?;
    output.success(&format!("✓ {name} exited with {status}"), Some(status));
    Ok(status)
}
