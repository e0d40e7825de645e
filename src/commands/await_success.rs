// ABOUTME: Await command implementation.
// ABOUTME: Re-runs a program under the Eventually evaluator until it exits with status 0.

use super::{platform, schema};
use crate::cli::AwaitArgs;
use foreman::application::{ApplicationConsole, BuildError, NullConsole, SystemConsole};
use foreman::config::Settings;
use foreman::deferred::{Eventually, TimeoutConstraint, Unavailable, from_fn};
use foreman::error::Result;
use foreman::output::{Output, OutputMode};
use foreman::process::ProcessError;
use foreman::{LaunchOptions, LaunchSchema, Platform};
use predicates::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_EVERY: Duration = Duration::from_secs(1);

pub async fn await_success(args: AwaitArgs, settings: Settings, output: &mut Output) -> Result<()> {
    let platform = platform(&args.remote, &settings)?;
    let (name, schema) = schema(&args.command)?;
    let schema = Arc::new(schema);

    let console: Arc<dyn ApplicationConsole> = match output.mode() {
        OutputMode::Normal => Arc::new(SystemConsole),
        OutputMode::Quiet | OutputMode::Json => Arc::new(NullConsole),
    };

    let constraint = ensure_bounds(&settings.ensure, args.within, args.every);

    let attempt_limit = constraint.max_duration();
    let description = args.command.join(" ");
    let run_once = from_fn(description, move || {
        attempt(
            Arc::clone(&platform),
            Arc::clone(&schema),
            name.clone(),
            Arc::clone(&console),
            attempt_limit,
        )
    });

    output.progress(&format!("  → Waiting up to {} for success...", humantime::format_duration(attempt_limit)));
    output.start_timer();

    Eventually::within(constraint)
        .with_message(format!("{} never succeeded", args.command.join(" ")))
        .assert_deferred(&run_once, &predicate::eq(0))
        .await?;

    output.success("✓ Succeeded", Some(0));
    Ok(())
}

/// The configured ensure bounds with the command-line flags on top.
///
/// An explicit `every` raises the poll cap so the pause is honored as given.
fn ensure_bounds(ensure: &TimeoutConstraint, within: Option<Duration>, every: Option<Duration>) -> TimeoutConstraint {
    let mut constraint = ensure.clone();
    if let Some(within) = within {
        constraint = constraint.within(within);
    }
    match every {
        Some(every) => {
            let cap = constraint.max_poll_period().max(every);
            constraint.polling_every(every).with_max_poll_period(cap)
        }
        None => constraint.polling_every(DEFAULT_EVERY),
    }
}

/// One run of the program; its exit status, or why there is none.
async fn attempt(
    platform: Arc<Platform>,
    schema: Arc<LaunchSchema>,
    name: String,
    console: Arc<dyn ApplicationConsole>,
    limit: Duration,
) -> std::result::Result<i32, Unavailable> {
    let description = format!("{name} exit status");
    let application = platform
        .realize(schema.as_ref(), &name, console, LaunchOptions::default())
        .await
        .map_err(|e| classify(&description, e))?;

    let status = application.wait_for(limit).await;
    application.close().await;

    match status {
        Ok(Some(status)) => {
            tracing::debug!(application = %name, status, "Attempt finished");
            Ok(status)
        }
        Ok(None) => Err(Unavailable::temporarily(&description)),
        Err(e) if e.is_interrupted() => Err(Unavailable::permanently_because(&description, e)),
        Err(e) => Err(Unavailable::temporarily_because(&description, e)),
    }
}

/// A program that cannot be spawned at all will never succeed.
fn classify(description: &str, error: BuildError) -> Unavailable {
    match &error {
        BuildError::Start {
            source: ProcessError::Spawn { .. },
            ..
        } => Unavailable::permanently_because(description, error),
        _ => Unavailable::temporarily_because(description, error),
    }
}
