// ABOUTME: Bounded polling of a Deferred until a predicate holds.
// ABOUTME: Also provides the Eventually assertion wrapper with optional message prefix.

use super::{Deferred, EnsureError, TimeoutConstraint, Unavailable, Value};
use predicates::Predicate;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Resolve `deferred` until `predicate` holds or `constraint` is exhausted.
pub async fn ensure<T, D, P>(deferred: &D, predicate: &P, constraint: &TimeoutConstraint) -> Result<T, EnsureError>
where
    T: fmt::Debug + Send,
    D: Deferred<T> + ?Sized,
    P: Predicate<T> + ?Sized,
{
    ensure_interruptible(deferred, predicate, constraint, &CancellationToken::new()).await
}

/// Like [`ensure`], but fails with [`EnsureError::Interrupted`] as soon as
/// `interrupt` is cancelled during a sleep.
pub async fn ensure_interruptible<T, D, P>(
    deferred: &D,
    predicate: &P,
    constraint: &TimeoutConstraint,
    interrupt: &CancellationToken,
) -> Result<T, EnsureError>
where
    T: fmt::Debug + Send,
    D: Deferred<T> + ?Sized,
    P: Predicate<T> + ?Sized,
{
    let started = Instant::now();
    let mut delays = constraint.delays();
    let mut attempts: u32 = 0;
    let mut last_value: Option<String> = None;
    let mut last_failure: Option<Unavailable> = None;

    if !constraint.initial_delay().is_zero()
        && !pause(constraint.initial_delay(), interrupt).await
    {
        return Err(EnsureError::Interrupted {
            deferred: deferred.to_string(),
            last_value,
        });
    }

    loop {
        attempts += 1;

        match deferred.get().await {
            Ok(value) => {
                if predicate.eval(&value) {
                    tracing::debug!(deferred = %deferred, attempts, "Deferred value satisfied predicate");
                    return Ok(value);
                }
                last_value = Some(format!("{value:?}"));
                last_failure = None;
            }
            Err(e) if e.is_permanent() => {
                return Err(EnsureError::Permanent {
                    deferred: deferred.to_string(),
                    predicate: predicate.to_string(),
                    last_value,
                    attempts,
                    source: e,
                });
            }
            Err(e) => {
                tracing::trace!(deferred = %deferred, attempts, error = %e, "Deferred value not yet available");
                last_failure = Some(e);
            }
        }

        let delay = delays.next().unwrap_or(constraint.max_poll_period());
        let elapsed = started.elapsed();
        if elapsed.saturating_add(delay) > constraint.max_duration() {
            return Err(exhausted(
                deferred.to_string(),
                predicate.to_string(),
                last_value,
                attempts,
                elapsed,
                last_failure,
            ));
        }

        if !pause(delay, interrupt).await {
            return Err(EnsureError::Interrupted {
                deferred: deferred.to_string(),
                last_value,
            });
        }
    }
}

fn exhausted(
    deferred: String,
    predicate: String,
    last_value: Option<String>,
    attempts: u32,
    elapsed: Duration,
    source: Option<Unavailable>,
) -> EnsureError {
    match last_value {
        Some(last_value) => EnsureError::Mismatch {
            deferred,
            predicate,
            last_value,
            attempts,
            elapsed,
            source,
        },
        None => EnsureError::Unresolved {
            deferred,
            predicate,
            attempts,
            elapsed,
            source,
        },
    }
}

/// Sleep for `delay`; false when interrupted first.
async fn pause(delay: Duration, interrupt: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = interrupt.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// A failed eventual assertion.
#[derive(Debug, Error)]
#[error("{}{source}", prefix(.message))]
pub struct AssertionError {
    message: Option<String>,
    source: EnsureError,
}

fn prefix(message: &Option<String>) -> String {
    match message {
        Some(m) => format!("{m}: "),
        None => String::new(),
    }
}

impl AssertionError {
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn cause(&self) -> &EnsureError {
        &self.source
    }
}

/// Assertions that must hold within a [`TimeoutConstraint`].
///
/// ```no_run
/// use foreman::deferred::{Eventually, TimeoutConstraint};
/// use predicates::prelude::*;
/// use std::time::Duration;
///
/// # async fn demo() -> Result<(), foreman::deferred::AssertionError> {
/// Eventually::within(TimeoutConstraint::default().within(Duration::from_secs(1)))
///     .with_message("cluster never formed")
///     .assert_that(3, predicate::eq(3))
///     .await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Eventually {
    constraint: TimeoutConstraint,
    message: Option<String>,
    interrupt: Option<CancellationToken>,
}

impl Eventually {
    pub fn within(constraint: TimeoutConstraint) -> Self {
        Self {
            constraint,
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn interruptible(mut self, interrupt: CancellationToken) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Assert that an already-known value satisfies `predicate`.
    pub async fn assert_that<T, P>(&self, value: T, predicate: P) -> Result<(), AssertionError>
    where
        T: Clone + fmt::Debug + Send + Sync,
        P: Predicate<T>,
    {
        self.assert_deferred(&Value(value), &predicate).await.map(|_| ())
    }

    /// Assert that `deferred` eventually resolves to a value satisfying `predicate`.
    pub async fn assert_deferred<T, D, P>(&self, deferred: &D, predicate: &P) -> Result<T, AssertionError>
    where
        T: fmt::Debug + Send,
        D: Deferred<T> + ?Sized,
        P: Predicate<T> + ?Sized,
    {
        let interrupt = self.interrupt.clone().unwrap_or_default();
        ensure_interruptible(deferred, predicate, &self.constraint, &interrupt)
            .await
            .map_err(|source| AssertionError {
                message: self.message.clone(),
                source,
            })
    }
}
