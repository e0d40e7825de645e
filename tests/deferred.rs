// ABOUTME: Integration tests for deferred values and the bounded polling evaluator.
// ABOUTME: Uses paused tokio time so elapsed-time assertions are exact.

use foreman::deferred::{
    AtomicFlag, EnsureError, Eventually, RetryDelays, TimeoutConstraint, Unavailable, Value, ensure,
    ensure_interruptible, from_fn,
};
use nonempty::nonempty;
use predicates::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn every(period: Duration, within: Duration) -> TimeoutConstraint {
    TimeoutConstraint::default().within(within).polling_every(period)
}

#[tokio::test(start_paused = true)]
async fn flag_set_by_another_task_is_observed() {
    let flag = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&flag);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(320)).await;
        setter.store(true, Ordering::SeqCst);
    });

    let started = Instant::now();
    let value = ensure(
        &AtomicFlag::new("ready", flag),
        &predicate::eq(true),
        &every(Duration::from_millis(100), Duration::from_secs(2)),
    )
    .await
    .unwrap();

    assert!(value);
    assert_eq!(started.elapsed(), Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn explicit_sequence_repeats_last_delay() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let deferred = from_fn("counter", move || {
        let counter = Arc::clone(&counter);
        async move { Ok::<_, Unavailable>(counter.fetch_add(1, Ordering::SeqCst) + 1) }
    });
    let constraint = TimeoutConstraint::default()
        .within(Duration::from_secs(10))
        .with_retry_delays(RetryDelays::Sequence(nonempty![
            Duration::from_millis(10),
            Duration::from_millis(100)
        ]));

    let started = Instant::now();
    let value = ensure(&deferred, &predicate::eq(4), &constraint).await.unwrap();

    assert_eq!(value, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(started.elapsed(), Duration::from_millis(210));
}

#[tokio::test(start_paused = true)]
async fn mismatch_reports_last_value_and_attempts() {
    let err = ensure(
        &Value(5),
        &predicate::gt(10),
        &every(Duration::from_millis(50), Duration::from_millis(200)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EnsureError::Mismatch { .. }));
    assert_eq!(err.last_value(), Some("5"));
    assert_eq!(err.attempts(), Some(5));
    assert!(err.to_string().contains("Value{5}"));
}

#[tokio::test(start_paused = true)]
async fn eventually_prefixes_failures_with_message() {
    let deferred = from_fn("never", || async { Err::<u32, _>(Unavailable::temporarily("never")) });

    let err = Eventually::within(every(Duration::from_millis(50), Duration::from_millis(120)))
        .with_message("service never came up")
        .assert_deferred(&deferred, &predicate::always())
        .await
        .unwrap_err();

    assert_eq!(err.message(), Some("service never came up"));
    assert!(err.to_string().starts_with("service never came up: "));
    assert!(matches!(err.cause(), EnsureError::Unresolved { .. }));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_pending_wait() {
    let interrupt = CancellationToken::new();
    let canceller = interrupt.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = ensure_interruptible(
        &Value(1),
        &predicate::eq(2),
        &every(Duration::from_secs(1), Duration::from_secs(30)),
        &interrupt,
    )
    .await
    .unwrap_err();

    assert!(err.is_interrupted());
    assert_eq!(err.last_value(), Some("1"));
    assert_eq!(started.elapsed(), Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_skips_remaining_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let deferred = from_fn("gone", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Err::<u32, _>(Unavailable::permanently("gone")) }
    });

    let err = ensure(&deferred, &predicate::always(), &TimeoutConstraint::default())
        .await
        .unwrap_err();

    assert!(err.is_permanent());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
