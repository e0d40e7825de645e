// ABOUTME: Quantum-based polling for a process exit status.
// ABOUTME: Shared by local and remote processes so both round and interrupt identically.

use super::{ProcessError, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Poll `probe` every `quantum` until it yields a status or `timeout` runs out.
///
/// A non-zero remainder smaller than one quantum is rounded up to a full
/// quantum, so the wait may overrun `timeout` by less than one quantum.
pub(crate) async fn poll_exit_status<F>(
    process_id: u64,
    quantum: Duration,
    timeout: Duration,
    interrupt: &CancellationToken,
    mut probe: F,
) -> Result<Option<i32>>
where
    F: FnMut() -> Option<i32>,
{
    if let Some(status) = probe() {
        return Ok(Some(status));
    }

    let mut remaining = timeout;
    while !remaining.is_zero() {
        tokio::select! {
            biased;
            _ = interrupt.cancelled() => return Err(ProcessError::Interrupted(process_id)),
            _ = tokio::time::sleep(quantum) => {}
        }

        if let Some(status) = probe() {
            return Ok(Some(status));
        }

        remaining = remaining.saturating_sub(quantum);
        if !remaining.is_zero() && remaining < quantum {
            remaining = quantum;
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::Instant;

    const QUANTUM: Duration = Duration::from_millis(500);

    fn status_after(delay: Duration, status: i32) -> Arc<Mutex<Option<i32>>> {
        let slot = Arc::new(Mutex::new(None));
        let writer = Arc::clone(&slot);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            *writer.lock() = Some(status);
        });
        slot
    }

    #[tokio::test(start_paused = true)]
    async fn status_arriving_mid_wait_is_returned() {
        let slot = status_after(Duration::from_millis(700), 3);
        let started = Instant::now();

        let status = poll_exit_status(1, QUANTUM, Duration::from_millis(1000), &CancellationToken::new(), || {
            *slot.lock()
        })
        .await
        .unwrap();

        let elapsed = started.elapsed();
        assert_eq!(status, Some(3));
        assert!(elapsed >= Duration::from_millis(700) && elapsed <= Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn known_status_returns_without_sleeping() {
        let started = Instant::now();
        let status = poll_exit_status(1, QUANTUM, Duration::from_secs(10), &CancellationToken::new(), || Some(0))
            .await
            .unwrap();
        assert_eq!(status, Some(0));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_unknown_status() {
        let started = Instant::now();
        let status = poll_exit_status(1, QUANTUM, Duration::from_millis(1200), &CancellationToken::new(), || None)
            .await
            .unwrap();
        assert_eq!(status, None);
        // 1200ms is 2 quanta plus a 200ms remainder rounded up to a third
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn interruption_is_reported() {
        let interrupt = CancellationToken::new();
        let canceller = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            canceller.cancel();
        });

        let err = poll_exit_status(7, QUANTUM, Duration::from_secs(5), &interrupt, || None)
            .await
            .unwrap_err();
        assert!(err.is_interrupted());
    }
}
