// Bounded retry with exponential backoff. Replaces the retry-by-recursion
// pattern: the budget is explicit and the backoff schedule is testable.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Run `op` up to `attempts` times, doubling `base_delay` between failures.
/// Returns the first success or the last error. `attempts` of zero is treated
/// as one.
pub async fn retry_with_backoff<T, E, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut delay = base_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(attempt, error = %e, "Retrying after {:?}", delay);
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            retry_with_backoff(3, Duration::from_millis(1), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_within_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            retry_with_backoff(3, Duration::from_millis(1), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            retry_with_backoff(3, Duration::from_millis(1), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            })
            .await;
        assert_eq!(result.unwrap_err(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
