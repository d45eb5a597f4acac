use std::future::Future;
use std::time::{Duration, Instant};

/// Awaits `fut` and emits a warning if it took longer than `max`.
///
/// Nothing is cancelled: a slow call still runs to completion. This only makes
/// stalls visible, since gateway calls carry no timeout of their own.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn passes_through_output_of_fast_future() {
        let out = warn_if_slow("fast", Duration::from_secs(5), async { 7 }).await;

        assert_eq!(out, 7);
        assert!(!logs_contain("slow operation detected"));
    }

    #[tokio::test]
    #[traced_test]
    async fn warns_when_future_exceeds_budget() {
        let out = warn_if_slow("sleepy", Duration::from_millis(1), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            "done"
        })
        .await;

        assert_eq!(out, "done");
        assert!(logs_contain("slow operation detected"));
    }
}
