//! Predicate-based polling that every UI interaction goes through.
//!
//! A probe is evaluated at most `max_attempts` times with `interval` between
//! evaluations (never after the last one). A probe that errors counts as
//! "not yet satisfied"; the error is logged and the next attempt proceeds.

use crate::driver::BrowserDriver;
use crate::errors::ExtractorError;
use crate::{Element, Selector};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to probe and how long to sleep between probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// A single probe with no sleeping.
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            interval_ms: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Upper bound on the time spent sleeping between probes.
    pub fn budget(&self) -> Duration {
        self.interval() * self.max_attempts.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(15, Duration::from_secs(1))
    }
}

/// Probe until it yields a value or the policy is exhausted.
pub async fn poll_until<T, F, Fut>(label: &str, policy: RetryPolicy, mut probe: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, ExtractorError>>,
{
    for attempt in 1..=policy.max_attempts {
        match probe(attempt).await {
            Ok(Some(value)) => {
                debug!(attempt, "{label}: satisfied");
                return Some(value);
            }
            Ok(None) => debug!(attempt, "{label}: not yet"),
            Err(e) => debug!(attempt, "{label}: probe failed, retrying: {e}"),
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval()).await;
        }
    }
    warn!(
        "{label}: gave up after {} attempts ({:?} between attempts)",
        policy.max_attempts,
        policy.interval()
    );
    None
}

/// Like [`poll_until`], but exhaustion becomes an [`ExtractorError::Timeout`].
pub async fn require<T, F, Fut>(label: &str, policy: RetryPolicy, probe: F) -> Result<T, ExtractorError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, ExtractorError>>,
{
    poll_until(label, policy, probe).await.ok_or_else(|| {
        ExtractorError::Timeout(format!(
            "{label} not satisfied after {} attempts",
            policy.max_attempts
        ))
    })
}

/// Returns true on the first probe that holds, false once the policy is exhausted.
pub async fn wait_for<F, Fut>(label: &str, policy: RetryPolicy, mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ExtractorError>>,
{
    poll_until(label, policy, |_| {
        let fut = predicate();
        async move { fut.await.map(|ok| ok.then_some(())) }
    })
    .await
    .is_some()
}

/// First element matching `selector` (optionally: first one that is displayed and enabled).
pub async fn locate(
    driver: &dyn BrowserDriver,
    selector: &Selector,
    policy: RetryPolicy,
    require_interactable: bool,
) -> Option<Element> {
    let label = format!("locate {selector}");
    poll_until(&label, policy, |_| async move {
        let candidates = driver.find_all(selector).await?;
        pick(candidates, require_interactable).await
    })
    .await
}

/// [`locate`] relative to an element instead of the whole page.
pub async fn locate_within(
    root: &Element,
    selector: &Selector,
    policy: RetryPolicy,
    require_interactable: bool,
) -> Option<Element> {
    let label = format!("locate {selector} within element");
    poll_until(&label, policy, |_| async move {
        let candidates = root.find_all(selector).await?;
        pick(candidates, require_interactable).await
    })
    .await
}

pub(crate) async fn pick(
    candidates: Vec<Element>,
    require_interactable: bool,
) -> Result<Option<Element>, ExtractorError> {
    if !require_interactable {
        return Ok(candidates.into_iter().next());
    }
    for candidate in candidates {
        // stale candidates are skipped rather than failing the probe
        if candidate.is_interactable().await.unwrap_or(false) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn exhaustion_evaluates_exactly_n_times_and_skips_final_sleep() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(4, Duration::from_millis(500));
        let started = Instant::now();

        let ok = wait_for("never", policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(false) }
        })
        .await;

        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_on_first_success_without_further_sleeping() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let ok = wait_for("third time", RetryPolicy::new(10, Duration::from_secs(1)), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n == 3) }
        })
        .await;

        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_errors_are_retried_not_fatal() {
        let calls = AtomicU32::new(0);
        let value = poll_until("flaky", RetryPolicy::new(5, Duration::from_millis(10)), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(ExtractorError::Driver("stale element".to_string()))
                } else {
                    Ok(Some(attempt))
                }
            }
        })
        .await;

        assert_eq!(value, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn require_reports_exhaustion_as_timeout() {
        let result: Result<(), _> =
            require("nothing", RetryPolicy::new(2, Duration::from_millis(1)), |_| async {
                Ok(None)
            })
            .await;
        assert!(matches!(result, Err(ExtractorError::Timeout(_))));
    }

    #[tokio::test]
    async fn zero_attempts_never_evaluates() {
        let calls = AtomicU32::new(0);
        let ok = wait_for("disabled", RetryPolicy::new(0, Duration::from_secs(1)), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(true) }
        })
        .await;
        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn budget_excludes_the_final_interval() {
        assert_eq!(
            RetryPolicy::new(5, Duration::from_secs(2)).budget(),
            Duration::from_secs(8)
        );
        assert_eq!(RetryPolicy::once().budget(), Duration::ZERO);
    }
}
