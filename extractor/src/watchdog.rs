//! Per-taxpayer wall-clock budget.
//!
//! A background timer cancels a token and force-closes the browser when the
//! budget runs out. Foreground code never gets interrupted mid-call; it calls
//! [`Checkpoint::check`] between steps and stops there.

use crate::driver::BrowserDriver;
use crate::errors::ExtractorError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cheap, cloneable view of the cancellation state, handed to every component.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    token: CancellationToken,
    expired: Arc<AtomicBool>,
    budget: Duration,
}

impl Checkpoint {
    /// A checkpoint that only trips when `token` is cancelled from outside.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            expired: Arc::new(AtomicBool::new(false)),
            budget: Duration::MAX,
        }
    }

    /// Fails once the budget has expired or the run was cancelled.
    pub fn check(&self, step: &str) -> Result<(), ExtractorError> {
        if !self.token.is_cancelled() {
            return Ok(());
        }
        if self.expired.load(Ordering::SeqCst) {
            debug!("Checkpoint '{}' hit after budget expiry", step);
            Err(ExtractorError::ProcessingTimeout(self.budget))
        } else {
            debug!("Checkpoint '{}' hit after cancellation", step);
            Err(ExtractorError::Cancelled)
        }
    }

    pub fn expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }
}

pub struct Watchdog {
    checkpoint: Checkpoint,
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Start the timer for one taxpayer. `parent` is the process-wide token, so
    /// cancelling the whole run also trips this taxpayer's checkpoints.
    pub fn arm(
        driver: Arc<dyn BrowserDriver>,
        budget: Duration,
        parent: &CancellationToken,
        label: impl Into<String>,
    ) -> Self {
        let label = label.into();
        let checkpoint = Checkpoint {
            token: parent.child_token(),
            expired: Arc::new(AtomicBool::new(false)),
            budget,
        };
        let stop = CancellationToken::new();

        let task_checkpoint = checkpoint.clone();
        let task_stop = stop.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_stop.cancelled() => {
                    debug!("Watchdog for {} disarmed", label);
                }
                _ = tokio::time::sleep(budget) => {
                    warn!("{} exceeded its {:?} budget, closing the browser", label, budget);
                    task_checkpoint.expired.store(true, Ordering::SeqCst);
                    task_checkpoint.token.cancel();
                    if let Err(e) = driver.quit().await {
                        warn!("Forced browser close for {} failed: {}", label, e);
                    }
                }
            }
        });

        Self {
            checkpoint,
            stop,
            handle: Some(handle),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint.clone()
    }

    /// Stop the timer and wait for it; a forced close already in progress is
    /// allowed to finish. Returns whether the budget expired.
    pub async fn disarm(mut self) -> bool {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Watchdog task ended abnormally: {}", e);
            }
        }
        self.checkpoint.expired()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fake_driver::FakeDriver;

    #[tokio::test(start_paused = true)]
    async fn expiry_trips_checkpoint_and_closes_browser() {
        let driver = Arc::new(FakeDriver::new());
        let root = CancellationToken::new();
        let watchdog = Watchdog::arm(driver.clone(), Duration::from_secs(60), &root, "ACME");
        let checkpoint = watchdog.checkpoint();

        assert!(checkpoint.check("start").is_ok());
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(matches!(
            checkpoint.check("traversal"),
            Err(ExtractorError::ProcessingTimeout(d)) if d == Duration::from_secs(60)
        ));
        assert!(watchdog.disarm().await);
        assert!(driver.is_closed());
        assert!(!root.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_before_expiry_leaves_browser_open() {
        let driver = Arc::new(FakeDriver::new());
        let root = CancellationToken::new();
        let watchdog = Watchdog::arm(driver.clone(), Duration::from_secs(60), &root, "ACME");
        let checkpoint = watchdog.checkpoint();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!watchdog.disarm().await);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(checkpoint.check("after").is_ok());
        assert!(!driver.is_closed());
    }

    #[tokio::test]
    async fn parent_cancellation_is_not_a_timeout() {
        let driver = Arc::new(FakeDriver::new());
        let root = CancellationToken::new();
        let watchdog = Watchdog::arm(driver, Duration::from_secs(600), &root, "ACME");
        root.cancel();
        assert!(matches!(
            watchdog.checkpoint().check("step"),
            Err(ExtractorError::Cancelled)
        ));
    }
}
