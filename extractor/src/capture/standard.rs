use super::{prepare_target, verify_saved, CaptureReport, DialogAutomationStrategy};
use crate::config::TimingConfig;
use crate::driver::{BrowserDriver, KeyStroke};
use crate::errors::ExtractorError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Drives the save dialog with the browser driver's own keyboard input.
///
/// Works wherever the dialog belongs to the same desktop session the driver
/// sends input to.
pub struct StandardStrategy {
    step: Duration,
    settle: crate::wait::RetryPolicy,
}

impl StandardStrategy {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            step: timing.dialog_step(),
            settle: timing.capture_settle,
        }
    }

    async fn drive(&self, driver: &dyn BrowserDriver, target: &Path) -> Result<(), ExtractorError> {
        let path = target.to_string_lossy();

        tokio::time::sleep(self.step).await;
        debug!("Confirming print preview");
        driver.press_key(KeyStroke::Enter).await?;

        tokio::time::sleep(self.step).await;
        driver.press_key(KeyStroke::SelectAll).await?;

        debug!("Typing target path {}", path);
        driver.type_text(&path).await?;
        tokio::time::sleep(self.step).await;

        driver.press_key(KeyStroke::Enter).await?;
        Ok(())
    }
}

#[async_trait]
impl DialogAutomationStrategy for StandardStrategy {
    fn name(&self) -> &'static str {
        "standard"
    }

    async fn save(&self, driver: &dyn BrowserDriver, target: &Path) -> CaptureReport {
        let target = prepare_target(target);
        info!("Saving {}", target.display());

        if let Err(e) = self.drive(driver, &target).await {
            error!("Save dialog for {} failed: {}", target.display(), e);
            for _ in 0..2 {
                if let Err(e) = driver.press_key(KeyStroke::Escape).await {
                    warn!("Could not dismiss the dialog: {}", e);
                    break;
                }
            }
            return CaptureReport {
                target,
                saved_as: None,
            };
        }

        verify_saved(&target, self.settle).await
    }
}
