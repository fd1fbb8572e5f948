use super::{prepare_target, verify_saved, CaptureReport, DialogAutomationStrategy};
use crate::config::TimingConfig;
use crate::driver::BrowserDriver;
use crate::errors::ExtractorError;
use crate::wait::RetryPolicy;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// OS-level keyboard injection, for dialogs the browser driver cannot reach.
#[async_trait]
pub trait HostKeyboard: Send + Sync {
    /// Press a key or chord in xdotool notation (`Return`, `ctrl+a`, `Escape`).
    async fn key(&self, chord: &str) -> Result<(), ExtractorError>;
    async fn type_text(&self, text: &str) -> Result<(), ExtractorError>;
}

/// [`HostKeyboard`] backed by the `xdotool` binary
pub struct XdotoolKeyboard {
    program: PathBuf,
}

impl XdotoolKeyboard {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<(), ExtractorError> {
        debug!("{} {:?}", self.program.display(), args);
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                ExtractorError::HostCommand(format!("{}: {}", self.program.display(), e))
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ExtractorError::HostCommand(format!(
                "{} {:?} exited with {}: {}",
                self.program.display(),
                args,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[async_trait]
impl HostKeyboard for XdotoolKeyboard {
    async fn key(&self, chord: &str) -> Result<(), ExtractorError> {
        self.run(&["key", chord]).await
    }

    async fn type_text(&self, text: &str) -> Result<(), ExtractorError> {
        self.run(&["type", "--", text]).await
    }
}

/// Save-dialog automation for hosts where the browser runs in a different
/// execution context than its native dialogs (WSL with an X server), so the
/// keystrokes have to be injected at the OS level.
pub struct ConstrainedHostStrategy {
    keyboard: Arc<dyn HostKeyboard>,
    step: Duration,
    settle: RetryPolicy,
}

impl ConstrainedHostStrategy {
    pub fn new(keyboard: Arc<dyn HostKeyboard>, timing: &TimingConfig) -> Self {
        Self {
            keyboard,
            step: timing.dialog_step(),
            settle: timing.capture_settle,
        }
    }

    async fn drive(&self, target: &Path) -> Result<(), ExtractorError> {
        self.keyboard.key("Return").await?;
        tokio::time::sleep(self.step).await;

        self.keyboard.key("ctrl+a").await?;
        tokio::time::sleep(self.step / 3).await;

        self.keyboard.type_text(&target.to_string_lossy()).await?;
        tokio::time::sleep(self.step / 2).await;

        self.keyboard.key("Return").await
    }
}

#[async_trait]
impl DialogAutomationStrategy for ConstrainedHostStrategy {
    fn name(&self) -> &'static str {
        "constrained-host"
    }

    async fn save(&self, _driver: &dyn BrowserDriver, target: &Path) -> CaptureReport {
        let target = prepare_target(target);
        info!("Saving {} through host keyboard injection", target.display());

        if let Err(e) = self.drive(&target).await {
            error!("Host-level save dialog for {} failed: {}", target.display(), e);
            for _ in 0..2 {
                if let Err(e) = self.keyboard.key("Escape").await {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fake_driver::FakeDriver;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingKeyboard {
        log: Mutex<Vec<String>>,
        refuse_typing: bool,
    }

    #[async_trait]
    impl HostKeyboard for RecordingKeyboard {
        async fn key(&self, chord: &str) -> Result<(), ExtractorError> {
            self.log.lock().unwrap().push(format!("key {chord}"));
            Ok(())
        }

        async fn type_text(&self, text: &str) -> Result<(), ExtractorError> {
            if self.refuse_typing {
                return Err(ExtractorError::HostCommand("xdotool: no display".to_string()));
            }
            self.log.lock().unwrap().push(format!("type {text}"));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn keystrokes_go_through_the_host_keyboard() {
        let dir = tempfile::tempdir().unwrap();
        let keyboard = Arc::new(RecordingKeyboard::default());
        let strategy = ConstrainedHostStrategy::new(keyboard.clone(), &TimingConfig::immediate());
        let driver = FakeDriver::new();

        let report = strategy.save(&driver, &dir.path().join("Tabla")).await;

        let target = dir.path().join("Tabla.pdf");
        assert_eq!(report.target, target);
        assert_eq!(
            *keyboard.log.lock().unwrap(),
            vec![
                "key Return".to_string(),
                "key ctrl+a".to_string(),
                format!("type {}", target.display()),
                "key Return".to_string(),
            ]
        );
        assert!(driver.input_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn injection_failure_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let keyboard = Arc::new(RecordingKeyboard {
            refuse_typing: true,
            ..Default::default()
        });
        let strategy = ConstrainedHostStrategy::new(keyboard.clone(), &TimingConfig::immediate());

        let report = strategy.save(&FakeDriver::new(), &dir.path().join("T")).await;
        assert!(!report.verified());
        let log = keyboard.log.lock().unwrap();
        assert_eq!(&log[log.len() - 2..], &["key Escape", "key Escape"]);
    }
}
