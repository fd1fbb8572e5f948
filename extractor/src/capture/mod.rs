//! Turning an on-screen table into a saved document.
//!
//! The portal's print affordance opens the browser's print flow; the browser
//! is preconfigured to print to PDF, so confirming it raises the native save
//! dialog. A [`DialogAutomationStrategy`] drives that dialog. Strategies never
//! fail upward: the outcome is inferred afterwards from the file system and
//! reported as verified or not.

mod constrained;
mod probe;
mod standard;

pub use constrained::{ConstrainedHostStrategy, HostKeyboard, XdotoolKeyboard};
pub use probe::{detect_wsl, HostCapabilities};
pub use standard::StandardStrategy;

use crate::driver::BrowserDriver;
use crate::element::Element;
use crate::fallback::activate;
use crate::naming::ARTIFACT_EXTENSION;
use crate::wait::{self, RetryPolicy};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What happened to one save attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub target: PathBuf,
    /// Where the file was actually found, when it was found
    pub saved_as: Option<PathBuf>,
}

impl CaptureReport {
    pub fn verified(&self) -> bool {
        self.saved_as.is_some()
    }
}

#[async_trait]
pub trait DialogAutomationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Drive the save dialog to write `target`. Always returns; failures show
    /// up as an unverified report.
    async fn save(&self, driver: &dyn BrowserDriver, target: &Path) -> CaptureReport;
}

/// `target` made absolute with the artifact extension, its parent directory
/// created. The save dialog resolves relative names against its own folder.
pub(crate) fn prepare_target(target: &Path) -> PathBuf {
    let target = match std::path::absolute(target) {
        Ok(absolute) => absolute,
        Err(e) => {
            warn!("Could not resolve {} to an absolute path: {}", target.display(), e);
            target.to_path_buf()
        }
    };
    let target = target.as_path();
    let has_extension = target
        .extension()
        .map(|e| e.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
        .unwrap_or(false);
    let target = if has_extension {
        target.to_path_buf()
    } else {
        let mut name = target.as_os_str().to_os_string();
        name.push(".");
        name.push(ARTIFACT_EXTENSION);
        PathBuf::from(name)
    };
    if let Some(dir) = target.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Could not create {}: {}", dir.display(), e);
        }
    }
    target
}

/// The file at `target`, or a sibling whose name starts with the target's
/// stem (the dialog may append a counter or change the case).
pub fn find_saved(target: &Path) -> Option<PathBuf> {
    if target.is_file() {
        return Some(target.to_path_buf());
    }
    let dir = target.parent()?;
    let stem = target.file_stem()?.to_string_lossy().to_lowercase();
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .find(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_lowercase().starts_with(&stem))
                .unwrap_or(false)
        })
}

/// Poll the file system until the saved file shows up or `settle` runs out.
pub(crate) async fn verify_saved(target: &Path, settle: RetryPolicy) -> CaptureReport {
    let label = format!("saved file {}", target.display());
    let saved_as =
        wait::poll_until(&label, settle, |_| async move { Ok(find_saved(target)) }).await;
    match &saved_as {
        Some(path) if path == target => info!("Saved {}", path.display()),
        Some(path) => info!("Saved {} (as {})", target.display(), path.display()),
        None => warn!(
            "Could not confirm that {} was saved; continuing",
            target.display()
        ),
    }
    CaptureReport {
        target: target.to_path_buf(),
        saved_as,
    }
}

/// Click a print affordance and save the resulting document to `target`.
///
/// A print window that opens as a separate browsing context is switched into
/// for the dialog and left afterwards; the original context is restored when
/// it still exists.
pub async fn capture_table(
    driver: &dyn BrowserDriver,
    print_button: &Element,
    target: &Path,
    strategy: &dyn DialogAutomationStrategy,
    new_window: RetryPolicy,
) -> CaptureReport {
    let original = driver.current_window().await.ok();
    let before = driver.window_handles().await.unwrap_or_default();

    if let Err(e) = activate(print_button).await {
        warn!("Print affordance for {} did not respond: {}", target.display(), e);
        return CaptureReport {
            target: target.to_path_buf(),
            saved_as: None,
        };
    }

    let known = &before;
    let print_window = wait::poll_until("print window", new_window, |_| async move {
        let now = driver.window_handles().await?;
        Ok(now.into_iter().find(|h| !known.contains(h)))
    })
    .await;
    if let Some(handle) = &print_window {
        debug!("Print window opened as {}", handle);
        if let Err(e) = driver.switch_to_window(handle).await {
            warn!("Could not switch to the print window: {}", e);
        }
    }

    debug!("Saving through the {} strategy", strategy.name());
    let report = strategy.save(driver, target).await;

    if print_window.is_some() {
        if let Some(original) = original {
            let still_open = driver
                .window_handles()
                .await
                .map(|handles| handles.contains(&original))
                .unwrap_or(false);
            if still_open {
                if let Err(e) = driver.switch_to_window(&original).await {
                    warn!("Could not return to the report window: {}", e);
                }
            }
        }
    }
    report
}
