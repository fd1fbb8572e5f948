//! Section, icon and table traversal.
//!
//! Walks `sections -> icons -> detail panels -> print affordances` in
//! document order and captures each table once. Every level absorbs and logs
//! its own failures so one broken table never costs the rest; only budget
//! expiry or cancellation ends the walk early.

use crate::capture::{capture_table, DialogAutomationStrategy};
use crate::config::{PortalConfig, TimingConfig};
use crate::driver::{BrowserDriver, KeyStroke};
use crate::element::Element;
use crate::errors::ExtractorError;
use crate::fallback::{activate, FallbackChain};
use crate::naming::{artifact_path, fold_text, positional_title};
use crate::wait;
use crate::watchdog::Checkpoint;
use crate::{Locator, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Target paths already captured for the current taxpayer.
///
/// A path is also treated as captured when the file already exists on disk,
/// so a re-run only fetches what is missing.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<PathBuf>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path` and returns true when it has to be captured now.
    pub fn should_capture(&mut self, path: &Path) -> bool {
        if self.seen.contains(path) {
            debug!("Already captured in this session: {}", path.display());
            return false;
        }
        self.seen.insert(path.to_path_buf());
        if path.exists() {
            debug!("Already on disk: {}", path.display());
            return false;
        }
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Whether a section title matches the ignore-list (accent and case
/// insensitive substring match).
pub fn is_ignored(title: &str, ignore_list: &[String]) -> bool {
    let title = fold_text(title);
    ignore_list
        .iter()
        .map(|entry| fold_text(entry))
        .any(|entry| !entry.is_empty() && title.contains(&entry))
}

/// Counters for one taxpayer's traversal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalSummary {
    pub sections_visited: usize,
    pub sections_skipped: Vec<String>,
    /// Saves confirmed on disk
    pub artifacts_captured: usize,
    /// Saves attempted but not found on disk afterwards
    pub artifacts_unverified: usize,
    /// Tables skipped because their file was already captured or present
    pub artifacts_deduplicated: usize,
    /// Failures absorbed at section, icon or table level
    pub absorbed_failures: usize,
}

pub struct Traversal<'a> {
    driver: Arc<dyn BrowserDriver>,
    portal: &'a PortalConfig,
    timing: &'a TimingConfig,
    strategy: &'a dyn DialogAutomationStrategy,
    checkpoint: Checkpoint,
    output_dir: PathBuf,
    dedup: DedupSet,
    summary: TraversalSummary,
}

impl<'a> Traversal<'a> {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        portal: &'a PortalConfig,
        timing: &'a TimingConfig,
        strategy: &'a dyn DialogAutomationStrategy,
        checkpoint: Checkpoint,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            driver,
            portal,
            timing,
            strategy,
            checkpoint,
            output_dir: output_dir.into(),
            dedup: DedupSet::new(),
            summary: TraversalSummary::default(),
        }
    }

    /// Walk every section. Only budget expiry or cancellation is returned as
    /// an error; the counters from [`Traversal::into_summary`] cover
    /// everything done up to that point either way.
    #[instrument(skip(self), fields(output = %self.output_dir.display()))]
    pub async fn run(&mut self) -> Result<(), ExtractorError> {
        let sections = Locator::new(self.driver.clone(), self.portal.sections.as_str())
            .with_policy(self.timing.content_load)
            .all()
            .await
            .unwrap_or_default();
        if sections.is_empty() {
            warn!("The report screen shows no sections");
        }
        info!("Found {} sections", sections.len());

        for (index, section) in sections.iter().enumerate() {
            self.checkpoint.check("section")?;
            if let Err(e) = self.section(index, section).await {
                if e.is_cancellation() {
                    return Err(e);
                }
                warn!("Section {} failed, moving on: {}", index + 1, e);
                self.summary.absorbed_failures += 1;
            }
        }
        Ok(())
    }

    pub fn into_summary(self) -> TraversalSummary {
        self.summary
    }

    async fn section(&mut self, index: usize, section: &Element) -> Result<(), ExtractorError> {
        let title = first_text_within(section, &self.portal.section_title).await;
        let title = if title.is_empty() {
            format!("seccion_{}", index + 1)
        } else {
            title
        };

        if is_ignored(&title, &self.portal.ignored_sections) {
            info!("Skipping section '{}'", title);
            self.summary.sections_skipped.push(title);
            return Ok(());
        }
        info!(target: "progress", "  Section: {}", title);
        self.summary.sections_visited += 1;

        let icons = section
            .find_all(&Selector::from(self.portal.section_icons.as_str()))
            .await?;
        debug!("Section '{}' has {} icons", title, icons.len());

        for (index, icon) in icons.iter().enumerate() {
            self.checkpoint.check("icon")?;
            if let Err(e) = self.icon(&title, icon).await {
                if e.is_cancellation() {
                    return Err(e);
                }
                warn!("Icon {} of '{}' failed, moving on: {}", index + 1, title, e);
                self.summary.absorbed_failures += 1;
            }
            self.dismiss_panel().await;
        }
        Ok(())
    }

    async fn icon(&mut self, section_title: &str, icon: &Element) -> Result<(), ExtractorError> {
        activate(icon).await?;

        let driver = self.driver.as_ref();
        let markers = [
            Selector::from(self.portal.print_marker.as_str()),
            Selector::from(self.portal.data_table.as_str()),
        ];
        let markers = &markers;
        let loaded = wait::wait_for("icon content", self.timing.content_load, || async move {
            for marker in markers {
                if !driver.find_all(marker).await?.is_empty() {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await;
        if !loaded {
            warn!("No content appeared for an icon in '{}'", section_title);
            return Ok(());
        }

        let panels = Locator::new(self.driver.clone(), self.portal.detail_panels.as_str())
            .visible()
            .all_now()
            .await?;
        debug!("{} visible panels", panels.len());

        for (index, panel) in panels.iter().enumerate() {
            self.checkpoint.check("table")?;
            if let Err(e) = self.panel(section_title, index, panel).await {
                if e.is_cancellation() {
                    return Err(e);
                }
                warn!("Table {} in '{}' failed, moving on: {}", index + 1, section_title, e);
                self.summary.absorbed_failures += 1;
            }
        }
        Ok(())
    }

    async fn panel(
        &mut self,
        section_title: &str,
        index: usize,
        panel: &Element,
    ) -> Result<(), ExtractorError> {
        let heading = first_text_within(panel, &self.portal.panel_heading).await;
        let table_title = if heading.is_empty() {
            positional_title(index)
        } else {
            heading
        };

        let prints = Locator::new(self.driver.clone(), self.portal.print_buttons.as_str())
            .within(panel.clone())
            .visible()
            .all_now()
            .await?;
        if prints.is_empty() {
            debug!("Table '{}' has no print affordance", table_title);
            return Ok(());
        }

        for print in prints {
            self.checkpoint.check("capture")?;
            let target = artifact_path(&self.output_dir, section_title, &table_title);
            if !self.dedup.should_capture(&target) {
                self.summary.artifacts_deduplicated += 1;
                continue;
            }
            let report = capture_table(
                self.driver.as_ref(),
                &print,
                &target,
                self.strategy,
                self.timing.new_context,
            )
            .await;
            if report.verified() {
                self.summary.artifacts_captured += 1;
                info!(target: "progress", "    Saved: {}", table_title);
            } else {
                self.summary.artifacts_unverified += 1;
                info!(target: "progress", "    Not confirmed: {}", table_title);
            }
        }
        Ok(())
    }

    /// Close whatever panel the last icon opened. Best effort.
    async fn dismiss_panel(&self) {
        let driver = self.driver.clone();
        let close = Locator::new(driver.clone(), self.portal.panel_close.as_str()).visible();
        let result = FallbackChain::new("dismiss panel")
            .then("close affordance", || async move {
                let button = close.all_now().await?.into_iter().next().ok_or_else(|| {
                    ExtractorError::ElementNotFound("no visible close affordance".to_string())
                })?;
                activate(&button).await.map(|_| ())
            })
            .then("cancel keystroke", || async move {
                driver.press_key(KeyStroke::Escape).await
            })
            .run()
            .await;
        if let Err(e) = result {
            warn!("Could not dismiss the panel: {}", e);
        }
    }
}

/// Trimmed text of the first match of `selector` under `root`, or empty.
async fn first_text_within(root: &Element, selector: &str) -> String {
    match root.find_all(&Selector::from(selector)).await {
        Ok(found) => match found.first() {
            Some(element) => element.text_or_empty().await,
            None => String::new(),
        },
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_list_matches_without_accents_or_case() {
        let list = vec!["Períodos anteriores".to_string(), "Prior-period".to_string()];
        assert!(is_ignored("PERIODOS ANTERIORES - 2019", &list));
        assert!(is_ignored("Prior-period disclosures", &list));
        assert!(!is_ignored("Bienes Personales", &list));
        assert!(!is_ignored("anything", &[String::new()]));
    }

    #[test]
    fn dedup_skips_repeats_and_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("a.pdf");
        let existing = dir.path().join("b.pdf");
        std::fs::write(&existing, b"%PDF").unwrap();

        let mut dedup = DedupSet::new();
        assert!(dedup.should_capture(&fresh));
        assert!(!dedup.should_capture(&fresh));
        assert!(!dedup.should_capture(&existing));
        assert!(dedup.contains(&existing));
        assert_eq!(dedup.len(), 2);
    }
}
