//! Fiscal-year selection on the report screen.
//!
//! The screen shows a sliding window of year buttons with arrows on either
//! side. The requested year is searched for in the visible window, sliding
//! towards it when needed. A missing year is substituted by the most recent
//! one seen; a screen without any year buttons is traversed as-is.

use crate::config::{PortalConfig, TimingConfig};
use crate::driver::BrowserDriver;
use crate::element::Element;
use crate::errors::ExtractorError;
use crate::fallback::activate;
use crate::wait;
use crate::watchdog::Checkpoint;
use crate::{Locator, Selector};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of year selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodSelection {
    /// The requested year was selected.
    Requested(String),
    /// The requested year was not offered; `used` was selected instead.
    Substituted { requested: String, used: String },
    /// No year controls were present; nothing was selected.
    Unselected,
}

impl PeriodSelection {
    /// The year the extracted documents belong to, when one was selected
    pub fn effective_year(&self) -> Option<&str> {
        match self {
            PeriodSelection::Requested(year) => Some(year),
            PeriodSelection::Substituted { used, .. } => Some(used),
            PeriodSelection::Unselected => None,
        }
    }

    pub fn is_substitution(&self) -> bool {
        matches!(self, PeriodSelection::Substituted { .. })
    }
}

struct YearButton {
    label: String,
    element: Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Earlier,
    Later,
}

pub struct PeriodSelector<'a> {
    driver: Arc<dyn BrowserDriver>,
    portal: &'a PortalConfig,
    timing: &'a TimingConfig,
    checkpoint: Checkpoint,
    seen: BTreeSet<String>,
}

impl<'a> PeriodSelector<'a> {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        portal: &'a PortalConfig,
        timing: &'a TimingConfig,
        checkpoint: Checkpoint,
    ) -> Self {
        Self {
            driver,
            portal,
            timing,
            checkpoint,
            seen: BTreeSet::new(),
        }
    }

    #[instrument(skip(self))]
    pub async fn select(&mut self, year: &str) -> Result<PeriodSelection, ExtractorError> {
        self.open_year_tab().await;
        self.checkpoint.check("year selection")?;

        let visible = self.visible_years(true).await;
        if visible.is_empty() {
            warn!("No fiscal-year controls on the report screen; continuing without a selection");
            return Ok(PeriodSelection::Unselected);
        }

        if let Some(button) = self.seek(year).await? {
            self.choose(&button).await;
            info!("Selected fiscal year {}", year);
            return Ok(PeriodSelection::Requested(year.to_string()));
        }

        let Some(latest) = most_recent(&self.seen) else {
            return Ok(PeriodSelection::Unselected);
        };
        warn!("Fiscal year {} is not offered; using {} instead", year, latest);
        match self.seek(&latest).await? {
            Some(button) => {
                self.choose(&button).await;
                Ok(PeriodSelection::Substituted {
                    requested: year.to_string(),
                    used: latest,
                })
            }
            None => {
                warn!("Could not bring year {} back into view", latest);
                Ok(PeriodSelection::Unselected)
            }
        }
    }

    async fn open_year_tab(&self) {
        let tab = Locator::new(self.driver.clone(), self.portal.year_tab.as_str())
            .with_policy(self.timing.quick);
        match tab.first().await {
            Ok(tab) => {
                if let Err(e) = activate(&tab).await {
                    debug!("Year tab did not respond: {}", e);
                }
            }
            Err(_) => debug!("No year tab; assuming the year list is already shown"),
        }
    }

    /// Year buttons currently displayed, remembering every label seen.
    async fn visible_years(&mut self, wait: bool) -> Vec<YearButton> {
        let locator = Locator::new(self.driver.clone(), self.portal.year_buttons.as_str())
            .with_policy(self.timing.content_load)
            .visible();
        let found = if wait {
            locator.all().await
        } else {
            locator.all_now().await
        };
        let elements = match found {
            Ok(elements) => elements,
            Err(e) => {
                debug!("Reading year buttons failed: {}", e);
                Vec::new()
            }
        };

        let mut buttons = Vec::with_capacity(elements.len());
        for element in elements {
            let label = year_label(&element, &self.portal.year_attribute).await;
            if label.is_empty() {
                continue;
            }
            self.seen.insert(label.clone());
            buttons.push(YearButton { label, element });
        }
        debug!(
            "Visible years: {:?}",
            buttons.iter().map(|b| b.label.as_str()).collect::<Vec<_>>()
        );
        buttons
    }

    /// Slide the year window towards `year` until its button is visible or
    /// the arrows run out.
    async fn seek(&mut self, year: &str) -> Result<Option<YearButton>, ExtractorError> {
        for click in 0..=self.portal.max_arrow_clicks {
            let visible = self.visible_years(false).await;
            let direction = direction_towards(year, visible.iter().map(|b| b.label.as_str()));
            if let Some(button) = visible.into_iter().find(|b| b.label == year) {
                return Ok(Some(button));
            }
            let Some(direction) = direction else {
                return Ok(None);
            };
            if click == self.portal.max_arrow_clicks {
                debug!("Gave up looking for {} after {} arrow clicks", year, click);
                return Ok(None);
            }
            self.checkpoint.check("year navigation")?;
            if !self.slide(direction).await {
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// Click an arrow once. False when the arrow is missing or disabled.
    async fn slide(&mut self, direction: Direction) -> bool {
        let portal = self.portal;
        let selector = match direction {
            Direction::Earlier => &portal.previous_years_arrow,
            Direction::Later => &portal.next_years_arrow,
        };
        let arrow = match Locator::new(self.driver.clone(), selector.as_str())
            .all_now()
            .await
        {
            Ok(arrows) => arrows.into_iter().next(),
            Err(_) => None,
        };
        let Some(arrow) = arrow else {
            debug!("No {:?} arrow", direction);
            return false;
        };
        if arrow.has_class(&self.portal.disabled_arrow_class).await {
            debug!("{:?} arrow is disabled", direction);
            return false;
        }

        let before: Vec<String> = self
            .visible_years(false)
            .await
            .into_iter()
            .map(|b| b.label)
            .collect();
        if let Err(e) = activate(&arrow).await {
            warn!("Year arrow did not respond: {}", e);
            return false;
        }

        let driver = self.driver.as_ref();
        let buttons = Selector::from(portal.year_buttons.as_str());
        let buttons = &buttons;
        let before = &before;
        let attribute = portal.year_attribute.as_str();
        wait::wait_for("year window to slide", self.timing.year_refresh, || async move {
            let mut labels = Vec::new();
            for element in driver.find_all(buttons).await? {
                if element.is_displayed().await.unwrap_or(false) {
                    let label = year_label(&element, attribute).await;
                    if !label.is_empty() {
                        labels.push(label);
                    }
                }
            }
            Ok(&labels != before)
        })
        .await;
        true
    }

    async fn choose(&self, button: &YearButton) {
        if let Err(e) = activate(&button.element).await {
            warn!("Year button {} did not respond: {}", button.label, e);
            return;
        }
        let driver = self.driver.as_ref();
        let sections = Selector::from(self.portal.sections.as_str());
        let sections = &sections;
        let loaded = wait::wait_for("report content", self.timing.year_refresh, || async move {
            Ok(!driver.find_all(sections).await?.is_empty())
        })
        .await;
        if !loaded {
            warn!("Report content did not refresh after selecting {}", button.label);
        }
    }
}

/// The year a button stands for: its data attribute, else its text.
async fn year_label(element: &Element, attribute: &str) -> String {
    match element.attribute(attribute).await {
        Ok(Some(value)) if !value.trim().is_empty() => value.trim().to_string(),
        _ => element.text_or_empty().await,
    }
}

fn most_recent(years: &BTreeSet<String>) -> Option<String> {
    years
        .iter()
        .max_by(|a, b| match (a.parse::<i32>(), b.parse::<i32>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => a.cmp(b),
        })
        .cloned()
}

/// Which arrow moves the window towards `year`, if it lies outside the window.
fn direction_towards<'a>(year: &str, visible: impl Iterator<Item = &'a str>) -> Option<Direction> {
    let target = year.parse::<i32>().ok()?;
    let numbers: Vec<i32> = visible.filter_map(|y| y.parse().ok()).collect();
    let min = numbers.iter().min()?;
    let max = numbers.iter().max()?;
    if target < *min {
        Some(Direction::Earlier)
    } else if target > *max {
        Some(Direction::Later)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_points_outside_the_window() {
        let window = ["2021", "2022", "2023"];
        assert_eq!(
            direction_towards("2019", window.iter().copied()),
            Some(Direction::Earlier)
        );
        assert_eq!(
            direction_towards("2025", window.iter().copied()),
            Some(Direction::Later)
        );
        assert_eq!(direction_towards("2022", window.iter().copied()), None);
        assert_eq!(direction_towards("x", window.iter().copied()), None);
        assert_eq!(direction_towards("2022", std::iter::empty()), None);
    }

    #[test]
    fn most_recent_is_numeric() {
        let years: BTreeSet<String> = ["2019", "2023", "2022"].iter().map(|s| s.to_string()).collect();
        assert_eq!(most_recent(&years).as_deref(), Some("2023"));
        assert_eq!(most_recent(&BTreeSet::new()), None);
    }

    #[test]
    fn effective_year_prefers_substitute() {
        let substituted = PeriodSelection::Substituted {
            requested: "2021".to_string(),
            used: "2023".to_string(),
        };
        assert_eq!(substituted.effective_year(), Some("2023"));
        assert!(substituted.is_substitution());
        assert_eq!(PeriodSelection::Unselected.effective_year(), None);
        assert_eq!(
            PeriodSelection::Requested("2022".to_string()).effective_year(),
            Some("2022")
        );
    }
}
