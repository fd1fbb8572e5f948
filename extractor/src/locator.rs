use tracing::{debug, instrument};

use crate::driver::BrowserDriver;
use crate::element::Element;
use crate::errors::ExtractorError;
use crate::selector::Selector;
use crate::wait::{self, RetryPolicy};
use std::sync::Arc;

/// A selector bound to a browser session, optionally scoped to a root element.
///
/// Every lookup goes through the wait engine using the locator's policy.
#[derive(Clone)]
pub struct Locator {
    driver: Arc<dyn BrowserDriver>,
    selector: Selector,
    policy: RetryPolicy,
    root: Option<Element>,
    visible_only: bool,
}

impl Locator {
    pub fn new(driver: Arc<dyn BrowserDriver>, selector: impl Into<Selector>) -> Self {
        Self {
            driver,
            selector: selector.into(),
            policy: RetryPolicy::default(),
            root: None,
            visible_only: false,
        }
    }

    /// Set the retry policy used by this locator instance.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the root element for this locator
    pub fn within(mut self, element: Element) -> Self {
        self.root = Some(element);
        self
    }

    /// Only consider elements that are currently displayed.
    pub fn visible(mut self) -> Self {
        self.visible_only = true;
        self
    }

    /// Wait for the first match. Exhaustion is a [`ExtractorError::Timeout`].
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector))]
    pub async fn first(&self) -> Result<Element, ExtractorError> {
        self.wait(self.visible_only).await
    }

    /// Wait for the first match that is displayed and enabled.
    pub async fn first_interactable(&self) -> Result<Element, ExtractorError> {
        self.wait(true).await
    }

    /// Wait until at least one element matches, then return every match.
    /// An exhausted wait yields an empty list rather than an error.
    pub async fn all(&self) -> Result<Vec<Element>, ExtractorError> {
        self.reject_invalid()?;
        let label = format!("all {}", self.selector);
        let found = wait::poll_until(&label, self.policy, |_| async move {
            let matches = self.all_now().await?;
            Ok((!matches.is_empty()).then_some(matches))
        })
        .await;
        Ok(found.unwrap_or_default())
    }

    /// Current matches without waiting.
    pub async fn all_now(&self) -> Result<Vec<Element>, ExtractorError> {
        self.reject_invalid()?;
        let matches = match &self.root {
            Some(root) => root.find_all(&self.selector).await?,
            None => self.driver.find_all(&self.selector).await?,
        };
        if !self.visible_only {
            return Ok(matches);
        }
        let mut visible = Vec::with_capacity(matches.len());
        for element in matches {
            if element.is_displayed().await.unwrap_or(false) {
                visible.push(element);
            }
        }
        Ok(visible)
    }

    async fn wait(&self, require_interactable: bool) -> Result<Element, ExtractorError> {
        self.reject_invalid()?;
        debug!("Waiting for element matching selector: {}", self.selector);
        let found = match &self.root {
            Some(root) => {
                wait::locate_within(root, &self.selector, self.policy, require_interactable).await
            }
            None => {
                wait::locate(
                    self.driver.as_ref(),
                    &self.selector,
                    self.policy,
                    require_interactable,
                )
                .await
            }
        };
        found.ok_or_else(|| {
            ExtractorError::Timeout(format!(
                "Timed out after {} attempts waiting for element {}",
                self.policy.max_attempts, self.selector
            ))
        })
    }

    fn reject_invalid(&self) -> Result<(), ExtractorError> {
        if let Selector::Invalid(reason) = &self.selector {
            return Err(ExtractorError::InvalidSelector(reason.clone()));
        }
        Ok(())
    }
}
