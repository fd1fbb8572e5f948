//! Login and navigation to the report screen.
//!
//! The controller walks a fixed sequence of states and ends either in
//! [`SessionState::Verified`] with the browser on the report screen, or in
//! [`SessionState::Failed`] with a categorised [`ExtractorError`]. There is no
//! retry of the sequence as a whole; each taxpayer gets one attempt per run.

use crate::classifier::{classify_login_failure, ErrorCategory};
use crate::config::{PortalConfig, TimingConfig};
use crate::driver::BrowserDriver;
use crate::errors::ExtractorError;
use crate::fallback::{activate, FallbackChain};
use crate::roster::TaxpayerRecord;
use crate::wait;
use crate::watchdog::Checkpoint;
use crate::Locator;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Start,
    LoginForm,
    CredentialEntry,
    AwaitRedirect,
    SearchTargetService,
    AwaitNewContext,
    Verified,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Start => "START",
            SessionState::LoginForm => "LOGIN_FORM",
            SessionState::CredentialEntry => "CREDENTIAL_ENTRY",
            SessionState::AwaitRedirect => "AWAIT_REDIRECT",
            SessionState::SearchTargetService => "SEARCH_TARGET_SERVICE",
            SessionState::AwaitNewContext => "AWAIT_NEW_CONTEXT",
            SessionState::Verified => "VERIFIED",
            SessionState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

pub struct SessionController<'a> {
    driver: Arc<dyn BrowserDriver>,
    portal: &'a PortalConfig,
    timing: &'a TimingConfig,
    checkpoint: Checkpoint,
    state: SessionState,
    history: Vec<SessionState>,
}

impl<'a> SessionController<'a> {
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
            state: SessionState::Start,
            history: vec![SessionState::Start],
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, in order
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Log in as `record` and land on the report screen.
    #[instrument(skip_all, fields(tax_id = %record.tax_id))]
    pub async fn establish(&mut self, record: &TaxpayerRecord) -> Result<(), ExtractorError> {
        match self.run(record).await {
            Ok(()) => {
                self.enter(SessionState::Verified);
                Ok(())
            }
            Err(e) => {
                warn!("Session for {} failed in {}: {}", record.name, self.state, e);
                self.enter(SessionState::Failed);
                Err(e)
            }
        }
    }

    async fn run(&mut self, record: &TaxpayerRecord) -> Result<(), ExtractorError> {
        self.checkpoint.check("login form")?;
        self.enter(SessionState::LoginForm);
        self.open_login_form().await?;

        self.checkpoint.check("credentials")?;
        self.enter(SessionState::CredentialEntry);
        self.enter_credentials(record).await?;

        self.checkpoint.check("redirect")?;
        self.enter(SessionState::AwaitRedirect);
        self.await_redirect().await?;

        self.checkpoint.check("service search")?;
        self.enter(SessionState::SearchTargetService);
        let handles_before = self.search_target_service().await?;

        self.checkpoint.check("report context")?;
        self.enter(SessionState::AwaitNewContext);
        self.await_report_context(&handles_before).await
    }

    fn enter(&mut self, next: SessionState) {
        debug!("Session {} -> {}", self.state, next);
        if next == SessionState::Verified {
            info!("Report screen verified");
        }
        self.state = next;
        self.history.push(next);
    }

    fn locator(&self, selector: &str) -> Locator {
        Locator::new(self.driver.clone(), selector).with_policy(self.timing.element)
    }

    /// A login failure refined by whatever the page currently shows.
    async fn login_failure(&self, fallback: ErrorCategory, what: &str) -> ExtractorError {
        let classification =
            classify_login_failure(self.driver.as_ref(), &self.portal.error_banners, fallback).await;
        let message = match classification.evidence {
            Some(evidence) => format!("{what}: {evidence}"),
            None => what.to_string(),
        };
        ExtractorError::login(classification.category, message)
    }

    async fn open_login_form(&self) -> Result<(), ExtractorError> {
        info!("Opening login page");
        if let Err(e) = self.driver.goto(&self.portal.login_url).await {
            return Err(ExtractorError::login(
                ErrorCategory::ServiceUnavailable,
                format!("login page unreachable: {e}"),
            ));
        }
        if self.locator(&self.portal.username_field).first().await.is_err() {
            return Err(self
                .login_failure(ErrorCategory::ServiceUnavailable, "login form did not appear")
                .await);
        }
        Ok(())
    }

    async fn enter_credentials(&self, record: &TaxpayerRecord) -> Result<(), ExtractorError> {
        let username = self.locator(&self.portal.username_field).first_interactable().await?;
        username.fill(&record.tax_id).await?;
        let next = self.locator(&self.portal.username_submit).first_interactable().await?;
        activate(&next).await?;

        // an unknown tax id is rejected before the credential step is shown
        let password = match self
            .locator(&self.portal.password_field)
            .first_interactable()
            .await
        {
            Ok(field) => field,
            Err(_) => {
                return Err(self
                    .login_failure(ErrorCategory::InvalidId, "credential field did not appear")
                    .await)
            }
        };
        password.fill(&record.credential).await?;
        let submit = self.locator(&self.portal.password_submit).first_interactable().await?;
        activate(&submit).await?;
        Ok(())
    }

    async fn await_redirect(&self) -> Result<(), ExtractorError> {
        let driver = self.driver.as_ref();
        let fragments = &self.portal.authenticated_url_fragments;
        let landed = wait::wait_for("authenticated redirect", self.timing.redirect, || async move {
            let url = driver.current_url().await?;
            Ok(fragments.iter().any(|f| url.contains(f.as_str())))
        })
        .await;
        if landed {
            info!("Logged in");
            return Ok(());
        }
        Err(self
            .login_failure(ErrorCategory::LoginTimeout, "no authenticated page after login")
            .await)
    }

    /// Search for the report service and open the first hit. Returns the
    /// window handles that existed before activation.
    async fn search_target_service(&self) -> Result<Vec<String>, ExtractorError> {
        let navigation = |what: &str, e: ExtractorError| {
            ExtractorError::Navigation(format!("{what}: {e}"))
        };

        let search = self
            .locator(&self.portal.search_input)
            .first_interactable()
            .await
            .map_err(|e| navigation("search box", e))?;
        activate(&search).await.map_err(|e| navigation("search box", e))?;
        search
            .fill(&self.portal.search_term)
            .await
            .map_err(|e| navigation("search box", e))?;
        debug!("Searching for '{}'", self.portal.search_term);

        self.locator(&self.portal.search_results)
            .visible()
            .first()
            .await
            .map_err(|e| navigation("search results", e))?;
        let first = self
            .locator(&self.portal.first_search_result)
            .first_interactable()
            .await
            .map_err(|e| navigation("first search result", e))?;

        let before = self.driver.window_handles().await.unwrap_or_default();
        activate(&first)
            .await
            .map_err(|e| navigation("first search result", e))?;
        Ok(before)
    }

    async fn await_report_context(&self, before: &[String]) -> Result<(), ExtractorError> {
        let driver = self.driver.as_ref();
        let outcome = FallbackChain::new("open report screen")
            .then("new browser context", || async move {
                let handle = wait::require("new browser context", self.timing.new_context, |_| async move {
                    let now = driver.window_handles().await?;
                    Ok(now.into_iter().find(|h| !before.contains(h)))
                })
                .await?;
                driver.switch_to_window(&handle).await?;
                self.verify_report_screen().await
            })
            .then("current context", || self.verify_report_screen())
            .then("direct deep link", || async move {
                info!("Opening the report screen directly");
                driver.goto(&self.portal.report_deep_link).await?;
                self.verify_report_screen().await
            })
            .run()
            .await
            .map_err(|e| ExtractorError::Navigation(format!("report screen unreachable: {e}")))?;
        debug!("Report screen reached via {}", outcome.strategy);
        Ok(())
    }

    async fn verify_report_screen(&self) -> Result<(), ExtractorError> {
        let driver = self.driver.as_ref();
        let fragment = self.portal.report_url_fragment.as_str();
        wait::require("report screen", self.timing.report_verify, |_| async move {
            let url = driver.current_url().await?;
            Ok(url.contains(fragment).then_some(()))
        })
        .await
    }
}
