//! Run configuration: portal locations, selectors and wait budgets.
//!
//! Every value has a default matching the live portal; a JSON file may
//! override any subset of them.

use crate::errors::ExtractorError;
use crate::wait::RetryPolicy;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// First fiscal year the report service publishes
pub const FIRST_SUPPORTED_YEAR: i32 = 2018;

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub portal: PortalConfig,
    pub timing: TimingConfig,
    /// Wall-clock budget for one taxpayer, in seconds
    pub taxpayer_timeout_secs: u64,
    pub results_root: PathBuf,
    pub webdriver_url: String,
    pub headless: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            timing: TimingConfig::default(),
            taxpayer_timeout_secs: 20 * 60,
            results_root: PathBuf::from("Resultados"),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: false,
        }
    }
}

impl ExtractorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ExtractorError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn taxpayer_timeout(&self) -> Duration {
        Duration::from_secs(self.taxpayer_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ExtractorError> {
        if self.taxpayer_timeout_secs == 0 {
            return Err(ExtractorError::InvalidArgument(
                "taxpayer_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.portal.authenticated_url_fragments.is_empty() {
            return Err(ExtractorError::InvalidArgument(
                "portal.authenticated_url_fragments must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where things are on the portal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub login_url: String,
    pub username_field: String,
    pub username_submit: String,
    pub password_field: String,
    pub password_submit: String,
    /// Any of these in the URL means the login went through.
    pub authenticated_url_fragments: Vec<String>,
    pub error_banners: Vec<String>,

    pub search_input: String,
    pub search_term: String,
    pub search_results: String,
    pub first_search_result: String,
    /// Opened directly when the search result does not produce the report screen.
    pub report_deep_link: String,
    pub report_url_fragment: String,

    pub year_tab: String,
    pub year_buttons: String,
    pub year_attribute: String,
    pub previous_years_arrow: String,
    pub next_years_arrow: String,
    pub disabled_arrow_class: String,
    pub max_arrow_clicks: u32,

    pub sections: String,
    pub section_title: String,
    pub section_icons: String,
    pub print_marker: String,
    pub data_table: String,
    pub detail_panels: String,
    pub panel_heading: String,
    pub print_buttons: String,
    pub panel_close: String,
    /// Sections whose title contains any of these (accent and case insensitive) are skipped.
    pub ignored_sections: Vec<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: "https://auth.afip.gob.ar/contribuyente_/login.xhtml".to_string(),
            username_field: "#F1:username".to_string(),
            username_submit: "#F1:btnSiguiente".to_string(),
            password_field: "#F1:password".to_string(),
            password_submit: "#F1:btnIngresar".to_string(),
            authenticated_url_fragments: vec![
                "menuPrincipal".to_string(),
                "portalcf.cloud.afip.gob.ar".to_string(),
            ],
            error_banners: vec![
                "#F1:msg".to_string(),
                "span.error".to_string(),
                ".alert-danger".to_string(),
                ".ui-messages-error".to_string(),
            ],

            search_input: "#buscadorInput".to_string(),
            search_term: "Nuestra Parte".to_string(),
            search_results: "#resultadoBusqueda".to_string(),
            first_search_result: "#resultadoBusqueda a:first-child".to_string(),
            report_deep_link: "https://serviciosweb.afip.gob.ar/genericos/nuestraParte/"
                .to_string(),
            report_url_fragment: "nuestraParte".to_string(),

            year_tab: "a[href='#tabNacional']".to_string(),
            year_buttons: "span.btn-consultar.c-2x".to_string(),
            year_attribute: "data-periodo".to_string(),
            previous_years_arrow: "a.left-button".to_string(),
            next_years_arrow: "a.right-button".to_string(),
            disabled_arrow_class: "flecha-disabled".to_string(),
            max_arrow_clicks: 10,

            sections: "div.seccion".to_string(),
            section_title: "h2".to_string(),
            section_icons: "a.icono".to_string(),
            print_marker: "a.btn-imprimir".to_string(),
            data_table: "table.table".to_string(),
            detail_panels: "div.panel-detalle".to_string(),
            panel_heading: ".panel-heading".to_string(),
            print_buttons: "a.btn-imprimir".to_string(),
            panel_close: "button.close".to_string(),
            ignored_sections: vec![
                "Períodos anteriores".to_string(),
                "Prior-period".to_string(),
            ],
        }
    }
}

/// Retry budgets, one per kind of wait
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub element: RetryPolicy,
    pub redirect: RetryPolicy,
    pub new_context: RetryPolicy,
    pub report_verify: RetryPolicy,
    pub content_load: RetryPolicy,
    pub year_refresh: RetryPolicy,
    /// Short wait for optional elements (close buttons, headings).
    pub quick: RetryPolicy,
    /// Pause before each native dialog keystroke
    pub dialog_step_ms: u64,
    /// Time allowed for the browser to write the file before verification
    pub capture_settle: RetryPolicy,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            element: RetryPolicy::new(15, Duration::from_secs(1)),
            redirect: RetryPolicy::new(20, Duration::from_secs(1)),
            new_context: RetryPolicy::new(5, Duration::from_secs(1)),
            report_verify: RetryPolicy::new(10, Duration::from_secs(1)),
            content_load: RetryPolicy::new(10, Duration::from_millis(500)),
            year_refresh: RetryPolicy::new(10, Duration::from_millis(500)),
            quick: RetryPolicy::new(2, Duration::from_millis(250)),
            dialog_step_ms: 1500,
            capture_settle: RetryPolicy::new(10, Duration::from_millis(500)),
        }
    }
}

impl TimingConfig {
    pub fn dialog_step(&self) -> Duration {
        Duration::from_millis(self.dialog_step_ms)
    }

    /// Budgets suitable for an in-memory page where nothing needs to settle.
    pub fn immediate() -> Self {
        let p = RetryPolicy::new(3, Duration::from_millis(10));
        Self {
            element: p,
            redirect: p,
            new_context: p,
            report_verify: p,
            content_load: p,
            year_refresh: p,
            quick: RetryPolicy::once(),
            dialog_step_ms: 0,
            capture_settle: p,
        }
    }
}

/// Fiscal years the portal offers, oldest first.
pub fn supported_years() -> Vec<String> {
    let current = chrono::Local::now().year();
    (FIRST_SUPPORTED_YEAR..=current.max(FIRST_SUPPORTED_YEAR))
        .map(|y| y.to_string())
        .collect()
}

pub fn validate_year(year: &str) -> Result<String, ExtractorError> {
    let year = year.trim();
    if supported_years().iter().any(|y| y == year) {
        Ok(year.to_string())
    } else {
        Err(ExtractorError::InvalidArgument(format!(
            "year '{}' is outside the supported range {}-{}",
            year,
            FIRST_SUPPORTED_YEAR,
            chrono::Local::now().year()
        )))
    }
}
