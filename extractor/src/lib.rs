//! Batch extraction of fiscal disclosure documents from the AFIP portal
//!
//! For every taxpayer in a roster the engine opens a fresh browser session,
//! logs in, navigates to the disclosure report, selects a fiscal year and
//! saves every table the report offers as a document on disk. Failures are
//! classified per taxpayer and never stop the batch.

pub mod browser_check;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod context;
pub mod driver;
pub mod element;
pub mod errors;
pub mod fallback;
pub mod locator;
pub mod naming;
pub mod orchestrator;
pub mod period;
pub mod report;
pub mod roster;
pub mod selector;
pub mod session;
pub mod traversal;
pub mod wait;
pub mod watchdog;
#[cfg(test)]
mod tests;

pub use capture::{DialogAutomationStrategy, HostCapabilities};
pub use classifier::ErrorCategory;
pub use config::{ExtractorConfig, PortalConfig, TimingConfig};
pub use context::RunContext;
pub use driver::{BrowserDriver, DriverFactory, WebDriverFactory};
pub use element::{Element, ElementImpl};
pub use errors::{ExtractorError, Result};
pub use locator::Locator;
pub use orchestrator::{Extractor, NullProgress, ProgressSink};
pub use report::{OutcomeRecord, RunReport};
pub use roster::{Roster, TaxpayerRecord};
pub use selector::Selector;
pub use wait::RetryPolicy;
