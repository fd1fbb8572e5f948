//! Browser session backends
//!
//! Everything above this module talks to a [`BrowserDriver`]; the production
//! backend speaks W3C WebDriver through `fantoccini`, and tests use an
//! in-memory page model.

use crate::errors::ExtractorError;
use crate::{Element, Selector};
use std::sync::Arc;

pub mod webdriver;

pub use webdriver::{WebDriverFactory, WebDriverSession};

/// Keystrokes sent through the driver's native input channel, i.e. to whatever
/// currently holds focus rather than to a specific element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStroke {
    Enter,
    Escape,
    /// Ctrl+A
    SelectAll,
}

/// The common trait that every browser backend must implement
#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate the current browsing context
    async fn goto(&self, url: &str) -> Result<(), ExtractorError>;

    async fn current_url(&self) -> Result<String, ExtractorError>;

    async fn title(&self) -> Result<String, ExtractorError>;

    /// Find all elements matching a selector in the current browsing context
    async fn find_all(&self, selector: &Selector) -> Result<Vec<Element>, ExtractorError>;

    /// Handles of every open browsing context (tabs and windows)
    async fn window_handles(&self) -> Result<Vec<String>, ExtractorError>;

    async fn current_window(&self) -> Result<String, ExtractorError>;

    async fn switch_to_window(&self, handle: &str) -> Result<(), ExtractorError>;

    async fn press_key(&self, key: KeyStroke) -> Result<(), ExtractorError>;

    async fn type_text(&self, text: &str) -> Result<(), ExtractorError>;

    /// End the session and close the browser. Calling it twice is not an error.
    async fn quit(&self) -> Result<(), ExtractorError>;

    fn is_closed(&self) -> bool;
}

/// Launches one fresh, exclusively owned browser session per taxpayer
#[async_trait::async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserDriver>, ExtractorError>;
}
