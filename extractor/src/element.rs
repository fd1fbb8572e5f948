use crate::errors::ExtractorError;
use crate::selector::Selector;
use async_trait::async_trait;
use std::fmt;
use std::fmt::Debug;

/// Represents a live element on the current page of a browser session
pub struct Element {
    inner: Box<dyn ElementImpl>,
}

/// Backend-specific element behaviour. One implementation per driver.
#[async_trait]
pub trait ElementImpl: Send + Sync + Debug {
    async fn text(&self) -> Result<String, ExtractorError>;
    async fn attribute(&self, name: &str) -> Result<Option<String>, ExtractorError>;
    async fn is_displayed(&self) -> Result<bool, ExtractorError>;
    async fn is_enabled(&self) -> Result<bool, ExtractorError>;
    async fn click(&self) -> Result<(), ExtractorError>;
    /// Click through the page's scripting engine instead of synthesized input.
    async fn js_click(&self) -> Result<(), ExtractorError>;
    async fn scroll_into_view(&self) -> Result<(), ExtractorError>;
    async fn clear(&self) -> Result<(), ExtractorError>;
    async fn send_keys(&self, text: &str) -> Result<(), ExtractorError>;
    async fn find_all(&self, selector: &Selector) -> Result<Vec<Element>, ExtractorError>;
    fn clone_box(&self) -> Box<dyn ElementImpl>;
}

impl Element {
    pub fn new(inner: Box<dyn ElementImpl>) -> Self {
        Self { inner }
    }

    pub async fn text(&self) -> Result<String, ExtractorError> {
        self.inner.text().await
    }

    /// Trimmed text, empty when the element cannot be read.
    pub async fn text_or_empty(&self) -> String {
        self.inner
            .text()
            .await
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>, ExtractorError> {
        self.inner.attribute(name).await
    }

    /// Whether the element's `class` attribute contains `class_name` as a whole token.
    pub async fn has_class(&self, class_name: &str) -> bool {
        match self.inner.attribute("class").await {
            Ok(Some(classes)) => classes.split_whitespace().any(|c| c == class_name),
            _ => false,
        }
    }

    pub async fn is_displayed(&self) -> Result<bool, ExtractorError> {
        self.inner.is_displayed().await
    }

    pub async fn is_enabled(&self) -> Result<bool, ExtractorError> {
        self.inner.is_enabled().await
    }

    /// Displayed and enabled.
    pub async fn is_interactable(&self) -> Result<bool, ExtractorError> {
        Ok(self.inner.is_displayed().await? && self.inner.is_enabled().await?)
    }

    pub async fn click(&self) -> Result<(), ExtractorError> {
        self.inner.click().await
    }

    pub async fn js_click(&self) -> Result<(), ExtractorError> {
        self.inner.js_click().await
    }

    pub async fn scroll_into_view(&self) -> Result<(), ExtractorError> {
        self.inner.scroll_into_view().await
    }

    pub async fn clear(&self) -> Result<(), ExtractorError> {
        self.inner.clear().await
    }

    pub async fn send_keys(&self, text: &str) -> Result<(), ExtractorError> {
        self.inner.send_keys(text).await
    }

    /// Replace the element's current value with `text`.
    pub async fn fill(&self, text: &str) -> Result<(), ExtractorError> {
        self.inner.clear().await?;
        self.inner.send_keys(text).await
    }

    pub async fn find_all(&self, selector: &Selector) -> Result<Vec<Element>, ExtractorError> {
        if let Selector::Invalid(reason) = selector {
            return Err(ExtractorError::InvalidSelector(reason.clone()));
        }
        self.inner.find_all(selector).await
    }
}

impl Clone for Element {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}

impl Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element").field("inner", &self.inner).finish()
    }
}
