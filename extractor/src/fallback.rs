//! Ordered fallback strategies.
//!
//! UI interactions often have a preferred way and one or more alternatives
//! (direct click, then scripted click; close button, then Escape). A chain
//! tries each named strategy in order and stops at the first success.

use crate::element::Element;
use crate::errors::ExtractorError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use tracing::{debug, warn};

type Strategy<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, ExtractorError>> + Send + 'a>;

/// The value produced by the strategy that succeeded, and its name
#[derive(Debug)]
pub struct FallbackOutcome<T> {
    pub strategy: &'static str,
    pub value: T,
}

pub struct FallbackChain<'a, T> {
    operation: String,
    strategies: Vec<(&'static str, Strategy<'a, T>)>,
}

impl<'a, T: Send + 'a> FallbackChain<'a, T> {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            strategies: Vec::new(),
        }
    }

    /// Append a strategy; strategies run in insertion order.
    pub fn then<F, Fut>(mut self, name: &'static str, strategy: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, ExtractorError>> + Send + 'a,
    {
        self.strategies
            .push((name, Box::new(move || strategy().boxed())));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub async fn run(self) -> Result<FallbackOutcome<T>, ExtractorError> {
        let mut attempted = Vec::with_capacity(self.strategies.len());
        for (name, strategy) in self.strategies {
            attempted.push(name.to_string());
            match strategy().await {
                Ok(value) => {
                    debug!("{}: '{}' succeeded", self.operation, name);
                    return Ok(FallbackOutcome {
                        strategy: name,
                        value,
                    });
                }
                Err(e) => warn!("{}: '{}' failed: {}", self.operation, name, e),
            }
        }
        Err(ExtractorError::FallbacksExhausted {
            operation: self.operation,
            attempted,
        })
    }
}

/// Bring an element into view and click it, falling back to a scripted click
/// when the synthesized one is rejected (overlays, zero-size targets).
/// Returns the name of the strategy that worked.
pub async fn activate(element: &Element) -> Result<&'static str, ExtractorError> {
    let outcome = FallbackChain::new("activate element")
        .then("scroll and click", || async {
            if let Err(e) = element.scroll_into_view().await {
                debug!("scroll into view failed: {}", e);
            }
            element.click().await
        })
        .then("scripted click", || element.js_click())
        .run()
        .await?;
    Ok(outcome.strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn stops_at_first_success() {
        let log = Mutex::new(Vec::new());
        let outcome = FallbackChain::new("activate")
            .then("direct", || async {
                log.lock().unwrap().push("direct");
                Err(ExtractorError::Driver("intercepted".to_string()))
            })
            .then("script", || async {
                log.lock().unwrap().push("script");
                Ok(7)
            })
            .then("never", || async {
                log.lock().unwrap().push("never");
                Ok(9)
            })
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.strategy, "script");
        assert_eq!(outcome.value, 7);
        assert_eq!(*log.lock().unwrap(), vec!["direct", "script"]);
    }

    #[tokio::test]
    async fn exhaustion_lists_every_attempt() {
        let result: Result<FallbackOutcome<()>, _> = FallbackChain::new("dismiss")
            .then("close button", || async {
                Err(ExtractorError::ElementNotFound("close".to_string()))
            })
            .then("escape", || async { Err(ExtractorError::Driver("gone".to_string())) })
            .run()
            .await;

        match result {
            Err(ExtractorError::FallbacksExhausted {
                operation,
                attempted,
            }) => {
                assert_eq!(operation, "dismiss");
                assert_eq!(attempted, vec!["close button", "escape"]);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_chain_is_exhausted_immediately() {
        let chain: FallbackChain<'_, ()> = FallbackChain::new("noop");
        assert!(chain.is_empty());
        assert!(chain.run().await.is_err());
    }
}
