use crate::capture::DialogAutomationStrategy;
use crate::config::ExtractorConfig;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a run shares across taxpayers, built once per invocation and
/// passed explicitly to each component.
#[derive(Clone)]
pub struct RunContext {
    pub config: Arc<ExtractorConfig>,
    /// Fiscal year requested by the user
    pub year: String,
    pub results_root: PathBuf,
    pub strategy: Arc<dyn DialogAutomationStrategy>,
    /// Cancelling this stops the batch at the next checkpoint.
    pub shutdown: CancellationToken,
}

impl RunContext {
    pub fn new(
        config: ExtractorConfig,
        year: impl Into<String>,
        strategy: Arc<dyn DialogAutomationStrategy>,
    ) -> Self {
        let results_root = config.results_root.clone();
        Self {
            config: Arc::new(config),
            year: year.into(),
            results_root,
            strategy,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_results_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.results_root = root.into();
        self
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("year", &self.year)
            .field("results_root", &self.results_root)
            .field("strategy", &self.strategy.name())
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish()
    }
}
