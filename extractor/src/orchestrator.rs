//! Batch driver: one taxpayer at a time, each in its own browser session
//! under its own wall-clock budget.

use crate::context::RunContext;
use crate::driver::{BrowserDriver, DriverFactory};
use crate::errors::ExtractorError;
use crate::naming::taxpayer_dir;
use crate::period::{PeriodSelection, PeriodSelector};
use crate::report::{write_error_marker, OutcomeRecord, RunReport};
use crate::roster::{Roster, TaxpayerRecord};
use crate::session::SessionController;
use crate::traversal::{Traversal, TraversalSummary};
use crate::watchdog::{Checkpoint, Watchdog};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Receives batch progress, e.g. to print it.
pub trait ProgressSink: Send {
    fn begin(&mut self, _total: usize) {}

    /// `index` is 0-based.
    fn taxpayer_started(&mut self, _index: usize, _record: &TaxpayerRecord) {}

    fn taxpayer_finished(&mut self, _index: usize, _outcome: &OutcomeRecord) {}

    /// Called once at the end, also when the batch was cancelled.
    fn finish(&mut self, _report: &RunReport) {}
}

/// A no-op progress sink.
pub struct NullProgress;

impl ProgressSink for NullProgress {}

/// What one taxpayer's run got through before it ended
#[derive(Debug, Default)]
struct Attempt {
    selection: Option<PeriodSelection>,
    output_dir: Option<PathBuf>,
    summary: Option<TraversalSummary>,
}

pub struct Extractor {
    ctx: RunContext,
    factory: Arc<dyn DriverFactory>,
}

impl Extractor {
    pub fn new(ctx: RunContext, factory: Arc<dyn DriverFactory>) -> Self {
        Self { ctx, factory }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Process every record in roster order. Never fails as a whole; each
    /// taxpayer ends up as one outcome in the report.
    #[instrument(skip_all, fields(year = %self.ctx.year, taxpayers = roster.len()))]
    pub async fn run_batch(&self, roster: &Roster, progress: &mut dyn ProgressSink) -> RunReport {
        let mut report = RunReport::new(self.ctx.year.clone());
        report.skipped_rows = roster.skipped;
        progress.begin(roster.len());

        for (index, record) in roster.records.iter().enumerate() {
            if self.ctx.shutdown.is_cancelled() {
                warn!(
                    "Run cancelled; {} taxpayers left unprocessed",
                    roster.len() - index
                );
                break;
            }
            progress.taxpayer_started(index, record);
            let outcome = self.process_taxpayer(record).await;
            progress.taxpayer_finished(index, &outcome);
            report.push(outcome);
        }

        report.finish();
        info!(
            target: "progress",
            "Finished: {} processed, {} successful, {} failed",
            report.processed(),
            report.succeeded(),
            report.failed()
        );
        progress.finish(&report);
        report
    }

    /// Run one taxpayer end to end. The browser is always closed before
    /// this returns.
    #[instrument(skip_all, fields(taxpayer = %record.name))]
    pub async fn process_taxpayer(&self, record: &TaxpayerRecord) -> OutcomeRecord {
        let started = Instant::now();
        let budget = self.ctx.config.taxpayer_timeout();
        info!(target: "progress", "Processing {} ({})", record.name, record.tax_id);

        let mut attempt = Attempt::default();
        let result = match self.factory.launch().await {
            Ok(driver) => {
                let watchdog =
                    Watchdog::arm(driver.clone(), budget, &self.ctx.shutdown, record.name.clone());
                let result = self
                    .extract(driver.clone(), record, watchdog.checkpoint(), &mut attempt)
                    .await;
                let expired = watchdog.disarm().await;
                if let Err(e) = driver.quit().await {
                    warn!("Closing the browser for {} failed: {}", record.name, e);
                }
                match result {
                    // whatever the foreground saw, an expired budget is the cause
                    _ if expired => Err(ExtractorError::ProcessingTimeout(budget)),
                    other => other,
                }
            }
            Err(e) => Err(e),
        };

        let mut outcome = match &result {
            Ok(()) => OutcomeRecord::success(record, &self.ctx.year),
            Err(e) => OutcomeRecord::failure(record, &self.ctx.year, e),
        };
        if let Some(selection) = &attempt.selection {
            outcome.effective_year = selection.effective_year().map(str::to_string);
            outcome.period_substituted = selection.is_substitution();
        }
        if let Some(summary) = &attempt.summary {
            outcome.artifacts_captured = summary.artifacts_captured;
            outcome.artifacts_unverified = summary.artifacts_unverified;
        }
        let output_dir = attempt
            .output_dir
            .unwrap_or_else(|| taxpayer_dir(&self.ctx.results_root, &self.ctx.year, &record.name));
        outcome.elapsed_secs = started.elapsed().as_secs_f64();

        match &result {
            Ok(()) => info!(
                target: "progress",
                "{}: done, {} documents saved ({} not confirmed)",
                record.name,
                outcome.artifacts_captured,
                outcome.artifacts_unverified
            ),
            Err(e) => {
                error!(target: "progress", "{}: failed ({}): {}", record.name, e.category(), e);
                match write_error_marker(&output_dir, &outcome) {
                    Ok(Some(path)) => info!("Error marker written to {}", path.display()),
                    Ok(None) => {}
                    Err(e) => warn!("Could not write the error marker: {}", e),
                }
            }
        }
        outcome.output_dir = Some(output_dir);
        outcome
    }

    async fn extract(
        &self,
        driver: Arc<dyn BrowserDriver>,
        record: &TaxpayerRecord,
        checkpoint: Checkpoint,
        attempt: &mut Attempt,
    ) -> Result<(), ExtractorError> {
        let config = &self.ctx.config;

        let mut session = SessionController::new(
            driver.clone(),
            &config.portal,
            &config.timing,
            checkpoint.clone(),
        );
        session.establish(record).await?;

        checkpoint.check("period selection")?;
        let selection = PeriodSelector::new(
            driver.clone(),
            &config.portal,
            &config.timing,
            checkpoint.clone(),
        )
        .select(&self.ctx.year)
        .await?;
        let year = selection
            .effective_year()
            .unwrap_or(self.ctx.year.as_str())
            .to_string();
        attempt.selection = Some(selection);

        let output_dir = taxpayer_dir(&self.ctx.results_root, &year, &record.name);
        std::fs::create_dir_all(&output_dir)?;
        attempt.output_dir = Some(output_dir.clone());

        checkpoint.check("traversal")?;
        let mut traversal = Traversal::new(
            driver,
            &config.portal,
            &config.timing,
            self.ctx.strategy.as_ref(),
            checkpoint,
            output_dir,
        );
        let result = traversal.run().await;
        // keep the counters even when the walk was cut short
        attempt.summary = Some(traversal.into_summary());
        result
    }
}
