//! Per-taxpayer outcomes and the artifacts produced from them: error
//! markers, the HTML summary and the re-run CSV of failed taxpayers.

use crate::classifier::ErrorCategory;
use crate::errors::ExtractorError;
use crate::roster::{write_roster, Roster, TaxpayerRecord};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// How one taxpayer's processing ended. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub taxpayer_id: String,
    pub taxpayer_name: String,
    pub success: bool,
    pub error_category: Option<ErrorCategory>,
    pub error_message: Option<String>,
    pub requested_year: String,
    /// Year actually selected on the portal, when one was
    pub effective_year: Option<String>,
    pub period_substituted: bool,
    pub artifacts_captured: usize,
    /// Saves that ran but could not be confirmed on disk
    pub artifacts_unverified: usize,
    pub output_dir: Option<PathBuf>,
    pub elapsed_secs: f64,
}

impl OutcomeRecord {
    pub fn success(record: &TaxpayerRecord, requested_year: &str) -> Self {
        Self {
            taxpayer_id: record.tax_id.clone(),
            taxpayer_name: record.name.clone(),
            success: true,
            error_category: None,
            error_message: None,
            requested_year: requested_year.to_string(),
            effective_year: None,
            period_substituted: false,
            artifacts_captured: 0,
            artifacts_unverified: 0,
            output_dir: None,
            elapsed_secs: 0.0,
        }
    }

    pub fn failure(record: &TaxpayerRecord, requested_year: &str, error: &ExtractorError) -> Self {
        Self {
            success: false,
            error_category: Some(error.category()),
            error_message: Some(error.to_string()),
            ..Self::success(record, requested_year)
        }
    }

    /// Category used for grouping; `None` for successes.
    pub fn category(&self) -> Option<ErrorCategory> {
        if self.success {
            None
        } else {
            Some(self.error_category.unwrap_or(ErrorCategory::Unclassified))
        }
    }
}

/// All outcomes of one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub year: String,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub outcomes: Vec<OutcomeRecord>,
    /// Roster rows rejected while loading
    pub skipped_rows: usize,
}

impl RunReport {
    pub fn new(year: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            started_at: Local::now(),
            finished_at: None,
            outcomes: Vec::new(),
            skipped_rows: 0,
        }
    }

    pub fn push(&mut self, outcome: OutcomeRecord) {
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.processed() - self.succeeded()
    }

    pub fn artifacts_captured(&self) -> usize {
        self.outcomes.iter().map(|o| o.artifacts_captured).sum()
    }

    pub fn artifacts_unverified(&self) -> usize {
        self.outcomes.iter().map(|o| o.artifacts_unverified).sum()
    }

    /// Failed outcomes, most fixable first; roster order within a category.
    pub fn failures_by_fixability(&self) -> Vec<&OutcomeRecord> {
        let mut failures: Vec<&OutcomeRecord> =
            self.outcomes.iter().filter(|o| !o.success).collect();
        // sort_by_key is stable
        failures.sort_by_key(|o| o.category().map(|c| c.fixability_rank()).unwrap_or(u8::MAX));
        failures
    }
}

/// Leave `error_<category>.txt` in the taxpayer's output directory.
pub fn write_error_marker(
    dir: &Path,
    outcome: &OutcomeRecord,
) -> Result<Option<PathBuf>, ExtractorError> {
    let Some(category) = outcome.category() else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("error_{}.txt", category.as_str()));
    let body = format!(
        "{}\nTaxpayer: {} ({})\nYear: {}\nWhen: {}\n\n{}\n",
        category.description(),
        outcome.taxpayer_name,
        outcome.taxpayer_id,
        outcome.requested_year,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        outcome.error_message.as_deref().unwrap_or_default()
    );
    std::fs::write(&path, body)?;
    Ok(Some(path))
}

/// Roster-formatted CSV of the failed taxpayers, most fixable first, for a
/// re-run. Returns how many rows were written.
pub fn write_failed_csv(
    path: &Path,
    report: &RunReport,
    roster: &Roster,
) -> Result<usize, ExtractorError> {
    let records: Vec<&TaxpayerRecord> = report
        .failures_by_fixability()
        .into_iter()
        .filter_map(|outcome| {
            let found = roster.find(&outcome.taxpayer_id);
            if found.is_none() {
                warn!("{} is not in the roster; left out of the re-run file", outcome.taxpayer_id);
            }
            found
        })
        .collect();
    let written = write_roster(path, records)?;
    info!("Wrote {} failed taxpayers to {}", written, path.display());
    Ok(written)
}

pub fn write_html(path: &Path, report: &RunReport) -> Result<(), ExtractorError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, render_html(report))?;
    info!("Report written to {}", path.display());
    Ok(())
}

/// Static summary page: the tally, then one table per outcome group
/// (successes first, failures in fixability order).
pub fn render_html(report: &RunReport) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"es\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Extraction report {year}</title>\n<style>\n\
         body {{ font-family: sans-serif; margin: 2em; }}\n\
         table {{ border-collapse: collapse; margin-bottom: 2em; }}\n\
         th, td {{ border: 1px solid #ccc; padding: 4px 8px; text-align: left; }}\n\
         .ok {{ color: #2e7d32; }} .fail {{ color: #c62828; }}\n\
         </style>\n</head>\n<body>\n<h1>Extraction report, fiscal year {year}</h1>\n",
        year = escape_html(&report.year)
    );

    let _ = write!(
        html,
        "<p>Started {}{}</p>\n<ul>\n<li>Processed: {}</li>\n<li class=\"ok\">Successful: {}</li>\n\
         <li class=\"fail\">Failed: {}</li>\n<li>Documents saved: {}</li>\n\
         <li>Documents not confirmed: {}</li>\n<li>Roster rows skipped: {}</li>\n</ul>\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
        report
            .finished_at
            .map(|t| format!(", finished {}", t.format("%Y-%m-%d %H:%M:%S")))
            .unwrap_or_default(),
        report.processed(),
        report.succeeded(),
        report.failed(),
        report.artifacts_captured(),
        report.artifacts_unverified(),
        report.skipped_rows,
    );

    let successes: Vec<&OutcomeRecord> = report.outcomes.iter().filter(|o| o.success).collect();
    if !successes.is_empty() {
        let _ = write!(html, "<h2 class=\"ok\">Successful ({})</h2>\n", successes.len());
        html.push_str(
            "<table>\n<tr><th>Taxpayer</th><th>Tax ID</th><th>Year</th>\
             <th>Saved</th><th>Not confirmed</th></tr>\n",
        );
        for o in successes {
            let year = match (&o.effective_year, o.period_substituted) {
                (Some(y), true) => format!("{} (requested {})", y, o.requested_year),
                (Some(y), false) => y.clone(),
                (None, _) => format!("{} (not selected)", o.requested_year),
            };
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape_html(&o.taxpayer_name),
                escape_html(&o.taxpayer_id),
                escape_html(&year),
                o.artifacts_captured,
                o.artifacts_unverified
            );
        }
        html.push_str("</table>\n");
    }

    let failures = report.failures_by_fixability();
    let mut groups: Vec<(ErrorCategory, Vec<&OutcomeRecord>)> = Vec::new();
    for outcome in failures {
        let category = outcome.category().unwrap_or(ErrorCategory::Unclassified);
        match groups.last_mut() {
            Some((current, members)) if *current == category => members.push(outcome),
            _ => groups.push((category, vec![outcome])),
        }
    }
    for (category, members) in groups {
        let _ = write!(
            html,
            "<h2 class=\"fail\">{} ({})</h2>\n<table>\n\
             <tr><th>Taxpayer</th><th>Tax ID</th><th>Detail</th></tr>\n",
            escape_html(category.description()),
            members.len()
        );
        for o in members {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape_html(&o.taxpayer_name),
                escape_html(&o.taxpayer_id),
                escape_html(o.error_message.as_deref().unwrap_or_default())
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
