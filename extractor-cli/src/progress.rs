use afip_extractor::{OutcomeRecord, ProgressSink, RunReport, TaxpayerRecord};
use colored::*;

/// Prints one colored line per taxpayer and the final tally.
#[derive(Default)]
pub struct ConsoleProgress {
    total: usize,
}

impl ProgressSink for ConsoleProgress {
    fn begin(&mut self, total: usize) {
        self.total = total;
        println!("{} taxpayers to process\n", total.to_string().bold());
    }

    fn taxpayer_started(&mut self, index: usize, record: &TaxpayerRecord) {
        println!(
            "{} {} ({})",
            format!("[{}/{}]", index + 1, self.total).dimmed(),
            record.name.bold(),
            record.tax_id
        );
    }

    fn taxpayer_finished(&mut self, _index: usize, outcome: &OutcomeRecord) {
        if outcome.success {
            let mut line = format!(
                "  {} {} documents saved",
                "✓".green(),
                outcome.artifacts_captured
            );
            if outcome.artifacts_unverified > 0 {
                line.push_str(&format!(", {} not confirmed", outcome.artifacts_unverified));
            }
            if outcome.period_substituted {
                if let Some(year) = &outcome.effective_year {
                    line.push_str(&format!(" (year {} used instead of {})", year, outcome.requested_year));
                }
            }
            println!("{line}");
        } else {
            let category = outcome
                .category()
                .map(|c| c.description())
                .unwrap_or_default();
            println!(
                "  {} {}: {}",
                "✗".red(),
                category.red(),
                outcome.error_message.as_deref().unwrap_or_default()
            );
        }
    }

    fn finish(&mut self, report: &RunReport) {
        println!();
        println!("{}", "Summary".bold());
        println!("  Processed:  {}", report.processed());
        println!("  Successful: {}", report.succeeded().to_string().green());
        println!("  Failed:     {}", report.failed().to_string().red());
        println!(
            "  Documents:  {} saved, {} not confirmed",
            report.artifacts_captured(),
            report.artifacts_unverified()
        );
        if report.processed() < self.total {
            println!(
                "  {}",
                format!("{} taxpayers were not processed", self.total - report.processed()).yellow()
            );
        }
    }
}
