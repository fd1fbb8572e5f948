//! AFIP extractor CLI
//!
//! Usage:
//!   afip-extractor --year 2023 --file clientes.csv
//!   afip-extractor                               # prompts for year and roster
//!   afip-extractor --convert-txt clientes.txt    # legacy listing -> roster CSV
//!   afip-extractor --sample-roster ejemplo.csv

use afip_extractor::capture::HostCapabilities;
use afip_extractor::config::validate_year;
use afip_extractor::report::{write_failed_csv, write_html};
use afip_extractor::roster::{convert_legacy_listing, load_roster, write_sample_roster};
use afip_extractor::{browser_check, Extractor, ExtractorConfig, RunContext, WebDriverFactory};
use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

mod cli;
mod logging;
mod progress;
mod prompts;

use cli::Cli;
use progress::ConsoleProgress;

fn main() -> ExitCode {
    let args = Cli::parse();

    let code = match std::panic::catch_unwind(AssertUnwindSafe(|| run(args))) {
        Ok(Ok(code)) => code,
        Ok(Err(e)) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
        Err(_) => {
            eprintln!("{}", "The extractor stopped unexpectedly.".red().bold());
            ExitCode::FAILURE
        }
    };
    prompts::pause();
    code
}

fn run(args: Cli) -> Result<ExitCode> {
    let logs = logging::init_logging(&args.log_dir)?;
    prompts::banner();

    if let Some(path) = &args.sample_roster {
        write_sample_roster(path)
            .with_context(|| format!("writing sample roster to {}", path.display()))?;
        println!("{} Example roster written to {}", "✓".green(), path.display());
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(txt) = &args.convert_txt {
        let csv = txt.with_extension("csv");
        let count = convert_legacy_listing(txt, &csv)
            .with_context(|| format!("converting {}", txt.display()))?;
        println!("{} {} taxpayers written to {}", "✓".green(), count, csv.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(&args)?;
    let year = match &args.year {
        Some(year) => validate_year(year)?,
        None => prompts::ask_year()?,
    };

    let roster_path = match (&args.file, args.select_file) {
        (Some(file), false) => file.clone(),
        _ => match prompts::pick_roster() {
            Some(path) => path,
            None => bail!("no roster file selected"),
        },
    };
    let roster = load_roster(&roster_path)
        .with_context(|| format!("loading roster {}", roster_path.display()))?;
    if roster.is_empty() {
        warn!("{} has no usable rows", roster_path.display());
        println!("{}", "The roster has no usable rows; nothing to do.".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    browser_check::preflight();
    let host = HostCapabilities::probe();
    let strategy = host.select_dialog_strategy(&config.timing);
    info!("Save dialogs are driven by the {} strategy", strategy.name());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;
    let results_root = config.results_root.clone();
    let report = runtime.block_on(async {
        let factory = WebDriverFactory::new(config.webdriver_url.clone(), config.headless)
            .context("preparing browser profiles")?;
        let ctx = RunContext::new(config, year, strategy);

        let shutdown = ctx.shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; stopping after the current step");
                shutdown.cancel();
            }
        });

        let extractor = Extractor::new(ctx, Arc::new(factory));
        let mut progress = ConsoleProgress::default();
        anyhow::Ok(extractor.run_batch(&roster, &mut progress).await)
    })?;

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let html = results_root.join(format!("reporte_{}_{}.html", report.year, stamp));
    write_html(&html, &report).context("writing the HTML report")?;
    println!("\nReport: {}", html.display());

    if report.failed() > 0 {
        let failed = results_root.join(format!("fallidos_{}_{}.csv", report.year, stamp));
        write_failed_csv(&failed, &report, &roster).context("writing the failed roster")?;
        println!("Failed taxpayers (for a re-run): {}", failed.display());
    }
    println!("Progress log: {}", logs.progress_log.display());
    println!("Technical log: {}", logs.technical_log.display());

    Ok(ExitCode::SUCCESS)
}

fn load_config(args: &Cli) -> Result<ExtractorConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractorConfig::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => default_config_file()
            .map(|path| {
                ExtractorConfig::from_file(&path)
                    .with_context(|| format!("reading configuration {}", path.display()))
            })
            .transpose()?
            .unwrap_or_default(),
    };

    if let Some(output) = &args.output {
        config.results_root = output.clone();
    }
    if let Some(url) = &args.webdriver_url {
        config.webdriver_url = url.clone();
    }
    if args.headless {
        config.headless = true;
    }
    if let Some(minutes) = args.timeout_minutes {
        config.taxpayer_timeout_secs = minutes * 60;
    }
    config.validate()?;
    Ok(config)
}

/// `afip_extractor.json` in the working directory, when present.
fn default_config_file() -> Option<PathBuf> {
    let path = Path::new("afip_extractor.json");
    path.is_file().then(|| path.to_path_buf())
}
