//! Console, technical log and progress log.
//!
//! `afip_extractor.log` is recreated on every run and receives everything at
//! debug level. `progreso_<date>.log` is appended to and only receives the
//! `progress` target, which is what an operator reads afterwards.

use anyhow::{Context, Result};
use std::env;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const TECHNICAL_LOG: &str = "afip_extractor.log";
pub const PROGRESS_TARGET: &str = "progress";

/// Keeps the background log writers alive; drop it last.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
    pub technical_log: PathBuf,
    pub progress_log: PathBuf,
}

fn console_level() -> Level {
    env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO)
}

pub fn progress_log_name(date: chrono::NaiveDate) -> String {
    format!("progreso_{}.log", date.format("%Y-%m-%d"))
}

pub fn init_logging(log_dir: &Path) -> Result<LogGuards> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let technical_log = log_dir.join(TECHNICAL_LOG);
    let technical = File::create(&technical_log)
        .with_context(|| format!("creating {}", technical_log.display()))?;
    let (technical_writer, technical_guard) = tracing_appender::non_blocking(technical);

    let progress_log = log_dir.join(progress_log_name(chrono::Local::now().date_naive()));
    let progress = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&progress_log)
        .with_context(|| format!("opening {}", progress_log.display()))?;
    let (progress_writer, progress_guard) = tracing_appender::non_blocking(progress);

    // progress lines are printed by the console progress sink instead
    let console_filter = EnvFilter::from_default_env()
        .add_directive(console_level().into())
        .add_directive("progress=off".parse()?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(technical_writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_filter(LevelFilter::DEBUG),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(progress_writer)
                .with_ansi(false)
                .with_target(false)
                .with_level(false)
                .with_filter(filter_fn(|meta| meta.target() == PROGRESS_TARGET)),
        )
        .try_init()
        .context("installing the log subscriber")?;

    tracing::info!("Technical log: {}", technical_log.display());
    Ok(LogGuards {
        _guards: vec![technical_guard, progress_guard],
        technical_log,
        progress_log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_log_is_named_by_date() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(progress_log_name(date), "progreso_2024-03-07.log");
    }
}
