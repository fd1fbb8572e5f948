//! Interactive bits: banner, year prompt, roster picker and the exit pause.

use afip_extractor::config::{supported_years, validate_year, FIRST_SUPPORTED_YEAR};
use afip_extractor::roster::ROSTER_HEADER;
use anyhow::{bail, Result};
use colored::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

pub fn banner() {
    println!("{}", "=".repeat(64).blue());
    println!("{}", "  AFIP 'Nuestra Parte' extractor".bold());
    println!("{}", "=".repeat(64).blue());
    println!("Roster: a CSV file with the columns {}.", ROSTER_HEADER.join(", ").cyan());
    println!("Chrome and chromedriver must be installed; keep the browser window");
    println!("untouched while documents are being saved.");
    println!();
}

/// Ask for a fiscal year until a supported one is entered.
pub fn ask_year() -> Result<String> {
    let years = supported_years();
    let latest = years.last().cloned().unwrap_or_else(|| FIRST_SUPPORTED_YEAR.to_string());
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!(
            "Fiscal year to extract ({}-{}) [{}]: ",
            FIRST_SUPPORTED_YEAR, latest, latest
        );
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            bail!("no fiscal year given");
        };
        let line = line?;
        let answer = if line.trim().is_empty() { latest.as_str() } else { line.trim() };
        match validate_year(answer) {
            Ok(year) => return Ok(year),
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }
}

/// Native file dialog for the roster. `None` when the user cancels.
pub fn pick_roster() -> Option<PathBuf> {
    println!("Select the roster file in the dialog...");
    rfd::FileDialog::new()
        .set_title("Roster (name, tax_id, credential)")
        .add_filter("CSV", &["csv"])
        .add_filter("All files", &["*"])
        .pick_file()
}

/// Keep the console open until the user acknowledges.
pub fn pause() {
    print!("\nPress ENTER to exit...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().read_line(&mut line);
}
