use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "afip-extractor")]
#[command(about = "Download the 'Nuestra Parte' disclosure tables for every taxpayer in a roster")]
#[command(
    long_about = "Logs into the AFIP portal once per taxpayer listed in a CSV roster (columns: name, tax_id, credential), \
selects a fiscal year and saves every table of the disclosure report as a PDF under <output>/<year>/<taxpayer>/."
)]
pub struct Cli {
    /// Fiscal year to extract (prompted for when omitted)
    #[clap(long, short = 'y')]
    pub year: Option<String>,

    /// Roster CSV file
    #[clap(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Pick the roster in a file dialog, even when --file is given
    #[clap(long)]
    pub select_file: bool,

    /// Results directory (overrides the config file)
    #[clap(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// JSON configuration file with portal selectors and wait budgets
    #[clap(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// chromedriver endpoint
    #[clap(long, env = "AFIP_WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// Run Chrome without a window
    #[clap(long)]
    pub headless: bool,

    /// Time budget per taxpayer, in minutes
    #[clap(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_minutes: Option<u64>,

    /// Convert a legacy plain-text listing into a roster CSV and exit
    #[clap(long, value_name = "TXT", conflicts_with_all = ["sample_roster"])]
    pub convert_txt: Option<PathBuf>,

    /// Write an example roster to this path and exit
    #[clap(long, value_name = "PATH")]
    pub sample_roster: Option<PathBuf>,

    /// Directory for the technical and progress logs
    #[clap(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from([
            "afip-extractor",
            "--year",
            "2023",
            "--file",
            "clientes.csv",
            "--headless",
            "--timeout-minutes",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.year.as_deref(), Some("2023"));
        assert_eq!(cli.file, Some(PathBuf::from("clientes.csv")));
        assert!(cli.headless);
        assert_eq!(cli.timeout_minutes, Some(5));
        assert!(!cli.select_file);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["afip-extractor", "--timeout-minutes", "0"]).is_err());
    }
}
