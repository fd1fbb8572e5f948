//! Startup preflight: is there a Chrome to drive, and which version.
//!
//! A missing browser is reported with installation hints but never aborts
//! the run; chromedriver may still find a browser we do not know about.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromeInstallation {
    pub path: PathBuf,
    pub version: Option<String>,
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if cfg!(target_os = "windows") {
        let roots = [
            std::env::var("PROGRAMFILES").unwrap_or_else(|_| r"C:\Program Files".to_string()),
            std::env::var("PROGRAMFILES(X86)")
                .unwrap_or_else(|_| r"C:\Program Files (x86)".to_string()),
            std::env::var("LOCALAPPDATA")
                .unwrap_or_else(|_| r"C:\Users\Default\AppData\Local".to_string()),
        ];
        for root in roots {
            candidates.push(
                Path::new(&root)
                    .join("Google")
                    .join("Chrome")
                    .join("Application")
                    .join("chrome.exe"),
            );
        }
    } else if cfg!(target_os = "macos") {
        candidates.push(PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ));
    } else {
        if let Some(paths) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&paths) {
                for name in ["google-chrome", "google-chrome-stable", "chrome", "chromium"] {
                    candidates.push(dir.join(name));
                }
            }
        }
        for fixed in [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chrome",
            "/snap/bin/google-chrome",
        ] {
            candidates.push(PathBuf::from(fixed));
        }
    }
    candidates
}

/// First Chrome binary found in the usual per-OS locations.
pub fn locate_chrome() -> Option<PathBuf> {
    candidate_paths().into_iter().find(|p| p.is_file())
}

/// Extract `major.minor.build.patch` from `--version` output.
pub fn parse_version(output: &str) -> Option<String> {
    static VERSION: OnceLock<Option<Regex>> = OnceLock::new();
    VERSION
        .get_or_init(|| Regex::new(r"\d+\.\d+\.\d+\.\d+").ok())
        .as_ref()?
        .find(output)
        .map(|m| m.as_str().to_string())
}

/// Run `<chrome> --version` and parse the answer.
pub fn chrome_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    parse_version(&String::from_utf8_lossy(&output.stdout))
}

/// Locate Chrome and log what was found, with hints when nothing was.
pub fn preflight() -> Option<ChromeInstallation> {
    match locate_chrome() {
        Some(path) => {
            let version = chrome_version(&path);
            info!(
                "Chrome found at {} (version {})",
                path.display(),
                version.as_deref().unwrap_or("unknown")
            );
            Some(ChromeInstallation { path, version })
        }
        None => {
            warn!("Google Chrome was not found. {}", install_hint());
            None
        }
    }
}

pub fn install_hint() -> &'static str {
    if cfg!(target_os = "windows") {
        "Download it from https://www.google.com/chrome/ and run the installer."
    } else if cfg!(target_os = "macos") {
        "Download it from https://www.google.com/chrome/ and drag it into Applications."
    } else if Path::new("/etc/debian_version").exists() {
        "Install it with: wget https://dl.google.com/linux/direct/google-chrome-stable_current_amd64.deb \
         && sudo apt install ./google-chrome-stable_current_amd64.deb"
    } else if Path::new("/etc/fedora-release").exists() || Path::new("/etc/redhat-release").exists() {
        "Install it with: sudo dnf install \
         https://dl.google.com/linux/direct/google-chrome-stable_current_x86_64.rpm"
    } else {
        "Download it for your distribution from https://www.google.com/chrome/."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_parsed_from_banner() {
        assert_eq!(
            parse_version("Google Chrome 124.0.6367.201 \n").as_deref(),
            Some("124.0.6367.201")
        );
        assert_eq!(parse_version("Chromium 99.1"), None);
    }
}
