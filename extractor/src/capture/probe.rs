use super::{ConstrainedHostStrategy, DialogAutomationStrategy, StandardStrategy, XdotoolKeyboard};
use crate::config::TimingConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const KERNEL_IDENTITY_FILES: &[&str] = &["/proc/version", "/proc/sys/kernel/osrelease"];

/// What the host offers for driving native dialogs. Probed once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Running under the Windows Subsystem for Linux
    pub wsl: bool,
    pub xdotool: Option<PathBuf>,
}

/// Whether kernel identity text names WSL.
pub fn detect_wsl(kernel_identity: &str) -> bool {
    let lower = kernel_identity.to_lowercase();
    lower.contains("microsoft") || lower.contains("wsl")
}

impl HostCapabilities {
    pub fn probe() -> Self {
        let wsl = cfg!(target_os = "linux")
            && KERNEL_IDENTITY_FILES
                .iter()
                .filter_map(|path| std::fs::read_to_string(path).ok())
                .any(|text| detect_wsl(&text));
        let xdotool = find_on_path("xdotool");
        let caps = Self { wsl, xdotool };
        info!(
            "Host capabilities: wsl={}, xdotool={}",
            caps.wsl,
            caps.xdotool
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "not found".to_string())
        );
        caps
    }

    /// The constrained-host strategy when the dialog is out of the driver's
    /// reach and an injection tool exists, the standard one otherwise.
    pub fn select_dialog_strategy(&self, timing: &TimingConfig) -> Arc<dyn DialogAutomationStrategy> {
        match (self.wsl, &self.xdotool) {
            (true, Some(xdotool)) => Arc::new(ConstrainedHostStrategy::new(
                Arc::new(XdotoolKeyboard::new(xdotool.clone())),
                timing,
            )),
            (true, None) => {
                warn!(
                    "WSL detected but xdotool is not installed (apt install xdotool); \
                     save dialogs may not respond"
                );
                Arc::new(StandardStrategy::new(timing))
            }
            _ => Arc::new(StandardStrategy::new(timing)),
        }
    }
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
