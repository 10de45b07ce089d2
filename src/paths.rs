use std::fs;
use std::path::{Path, PathBuf};

const PACKAGES: [&str; 2] = [
    "Microsoft.WindowsTerminal_8wekyb3d8bbwe",
    "Microsoft.WindowsTerminalPreview_8wekyb3d8bbwe",
];

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

pub fn default_ssh_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".ssh"))
        .unwrap_or_else(|| PathBuf::from(".ssh"))
}

/// Whether we run under the Windows Subsystem for Linux
pub fn is_wsl() -> bool {
    fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|release| release.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

fn settings_under(local_app_data: &Path) -> Vec<PathBuf> {
    PACKAGES
        .iter()
        .map(|package| {
            local_app_data
                .join("Packages")
                .join(package)
                .join("LocalState")
                .join("settings.json")
        })
        .collect()
}

/// Pick the first candidate that exists, otherwise the first one
fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|p| p.exists())
        .or_else(|| candidates.first())
        .cloned()
}

/// Locate Windows Terminal's `settings.json`.
///
/// Native Windows uses `%LOCALAPPDATA%`. Under WSL (and elsewhere) the Windows
/// user profile is looked up on the mounted `C:` drive, then under the home
/// directory.
pub fn default_settings_path() -> PathBuf {
    if cfg!(windows) {
        let native = dirs::data_local_dir().and_then(|dir| first_existing(settings_under(&dir)));
        if let Some(path) = native {
            return path;
        }
    }

    let user = std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_default();

    let windows_home = Path::new("/mnt/c/Users").join(&user);
    let mut candidates = settings_under(&windows_home.join("AppData").join("Local"));
    if !is_wsl() {
        if let Some(home) = dirs::home_dir() {
            candidates.extend(settings_under(&home.join("AppData").join("Local")));
        }
    }

    tracing::debug!("Settings path candidates: {:?}", candidates);
    first_existing(candidates).unwrap_or_else(|| PathBuf::from("settings.json"))
}
