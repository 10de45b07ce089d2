use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while syncing SSH hosts into the terminal settings file
#[derive(Debug, Error)]
pub enum SyncError {
    /// The SSH directory to scan does not exist
    #[error("SSH directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// A candidate SSH config file could not be read (skipped, never fatal)
    #[error("Cannot read {}: {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON or has an unusable `profiles` section
    #[error("Malformed settings document {}: {reason}", path.display())]
    MalformedSettingsDocument { path: PathBuf, reason: String },

    /// The settings file exists but could not be read
    #[error("Cannot read settings file {}: {source}", path.display())]
    SettingsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is missing and the run cannot create it
    #[error("Settings file not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    /// The merged document could not be persisted
    #[error("Failed to write settings file {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
