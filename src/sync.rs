use crate::config::SyncConfig;
use crate::discovery::discover_files;
use crate::error::SyncError;
use crate::mapper::AttributeMapper;
use crate::models::ProfileEntry;
use crate::settings::{self, merge, MergeReport, SettingsDocument};
use crate::ssh_config::{looks_like_ssh_config, parse_ssh_config};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of a completed run
#[derive(Debug)]
pub struct SyncOutcome {
    pub files_scanned: usize,
    pub hosts_found: usize,
    pub report: MergeReport,
    /// Set when the settings file was rewritten
    pub written: Option<PathBuf>,
    pub backup: Option<PathBuf>,
    /// The merged document, filled in on dry runs
    pub preview: Option<String>,
}

/// Read one candidate file, returning its hosts as profiles.
///
/// Unreadable files (permissions, binary content) are reported as
/// `FileUnreadable`; callers log and move on.
fn profiles_from_file(
    path: &Path,
    mapper: &AttributeMapper,
) -> Result<Vec<ProfileEntry>, SyncError> {
    let content = fs::read_to_string(path).map_err(|source| SyncError::FileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    if !looks_like_ssh_config(&content) {
        tracing::debug!("{}: not an SSH config, skipping", path.display());
        return Ok(Vec::new());
    }

    let profiles: Vec<ProfileEntry> = parse_ssh_config(&content)
        .map(|host| mapper.map(&host))
        .collect();
    tracing::debug!("{}: parsed {} host(s)", path.display(), profiles.len());
    Ok(profiles)
}

/// Scan the SSH directory and map every host found.
///
/// A host name seen in several files resolves to the last file scanned, kept
/// at the position where the name first appeared.
pub fn collect_profiles(
    config: &SyncConfig,
    mapper: &AttributeMapper,
) -> Result<(usize, Vec<ProfileEntry>), SyncError> {
    tracing::debug!(
        "Scanning SSH dir: {} (recursive={})",
        config.ssh_dir.display(),
        config.recursive
    );
    let files = discover_files(&config.ssh_dir, config.recursive, &config.exclude_files)?;

    let mut profiles: Vec<ProfileEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut scanned = 0;

    for file in &files {
        let found = match profiles_from_file(file, mapper) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("{}", e);
                continue;
            }
        };
        if !found.is_empty() {
            scanned += 1;
        }

        for profile in found {
            match index.get(&profile.name) {
                Some(&i) => {
                    tracing::debug!("Host '{}' redefined in {}", profile.name, file.display());
                    profiles[i] = profile;
                }
                None => {
                    index.insert(profile.name.clone(), profiles.len());
                    profiles.push(profile);
                }
            }
        }
    }

    tracing::info!("Found {} host(s) in {} SSH config file(s)", profiles.len(), scanned);
    Ok((scanned, profiles))
}

/// Load the target document, applying the missing-file policy: an Add run
/// starts from a fresh document, a Remove-only run has nothing to work on.
fn load_target(config: &SyncConfig) -> Result<(SettingsDocument, bool), SyncError> {
    match SettingsDocument::load(&config.settings_path)? {
        Some(document) => Ok((document, true)),
        None if config.mode.add => {
            tracing::info!(
                "{} does not exist, starting from an empty settings file",
                config.settings_path.display()
            );
            Ok((SettingsDocument::new_default(&config.settings_path), false))
        }
        None => Err(SyncError::TargetNotFound(config.settings_path.clone())),
    }
}

/// Discover, parse, map, merge and persist in one pass.
///
/// Nothing is written unless every step before the write succeeded.
pub fn run(config: &SyncConfig) -> Result<SyncOutcome, SyncError> {
    let mapper = AttributeMapper::default();
    let (files_scanned, profiles) = collect_profiles(config, &mapper)?;

    let (document, existed) = load_target(config)?;
    let (merged, report) = merge(&document, &profiles, config.mode, &config.exclude_hosts)?;

    tracing::info!(
        "{} added, {} updated, {} removed, {} unchanged",
        report.added.len(),
        report.updated.len(),
        report.removed.len(),
        report.unchanged.len()
    );

    let mut outcome = SyncOutcome {
        files_scanned,
        hosts_found: profiles.len(),
        report,
        written: None,
        backup: None,
        preview: None,
    };

    if config.dry_run {
        let rendered = merged.to_json().map_err(|e| SyncError::WriteFailure {
            path: config.settings_path.clone(),
            source: e.into(),
        })?;
        outcome.preview = Some(rendered);
        return Ok(outcome);
    }

    if existed && merged == document {
        tracing::info!("{} is already up to date", config.settings_path.display());
        return Ok(outcome);
    }

    // Stage first so a target that cannot be written never gets a backup
    let staged = merged.stage()?;
    if existed && config.backup {
        outcome.backup = Some(settings::backup(&config.settings_path)?);
    }

    staged.commit()?;
    tracing::info!("Saved settings to {}", config.settings_path.display());
    outcome.written = Some(config.settings_path.clone());
    Ok(outcome)
}
