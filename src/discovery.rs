use crate::error::SyncError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// List the regular files under `ssh_dir`, sorted by path.
///
/// Files whose name is in `exclude_files` are left out. Directory entries
/// that cannot be read are logged and skipped.
pub fn discover_files(
    ssh_dir: &Path,
    recursive: bool,
    exclude_files: &HashSet<String>,
) -> Result<Vec<PathBuf>, SyncError> {
    if !ssh_dir.is_dir() {
        return Err(SyncError::DirectoryNotFound(ssh_dir.to_path_buf()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(ssh_dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(max_depth)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if exclude_files.contains(name.as_ref()) {
            tracing::debug!("Excluding file {}", entry.path().display());
            continue;
        }

        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}
