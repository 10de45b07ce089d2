use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::paths::{default_settings_path, default_ssh_dir, expand_tilde};
use crate::settings::MergeMode;

/// Persistent defaults read from `config.toml`. Every field is optional;
/// command line flags take precedence.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ssh_dir: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
    pub recursive: Option<bool>,
    pub exclude_hosts: Vec<String>,
    pub exclude_files: Vec<String>,
    pub backup: Option<bool>,
}

#[derive(Debug)]
pub struct ConfigManager {
    config_file: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    pub fn new(config_file: Option<PathBuf>) -> Result<Self> {
        match config_file {
            Some(path) => Ok(Self {
                config_file: expand_tilde(&path),
                explicit: true,
            }),
            None => {
                let config_dir = dirs::config_dir()
                    .context("Could not find config directory")?
                    .join("ssh-to-terminal");
                Ok(Self {
                    config_file: config_dir.join("config.toml"),
                    explicit: false,
                })
            }
        }
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_file
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        // A missing default config just means defaults; a missing explicit one is a mistake
        if !self.config_file.exists() {
            if self.explicit {
                anyhow::bail!("Config file not found: {}", self.config_file.display());
            }
            tracing::debug!("No config file at {}", self.config_file.display());
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .with_context(|| format!("Failed to read config file {}", self.config_file.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", self.config_file.display()))
    }
}

/// Everything one sync run needs, fully resolved
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub ssh_dir: PathBuf,
    pub recursive: bool,
    pub settings_path: PathBuf,
    pub mode: MergeMode,
    pub exclude_hosts: HashSet<String>,
    pub exclude_files: HashSet<String>,
    pub dry_run: bool,
    pub backup: bool,
}

impl SyncConfig {
    /// Combine command line flags with the config file, flags winning
    pub fn resolve(cli: &Cli, app: AppConfig) -> Self {
        let ssh_dir = cli
            .ssh_dir
            .clone()
            .or(app.ssh_dir)
            .map(|p| expand_tilde(&p))
            .unwrap_or_else(default_ssh_dir);

        let settings_path = cli
            .terminal
            .clone()
            .or(app.settings_path)
            .map(|p| expand_tilde(&p))
            .unwrap_or_else(default_settings_path);

        let recursive = !cli.nosubdir && app.recursive.unwrap_or(true);
        let backup = !cli.no_backup && app.backup.unwrap_or(true);

        let exclude_hosts = app
            .exclude_hosts
            .into_iter()
            .chain(cli.exclude.iter().cloned())
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let exclude_files = app
            .exclude_files
            .into_iter()
            .chain(cli.exclude_file.iter().cloned())
            .filter_map(|name| {
                Path::new(name.trim())
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .collect();

        Self {
            ssh_dir,
            recursive,
            settings_path,
            mode: MergeMode {
                add: cli.add,
                remove: cli.remove,
            },
            exclude_hosts,
            exclude_files,
            dry_run: cli.dry_run,
            backup,
        }
    }
}
