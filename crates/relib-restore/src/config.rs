use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use relib_core::DEFAULT_LOCKFILE_NAME;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "relib.toml";

/// Project settings read from `relib.toml` in the project root.
///
/// Every field is optional in the file. Relative paths are resolved against
/// the project root by [`RestoreConfig::lockfile_path`] and
/// [`RestoreConfig::library_paths`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestoreConfig {
    /// Library search paths; the first one is the project library.
    pub library: Vec<PathBuf>,
    pub lockfile: PathBuf,
    /// Repository name to location; overrides lockfile repositories.
    pub repos: BTreeMap<String, String>,
    pub ignored: Vec<String>,
    pub clean: bool,
    pub prompt: bool,
    pub recursive: bool,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            library: vec![PathBuf::from("library")],
            lockfile: PathBuf::from(DEFAULT_LOCKFILE_NAME),
            repos: BTreeMap::new(),
            ignored: Vec::new(),
            clean: false,
            prompt: false,
            recursive: true,
        }
    }
}

impl RestoreConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse relib config")?;
        if config.library.is_empty() {
            anyhow::bail!("relib config must name at least one library path");
        }
        Ok(config)
    }

    /// Loads `<project_root>/relib.toml`, falling back to defaults when the
    /// file does not exist.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config: {}", path.display()))
    }

    pub fn lockfile_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.lockfile)
    }

    pub fn library_paths(&self, project_root: &Path) -> Vec<PathBuf> {
        self.library
            .iter()
            .map(|path| project_root.join(path))
            .collect()
    }
}
