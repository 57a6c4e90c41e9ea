use anyhow::{Context, Result};
use relib_core::DESCRIPTOR_FILE_NAME;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory names inside a library that are never packages.
pub(crate) const STAGING_DIR_NAME: &str = ".relib-staging";

/// Paths inside one package library root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLayout {
    root: PathBuf,
}

impl LibraryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn descriptor_path(&self, name: &str) -> PathBuf {
        self.package_dir(name).join(DESCRIPTOR_FILE_NAME)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR_NAME)
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create library {}", self.root.display()))
    }
}
