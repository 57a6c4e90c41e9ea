use std::path::PathBuf;

use thiserror::Error;

use crate::preflight::PreflightReport;

/// Fatal restore failures. Per-package install failures are not errors; they
/// are collected in the report.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("failed to read lockfile {}", path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("restore rejected by preflight checks:\n{0}")]
    PreflightRejected(PreflightReport),

    #[error("failed to remove package '{package}'")]
    Removal {
        package: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to snapshot libraries")]
    Snapshot(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
