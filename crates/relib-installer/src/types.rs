use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStatus {
    Installed { path: PathBuf },
    Failed { reason: String },
}

impl InstallStatus {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed { path } => write!(f, "installed into {}", path.display()),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalStatus {
    NotInstalled,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalResult {
    pub name: String,
    pub version: Option<String>,
    pub status: RemovalStatus,
}
