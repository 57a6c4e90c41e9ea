use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use relib_core::DiffResult;
use relib_installer::RemovalResult;
use relib_resolver::RequirementConflict;

/// What happened to one package during an install batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { path: PathBuf },
    Failed { reason: String },
    /// Not attempted because a dependency failed earlier in the batch.
    FailedByCascade { dependency: String },
    ConflictingRequirement(RequirementConflict),
    /// No record could be found in the lockfile or any repository.
    Unavailable,
}

impl InstallOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed { path } => write!(f, "installed into {}", path.display()),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            Self::FailedByCascade { dependency } => {
                write!(f, "skipped: dependency '{dependency}' failed")
            }
            Self::ConflictingRequirement(conflict) => write!(f, "failed: {conflict}"),
            Self::Unavailable => f.write_str("failed: no record available"),
        }
    }
}

/// Result of one install batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub removed: Vec<RemovalResult>,
    /// Per-package outcomes in the order they were decided.
    pub outcomes: Vec<(String, InstallOutcome)>,
    /// Packages whose existing install already matched.
    pub satisfied: BTreeMap<String, PathBuf>,
    pub conflicts: Vec<RequirementConflict>,
    /// Installed packages that do not match the lockfile afterwards.
    pub repairs: DiffResult,
}

impl InstallReport {
    pub fn outcome(&self, name: &str) -> Option<&InstallOutcome> {
        self.outcomes
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn installed_names(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_installed())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_installed())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_installed())
    }

    /// True when the lockfile no longer describes what was installed.
    pub fn needs_lockfile_refresh(&self) -> bool {
        !self.repairs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// The actions that were approved and applied.
    pub actions: DiffResult,
    pub install: InstallReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The library already matches the lockfile.
    Synchronized,
    /// The confirmation gate declined; nothing was changed.
    Aborted { diff: DiffResult },
    Restored(RestoreReport),
}
