use std::fmt;
use std::path::{Path, PathBuf};

use relib_core::{
    is_within_root, Action, DiffResult, PackageVersion, RecordSet, RemoteKind, Source,
    VersionConstraint,
};
use tracing::{debug, info};

use crate::error::RestoreError;

/// What preflight checks actions against.
#[derive(Debug, Clone, Copy)]
pub struct PreflightContext<'a> {
    pub intended: &'a RecordSet,
    pub current: &'a RecordSet,
    pub project_library: &'a Path,
    /// Version of the runtime packages will be installed for, when known.
    pub runtime_version: Option<&'a PackageVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightIssueKind {
    NotInManifest,
    UnknownSource,
    RuntimeMismatch {
        required: VersionConstraint,
        found: PackageVersion,
    },
    OutsideProjectLibrary {
        location: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightIssue {
    pub package: String,
    pub kind: PreflightIssueKind,
}

impl fmt::Display for PreflightIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PreflightIssueKind::NotInManifest => {
                write!(f, "{}: not declared in the lockfile", self.package)
            }
            PreflightIssueKind::UnknownSource => {
                write!(f, "{}: unknown source; cannot be retrieved", self.package)
            }
            PreflightIssueKind::RuntimeMismatch { required, found } => write!(
                f,
                "{}: requires R {required} but the runtime is {found}",
                self.package
            ),
            PreflightIssueKind::OutsideProjectLibrary { location: Some(path) } => write!(
                f,
                "{}: installed at {} outside the project library",
                self.package,
                path.display()
            ),
            PreflightIssueKind::OutsideProjectLibrary { location: None } => {
                write!(f, "{}: no installed location to remove", self.package)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreflightReport {
    pub checked: usize,
    pub issues: Vec<PreflightIssue>,
}

impl PreflightReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for PreflightReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .issues
            .iter()
            .map(|issue| format!("- {issue}"))
            .collect::<Vec<_>>();
        f.write_str(&lines.join("\n"))
    }
}

/// Checks that every action can be carried out. Nothing is mutated; any
/// issue rejects the whole restore.
pub fn preflight(
    actions: &DiffResult,
    context: &PreflightContext<'_>,
) -> Result<PreflightReport, RestoreError> {
    let mut report = PreflightReport {
        checked: actions.len(),
        issues: Vec::new(),
    };

    for (name, action) in actions.iter() {
        match action {
            Action::Install => check_install(name, context, &mut report.issues),
            Action::Remove => check_remove(name, context, &mut report.issues),
        }
    }

    if report.is_clean() {
        debug!(checked = report.checked, "preflight passed");
        Ok(report)
    } else {
        info!(issues = report.issues.len(), "preflight rejected restore");
        Err(RestoreError::PreflightRejected(report))
    }
}

fn check_install(name: &str, context: &PreflightContext<'_>, issues: &mut Vec<PreflightIssue>) {
    let issue = |kind| PreflightIssue {
        package: name.to_string(),
        kind,
    };

    let Some(record) = context.intended.get(name) else {
        issues.push(issue(PreflightIssueKind::NotInManifest));
        return;
    };

    if let Source::Remote(remote) = &record.source {
        if remote.kind == RemoteKind::Unknown {
            issues.push(issue(PreflightIssueKind::UnknownSource));
        }
    }

    if let (Some(required), Some(found)) = (&record.runtime, context.runtime_version) {
        if !required.matches(found) {
            issues.push(issue(PreflightIssueKind::RuntimeMismatch {
                required: required.clone(),
                found: found.clone(),
            }));
        }
    }
}

fn check_remove(name: &str, context: &PreflightContext<'_>, issues: &mut Vec<PreflightIssue>) {
    let location = context
        .current
        .get(name)
        .and_then(|record| record.location());
    match location {
        Some(path) if is_within_root(path, context.project_library) => {}
        other => issues.push(PreflightIssue {
            package: name.to_string(),
            kind: PreflightIssueKind::OutsideProjectLibrary {
                location: other.map(Path::to_path_buf),
            },
        }),
    }
}

/// Result of the confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Proceed,
    Abort,
}

/// Asks whether the computed actions should be applied.
pub trait Confirmer {
    fn confirm(&self, actions: &DiffResult) -> bool;
}

/// Approves everything without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _actions: &DiffResult) -> bool {
        true
    }
}

/// Consults `confirmer` only when `interactive` is set.
pub fn confirm(actions: &DiffResult, interactive: bool, confirmer: &dyn Confirmer) -> Confirmation {
    if !interactive || confirmer.confirm(actions) {
        Confirmation::Proceed
    } else {
        info!(actions = actions.len(), "restore declined");
        Confirmation::Abort
    }
}
