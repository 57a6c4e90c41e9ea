use std::collections::{BTreeMap, BTreeSet};

use relib_core::{diff, Action, DiffResult, RecordSet};
use relib_installer::{
    remove_package, InstallStatus, Installer, LibraryLayout, PostInstallHook, SnapshotProducer,
};
use relib_resolver::{install_order, Resolution, ResolutionSession, Resolver};
use tracing::{debug, info, warn};

use crate::error::RestoreError;
use crate::report::{InstallOutcome, InstallReport};

/// Observes install progress. Every method has a no-op default.
pub trait RestoreObserver {
    fn batch_started(&self, _total: usize) {}
    fn package_finished(&self, _name: &str, _outcome: &InstallOutcome) {}
    fn batch_finished(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl RestoreObserver for Silent {}

/// Applies approved actions to the project library.
pub struct Orchestrator<'a> {
    resolver: Resolver<'a>,
    installer: &'a dyn Installer,
    snapshot: &'a dyn SnapshotProducer,
    hook: &'a dyn PostInstallHook,
    observer: &'a dyn RestoreObserver,
    project_library: LibraryLayout,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        resolver: Resolver<'a>,
        installer: &'a dyn Installer,
        snapshot: &'a dyn SnapshotProducer,
        hook: &'a dyn PostInstallHook,
        project_library: LibraryLayout,
    ) -> Self {
        Self {
            resolver,
            installer,
            snapshot,
            hook,
            observer: &Silent,
            project_library,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn RestoreObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Removes first, then resolves and installs dependency-first. Install
    /// failures are collected and fail every dependent in the batch; only
    /// removal and snapshot failures abort.
    pub fn apply(
        &self,
        session: &mut ResolutionSession,
        actions: &DiffResult,
        current: &RecordSet,
    ) -> Result<InstallReport, RestoreError> {
        let mut report = InstallReport::default();

        for name in actions.names_with(Action::Remove) {
            if let Some(record) = current.get(&name) {
                debug!(package = %record.label(), "removing package");
            }
            let removed = remove_package(&self.project_library, &name).map_err(|source| {
                RestoreError::Removal {
                    package: name.clone(),
                    source,
                }
            })?;
            report.removed.push(removed);
        }

        let requested = actions.names_with(Action::Install);
        if !requested.is_empty() {
            let resolution = self.resolver.resolve(session, &requested);
            self.install_batch(&resolution, &mut report);
            report.satisfied = resolution.satisfied;
            report.conflicts = resolution.conflicts;
        }

        report.repairs = self.detect_repairs(session.intended(), current, &report)?;

        self.hook.installed(&report.installed_names());
        Ok(report)
    }

    fn install_batch(&self, resolution: &Resolution, report: &mut InstallReport) {
        let order = install_order(&resolution.installable);
        self.observer
            .batch_started(order.len() + resolution.unavailable.len());

        let mut failed: BTreeSet<String> = BTreeSet::new();

        for name in &resolution.unavailable {
            warn!(package = %name, "no record available; cannot install");
            self.finish(report, &mut failed, name, InstallOutcome::Unavailable);
        }

        let conflicts = resolution
            .conflicts
            .iter()
            .map(|conflict| (conflict.package.as_str(), conflict))
            .collect::<BTreeMap<_, _>>();

        for name in order {
            let Some(record) = resolution.installable.get(&name) else {
                continue;
            };

            if let Some(conflict) = conflicts.get(name.as_str()) {
                self.finish(
                    report,
                    &mut failed,
                    &name,
                    InstallOutcome::ConflictingRequirement((*conflict).clone()),
                );
                continue;
            }

            let failed_dependency = record
                .requirements
                .iter()
                .find(|requirement| failed.contains(&requirement.name))
                .map(|requirement| requirement.name.clone());
            if let Some(dependency) = failed_dependency {
                info!(package = %name, dependency = %dependency, "skipping package; dependency failed");
                self.finish(
                    report,
                    &mut failed,
                    &name,
                    InstallOutcome::FailedByCascade { dependency },
                );
                continue;
            }

            let status = self
                .installer
                .install(std::slice::from_ref(record), &self.project_library)
                .into_iter()
                .next()
                .unwrap_or_else(|| InstallStatus::failed("installer reported no status"));
            let outcome = match status {
                InstallStatus::Installed { path } => InstallOutcome::Installed { path },
                InstallStatus::Failed { reason } => {
                    warn!(package = %name, reason = %reason, "install failed");
                    InstallOutcome::Failed { reason }
                }
            };
            self.finish(report, &mut failed, &name, outcome);
        }

        self.observer.batch_finished();
    }

    fn finish(
        &self,
        report: &mut InstallReport,
        failed: &mut BTreeSet<String>,
        name: &str,
        outcome: InstallOutcome,
    ) {
        if !outcome.is_installed() {
            failed.insert(name.to_string());
        }
        self.observer.package_finished(name, &outcome);
        report.outcomes.push((name.to_string(), outcome));
    }

    /// Diffs the lockfile against the project library after the batch. Any
    /// non-removal entry for a package the batch touched means the library
    /// drifted from the lockfile. Packages unchanged since `before` are left
    /// out.
    fn detect_repairs(
        &self,
        intended: &RecordSet,
        before: &RecordSet,
        report: &InstallReport,
    ) -> Result<DiffResult, RestoreError> {
        if report.outcomes.is_empty() {
            return Ok(DiffResult::new());
        }

        let installed = self
            .snapshot
            .snapshot(&[self.project_library.root().to_path_buf()])
            .map_err(RestoreError::Snapshot)?;
        let mut repairs = diff(intended, &installed);
        repairs.retain(|name, action| {
            if action == Action::Remove {
                return false;
            }
            let unchanged = match (before.get(name), installed.get(name)) {
                (Some(old), Some(new)) => old.same_identity(new) && old.location == new.location,
                _ => false,
            };
            !unchanged
        });

        if !repairs.is_empty() {
            warn!(
                packages = %repairs.names_with(Action::Install).join(", "),
                "installed packages differ from the lockfile; consider refreshing the lockfile"
            );
        }
        Ok(repairs)
    }
}
