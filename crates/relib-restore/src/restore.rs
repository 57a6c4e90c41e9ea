use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use relib_core::{
    diff, Action, DcfDescriptorReader, DescriptorReader, DiffFilter, DiffResult, Lockfile,
    PackageVersion, RecordSet,
};
use relib_installer::{
    Installer, LibraryLayout, LocalRepositories, LogHook, PostInstallHook, SnapshotProducer,
};
use relib_resolver::{PackageCatalog, RebuildSet, ResolutionSession, Resolver, SessionConfig};
use tracing::{debug, info};

use crate::config::RestoreConfig;
use crate::error::RestoreError;
use crate::orchestrator::{Orchestrator, RestoreObserver, Silent};
use crate::policy::{apply_policy, ActionPolicy, KeepAll};
use crate::preflight::{confirm, preflight, AssumeYes, Confirmation, Confirmer, PreflightContext};
use crate::report::{RestoreOutcome, RestoreReport};

/// Where the lockfile comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Path(PathBuf),
    Lockfile(Lockfile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOptions {
    pub project: String,
    pub project_root: PathBuf,
    /// Library search paths; the first is the project library and the only
    /// one ever written to.
    pub library_paths: Vec<PathBuf>,
    pub manifest: ManifestSource,
    /// Repository name to location, overriding the lockfile's repositories.
    pub repos: BTreeMap<String, String>,
    pub clean: bool,
    pub prompt: bool,
    /// Restrict the restore to these names; each is an explicit request.
    pub packages: Vec<String>,
    pub exclude: Vec<String>,
    pub rebuild: RebuildSet,
    pub recursive: bool,
    pub runtime_version: Option<PackageVersion>,
}

impl RestoreOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self::from_config(project_root, &RestoreConfig::default())
    }

    pub fn from_config(project_root: impl Into<PathBuf>, config: &RestoreConfig) -> Self {
        let project_root = project_root.into();
        let project = project_root
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("project")
            .to_string();
        Self {
            project,
            library_paths: config.library_paths(&project_root),
            manifest: ManifestSource::Path(config.lockfile_path(&project_root)),
            repos: config.repos.clone(),
            clean: config.clean,
            prompt: config.prompt,
            packages: Vec::new(),
            exclude: config.ignored.clone(),
            rebuild: RebuildSet::None,
            recursive: config.recursive,
            runtime_version: None,
            project_root,
        }
    }

    pub fn project_library(&self) -> Option<&Path> {
        self.library_paths.first().map(PathBuf::as_path)
    }

    /// Local repositories from the lockfile, with overrides applied on top.
    /// Relative override paths are resolved against the project root.
    pub fn repositories(&self, lockfile: &Lockfile) -> LocalRepositories {
        let mut repositories = LocalRepositories::new();
        if let Some(runtime) = &lockfile.runtime {
            for repository in &runtime.repositories {
                repositories.add_location(&repository.name, &repository.url);
            }
        }
        for (name, location) in &self.repos {
            if location.contains("://") {
                repositories.add_location(name, location);
            } else {
                repositories.add(name.clone(), self.project_root.join(location));
            }
        }
        repositories
    }
}

pub fn load_lockfile(source: &ManifestSource) -> Result<Lockfile, RestoreError> {
    match source {
        ManifestSource::Path(path) => {
            Lockfile::from_path(path).map_err(|source| RestoreError::ManifestRead {
                path: path.clone(),
                source,
            })
        }
        ManifestSource::Lockfile(lockfile) => Ok(lockfile.clone()),
    }
}

/// The filtered actions for a restore, before anything is applied.
#[derive(Debug, Clone)]
pub struct RestorePlan {
    pub lockfile: Lockfile,
    pub intended: RecordSet,
    pub current: RecordSet,
    pub actions: DiffResult,
}

/// Entry point for restores. Collaborators are borrowed; the defaults for
/// the optional ones never prompt and only log.
pub struct Restorer<'a> {
    snapshot: &'a dyn SnapshotProducer,
    installer: &'a dyn Installer,
    catalog: &'a dyn PackageCatalog,
    reader: &'a dyn DescriptorReader,
    confirmer: &'a dyn Confirmer,
    policy: &'a dyn ActionPolicy,
    hook: &'a dyn PostInstallHook,
    observer: &'a dyn RestoreObserver,
}

impl<'a> Restorer<'a> {
    pub fn new(
        snapshot: &'a dyn SnapshotProducer,
        installer: &'a dyn Installer,
        catalog: &'a dyn PackageCatalog,
    ) -> Self {
        Self {
            snapshot,
            installer,
            catalog,
            reader: &DcfDescriptorReader,
            confirmer: &AssumeYes,
            policy: &KeepAll,
            hook: &LogHook,
            observer: &Silent,
        }
    }

    pub fn with_reader(mut self, reader: &'a dyn DescriptorReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_confirmer(mut self, confirmer: &'a dyn Confirmer) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn with_policy(mut self, policy: &'a dyn ActionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_hook(mut self, hook: &'a dyn PostInstallHook) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn RestoreObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Reads the lockfile and libraries and computes the filtered actions.
    pub fn plan(&self, options: &RestoreOptions) -> Result<RestorePlan, RestoreError> {
        let project_library = require_project_library(options)?;
        let lockfile = load_lockfile(&options.manifest)?;
        let intended = lockfile
            .records()
            .map_err(|source| RestoreError::ManifestRead {
                path: manifest_path(&options.manifest),
                source,
            })?;
        let current = self
            .snapshot
            .snapshot(&options.library_paths)
            .map_err(RestoreError::Snapshot)?;

        let mut desired = intended.clone();
        let raw = if options.packages.is_empty() {
            diff(&current, &desired)
        } else {
            let scope = options.packages.iter().cloned().collect::<BTreeSet<_>>();
            desired.retain(|name| scope.contains(name));
            let mut scoped = diff(&current, &desired);
            scoped.retain(|name, _| scope.contains(name));
            for name in &options.packages {
                scoped.insert(name.as_str(), Action::Install);
            }
            scoped
        };

        let filtered = DiffFilter::new(project_library)
            .clean(options.clean)
            .ignore(options.exclude.iter().cloned())
            .apply(raw, &current);
        let actions = apply_policy(self.policy, &filtered);
        debug!(actions = actions.len(), "restore plan computed");

        Ok(RestorePlan {
            lockfile,
            intended,
            current,
            actions,
        })
    }

    /// Brings the project library in line with the lockfile.
    ///
    /// Preflight and confirmation run before any mutation. The resolution
    /// session lives only for the duration of this call.
    pub fn restore(&mut self, options: &RestoreOptions) -> Result<RestoreOutcome, RestoreError> {
        let plan = self.plan(options)?;
        if plan.actions.is_empty() {
            info!(project = %options.project, "library is already synchronized");
            return Ok(RestoreOutcome::Synchronized);
        }

        let project_library = require_project_library(options)?;
        preflight(
            &plan.actions,
            &PreflightContext {
                intended: &plan.intended,
                current: &plan.current,
                project_library,
                runtime_version: options.runtime_version.as_ref(),
            },
        )?;

        if confirm(&plan.actions, options.prompt, self.confirmer) == Confirmation::Abort {
            return Ok(RestoreOutcome::Aborted { diff: plan.actions });
        }

        let mut session = ResolutionSession::begin(SessionConfig {
            project: options.project.clone(),
            intended: plan.intended.clone(),
            explicit: options.packages.iter().cloned().collect(),
            rebuild: options.rebuild.clone(),
            recursive: options.recursive,
        });
        let orchestrator = Orchestrator::new(
            Resolver::new(self.reader, self.catalog, &options.library_paths),
            self.installer,
            self.snapshot,
            self.hook,
            LibraryLayout::new(project_library),
        )
        .with_observer(self.observer);
        let install = orchestrator.apply(&mut session, &plan.actions, &plan.current)?;
        session.end();

        info!(
            project = %options.project,
            installed = install.installed_names().len(),
            failed = install.failed_names().len(),
            removed = install.removed.len(),
            "restore finished"
        );
        Ok(RestoreOutcome::Restored(RestoreReport {
            actions: plan.actions,
            install,
        }))
    }
}

fn require_project_library(options: &RestoreOptions) -> Result<&Path, RestoreError> {
    options
        .project_library()
        .ok_or_else(|| RestoreError::Other(anyhow!("no library paths configured")))
}

fn manifest_path(source: &ManifestSource) -> PathBuf {
    match source {
        ManifestSource::Path(path) => path.clone(),
        ManifestSource::Lockfile(_) => PathBuf::from("<in-memory lockfile>"),
    }
}
