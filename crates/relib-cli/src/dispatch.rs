use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use relib_core::{DcfDescriptorReader, PackageVersion};
use relib_installer::{LibrarySnapshot, RepositoryInstaller, SnapshotProducer};
use relib_resolver::RebuildSet;
use relib_restore::{
    load_lockfile, ManifestSource, RestoreConfig, RestoreOptions, RestoreOutcome, Restorer,
};

use crate::prompt::StdinConfirmer;
use crate::render::{
    format_action_lines, format_install_report_lines, format_library_lines, ProgressObserver,
    TerminalRenderer,
};
use crate::{PlanArgs, RestoreArgs};

/// Config file values, with command-line flags layered on top.
pub(crate) fn plan_options(project_root: &Path, args: &PlanArgs) -> Result<RestoreOptions> {
    let config = RestoreConfig::load(project_root)?;
    let mut options = RestoreOptions::from_config(project_root, &config);

    if let Some(lockfile) = &args.lockfile {
        options.manifest = ManifestSource::Path(project_root.join(lockfile));
    }
    if !args.library.is_empty() {
        options.library_paths = resolve_paths(project_root, &args.library);
    }
    options.repos.extend(args.repo.iter().cloned());
    options.clean |= args.clean;
    options.exclude.extend(args.exclude.iter().cloned());
    options.packages = args.packages.clone();
    Ok(options)
}

pub(crate) fn restore_options(project_root: &Path, args: &RestoreArgs) -> Result<RestoreOptions> {
    let mut options = plan_options(project_root, &args.plan)?;
    options.prompt |= args.prompt;
    if args.no_recursive {
        options.recursive = false;
    }
    options.rebuild = RebuildSet::from_names(args.rebuild.iter().cloned());
    options.runtime_version = args
        .runtime_version
        .as_deref()
        .map(PackageVersion::parse)
        .transpose()
        .context("invalid --runtime-version")?;
    Ok(options)
}

pub(crate) fn run_restore(
    project_root: &Path,
    args: &RestoreArgs,
    renderer: TerminalRenderer,
) -> Result<()> {
    let options = restore_options(project_root, args)?;
    let lockfile = load_lockfile(&options.manifest)?;
    let repositories = options.repositories(&lockfile);
    if repositories.is_empty() {
        tracing::warn!("no local repositories configured; only satisfied packages can be restored");
    }

    let installer = RepositoryInstaller::new(repositories.clone());
    let snapshot = LibrarySnapshot::new(&DcfDescriptorReader);
    let confirmer = StdinConfirmer::new(renderer);
    let observer = ProgressObserver::new(renderer);
    let mut restorer = Restorer::new(&snapshot, &installer, &repositories)
        .with_confirmer(&confirmer)
        .with_observer(&observer);

    match restorer.restore(&options)? {
        RestoreOutcome::Synchronized => {
            renderer.print_status("ok", "library is synchronized with the lockfile");
            Ok(())
        }
        RestoreOutcome::Aborted { .. } => {
            renderer.print_status("warn", "restore aborted; no changes were made");
            Ok(())
        }
        RestoreOutcome::Restored(report) => {
            renderer.print_section("restore");
            renderer.print_lines(&format_install_report_lines(
                &report.install,
                renderer.style(),
            ));
            let failed = report.install.failed_names();
            if !failed.is_empty() {
                bail!(
                    "{} package(s) failed to install: {}",
                    failed.len(),
                    failed.join(", ")
                );
            }
            Ok(())
        }
    }
}

pub(crate) fn run_status(
    project_root: &Path,
    args: &PlanArgs,
    renderer: TerminalRenderer,
) -> Result<()> {
    let options = plan_options(project_root, args)?;
    let lockfile = load_lockfile(&options.manifest)?;
    let repositories = options.repositories(&lockfile);
    let installer = RepositoryInstaller::new(repositories.clone());
    let snapshot = LibrarySnapshot::new(&DcfDescriptorReader);
    let restorer = Restorer::new(&snapshot, &installer, &repositories);

    let plan = restorer.plan(&options)?;
    if plan.actions.is_empty() {
        renderer.print_status("ok", "library is synchronized with the lockfile");
        return Ok(());
    }
    renderer.print_section("pending actions");
    renderer.print_lines(&format_action_lines(&plan.actions, renderer.style()));
    Ok(())
}

pub(crate) fn run_library(
    project_root: &Path,
    library: &[PathBuf],
    renderer: TerminalRenderer,
) -> Result<()> {
    let libraries = if library.is_empty() {
        RestoreConfig::load(project_root)?.library_paths(project_root)
    } else {
        resolve_paths(project_root, library)
    };
    let installed = LibrarySnapshot::new(&DcfDescriptorReader).snapshot(&libraries)?;
    if installed.is_empty() {
        renderer.print_status("info", "no packages installed");
        return Ok(());
    }
    renderer.print_lines(&format_library_lines(&installed));
    Ok(())
}

fn resolve_paths(project_root: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    paths.iter().map(|path| project_root.join(path)).collect()
}
