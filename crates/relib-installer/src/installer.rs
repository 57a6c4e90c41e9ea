use anyhow::{anyhow, Context, Result};
use relib_core::{
    parse_descriptor, render_source_fields, PackageRecord, RemoteKind, Source,
    DESCRIPTOR_FILE_NAME,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::fs_utils::{copy_dir_recursive, make_staging_dir, move_dir_or_copy, remove_path};
use crate::{InstallStatus, LibraryLayout, LocalRepositories};

/// Retrieves packages into a library, returning one status per record in
/// input order.
///
/// Failures are reported through [`InstallStatus::Failed`] so the caller can
/// keep going with unrelated packages.
pub trait Installer {
    fn install(&self, records: &[PackageRecord], library: &LibraryLayout) -> Vec<InstallStatus>;
}

/// Installs package builds copied out of local repositories.
///
/// Each build is staged under the library's staging directory, its
/// descriptor is stamped with the record's source fields, and the staged
/// directory then replaces `<library>/<name>`.
#[derive(Debug, Clone, Default)]
pub struct RepositoryInstaller {
    repositories: LocalRepositories,
}

impl RepositoryInstaller {
    pub fn new(repositories: LocalRepositories) -> Self {
        Self { repositories }
    }

    pub fn repositories(&self) -> &LocalRepositories {
        &self.repositories
    }

    fn install_one(&self, record: &PackageRecord, library: &LibraryLayout) -> InstallStatus {
        if let Source::Remote(remote) = &record.source {
            if remote.kind == RemoteKind::Unknown {
                return InstallStatus::failed(format!(
                    "'{}' has an unknown source and cannot be retrieved",
                    record.package
                ));
            }
        }

        let Some(source_dir) = self.repositories.locate(record) else {
            return InstallStatus::failed(format!(
                "{} was not found in any local repository",
                record.label()
            ));
        };
        debug!(package = %record.package, from = %source_dir.display(), "installing package");

        match self.install_from(record, &source_dir, library) {
            Ok(path) => {
                info!(package = %record.package, version = %record.version, "installed package");
                InstallStatus::Installed { path }
            }
            Err(err) => InstallStatus::failed(format!("{err:#}")),
        }
    }

    fn install_from(
        &self,
        record: &PackageRecord,
        source_dir: &Path,
        library: &LibraryLayout,
    ) -> Result<PathBuf> {
        library.ensure_root()?;
        let staging_root = library.staging_dir();
        let staged = make_staging_dir(&staging_root, &record.package)?;

        let result = stage_package(record, source_dir, &staged).and_then(|_| {
            let dst = library.package_dir(&record.package);
            if fs::symlink_metadata(&dst).is_ok() {
                remove_path(&dst).with_context(|| {
                    format!("failed to replace existing install: {}", dst.display())
                })?;
            }
            move_dir_or_copy(&staged, &dst)?;
            Ok(dst)
        });

        if staged.exists() {
            if let Err(err) = fs::remove_dir_all(&staged) {
                warn!(dir = %staged.display(), error = %err, "failed to clean staging dir");
            }
        }
        if fs::read_dir(&staging_root).is_ok_and(|mut entries| entries.next().is_none()) {
            if let Err(err) = fs::remove_dir(&staging_root) {
                debug!(dir = %staging_root.display(), error = %err, "failed to remove staging root");
            }
        }
        result
    }
}

impl Installer for RepositoryInstaller {
    fn install(&self, records: &[PackageRecord], library: &LibraryLayout) -> Vec<InstallStatus> {
        records
            .iter()
            .map(|record| self.install_one(record, library))
            .collect()
    }
}

fn stage_package(record: &PackageRecord, source_dir: &Path, staged: &Path) -> Result<()> {
    copy_dir_recursive(source_dir, staged)?;

    let descriptor_path = staged.join(DESCRIPTOR_FILE_NAME);
    let raw = fs::read_to_string(&descriptor_path)
        .with_context(|| format!("failed to read descriptor: {}", descriptor_path.display()))?;
    let found = parse_descriptor(&raw)
        .with_context(|| format!("failed to parse descriptor: {}", descriptor_path.display()))?;
    if found.package != record.package || found.version != record.version {
        return Err(anyhow!(
            "repository holds {} where {} was expected",
            found.label(),
            record.label()
        ));
    }

    fs::write(&descriptor_path, stamp_source_fields(&raw, &record.source))
        .with_context(|| format!("failed to write descriptor: {}", descriptor_path.display()))
}

/// Replaces every `Repository` and `Remote*` field in a descriptor with the
/// fields describing `source`.
pub(crate) fn stamp_source_fields(raw: &str, source: &Source) -> String {
    let mut payload = String::with_capacity(raw.len());
    let mut skipping = false;
    for line in raw.lines() {
        if line.starts_with([' ', '\t']) {
            if !skipping {
                payload.push_str(line);
                payload.push('\n');
            }
            continue;
        }
        let key = line.split_once(':').map(|(key, _)| key.trim());
        skipping = key.is_some_and(|key| key == "Repository" || key.starts_with("Remote"));
        if !skipping && !line.trim().is_empty() {
            payload.push_str(line);
            payload.push('\n');
        }
    }
    payload.push_str(&render_source_fields(source));
    payload
}
