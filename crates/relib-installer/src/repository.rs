use relib_core::{
    DcfDescriptorReader, DescriptorReader, PackageRecord, PackageVersion, RemoteKind, Source,
};
use relib_resolver::PackageCatalog;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A package repository laid out on disk as `<root>/<name>/<version>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepository {
    pub name: String,
    pub root: PathBuf,
}

/// Local repositories in priority order.
#[derive(Debug, Clone, Default)]
pub struct LocalRepositories {
    repositories: Vec<LocalRepository>,
}

impl LocalRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a repository, replacing an earlier one with the same name.
    pub fn with_repository(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.add(name, root);
        self
    }

    pub fn add(&mut self, name: impl Into<String>, root: impl Into<PathBuf>) {
        let name = name.into();
        let root = root.into();
        match self.repositories.iter_mut().find(|repo| repo.name == name) {
            Some(existing) => existing.root = root,
            None => self.repositories.push(LocalRepository { name, root }),
        }
    }

    /// Adds a repository given as a path or `file://` location. Network
    /// locations cannot be served locally and are skipped.
    pub fn add_location(&mut self, name: &str, location: &str) -> bool {
        match local_path(location) {
            Some(root) => {
                self.add(name, root);
                true
            }
            None => {
                debug!(repository = name, location, "not a local repository; skipping");
                false
            }
        }
    }

    pub fn repositories(&self) -> &[LocalRepository] {
        &self.repositories
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Finds the directory holding the exact build `record` describes.
    pub fn locate(&self, record: &PackageRecord) -> Option<PathBuf> {
        match &record.source {
            Source::Repository { repository } => {
                let preferred = repository.as_deref();
                let ordered = self
                    .repositories
                    .iter()
                    .filter(|repo| Some(repo.name.as_str()) == preferred)
                    .chain(
                        self.repositories
                            .iter()
                            .filter(|repo| Some(repo.name.as_str()) != preferred),
                    );
                for repo in ordered {
                    let candidate = repo.root.join(&record.package).join(&record.version);
                    if candidate.is_dir() {
                        return Some(candidate);
                    }
                }
                None
            }
            Source::Remote(remote) => {
                if remote.kind == RemoteKind::Unknown {
                    return None;
                }
                if remote.kind == RemoteKind::Local {
                    if let Some(path) = remote.url.as_deref().and_then(local_path) {
                        if path.is_dir() {
                            return Some(path);
                        }
                    }
                }
                let keys = remote
                    .sha
                    .iter()
                    .map(String::as_str)
                    .chain(std::iter::once(record.version.as_str()))
                    .collect::<Vec<_>>();
                for key in keys {
                    for repo in &self.repositories {
                        let candidate = repo.root.join(&record.package).join(key);
                        if candidate.is_dir() {
                            return Some(candidate);
                        }
                    }
                }
                None
            }
        }
    }

    fn versions_in(&self, repo: &LocalRepository, name: &str) -> Vec<(PackageVersion, PackageRecord)> {
        let package_root = repo.root.join(name);
        let Ok(entries) = fs::read_dir(&package_root) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let record = match DcfDescriptorReader.read(&path) {
                Ok(record) if record.package == name => record,
                Ok(_) => continue,
                Err(err) => {
                    debug!(dir = %path.display(), error = %format!("{err:#}"), "skipping repository entry");
                    continue;
                }
            };
            if let Ok(version) = PackageVersion::parse(&record.version) {
                found.push((version, record));
            }
        }
        found
    }
}

impl PackageCatalog for LocalRepositories {
    /// The highest version of `name` across all repositories. Earlier
    /// repositories win ties.
    fn lookup(&self, name: &str) -> Option<PackageRecord> {
        let mut best: Option<(PackageVersion, PackageRecord)> = None;
        for repo in &self.repositories {
            for (version, mut record) in self.versions_in(repo, name) {
                if best
                    .as_ref()
                    .is_some_and(|(current, _)| &version <= current)
                {
                    continue;
                }
                record.source = Source::repository(repo.name.clone());
                record.location = None;
                best = Some((version, record));
            }
        }
        best.map(|(_, record)| record)
    }
}

fn local_path(location: &str) -> Option<PathBuf> {
    if let Some(rest) = location.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if location.contains("://") {
        return None;
    }
    Some(Path::new(location).to_path_buf())
}
