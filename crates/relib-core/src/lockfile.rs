use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::record::{
    validate_package_name, PackageRecord, RemoteKind, RemoteSource, Requirement, Source,
};
use crate::descriptor::RUNTIME_PACKAGE;
use crate::record_set::RecordSet;
use crate::version::PackageVersion;

pub const DEFAULT_LOCKFILE_NAME: &str = "renv.lock";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lockfile {
    #[serde(rename = "R", default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<LockfileRuntime>,
    #[serde(rename = "Packages", default)]
    pub packages: BTreeMap<String, LockfileRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockfileRuntime {
    #[serde(rename = "Version")]
    pub version: Option<String>,
    #[serde(rename = "Repositories", default)]
    pub repositories: Vec<LockfileRepository>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockfileRepository {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct LockfileRecord {
    pub package: String,
    pub version: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub remote_type: Option<String>,
    #[serde(default)]
    pub remote_host: Option<String>,
    #[serde(default)]
    pub remote_username: Option<String>,
    #[serde(default)]
    pub remote_repo: Option<String>,
    #[serde(default)]
    pub remote_subdir: Option<String>,
    #[serde(default)]
    pub remote_ref: Option<String>,
    #[serde(default)]
    pub remote_sha: Option<String>,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl Lockfile {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let lockfile: Self = serde_json::from_str(input).context("failed to parse lockfile")?;
        for (key, record) in &lockfile.packages {
            if key != &record.package {
                return Err(anyhow!(
                    "lockfile entry '{key}' declares package '{}'",
                    record.package
                ));
            }
            validate_package_name(key)?;
            PackageVersion::parse(&record.version)
                .with_context(|| format!("invalid version for package '{key}'"))?;
        }
        Ok(lockfile)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read lockfile: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("invalid lockfile: {}", path.display()))
    }

    /// Runtime version the lockfile was produced with, when recorded.
    pub fn runtime_version(&self) -> anyhow::Result<Option<PackageVersion>> {
        self.runtime
            .as_ref()
            .and_then(|runtime| runtime.version.as_deref())
            .map(PackageVersion::parse)
            .transpose()
    }

    pub fn records(&self) -> anyhow::Result<RecordSet> {
        self.packages
            .values()
            .map(|entry| {
                entry
                    .to_record()
                    .with_context(|| format!("invalid lockfile record '{}'", entry.package))
            })
            .collect()
    }
}

impl LockfileRecord {
    /// Converts to a record. An `R (>= x)` requirement becomes the runtime
    /// constraint rather than a package dependency.
    pub fn to_record(&self) -> anyhow::Result<PackageRecord> {
        let mut requirements = Vec::with_capacity(self.requirements.len());
        let mut runtime = None;
        for raw in &self.requirements {
            let requirement = Requirement::parse(raw)?;
            if requirement.name == RUNTIME_PACKAGE {
                runtime = requirement.constraint;
            } else {
                requirements.push(requirement);
            }
        }

        let mut record = PackageRecord::new(&self.package, &self.version, self.source())
            .with_requirements(requirements);
        record.runtime = runtime;
        Ok(record)
    }

    fn source(&self) -> Source {
        let token = self
            .source
            .as_deref()
            .or(self.remote_type.as_deref())
            .unwrap_or("Repository");

        match token {
            "Repository" | "CRAN" | "Bioconductor" | "standard" => Source::Repository {
                repository: self.repository.clone().or_else(|| {
                    (token == "CRAN" || token == "Bioconductor").then(|| token.to_string())
                }),
            },
            other => Source::Remote(RemoteSource {
                kind: RemoteKind::parse_token(other),
                host: self.remote_host.clone(),
                username: self.remote_username.clone(),
                repo: self.remote_repo.clone(),
                subdir: self.remote_subdir.clone(),
                reference: self.remote_ref.clone(),
                sha: self.remote_sha.clone(),
                url: self.remote_url.clone(),
            }),
        }
    }
}
