//! `DESCRIPTION` files: the `Key: value` metadata stored inside every
//! installed package directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};

use crate::record::{PackageRecord, RemoteKind, RemoteSource, Requirement, Source};
use crate::version::PackageVersion;

pub const DESCRIPTOR_FILE_NAME: &str = "DESCRIPTION";

/// Name under which dependency fields refer to the runtime itself.
pub const RUNTIME_PACKAGE: &str = "R";

/// Packages bundled with the runtime; they never need installing.
pub const BUNDLED_PACKAGES: &[&str] = &[
    "base",
    "compiler",
    "datasets",
    "grDevices",
    "graphics",
    "grid",
    "methods",
    "parallel",
    "splines",
    "stats",
    "stats4",
    "tcltk",
    "tools",
    "utils",
];

/// True for the runtime itself and for packages shipped with it.
pub fn is_bundled_package(name: &str) -> bool {
    name == RUNTIME_PACKAGE || BUNDLED_PACKAGES.contains(&name)
}

const DEPENDENCY_FIELDS: [&str; 3] = ["Depends", "Imports", "LinkingTo"];

/// Reads the descriptor of one installed package directory.
pub trait DescriptorReader {
    fn read(&self, package_dir: &Path) -> anyhow::Result<PackageRecord>;
}

/// Reads `<package_dir>/DESCRIPTION` from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcfDescriptorReader;

impl DescriptorReader for DcfDescriptorReader {
    fn read(&self, package_dir: &Path) -> anyhow::Result<PackageRecord> {
        let path = package_dir.join(DESCRIPTOR_FILE_NAME);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read descriptor: {}", path.display()))?;
        let record = parse_descriptor(&raw)
            .with_context(|| format!("failed to parse descriptor: {}", path.display()))?;
        Ok(record.with_location(package_dir))
    }
}

/// Splits a DCF document into fields. Indented lines continue the previous
/// field; blank lines are skipped.
pub fn parse_fields(raw: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut last_key: Option<String> = None;

    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            let key = last_key
                .as_ref()
                .ok_or_else(|| anyhow!("line {} continues a missing field", index + 1))?;
            if let Some(value) = fields.get_mut(key) {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            return Err(anyhow!("line {} is not a 'Key: value' field", index + 1));
        };
        let key = key.trim().to_string();
        fields.insert(key.clone(), value.trim().to_string());
        last_key = Some(key);
    }

    Ok(fields)
}

pub fn parse_descriptor(raw: &str) -> anyhow::Result<PackageRecord> {
    let fields = parse_fields(raw)?;
    let package = fields
        .get("Package")
        .filter(|value| !value.is_empty())
        .context("descriptor is missing Package")?;
    let version = fields
        .get("Version")
        .filter(|value| !value.is_empty())
        .context("descriptor is missing Version")?;
    PackageVersion::parse(version)
        .with_context(|| format!("descriptor for '{package}' has an invalid Version"))?;

    let mut requirements = Vec::new();
    let mut runtime = None;
    for field in DEPENDENCY_FIELDS {
        let Some(value) = fields.get(field) else {
            continue;
        };
        for entry in value.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let requirement = Requirement::parse(entry)
                .with_context(|| format!("invalid {field} entry for '{package}'"))?;
            if requirement.name == RUNTIME_PACKAGE {
                runtime = requirement.constraint;
                continue;
            }
            if BUNDLED_PACKAGES.contains(&requirement.name.as_str()) {
                continue;
            }
            if !requirements
                .iter()
                .any(|existing: &Requirement| existing == &requirement)
            {
                requirements.push(requirement);
            }
        }
    }

    let mut record = PackageRecord::new(package, version, descriptor_source(&fields))
        .with_requirements(requirements);
    record.runtime = runtime;
    Ok(record)
}

fn descriptor_source(fields: &BTreeMap<String, String>) -> Source {
    let field = |name: &str| fields.get(name).cloned();
    match fields.get("RemoteType").map(String::as_str) {
        None | Some("standard") => match field("Repository") {
            Some(repository) => Source::Repository {
                repository: Some(repository),
            },
            None if fields.contains_key("RemoteType") => Source::Repository { repository: None },
            None => Source::Remote(RemoteSource::new(RemoteKind::Unknown)),
        },
        Some(kind) => Source::Remote(RemoteSource {
            kind: RemoteKind::parse_token(kind),
            host: field("RemoteHost"),
            username: field("RemoteUsername"),
            repo: field("RemoteRepo"),
            subdir: field("RemoteSubdir"),
            reference: field("RemoteRef"),
            sha: field("RemoteSha"),
            url: field("RemoteUrl"),
        }),
    }
}

/// Renders the identity and dependency fields of `record` as a descriptor.
pub fn render_descriptor(record: &PackageRecord) -> String {
    let mut payload = String::new();
    payload.push_str(&format!("Package: {}\n", record.package));
    payload.push_str(&format!("Version: {}\n", record.version));

    let mut depends = Vec::new();
    if let Some(runtime) = &record.runtime {
        depends.push(format!("{RUNTIME_PACKAGE} ({runtime})"));
    }
    if !depends.is_empty() {
        payload.push_str(&format!("Depends: {}\n", depends.join(", ")));
    }
    if !record.requirements.is_empty() {
        let imports = record
            .requirements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        payload.push_str(&format!("Imports: {}\n", imports.join(", ")));
    }

    payload.push_str(&render_source_fields(&record.source));
    payload
}

/// The `Repository` or `Remote*` fields describing `source`.
pub fn render_source_fields(source: &Source) -> String {
    let mut payload = String::new();
    match source {
        Source::Repository { repository } => {
            if let Some(repository) = repository {
                payload.push_str(&format!("Repository: {repository}\n"));
            } else {
                payload.push_str("RemoteType: standard\n");
            }
        }
        Source::Remote(remote) => {
            if remote.kind == RemoteKind::Unknown {
                return payload;
            }
            payload.push_str(&format!("RemoteType: {}\n", remote.kind.as_str().to_lowercase()));
            let optional = [
                ("RemoteHost", &remote.host),
                ("RemoteUsername", &remote.username),
                ("RemoteRepo", &remote.repo),
                ("RemoteSubdir", &remote.subdir),
                ("RemoteRef", &remote.reference),
                ("RemoteSha", &remote.sha),
                ("RemoteUrl", &remote.url),
            ];
            for (key, value) in optional {
                if let Some(value) = value {
                    payload.push_str(&format!("{key}: {value}\n"));
                }
            }
        }
    }
    payload
}
