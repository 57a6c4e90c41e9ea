use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::version::VersionConstraint;

/// Where a package comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A CRAN-like package repository, optionally naming which one.
    Repository { repository: Option<String> },
    Remote(RemoteSource),
}

impl Source {
    pub fn repository(name: impl Into<String>) -> Self {
        Self::Repository {
            repository: Some(name.into()),
        }
    }

    pub fn is_repository(&self) -> bool {
        matches!(self, Self::Repository { .. })
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Repository { .. } => "Repository",
            Self::Remote(remote) => remote.kind.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteKind {
    GitHub,
    GitLab,
    Bitbucket,
    Git,
    Url,
    Local,
    Unknown,
}

impl RemoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "GitHub",
            Self::GitLab => "GitLab",
            Self::Bitbucket => "Bitbucket",
            Self::Git => "git",
            Self::Url => "URL",
            Self::Local => "Local",
            Self::Unknown => "unknown",
        }
    }

    /// Maps both lockfile `Source` values and descriptor `RemoteType` values.
    pub fn parse_token(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "github" => Self::GitHub,
            "gitlab" => Self::GitLab,
            "bitbucket" => Self::Bitbucket,
            "git" | "git2r" | "xgit" => Self::Git,
            "url" => Self::Url,
            "local" => Self::Local,
            _ => Self::Unknown,
        }
    }
}

/// Identity fields of a non-repository source. Every field takes part in
/// record identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSource {
    pub kind: RemoteKind,
    pub host: Option<String>,
    pub username: Option<String>,
    pub repo: Option<String>,
    pub subdir: Option<String>,
    pub reference: Option<String>,
    pub sha: Option<String>,
    pub url: Option<String>,
}

impl RemoteSource {
    pub fn new(kind: RemoteKind) -> Self {
        Self {
            kind,
            host: None,
            username: None,
            repo: None,
            subdir: None,
            reference: None,
            sha: None,
            url: None,
        }
    }
}

/// A dependency edge declared by a record: `name` plus an optional version
/// constraint, written `name (>= 1.0)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    pub name: String,
    pub constraint: Option<VersionConstraint>,
}

impl Requirement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let trimmed = input.trim();
        let Some((name, rest)) = trimmed.split_once('(') else {
            let name = trimmed.to_string();
            validate_package_name(&name)?;
            return Ok(Self::new(name));
        };

        let name = name.trim().to_string();
        validate_package_name(&name)?;
        let constraint_text = rest
            .strip_suffix(')')
            .ok_or_else(|| anyhow!("unterminated constraint in requirement '{trimmed}'"))?;
        let constraint = VersionConstraint::parse(constraint_text)
            .with_context(|| format!("invalid requirement '{trimmed}'"))?;
        Ok(Self {
            name,
            constraint: Some(constraint),
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(constraint) => write!(f, "{} ({constraint})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One package as declared in a manifest or observed in a library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub package: String,
    pub version: String,
    pub source: Source,
    pub requirements: Vec<Requirement>,
    /// Constraint on the language runtime itself, such as `>= 4.1`.
    pub runtime: Option<VersionConstraint>,
    /// Directory the record was read from; never part of identity.
    pub location: Option<PathBuf>,
}

impl PackageRecord {
    pub fn new(package: impl Into<String>, version: impl Into<String>, source: Source) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            source,
            requirements: Vec::new(),
            runtime: None,
            location: None,
        }
    }

    pub fn with_requirements(mut self, requirements: Vec<Requirement>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Identity equality used by the diff and by installed-package matching.
    ///
    /// Two repository records are the same package when name and version
    /// agree. Any other pairing must also agree on the source kind and every
    /// remote identity field.
    pub fn same_identity(&self, other: &PackageRecord) -> bool {
        if self.package != other.package || self.version != other.version {
            return false;
        }
        match (&self.source, &other.source) {
            (Source::Repository { .. }, Source::Repository { .. }) => true,
            (Source::Remote(left), Source::Remote(right)) => left == right,
            _ => false,
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.package, self.version)
    }
}

pub(crate) fn validate_package_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        return Err(anyhow!("package name must not be empty"));
    }
    let mut chars = name.chars();
    let starts_ok = chars.next().is_some_and(|ch| ch.is_ascii_alphabetic());
    if !starts_ok || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '.') {
        return Err(anyhow!("invalid package name: '{name}'"));
    }
    Ok(())
}
