use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use relib_core::{PackageRecord, RecordSet, VersionConstraint};

/// Packages that must be retrieved fresh even when a matching install exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RebuildSet {
    #[default]
    None,
    All,
    Only(BTreeSet<String>),
}

impl RebuildSet {
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Only(names) => names.contains(name),
        }
    }

    /// `*` selects every package; anything else is a list of names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect::<BTreeSet<String>>();
        if names.contains("*") {
            Self::All
        } else if names.is_empty() {
            Self::None
        } else {
            Self::Only(names)
        }
    }
}

/// One constraint on a package, and the dependent that contributed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementEntry {
    pub constraint: Option<VersionConstraint>,
    pub contributed_by: String,
}

impl fmt::Display for RequirementEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(constraint) => write!(f, "{} requires ({constraint})", self.contributed_by),
            None => write!(f, "{} requires any version", self.contributed_by),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementConflict {
    pub package: String,
    pub entries: Vec<RequirementEntry>,
    pub selected_version: Option<String>,
}

impl fmt::Display for RequirementConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details = self
            .entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        match &self.selected_version {
            Some(version) => write!(
                f,
                "conflicting requirements for '{}' (selected {version}): {details}",
                self.package
            ),
            None => write!(f, "conflicting requirements for '{}': {details}", self.package),
        }
    }
}

/// Supplies records for dependencies the manifest does not declare.
pub trait PackageCatalog {
    fn lookup(&self, name: &str) -> Option<PackageRecord>;
}

/// A catalog that knows nothing; every undeclared dependency is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl PackageCatalog for EmptyCatalog {
    fn lookup(&self, _name: &str) -> Option<PackageRecord> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Records that need retrieval, keyed by name.
    pub installable: RecordSet,
    /// Installable names in the order they were discovered.
    pub discovery_order: Vec<String>,
    /// Names already satisfied by an existing install, with its location.
    pub satisfied: BTreeMap<String, PathBuf>,
    /// Names for which no record could be determined.
    pub unavailable: Vec<String>,
    pub conflicts: Vec<RequirementConflict>,
}

impl Resolution {
    pub fn is_conflicted(&self, name: &str) -> bool {
        self.conflicts.iter().any(|conflict| conflict.package == name)
    }
}
