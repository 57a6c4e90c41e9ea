//! Three-way comparison between an installed record set and a desired one.
//!
//! [`diff`] only states which names differ. Whether a removal is allowed to
//! happen is policy, applied afterwards by [`DiffFilter`].

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::record_set::RecordSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Install,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-package actions; a name with no entry needs nothing done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    actions: BTreeMap<String, Action>,
}

impl DiffResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, action: Action) {
        self.actions.insert(name.into(), action);
    }

    pub fn get(&self, name: &str) -> Option<Action> {
        self.actions.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) -> Option<Action> {
        self.actions.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Action)> {
        self.actions
            .iter()
            .map(|(name, action)| (name.as_str(), *action))
    }

    pub fn names_with(&self, action: Action) -> Vec<String> {
        self.actions
            .iter()
            .filter(|(_, candidate)| **candidate == action)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, Action) -> bool,
    {
        self.actions.retain(|name, action| keep(name, *action));
    }

    /// One `- install A` style line per action, sorted by name.
    pub fn summary_lines(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|(name, action)| format!("- {action} {name}"))
            .collect()
    }
}

impl<'a> IntoIterator for &'a DiffResult {
    type Item = (&'a String, &'a Action);
    type IntoIter = btree_map::Iter<'a, String, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

pub fn diff(current: &RecordSet, desired: &RecordSet) -> DiffResult {
    let mut result = DiffResult::new();

    for (name, wanted) in desired {
        match current.get(name) {
            None => result.insert(name.clone(), Action::Install),
            Some(installed) if !installed.same_identity(wanted) => {
                result.insert(name.clone(), Action::Install)
            }
            Some(_) => {}
        }
    }

    for name in current.names() {
        if !desired.contains(name) {
            result.insert(name, Action::Remove);
        }
    }

    result
}

/// Projects `current` forward through `result`: installs take the desired
/// record, removals drop the name.
pub fn apply_diff(current: &RecordSet, desired: &RecordSet, result: &DiffResult) -> RecordSet {
    let mut next = current.clone();
    for (name, action) in result.iter() {
        match action {
            Action::Install => {
                if let Some(record) = desired.get(name) {
                    next.insert(record.clone());
                }
            }
            Action::Remove => {
                next.remove(name);
            }
        }
    }
    next
}

/// Removal and ignore policy layered on top of a raw diff.
#[derive(Debug, Clone, Default)]
pub struct DiffFilter {
    pub clean: bool,
    pub library_root: Option<PathBuf>,
    pub ignored: BTreeSet<String>,
}

impl DiffFilter {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            clean: false,
            library_root: Some(library_root.into()),
            ignored: BTreeSet::new(),
        }
    }

    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored.extend(names.into_iter().map(Into::into));
        self
    }

    /// Applies the policy. `current` supplies installed locations for the
    /// library-root check; a removal with no known location is dropped.
    pub fn apply(&self, mut result: DiffResult, current: &RecordSet) -> DiffResult {
        result.retain(|name, action| {
            if self.ignored.contains(name) {
                debug!(package = name, %action, "dropping action for ignored package");
                return false;
            }
            if action != Action::Remove {
                return true;
            }
            if !self.clean {
                return false;
            }

            let location = current.get(name).and_then(|record| record.location());
            let in_scope = match (&self.library_root, location) {
                (Some(root), Some(location)) => is_within_root(location, root),
                _ => false,
            };
            if !in_scope {
                debug!(package = name, "keeping package outside the managed library");
            }
            in_scope
        });
        result
    }
}

/// True when `path` sits inside `root`.
///
/// Only the parent directory is resolved, so an entry that is itself a
/// symlink counts by where the link lives, not where it points.
pub fn is_within_root(path: &Path, root: &Path) -> bool {
    let resolved = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .ok(),
        _ => path.canonicalize().ok(),
    };
    match (resolved, root.canonicalize()) {
        (Some(path), Ok(root)) => path.starts_with(root),
        _ => path.starts_with(root),
    }
}
