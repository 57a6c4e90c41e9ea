use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use relib_core::{constraints_satisfiable, PackageVersion, RecordSet, VersionConstraint};
use tracing::{debug, warn};

use crate::types::{RebuildSet, RequirementConflict, RequirementEntry};

/// Inputs fixed for the lifetime of one restore.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub project: String,
    pub intended: RecordSet,
    /// Names requested directly; never satisfied by an existing install.
    pub explicit: BTreeSet<String>,
    pub rebuild: RebuildSet,
    pub recursive: bool,
}

/// Mutable resolution state for exactly one restore operation.
///
/// The session is created when a restore begins and released when it ends,
/// either through [`ResolutionSession::end`] or, on early return and error
/// paths, when it is dropped.
#[derive(Debug)]
pub struct ResolutionSession {
    config: SessionConfig,
    processed: HashSet<String>,
    queue: VecDeque<String>,
    queued: HashSet<String>,
    requirements: BTreeMap<String, Vec<RequirementEntry>>,
    released: bool,
}

impl ResolutionSession {
    pub fn begin(config: SessionConfig) -> Self {
        debug!(
            project = %config.project,
            intended = config.intended.len(),
            explicit = config.explicit.len(),
            recursive = config.recursive,
            "restore session started"
        );
        Self {
            config,
            processed: HashSet::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            requirements: BTreeMap::new(),
            released: false,
        }
    }

    pub fn end(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        debug!(
            project = %self.config.project,
            processed = self.processed.len(),
            "restore session released"
        );
        self.queue.clear();
        self.queued.clear();
    }

    pub fn project(&self) -> &str {
        &self.config.project
    }

    pub fn intended(&self) -> &RecordSet {
        &self.config.intended
    }

    pub fn is_recursive(&self) -> bool {
        self.config.recursive
    }

    pub fn is_explicit(&self, name: &str) -> bool {
        self.config.explicit.contains(name)
    }

    pub fn must_rebuild(&self, name: &str) -> bool {
        self.config.rebuild.contains(name)
    }

    /// Records `name` as processed. Returns false if it already was.
    pub fn mark_processed(&mut self, name: &str) -> bool {
        self.queued.remove(name);
        self.processed.insert(name.to_string())
    }

    pub fn is_processed(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Queues `name` unless it was already processed or is already waiting.
    pub fn enqueue(&mut self, name: &str) -> bool {
        if self.processed.contains(name) || self.queued.contains(name) {
            return false;
        }
        self.queued.insert(name.to_string());
        self.queue.push_back(name.to_string());
        true
    }

    pub fn next_pending(&mut self) -> Option<String> {
        let next = self.queue.pop_front()?;
        self.queued.remove(&next);
        Some(next)
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }

    pub fn add_requirement(
        &mut self,
        name: &str,
        constraint: Option<VersionConstraint>,
        contributed_by: &str,
    ) {
        self.requirements
            .entry(name.to_string())
            .or_default()
            .push(RequirementEntry {
                constraint,
                contributed_by: contributed_by.to_string(),
            });
    }

    pub fn requirements(&self, name: &str) -> &[RequirementEntry] {
        self.requirements
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Packages whose contributed constraints cannot all hold, either among
    /// themselves or against the version chosen for the package in
    /// `records`.
    pub fn conflicts(&self, records: &RecordSet) -> Vec<RequirementConflict> {
        let mut conflicts = Vec::new();
        for (name, entries) in &self.requirements {
            let constraints = entries
                .iter()
                .filter_map(|entry| entry.constraint.as_ref())
                .collect::<Vec<_>>();
            if constraints.is_empty() {
                continue;
            }

            let selected = records.get(name).map(|record| record.version.clone());
            let jointly_satisfiable = constraints_satisfiable(constraints.iter().copied());
            let selected_satisfies = match selected.as_deref().map(PackageVersion::parse) {
                Some(Ok(version)) => constraints.iter().all(|constraint| constraint.matches(&version)),
                _ => true,
            };

            if !jointly_satisfiable || !selected_satisfies {
                warn!(
                    package = %name,
                    contributors = entries.len(),
                    "conflicting requirements"
                );
                conflicts.push(RequirementConflict {
                    package: name.clone(),
                    entries: entries.clone(),
                    selected_version: selected,
                });
            }
        }
        conflicts
    }
}

impl Drop for ResolutionSession {
    fn drop(&mut self) {
        self.release();
    }
}
