use std::path::PathBuf;

use relib_core::{is_bundled_package, DescriptorReader, PackageRecord, RecordSet};
use tracing::{debug, info};

use crate::matcher::DescriptorMatcher;
use crate::session::ResolutionSession;
use crate::types::{PackageCatalog, Resolution};

/// Expands requested names into the full set of records that need
/// retrieval. State lives in the [`ResolutionSession`]; the resolver itself
/// only holds its collaborators.
pub struct Resolver<'a> {
    matcher: DescriptorMatcher<'a>,
    catalog: &'a dyn PackageCatalog,
    search_paths: &'a [PathBuf],
}

impl<'a> Resolver<'a> {
    pub fn new(
        reader: &'a dyn DescriptorReader,
        catalog: &'a dyn PackageCatalog,
        search_paths: &'a [PathBuf],
    ) -> Self {
        Self {
            matcher: DescriptorMatcher::new(reader),
            catalog,
            search_paths,
        }
    }

    pub fn resolve(&self, session: &mut ResolutionSession, requested: &[String]) -> Resolution {
        for name in requested {
            session.enqueue(name);
        }

        let mut resolution = Resolution::default();
        let mut known = RecordSet::new();

        while let Some(name) = session.next_pending() {
            if !session.mark_processed(&name) {
                continue;
            }

            let Some(record) = self.record_for(session, &name) else {
                debug!(package = %name, "no record available");
                resolution.unavailable.push(name);
                continue;
            };

            let forced = session.must_rebuild(&name);
            let installed = if forced {
                None
            } else {
                self.matcher.find(session, &record, self.search_paths)
            };

            match installed {
                Some(location) => {
                    debug!(package = %name, path = %location.display(), "already satisfied");
                    resolution.satisfied.insert(name.clone(), location);
                }
                None => {
                    if forced {
                        debug!(package = %name, "rebuild requested");
                    }
                    resolution.discovery_order.push(name.clone());
                    resolution.installable.insert(record.clone());
                }
            }

            if session.is_recursive() {
                enqueue_requirements(session, &record);
            }
            known.insert(record);
        }

        resolution.conflicts = session.conflicts(&known);
        info!(
            installable = resolution.installable.len(),
            satisfied = resolution.satisfied.len(),
            unavailable = resolution.unavailable.len(),
            conflicts = resolution.conflicts.len(),
            "resolved restore set"
        );
        resolution
    }

    fn record_for(&self, session: &ResolutionSession, name: &str) -> Option<PackageRecord> {
        if let Some(record) = session.intended().get(name) {
            return Some(record.clone());
        }
        if !session.is_recursive() {
            return None;
        }
        self.catalog.lookup(name)
    }
}

fn enqueue_requirements(session: &mut ResolutionSession, record: &PackageRecord) {
    for requirement in &record.requirements {
        if is_bundled_package(&requirement.name) {
            continue;
        }
        session.add_requirement(
            &requirement.name,
            requirement.constraint.clone(),
            &record.package,
        );
        session.enqueue(&requirement.name);
    }
}
