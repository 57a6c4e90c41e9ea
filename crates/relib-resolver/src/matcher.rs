use std::path::{Path, PathBuf};

use relib_core::{DescriptorReader, PackageRecord};
use tracing::debug;

use crate::session::ResolutionSession;

/// Finds an existing install that already satisfies a record.
pub struct DescriptorMatcher<'a> {
    reader: &'a dyn DescriptorReader,
}

impl<'a> DescriptorMatcher<'a> {
    pub fn new(reader: &'a dyn DescriptorReader) -> Self {
        Self { reader }
    }

    /// Scans `search_paths` in priority order and returns the first install
    /// whose descriptor has the same identity as `record`.
    ///
    /// Explicitly requested packages never match. An unreadable descriptor
    /// only disqualifies its own library.
    pub fn find(
        &self,
        session: &ResolutionSession,
        record: &PackageRecord,
        search_paths: &[PathBuf],
    ) -> Option<PathBuf> {
        if session.is_explicit(&record.package) {
            debug!(package = %record.package, "explicit request bypasses installed match");
            return None;
        }

        for library in search_paths {
            let candidate_dir = library.join(&record.package);
            if !candidate_dir.is_dir() {
                continue;
            }

            let candidate = match self.reader.read(&candidate_dir) {
                Ok(candidate) => candidate,
                Err(err) => {
                    debug!(
                        package = %record.package,
                        path = %candidate_dir.display(),
                        error = %format!("{err:#}"),
                        "skipping unreadable descriptor"
                    );
                    continue;
                }
            };

            if candidate.same_identity(record) {
                return Some(absolute(&candidate_dir));
            }
        }

        None
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
