use anyhow::{Context, Result};
use relib_core::{DescriptorReader, RecordSet};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Produces the set of packages currently installed across libraries.
pub trait SnapshotProducer {
    fn snapshot(&self, libraries: &[PathBuf]) -> Result<RecordSet>;
}

/// Reads every package directory of each library in order. A package found
/// in an earlier library shadows later copies of the same name.
pub struct LibrarySnapshot<'a> {
    reader: &'a dyn DescriptorReader,
}

impl<'a> LibrarySnapshot<'a> {
    pub fn new(reader: &'a dyn DescriptorReader) -> Self {
        Self { reader }
    }
}

impl SnapshotProducer for LibrarySnapshot<'_> {
    fn snapshot(&self, libraries: &[PathBuf]) -> Result<RecordSet> {
        let mut installed = RecordSet::new();
        for library in libraries {
            if !library.exists() {
                debug!(library = %library.display(), "library does not exist; skipping");
                continue;
            }

            let mut entries = fs::read_dir(library)
                .with_context(|| format!("failed to read library: {}", library.display()))?
                .collect::<std::io::Result<Vec<_>>>()
                .with_context(|| format!("failed to list library: {}", library.display()))?;
            entries.sort_by_key(|entry| entry.file_name());

            for entry in entries {
                let path = entry.path();
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    continue;
                };
                if name.starts_with('.') || !path.is_dir() || installed.contains(name) {
                    continue;
                }

                match self.reader.read(&path) {
                    Ok(record) if record.package == name => {
                        installed.insert(record);
                    }
                    Ok(record) => warn!(
                        dir = %path.display(),
                        package = %record.package,
                        "descriptor names a different package; skipping"
                    ),
                    Err(err) => warn!(
                        dir = %path.display(),
                        error = %format!("{err:#}"),
                        "skipping unreadable package"
                    ),
                }
            }
        }
        Ok(installed)
    }
}
