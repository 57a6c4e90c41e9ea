mod descriptor;
mod diff;
mod lockfile;
mod record;
mod record_set;
mod version;

pub use descriptor::{
    parse_descriptor, parse_fields, render_descriptor, render_source_fields, DcfDescriptorReader,
    DescriptorReader, is_bundled_package, BUNDLED_PACKAGES, DESCRIPTOR_FILE_NAME, RUNTIME_PACKAGE,
};
pub use diff::{apply_diff, diff, is_within_root, Action, DiffFilter, DiffResult};
pub use lockfile::{
    Lockfile, LockfileRecord, LockfileRepository, LockfileRuntime, DEFAULT_LOCKFILE_NAME,
};
pub use record::{PackageRecord, RemoteKind, RemoteSource, Requirement, Source};
pub use record_set::RecordSet;
pub use version::{constraints_satisfiable, ConstraintOp, PackageVersion, VersionConstraint};
