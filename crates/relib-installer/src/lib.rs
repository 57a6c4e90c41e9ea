mod fs_utils;
mod hook;
mod installer;
mod layout;
mod removal;
mod repository;
mod snapshot;
mod types;

pub use hook::{LogHook, PostInstallHook};
pub use installer::{Installer, RepositoryInstaller};
pub use layout::LibraryLayout;
pub use removal::remove_package;
pub use repository::{LocalRepositories, LocalRepository};
pub use snapshot::{LibrarySnapshot, SnapshotProducer};
pub use types::{InstallStatus, RemovalResult, RemovalStatus};

#[cfg(test)]
mod tests;
