//! Restores a package library from a lockfile.
//!
//! [`Restorer::restore`] reads the lockfile and the installed libraries,
//! computes and filters a diff, runs preflight and the confirmation gate,
//! and then hands the approved actions to the [`Orchestrator`].

mod config;
mod error;
mod orchestrator;
mod policy;
mod preflight;
mod report;
mod restore;

pub use config::{RestoreConfig, CONFIG_FILE_NAME};
pub use error::RestoreError;
pub use orchestrator::{Orchestrator, RestoreObserver, Silent};
pub use policy::{ActionPolicy, KeepAll};
pub use preflight::{
    confirm, preflight, AssumeYes, Confirmation, Confirmer, PreflightContext, PreflightIssue,
    PreflightIssueKind, PreflightReport,
};
pub use report::{InstallOutcome, InstallReport, RestoreOutcome, RestoreReport};
pub use restore::{load_lockfile, ManifestSource, RestoreOptions, RestorePlan, Restorer};
