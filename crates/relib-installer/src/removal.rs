use anyhow::{anyhow, Context, Result};
use relib_core::{is_within_root, DcfDescriptorReader, DescriptorReader};
use std::path::Component;
use tracing::{debug, info};

use crate::fs_utils::remove_path;
use crate::{LibraryLayout, RemovalResult, RemovalStatus};

/// Deletes `<library>/<name>` from the given library.
///
/// The name must be a single path component and the resolved directory must
/// stay inside the library root.
pub fn remove_package(layout: &LibraryLayout, name: &str) -> Result<RemovalResult> {
    validate_package_dir_name(name)?;

    let package_dir = layout.package_dir(name);
    if std::fs::symlink_metadata(&package_dir).is_err() {
        debug!(package = name, "package not present in library; nothing to remove");
        return Ok(RemovalResult {
            name: name.to_string(),
            version: None,
            status: RemovalStatus::NotInstalled,
        });
    }

    if !is_within_root(&package_dir, layout.root()) {
        return Err(anyhow!(
            "refusing to remove '{}': {} is outside library {}",
            name,
            package_dir.display(),
            layout.root().display()
        ));
    }

    let version = DcfDescriptorReader
        .read(&package_dir)
        .ok()
        .map(|record| record.version);

    remove_path(&package_dir)
        .with_context(|| format!("failed to remove package dir: {}", package_dir.display()))?;
    info!(package = name, library = %layout.root().display(), "removed package");

    Ok(RemovalResult {
        name: name.to_string(),
        version,
        status: RemovalStatus::Removed,
    })
}

fn validate_package_dir_name(name: &str) -> Result<()> {
    let mut components = std::path::Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(anyhow!("invalid package name for removal: '{name}'")),
    }
}
