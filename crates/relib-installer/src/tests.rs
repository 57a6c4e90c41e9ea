use super::*;

use relib_core::{
    DcfDescriptorReader, DescriptorReader, PackageRecord, RemoteKind, RemoteSource, Source,
    DESCRIPTOR_FILE_NAME,
};
use relib_resolver::PackageCatalog;
use std::fs;
use std::path::{Path, PathBuf};

use crate::installer::stamp_source_fields;

fn write_build(repo_root: &Path, dir_name: &str, descriptor: &str) -> PathBuf {
    let package = descriptor
        .lines()
        .find_map(|line| line.strip_prefix("Package: "))
        .expect("descriptor names a package");
    let dir = repo_root.join(package).join(dir_name);
    fs::create_dir_all(dir.join("R")).expect("create build dir");
    fs::write(dir.join(DESCRIPTOR_FILE_NAME), descriptor).expect("write descriptor");
    fs::write(dir.join("R").join(package), "# code\n").expect("write payload");
    dir
}

fn write_installed(library: &Path, name: &str, descriptor: &str) -> PathBuf {
    let dir = library.join(name);
    fs::create_dir_all(&dir).expect("create package dir");
    fs::write(dir.join(DESCRIPTOR_FILE_NAME), descriptor).expect("write descriptor");
    dir
}

fn install_single(
    installer: &RepositoryInstaller,
    record: &PackageRecord,
    layout: &LibraryLayout,
) -> InstallStatus {
    let mut statuses = installer.install(std::slice::from_ref(record), layout);
    assert_eq!(statuses.len(), 1);
    statuses.remove(0)
}

fn repo_record(name: &str, version: &str) -> PackageRecord {
    PackageRecord::new(name, version, Source::repository("CRAN"))
}

#[test]
fn layout_paths_are_rooted_in_the_library() {
    let layout = LibraryLayout::new("/tmp/project/lib");
    assert_eq!(layout.package_dir("A"), PathBuf::from("/tmp/project/lib/A"));
    assert_eq!(
        layout.descriptor_path("A"),
        PathBuf::from("/tmp/project/lib/A/DESCRIPTION")
    );
    assert!(layout.staging_dir().starts_with(layout.root()));
}

#[test]
fn snapshot_reads_each_package_directory() {
    let library = tempfile::tempdir().expect("tempdir");
    write_installed(
        library.path(),
        "A",
        "Package: A\nVersion: 1.0\nRepository: CRAN\nImports: B (>= 0.5)\n",
    );
    write_installed(library.path(), "B", "Package: B\nVersion: 0.6\nRepository: CRAN\n");
    fs::create_dir_all(library.path().join(".relib-staging")).expect("staging");
    fs::write(library.path().join("README"), "not a package").expect("file");

    let installed = LibrarySnapshot::new(&DcfDescriptorReader)
        .snapshot(&[library.path().to_path_buf()])
        .expect("snapshot");

    assert_eq!(installed.names().collect::<Vec<_>>(), vec!["A", "B"]);
    let a = installed.get("A").expect("A present");
    assert_eq!(a.requirements.len(), 1);
    assert_eq!(a.location(), Some(library.path().join("A").as_path()));
}

#[test]
fn snapshot_prefers_earlier_libraries_and_skips_broken_packages() {
    let project = tempfile::tempdir().expect("tempdir");
    let system = tempfile::tempdir().expect("tempdir");
    write_installed(project.path(), "A", "Package: A\nVersion: 2.0\nRepository: CRAN\n");
    write_installed(system.path(), "A", "Package: A\nVersion: 1.0\nRepository: CRAN\n");
    write_installed(system.path(), "Broken", "Version: 1.0\n");
    write_installed(system.path(), "Mismatch", "Package: Other\nVersion: 1.0\n");

    let installed = LibrarySnapshot::new(&DcfDescriptorReader)
        .snapshot(&[
            project.path().to_path_buf(),
            system.path().to_path_buf(),
            system.path().join("missing"),
        ])
        .expect("snapshot");

    assert_eq!(installed.len(), 1);
    assert_eq!(installed.get("A").expect("A").version, "2.0");
}

#[test]
fn remove_package_deletes_the_directory() {
    let library = tempfile::tempdir().expect("tempdir");
    write_installed(library.path(), "A", "Package: A\nVersion: 1.0\nRepository: CRAN\n");
    let layout = LibraryLayout::new(library.path());

    let result = remove_package(&layout, "A").expect("remove");
    assert_eq!(result.status, RemovalStatus::Removed);
    assert_eq!(result.version.as_deref(), Some("1.0"));
    assert!(!library.path().join("A").exists());

    let again = remove_package(&layout, "A").expect("remove again");
    assert_eq!(again.status, RemovalStatus::NotInstalled);
}

#[test]
fn remove_package_rejects_names_that_escape_the_library() {
    let library = tempfile::tempdir().expect("tempdir");
    let layout = LibraryLayout::new(library.path().join("lib"));
    fs::create_dir_all(layout.root()).expect("lib");

    for name in ["../lib", "a/b", "/etc", ""] {
        assert!(remove_package(&layout, name).is_err(), "{name:?} must be rejected");
    }
    assert!(layout.root().exists());
}

#[cfg(unix)]
#[test]
fn remove_package_unlinks_a_symlinked_package_and_keeps_its_target() {
    let library = tempfile::tempdir().expect("tempdir");
    let cache = tempfile::tempdir().expect("tempdir");
    let target = write_installed(cache.path(), "Z", "Package: Z\nVersion: 2.1\nRepository: CRAN\n");
    std::os::unix::fs::symlink(&target, library.path().join("Z")).expect("symlink");
    let layout = LibraryLayout::new(library.path());

    let result = remove_package(&layout, "Z").expect("remove");
    assert_eq!(result.status, RemovalStatus::Removed);
    assert_eq!(result.version.as_deref(), Some("2.1"));
    assert!(fs::symlink_metadata(library.path().join("Z")).is_err());
    assert!(target.join(DESCRIPTOR_FILE_NAME).exists());
}

#[test]
fn catalog_lookup_picks_the_highest_version_across_repositories() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    write_build(first.path(), "1.0", "Package: B\nVersion: 1.0\n");
    write_build(second.path(), "1.2", "Package: B\nVersion: 1.2\nImports: C\n");
    write_build(second.path(), "0.9", "Package: B\nVersion: 0.9\n");

    let repositories = LocalRepositories::new()
        .with_repository("first", first.path())
        .with_repository("second", second.path());

    let found = repositories.lookup("B").expect("B available");
    assert_eq!(found.version, "1.2");
    assert_eq!(found.source, Source::repository("second"));
    assert_eq!(found.requirements[0].name, "C");
    assert!(found.location.is_none());
    assert!(repositories.lookup("Z").is_none());
}

#[test]
fn network_locations_are_not_local_repositories() {
    let mut repositories = LocalRepositories::new();
    assert!(!repositories.add_location("CRAN", "https://cloud.r-project.org"));
    assert!(repositories.add_location("local", "file:///srv/repo"));
    assert!(repositories.add_location("plain", "/srv/other"));
    assert_eq!(repositories.repositories().len(), 2);
    assert_eq!(
        repositories.repositories()[0].root,
        PathBuf::from("/srv/repo")
    );
}

#[test]
fn repository_installer_stages_and_stamps_the_source() {
    let repo = tempfile::tempdir().expect("tempdir");
    let library = tempfile::tempdir().expect("tempdir");
    write_build(
        repo.path(),
        "1.0",
        "Package: A\nVersion: 1.0\nImports: B\nRemoteType: github\nRemoteSha: old\n  continued\n",
    );
    let installer =
        RepositoryInstaller::new(LocalRepositories::new().with_repository("CRAN", repo.path()));
    let layout = LibraryLayout::new(library.path().join("lib"));

    let status = install_single(&installer, &repo_record("A", "1.0"), &layout);
    assert!(status.is_installed(), "{status}");

    let installed = DcfDescriptorReader
        .read(&layout.package_dir("A"))
        .expect("installed descriptor");
    assert!(installed.same_identity(&repo_record("A", "1.0")));
    assert_eq!(installed.source, Source::repository("CRAN"));
    assert!(layout.package_dir("A").join("R").join("A").exists());
    assert!(!layout.staging_dir().exists());
}

#[test]
fn repository_installer_keeps_a_staging_root_that_is_still_in_use() {
    let repo = tempfile::tempdir().expect("tempdir");
    let library = tempfile::tempdir().expect("tempdir");
    write_build(repo.path(), "1.0", "Package: A\nVersion: 1.0\n");
    let installer =
        RepositoryInstaller::new(LocalRepositories::new().with_repository("CRAN", repo.path()));
    let layout = LibraryLayout::new(library.path().join("lib"));
    let leftover = layout.staging_dir().join("B-other");
    fs::create_dir_all(&leftover).expect("leftover staging dir");

    let status = install_single(&installer, &repo_record("A", "1.0"), &layout);
    assert!(status.is_installed(), "{status}");
    assert!(leftover.exists());
    assert_eq!(
        fs::read_dir(layout.staging_dir()).expect("staging root").count(),
        1
    );
}

#[test]
fn repository_installer_replaces_an_existing_install() {
    let repo = tempfile::tempdir().expect("tempdir");
    let library = tempfile::tempdir().expect("tempdir");
    write_build(repo.path(), "2.0", "Package: A\nVersion: 2.0\n");
    write_installed(library.path(), "A", "Package: A\nVersion: 1.0\nRepository: CRAN\n");
    fs::write(library.path().join("A").join("stale"), "x").expect("stale file");

    let installer =
        RepositoryInstaller::new(LocalRepositories::new().with_repository("CRAN", repo.path()));
    let status = install_single(
        &installer,
        &repo_record("A", "2.0"),
        &LibraryLayout::new(library.path()),
    );

    assert!(status.is_installed(), "{status}");
    assert!(!library.path().join("A").join("stale").exists());
    let installed = DcfDescriptorReader
        .read(&library.path().join("A"))
        .expect("descriptor");
    assert_eq!(installed.version, "2.0");
}

#[test]
fn repository_installer_reports_missing_and_unknown_packages() {
    let repo = tempfile::tempdir().expect("tempdir");
    let library = tempfile::tempdir().expect("tempdir");
    write_build(repo.path(), "1.0", "Package: A\nVersion: 1.0\n");
    let installer =
        RepositoryInstaller::new(LocalRepositories::new().with_repository("CRAN", repo.path()));
    let layout = LibraryLayout::new(library.path());

    let missing = install_single(&installer, &repo_record("A", "9.9"), &layout);
    assert!(matches!(missing, InstallStatus::Failed { .. }));

    let unknown = PackageRecord::new(
        "A",
        "1.0",
        Source::Remote(RemoteSource::new(RemoteKind::Unknown)),
    );
    let status = install_single(&installer, &unknown, &layout);
    match status {
        InstallStatus::Failed { reason } => assert!(reason.contains("unknown source")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!library.path().join("A").exists());
}

#[test]
fn repository_installer_locates_remote_builds_by_sha() {
    let repo = tempfile::tempdir().expect("tempdir");
    let library = tempfile::tempdir().expect("tempdir");
    write_build(repo.path(), "abc123", "Package: G\nVersion: 0.1\n");
    let mut remote = RemoteSource::new(RemoteKind::GitHub);
    remote.username = Some("someone".to_string());
    remote.repo = Some("G".to_string());
    remote.sha = Some("abc123".to_string());
    let record = PackageRecord::new("G", "0.1", Source::Remote(remote));

    let installer =
        RepositoryInstaller::new(LocalRepositories::new().with_repository("mirror", repo.path()));
    let layout = LibraryLayout::new(library.path());
    assert!(install_single(&installer, &record, &layout).is_installed());

    let installed = DcfDescriptorReader
        .read(&layout.package_dir("G"))
        .expect("descriptor");
    assert!(installed.same_identity(&record));
}

#[test]
fn stamping_replaces_existing_source_fields() {
    let raw = "Package: A\nVersion: 1.0\nRepository: old\nRemoteUrl: x\n  more\nTitle: T\n";
    let stamped = stamp_source_fields(raw, &Source::repository("CRAN"));
    assert_eq!(
        stamped,
        "Package: A\nVersion: 1.0\nTitle: T\nRepository: CRAN\n"
    );
}

#[test]
fn batch_install_reports_one_status_per_record_in_order() {
    let repo = tempfile::tempdir().expect("tempdir");
    let library = tempfile::tempdir().expect("tempdir");
    write_build(repo.path(), "1.0", "Package: A\nVersion: 1.0\n");
    write_build(repo.path(), "2.0", "Package: B\nVersion: 2.0\n");
    let installer =
        RepositoryInstaller::new(LocalRepositories::new().with_repository("CRAN", repo.path()));

    let statuses = installer.install(
        &[
            repo_record("A", "1.0"),
            repo_record("Missing", "1.0"),
            repo_record("B", "2.0"),
        ],
        &LibraryLayout::new(library.path()),
    );

    assert_eq!(statuses.len(), 3);
    assert!(statuses[0].is_installed());
    assert!(!statuses[1].is_installed());
    assert!(statuses[2].is_installed());
}
