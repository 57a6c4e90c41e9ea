use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use relib_core::{
    render_descriptor, DcfDescriptorReader, DescriptorReader, PackageRecord, RecordSet,
    Requirement, Source, DESCRIPTOR_FILE_NAME,
};

use super::*;

fn repo(name: &str, version: &str, requirements: &[&str]) -> PackageRecord {
    PackageRecord::new(name, version, Source::repository("CRAN")).with_requirements(
        requirements
            .iter()
            .map(|raw| Requirement::parse(raw).expect("requirement must parse"))
            .collect(),
    )
}

fn install_into(library: &Path, record: &PackageRecord) {
    let dir = library.join(&record.package);
    fs::create_dir_all(&dir).expect("must create package dir");
    fs::write(dir.join(DESCRIPTOR_FILE_NAME), render_descriptor(record))
        .expect("must write descriptor");
}

fn session(intended: Vec<PackageRecord>, recursive: bool) -> ResolutionSession {
    ResolutionSession::begin(SessionConfig {
        project: "demo".to_string(),
        intended: intended.into_iter().collect(),
        explicit: BTreeSet::new(),
        rebuild: RebuildSet::None,
        recursive,
    })
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

struct CountingReader {
    reads: Cell<usize>,
}

impl DescriptorReader for CountingReader {
    fn read(&self, package_dir: &Path) -> anyhow::Result<PackageRecord> {
        self.reads.set(self.reads.get() + 1);
        DcfDescriptorReader.read(package_dir)
    }
}

struct MapCatalog {
    records: BTreeMap<String, PackageRecord>,
    lookups: Cell<usize>,
}

impl MapCatalog {
    fn new(records: Vec<PackageRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.package.clone(), record))
                .collect(),
            lookups: Cell::new(0),
        }
    }
}

impl PackageCatalog for MapCatalog {
    fn lookup(&self, name: &str) -> Option<PackageRecord> {
        self.lookups.set(self.lookups.get() + 1);
        self.records.get(name).cloned()
    }
}

#[test]
fn rebuild_set_from_names() {
    assert_eq!(RebuildSet::from_names(Vec::<String>::new()), RebuildSet::None);
    assert_eq!(RebuildSet::from_names(["*"]), RebuildSet::All);
    let only = RebuildSet::from_names(["A", "B"]);
    assert!(only.contains("A"));
    assert!(!only.contains("C"));
    assert!(RebuildSet::All.contains("anything"));
}

#[test]
fn memo_set_accepts_each_name_once() {
    let mut session = session(Vec::new(), true);
    assert!(session.mark_processed("A"));
    assert!(!session.mark_processed("A"));
    assert!(session.is_processed("A"));
    assert_eq!(session.processed_count(), 1);
}

#[test]
fn queue_skips_processed_and_already_queued_names() {
    let mut session = session(Vec::new(), true);
    assert!(session.enqueue("A"));
    assert!(!session.enqueue("A"));
    assert!(session.enqueue("B"));

    assert_eq!(session.next_pending().as_deref(), Some("A"));
    session.mark_processed("A");
    assert!(!session.enqueue("A"));
    assert_eq!(session.pending().collect::<Vec<_>>(), vec!["B"]);
}

#[test]
fn requirements_keep_every_contributor_in_order() {
    let mut session = session(Vec::new(), true);
    session.add_requirement("D", None, "A");
    session.add_requirement("D", Some(">= 1.0".parse().expect("c")), "B");

    let entries = session.requirements("D");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].contributed_by, "A");
    assert_eq!(entries[1].to_string(), "B requires (>= 1.0)");
    assert!(session.requirements("missing").is_empty());
}

#[test]
fn explicit_requests_never_match_an_installed_package() {
    let library = tempfile::tempdir().expect("tempdir");
    let record = repo("Q", "2.0", &[]);
    install_into(library.path(), &record);
    let search_paths = vec![library.path().to_path_buf()];
    let matcher = DescriptorMatcher::new(&DcfDescriptorReader);

    let implicit = session(vec![record.clone()], false);
    assert!(matcher.find(&implicit, &record, &search_paths).is_some());

    let explicit = ResolutionSession::begin(SessionConfig {
        project: "demo".to_string(),
        intended: [record.clone()].into_iter().collect(),
        explicit: BTreeSet::from(["Q".to_string()]),
        rebuild: RebuildSet::None,
        recursive: false,
    });
    assert_eq!(matcher.find(&explicit, &record, &search_paths), None);
}

#[test]
fn matcher_prefers_earlier_libraries_and_skips_broken_descriptors() {
    let broken = tempfile::tempdir().expect("tempdir");
    let stale = tempfile::tempdir().expect("tempdir");
    let good = tempfile::tempdir().expect("tempdir");
    let shadow = tempfile::tempdir().expect("tempdir");

    let record = repo("A", "1.0", &[]);
    fs::create_dir_all(broken.path().join("A")).expect("mkdir");
    fs::write(broken.path().join("A").join(DESCRIPTOR_FILE_NAME), "not a descriptor")
        .expect("write");
    install_into(stale.path(), &repo("A", "0.9", &[]));
    install_into(good.path(), &record);
    install_into(shadow.path(), &record);

    let search_paths = vec![
        broken.path().to_path_buf(),
        stale.path().to_path_buf(),
        good.path().to_path_buf(),
        shadow.path().to_path_buf(),
    ];
    let session = session(vec![record.clone()], false);
    let found = DescriptorMatcher::new(&DcfDescriptorReader)
        .find(&session, &record, &search_paths)
        .expect("must find match");

    assert_eq!(
        found,
        good.path().join("A").canonicalize().expect("canonical path")
    );
}

#[test]
fn resolver_drops_satisfied_packages_but_follows_their_requirements() {
    let library = tempfile::tempdir().expect("tempdir");
    let a = repo("A", "1.0", &["B"]);
    let b = repo("B", "2.0", &[]);
    install_into(library.path(), &a);

    let search_paths = vec![library.path().to_path_buf()];
    let catalog = EmptyCatalog;
    let resolver = Resolver::new(&DcfDescriptorReader, &catalog, &search_paths);
    let mut session = session(vec![a, b], true);

    let resolution = resolver.resolve(&mut session, &names(&["A"]));

    assert!(resolution.satisfied.contains_key("A"));
    assert_eq!(resolution.discovery_order, names(&["B"]));
    assert!(resolution.installable.contains("B"));
    assert_eq!(session.requirements("B").len(), 1);
}

#[test]
fn resolver_expands_undeclared_dependencies_from_the_catalog() {
    let library = tempfile::tempdir().expect("tempdir");
    let search_paths = vec![library.path().to_path_buf()];
    let catalog = MapCatalog::new(vec![repo("B", "1.1", &["C", "methods"]), repo("C", "0.5", &[])]);
    let resolver = Resolver::new(&DcfDescriptorReader, &catalog, &search_paths);
    let mut session = session(vec![repo("A", "1.0", &["B"])], true);

    let resolution = resolver.resolve(&mut session, &names(&["A"]));

    assert_eq!(resolution.discovery_order, names(&["A", "B", "C"]));
    assert!(resolution.unavailable.is_empty());
    assert!(!session.is_processed("methods"));
}

#[test]
fn non_recursive_resolution_ignores_requirements() {
    let library = tempfile::tempdir().expect("tempdir");
    let search_paths = vec![library.path().to_path_buf()];
    let catalog = MapCatalog::new(vec![repo("B", "1.1", &[])]);
    let resolver = Resolver::new(&DcfDescriptorReader, &catalog, &search_paths);
    let mut session = session(vec![repo("A", "1.0", &["B"])], false);

    let resolution = resolver.resolve(&mut session, &names(&["A", "X"]));

    assert_eq!(resolution.discovery_order, names(&["A"]));
    assert_eq!(resolution.unavailable, names(&["X"]));
    assert_eq!(catalog.lookups.get(), 0);
}

#[test]
fn resolver_reports_unknown_dependencies_as_unavailable() {
    let library = tempfile::tempdir().expect("tempdir");
    let search_paths = vec![library.path().to_path_buf()];
    let catalog = EmptyCatalog;
    let resolver = Resolver::new(&DcfDescriptorReader, &catalog, &search_paths);
    let mut session = session(vec![repo("A", "1.0", &["ghost"])], true);

    let resolution = resolver.resolve(&mut session, &names(&["A"]));

    assert_eq!(resolution.discovery_order, names(&["A"]));
    assert_eq!(resolution.unavailable, names(&["ghost"]));
}

#[test]
fn resolving_a_name_twice_matches_it_once() {
    let library = tempfile::tempdir().expect("tempdir");
    let a = repo("A", "1.0", &[]);
    install_into(library.path(), &a);
    let search_paths = vec![library.path().to_path_buf()];
    let reader = CountingReader {
        reads: Cell::new(0),
    };
    let catalog = EmptyCatalog;
    let resolver = Resolver::new(&reader, &catalog, &search_paths);
    let mut session = session(vec![a], true);

    let first = resolver.resolve(&mut session, &names(&["A", "A"]));
    let second = resolver.resolve(&mut session, &names(&["A"]));

    assert!(first.satisfied.contains_key("A"));
    assert!(second.satisfied.is_empty());
    assert_eq!(reader.reads.get(), 1);
}

#[test]
fn dependency_cycles_terminate() {
    let library = tempfile::tempdir().expect("tempdir");
    let search_paths = vec![library.path().to_path_buf()];
    let catalog = EmptyCatalog;
    let resolver = Resolver::new(&DcfDescriptorReader, &catalog, &search_paths);
    let mut session = session(
        vec![repo("A", "1.0", &["B"]), repo("B", "1.0", &["A"])],
        true,
    );

    let resolution = resolver.resolve(&mut session, &names(&["A"]));

    assert_eq!(resolution.discovery_order, names(&["A", "B"]));
    assert_eq!(session.processed_count(), 2);
}

#[test]
fn rebuild_bypasses_installed_matches() {
    let library = tempfile::tempdir().expect("tempdir");
    let a = repo("A", "1.0", &[]);
    let b = repo("B", "1.0", &[]);
    install_into(library.path(), &a);
    install_into(library.path(), &b);
    let search_paths = vec![library.path().to_path_buf()];
    let reader = CountingReader {
        reads: Cell::new(0),
    };
    let catalog = EmptyCatalog;
    let resolver = Resolver::new(&reader, &catalog, &search_paths);
    let mut session = ResolutionSession::begin(SessionConfig {
        project: "demo".to_string(),
        intended: [a, b].into_iter().collect(),
        explicit: BTreeSet::new(),
        rebuild: RebuildSet::from_names(["A"]),
        recursive: true,
    });

    let resolution = resolver.resolve(&mut session, &names(&["A", "B"]));

    assert_eq!(resolution.discovery_order, names(&["A"]));
    assert!(resolution.satisfied.contains_key("B"));
    assert_eq!(reader.reads.get(), 1);
}

#[test]
fn conflicting_requirements_across_dependents_are_reported() {
    let library = tempfile::tempdir().expect("tempdir");
    let search_paths = vec![library.path().to_path_buf()];
    let catalog = EmptyCatalog;
    let resolver = Resolver::new(&DcfDescriptorReader, &catalog, &search_paths);
    let mut session = session(
        vec![
            repo("left", "1.0", &["D (== 1.0)"]),
            repo("right", "1.0", &["D (== 2.0)"]),
            repo("D", "1.0", &[]),
        ],
        true,
    );

    let resolution = resolver.resolve(&mut session, &names(&["left", "right"]));

    assert_eq!(resolution.conflicts.len(), 1);
    let conflict = &resolution.conflicts[0];
    assert_eq!(conflict.package, "D");
    assert_eq!(conflict.entries.len(), 2);
    assert_eq!(conflict.selected_version.as_deref(), Some("1.0"));
    assert!(resolution.is_conflicted("D"));
    assert!(conflict.to_string().contains("right requires (== 2.0)"));
}

#[test]
fn selected_version_outside_requirement_is_a_conflict() {
    let mut session = session(Vec::new(), true);
    session.add_requirement("D", Some(">= 2.0".parse().expect("c")), "A");

    let records: RecordSet = [repo("D", "1.5", &[])].into_iter().collect();
    assert_eq!(session.conflicts(&records).len(), 1);

    let newer: RecordSet = [repo("D", "2.1", &[])].into_iter().collect();
    assert!(session.conflicts(&newer).is_empty());
}

#[test]
fn install_order_is_dependency_first() {
    let records: RecordSet = [
        repo("app", "1.0", &["lib"]),
        repo("lib", "1.2", &["zlib", "outside"]),
        repo("zlib", "2.1", &[]),
    ]
    .into_iter()
    .collect();

    assert_eq!(install_order(&records), names(&["zlib", "lib", "app"]));
}

#[test]
fn install_order_appends_cycle_members_by_name() {
    let records: RecordSet = [
        repo("solo", "1.0", &[]),
        repo("b", "1.0", &["a"]),
        repo("a", "1.0", &["b"]),
    ]
    .into_iter()
    .collect();

    assert_eq!(install_order(&records), names(&["solo", "a", "b"]));
}

#[test]
fn ending_a_session_consumes_it() {
    let session = session(Vec::new(), true);
    assert_eq!(session.project(), "demo");
    session.end();
}
