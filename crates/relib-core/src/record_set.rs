use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::record::PackageRecord;

/// Package records keyed by package name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: BTreeMap<String, PackageRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record under its own package name, returning the record it
    /// replaced.
    pub fn insert(&mut self, record: PackageRecord) -> Option<PackageRecord> {
        self.records.insert(record.package.clone(), record)
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<PackageRecord> {
        self.records.remove(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.values()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, PackageRecord> {
        self.records.iter()
    }

    /// Keeps only records whose name passes `keep`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.records.retain(|name, _| keep(name));
    }
}

impl FromIterator<PackageRecord> for RecordSet {
    fn from_iter<T: IntoIterator<Item = PackageRecord>>(iter: T) -> Self {
        let mut set = Self::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl IntoIterator for RecordSet {
    type Item = PackageRecord;
    type IntoIter = btree_map::IntoValues<String, PackageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = (&'a String, &'a PackageRecord);
    type IntoIter = btree_map::Iter<'a, String, PackageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
