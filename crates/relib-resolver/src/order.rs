use std::collections::{BTreeMap, BTreeSet, HashSet};

use relib_core::RecordSet;
use tracing::warn;

/// Orders `records` dependency-first, breaking ties by name. Requirements on
/// packages outside the set are ignored. Names caught in a cycle cannot be
/// ordered; they are appended by name.
pub fn install_order(records: &RecordSet) -> Vec<String> {
    let mut reverse: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();

    for (name, record) in records {
        let dependencies = record
            .requirements
            .iter()
            .map(|requirement| requirement.name.as_str())
            .filter(|dep_name| *dep_name != name.as_str() && records.contains(dep_name))
            .collect::<BTreeSet<_>>();
        in_degree.insert(name.as_str(), dependencies.len());
        for dep_name in dependencies {
            reverse.entry(dep_name).or_default().insert(name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter_map(|(name, degree)| (*degree == 0).then_some(*name))
        .collect();
    let mut ordered = Vec::with_capacity(records.len());

    while let Some(next) = ready.pop_first() {
        ordered.push(next.to_string());
        if let Some(children) = reverse.get(next) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
    }

    if ordered.len() != records.len() {
        let ordered_set: HashSet<String> = ordered.iter().cloned().collect();
        let cycle_nodes = records
            .names()
            .filter(|name| !ordered_set.contains(*name))
            .map(str::to_string)
            .collect::<Vec<_>>();
        warn!(
            packages = %cycle_nodes.join(", "),
            "dependency cycle detected; installing remaining packages by name"
        );
        ordered.extend(cycle_nodes);
    }

    ordered
}
