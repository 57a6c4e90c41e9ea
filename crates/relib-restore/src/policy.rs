use relib_core::{Action, DiffResult};
use tracing::debug;

/// Caller-supplied decision over each proposed action. Returning `None`
/// drops the action; returning a different action replaces it.
pub trait ActionPolicy {
    fn decide(&self, package: &str, proposed: Action) -> Option<Action>;
}

/// Keeps every proposed action.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

impl ActionPolicy for KeepAll {
    fn decide(&self, _package: &str, proposed: Action) -> Option<Action> {
        Some(proposed)
    }
}

impl<F> ActionPolicy for F
where
    F: Fn(&str, Action) -> Option<Action>,
{
    fn decide(&self, package: &str, proposed: Action) -> Option<Action> {
        self(package, proposed)
    }
}

pub(crate) fn apply_policy(policy: &dyn ActionPolicy, actions: &DiffResult) -> DiffResult {
    let mut decided = DiffResult::new();
    for (name, proposed) in actions.iter() {
        match policy.decide(name, proposed) {
            Some(action) => decided.insert(name, action),
            None => debug!(package = name, action = %proposed, "action dropped by policy"),
        }
    }
    decided
}
