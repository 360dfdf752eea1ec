//! Role assignment reconciliation.
//!
//! `compute_role_delta` works out the minimal add/remove sets between a
//! principal's current and desired roles; [`admin`] applies them.

pub mod admin;

use std::collections::BTreeSet;

use serde::Serialize;

/// Roles to add and remove to move from one assignment to another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDelta {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl RoleDelta {
    /// True when the assignment is already as desired.
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Diff `current` against `desired`. Order is irrelevant and duplicates collapse.
pub fn compute_role_delta<C, D, S, T>(current: C, desired: D) -> RoleDelta
where
    C: IntoIterator<Item = S>,
    D: IntoIterator<Item = T>,
    S: AsRef<str>,
    T: AsRef<str>,
{
    let current: BTreeSet<String> = current.into_iter().map(|r| r.as_ref().to_string()).collect();
    let desired: BTreeSet<String> = desired.into_iter().map(|r| r.as_ref().to_string()).collect();

    RoleDelta {
        to_add: desired.difference(&current).cloned().collect(),
        to_remove: current.difference(&desired).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(roles: &[&str]) -> BTreeSet<String> {
        roles.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn identical_sets_are_a_noop() {
        let delta = compute_role_delta(["Admin", "User"], ["User", "Admin"]);
        assert!(delta.is_noop());
        assert!(delta.to_add.is_empty());
        assert!(delta.to_remove.is_empty());
    }

    #[test]
    fn added_role_only() {
        let delta = compute_role_delta(["User"], ["User", "Editor"]);
        assert_eq!(delta.to_add, set(&["Editor"]));
        assert!(delta.to_remove.is_empty());
        assert!(!delta.is_noop());
    }

    #[test]
    fn removed_role_only() {
        let delta = compute_role_delta(["Editor", "User"], ["User"]);
        assert!(delta.to_add.is_empty());
        assert_eq!(delta.to_remove, set(&["Editor"]));
    }

    #[test]
    fn swap_adds_and_removes() {
        let delta = compute_role_delta(["User", "Auditor"], ["Admin", "User"]);
        assert_eq!(delta.to_add, set(&["Admin"]));
        assert_eq!(delta.to_remove, set(&["Auditor"]));
    }

    #[test]
    fn duplicates_collapse() {
        let delta = compute_role_delta(["User", "User"], ["User", "Editor", "Editor"]);
        assert_eq!(delta.to_add, set(&["Editor"]));
        assert!(delta.to_remove.is_empty());
    }

    #[test]
    fn empty_to_empty_is_a_noop() {
        let delta = compute_role_delta(Vec::<String>::new(), Vec::<String>::new());
        assert!(delta.is_noop());
    }

    #[test]
    fn serializes_camel_case() {
        let delta = compute_role_delta(["User"], ["Editor"]);
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json["toAdd"][0], "Editor");
        assert_eq!(json["toRemove"][0], "User");
    }
}
