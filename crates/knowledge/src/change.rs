//! Change detection between the stored hashes and the current source listing.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// How a document differs from its stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Changed,
    Unchanged,
    Removed,
}

impl ChangeKind {
    /// Classify a listed document given its stored hash (if any).
    pub fn classify(stored_hash: Option<&str>, current_hash: &str) -> Self {
        match stored_hash {
            None => Self::New,
            Some(stored) if stored == current_hash => Self::Unchanged,
            Some(_) => Self::Changed,
        }
    }

    /// Whether the document's chunks must be (re)written.
    pub fn needs_processing(&self, force_rebuild: bool) -> bool {
        match self {
            Self::New | Self::Changed => true,
            Self::Unchanged => force_rebuild,
            Self::Removed => false,
        }
    }
}

/// Classification of every document known to either side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangePlan {
    /// Listed documents in listing order, with their classification
    pub listed: Vec<(String, ChangeKind)>,

    /// Stored documents absent from the listing, sorted
    pub removed: Vec<String>,
}

impl ChangePlan {
    /// Compare the stored `id -> hash` map with the current `(id, hash)` listing.
    pub fn build(stored: &HashMap<String, String>, current: &[(String, String)]) -> Self {
        let mut seen = HashSet::new();
        let listed = current
            .iter()
            .map(|(id, hash)| {
                seen.insert(id.as_str());
                let kind = ChangeKind::classify(stored.get(id).map(String::as_str), hash);
                (id.clone(), kind)
            })
            .collect();

        let mut removed: Vec<String> = stored
            .keys()
            .filter(|id| !seen.contains(id.as_str()))
            .cloned()
            .collect();
        removed.sort();

        Self { listed, removed }
    }

    /// Keep only removals at or below `scope`; `None` keeps all of them.
    pub fn within(mut self, scope: Option<&str>) -> Self {
        if let Some(scope) = scope {
            self.removed.retain(|id| in_scope(id, scope));
        }
        self
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        match kind {
            ChangeKind::Removed => self.removed.len(),
            other => self.listed.iter().filter(|(_, k)| *k == other).count(),
        }
    }
}

/// Whether `id` is `scope` itself or a path below it. An empty scope holds every id.
pub fn in_scope(id: &str, scope: &str) -> bool {
    scope.is_empty()
        || id == scope
        || id
            .strip_prefix(scope)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(ChangeKind::classify(None, "h1"), ChangeKind::New);
        assert_eq!(ChangeKind::classify(Some("h1"), "h1"), ChangeKind::Unchanged);
        assert_eq!(ChangeKind::classify(Some("h0"), "h1"), ChangeKind::Changed);
    }

    #[test]
    fn test_force_rebuild_only_affects_unchanged() {
        assert!(!ChangeKind::Unchanged.needs_processing(false));
        assert!(ChangeKind::Unchanged.needs_processing(true));
        assert!(ChangeKind::New.needs_processing(false));
        assert!(!ChangeKind::Removed.needs_processing(true));
    }

    #[test]
    fn test_build_plan() {
        let stored: HashMap<String, String> = [
            ("a".to_string(), "ha".to_string()),
            ("b".to_string(), "hb".to_string()),
            ("gone".to_string(), "hg".to_string()),
        ]
        .into_iter()
        .collect();

        let current = vec![
            ("a".to_string(), "ha".to_string()),
            ("b".to_string(), "hb2".to_string()),
            ("c".to_string(), "hc".to_string()),
        ];

        let plan = ChangePlan::build(&stored, &current);
        assert_eq!(
            plan.listed,
            vec![
                ("a".to_string(), ChangeKind::Unchanged),
                ("b".to_string(), ChangeKind::Changed),
                ("c".to_string(), ChangeKind::New),
            ]
        );
        assert_eq!(plan.removed, vec!["gone".to_string()]);
        assert_eq!(plan.count(ChangeKind::Removed), 1);
        assert_eq!(plan.count(ChangeKind::New), 1);
    }

    #[test]
    fn test_removals_limited_to_scope() {
        let stored: HashMap<String, String> = ["docs/guide.md", "docs-old/x.md", "notes/todo.md"]
            .iter()
            .map(|id| (id.to_string(), "h".to_string()))
            .collect();
        let current = vec![("notes/new.md".to_string(), "h".to_string())];

        let plan = ChangePlan::build(&stored, &current).within(Some("notes"));
        assert_eq!(plan.removed, vec!["notes/todo.md".to_string()]);

        let plan = ChangePlan::build(&stored, &current).within(Some("docs"));
        assert_eq!(plan.removed, vec!["docs/guide.md".to_string()]);

        let plan = ChangePlan::build(&stored, &current).within(Some(""));
        assert_eq!(plan.removed.len(), 3);
    }
}
