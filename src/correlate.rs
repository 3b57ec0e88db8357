use std::collections::HashMap;
use std::fmt;

/// Kinds of entities the migration creates, used as correlation and report
/// keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Project,
    Issue,
    Comment,
    Attachment,
    ChecklistItem,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Project => "project",
            EntityKind::Issue => "issue",
            EntityKind::Comment => "comment",
            EntityKind::Attachment => "attachment",
            EntityKind::ChecklistItem => "checklist item",
        };
        f.write_str(name)
    }
}

/// Run-scoped mapping from source entity ids to the ids of their newly
/// created destination counterparts.
///
/// Single-writer: owned by the orchestrator, populated the instant a create
/// call returns, consulted when a child needs its parent's destination id.
/// The orchestrator's top-down traversal guarantees a parent is recorded
/// before any of its children are looked up.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: HashMap<(EntityKind, String), String>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly created destination id. Each (kind, source id) pair is
    /// created at most once per run; recording it twice is a traversal bug.
    pub fn record(&mut self, kind: EntityKind, source_id: &str, dest_id: String) {
        let prev = self.entries.insert((kind, source_id.to_string()), dest_id);
        debug_assert!(
            prev.is_none(),
            "duplicate correlation entry for {kind} {source_id}"
        );
    }

    pub fn lookup(&self, kind: EntityKind, source_id: &str) -> Option<&str> {
        self.entries
            .get(&(kind, source_id.to_string()))
            .map(String::as_str)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entries.keys().filter(|(k, _)| *k == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
