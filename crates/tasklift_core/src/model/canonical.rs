//! Canonical import model shared by every migration adapter.
//!
//! # Responsibility
//! - Describe one exported namespace as plain data: lists, tasks, labels and
//!   relations keyed by external ids.
//! - Serve as the only contract between adapters and the import pipeline.
//!
//! # Invariants
//! - No service-specific types leak into this module.
//! - Relations reference tasks by external id; internal ids do not exist yet.
//! - Timestamps are Unix epoch milliseconds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier a source service uses for one of its tasks.
pub type ExternalId = String;

/// Kind of a directed task-to-task relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// The other task is this task's parent.
    ParentTask,
    /// The other task is a subtask of this task.
    Subtask,
    Related,
    DuplicateOf,
    Duplicates,
    Blocking,
    Blocked,
    Precedes,
    Follows,
    CopiedFrom,
    CopiedTo,
}

impl RelationKind {
    /// Every supported kind, in storage order.
    pub const ALL: [RelationKind; 11] = [
        RelationKind::ParentTask,
        RelationKind::Subtask,
        RelationKind::Related,
        RelationKind::DuplicateOf,
        RelationKind::Duplicates,
        RelationKind::Blocking,
        RelationKind::Blocked,
        RelationKind::Precedes,
        RelationKind::Follows,
        RelationKind::CopiedFrom,
        RelationKind::CopiedTo,
    ];

    /// Kind written on the opposite edge.
    pub fn inverse(self) -> Self {
        match self {
            Self::ParentTask => Self::Subtask,
            Self::Subtask => Self::ParentTask,
            Self::Related => Self::Related,
            Self::DuplicateOf => Self::Duplicates,
            Self::Duplicates => Self::DuplicateOf,
            Self::Blocking => Self::Blocked,
            Self::Blocked => Self::Blocking,
            Self::Precedes => Self::Follows,
            Self::Follows => Self::Precedes,
            Self::CopiedFrom => Self::CopiedTo,
            Self::CopiedTo => Self::CopiedFrom,
        }
    }

    /// Stable storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParentTask => "parenttask",
            Self::Subtask => "subtask",
            Self::Related => "related",
            Self::DuplicateOf => "duplicateof",
            Self::Duplicates => "duplicates",
            Self::Blocking => "blocking",
            Self::Blocked => "blocked",
            Self::Precedes => "precedes",
            Self::Follows => "follows",
            Self::CopiedFrom => "copiedfrom",
            Self::CopiedTo => "copiedto",
        }
    }

    /// Parses a storage name produced by `as_str`.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

/// Label attached to an imported task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelImport {
    pub title: String,
}

impl LabelImport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Opaque attachment carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentImport {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// One task as exported by a source service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskImport {
    /// Source id, only used to resolve relations inside one batch.
    pub external_id: Option<ExternalId>,
    pub title: String,
    pub description: String,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub due_date: Option<i64>,
    /// Absolute reminder instants; duplicates collapse on insert.
    pub reminders: Vec<i64>,
    pub done: bool,
    pub done_at: Option<i64>,
    pub priority: i64,
    /// Source recurrence rule, kept verbatim.
    pub repeat: Option<String>,
    /// Creation instant in the source service; import time when absent.
    pub created: Option<i64>,
    /// Candidate ordering key seeded by the adapter.
    pub position: Option<f64>,
    pub labels: Vec<LabelImport>,
    pub relations: BTreeMap<RelationKind, Vec<ExternalId>>,
    pub attachments: Vec<AttachmentImport>,
}

impl TaskImport {
    /// Creates a task with only a title set.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the external id used for relation resolution.
    pub fn with_external_id(mut self, external_id: impl Into<ExternalId>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Sets the adapter-seeded position.
    pub fn with_position(mut self, position: f64) -> Self {
        self.position = Some(position);
        self
    }

    /// Adds one relation edge to `target`.
    pub fn add_relation(&mut self, kind: RelationKind, target: impl Into<ExternalId>) {
        self.relations.entry(kind).or_default().push(target.into());
    }

    /// Number of outgoing relation edges.
    pub fn relation_count(&self) -> usize {
        self.relations.values().map(Vec::len).sum()
    }
}

/// One list (project) with its tasks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListImport {
    pub title: String,
    pub tasks: Vec<TaskImport>,
}

impl ListImport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tasks: Vec::new(),
        }
    }
}

/// Root of one parsed export.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NamespaceImport {
    pub title: String,
    /// Lists in the order they should be created.
    pub lists: Vec<ListImport>,
}

impl NamespaceImport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lists: Vec::new(),
        }
    }

    /// Total number of tasks across all lists.
    pub fn task_count(&self) -> usize {
        self.lists.iter().map(|list| list.tasks.len()).sum()
    }

    /// Total number of outgoing relation edges across all tasks.
    pub fn relation_count(&self) -> usize {
        self.lists
            .iter()
            .flat_map(|list| list.tasks.iter())
            .map(TaskImport::relation_count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_is_an_involution() {
        for kind in RelationKind::ALL {
            assert_eq!(kind.inverse().inverse(), kind);
            assert_eq!(RelationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RelationKind::ParentTask.inverse(), RelationKind::Subtask);
        assert_eq!(RelationKind::parse("sibling"), None);
    }

    #[test]
    fn counts_walk_every_list() {
        let mut namespace = NamespaceImport::new("Imported");
        let mut inbox = ListImport::new("Inbox");
        let mut child = TaskImport::new("child").with_external_id("2");
        child.add_relation(RelationKind::ParentTask, "1");
        inbox.tasks.push(TaskImport::new("parent").with_external_id("1"));
        inbox.tasks.push(child);
        namespace.lists.push(inbox);
        namespace.lists.push(ListImport::new("Empty"));

        assert_eq!(namespace.task_count(), 2);
        assert_eq!(namespace.relation_count(), 1);
    }

    #[test]
    fn serializes_relation_kinds_as_map_keys() {
        let mut task = TaskImport::new("child").with_external_id("2");
        task.add_relation(RelationKind::ParentTask, "1");

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["relations"]["parent_task"][0], "1");
        assert_eq!(value["external_id"], "2");

        let back: TaskImport = serde_json::from_value(value).unwrap();
        assert_eq!(back, task);
    }
}
