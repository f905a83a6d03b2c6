//! Persisted read models for imported task data.
//!
//! # Responsibility
//! - Define identifiers and row shapes returned by repositories.
//!
//! # Invariants
//! - Ids are stable v4 UUIDs generated at insert time.
//! - Timestamps are Unix epoch milliseconds.

use crate::model::canonical::RelationKind;
use uuid::Uuid;

/// Authenticated caller identity supplied by the outer layer.
pub type UserId = Uuid;
pub type NamespaceId = Uuid;
pub type ListId = Uuid;
pub type TaskId = Uuid;
pub type LabelId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRecord {
    pub id: NamespaceId,
    pub owner: UserId,
    pub title: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRecord {
    pub id: ListId,
    pub namespace_id: NamespaceId,
    pub title: String,
    pub created_at: i64,
}

/// Task row as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: TaskId,
    pub list_id: ListId,
    /// Insertion sequence; seeds legacy position backfill.
    pub seq: i64,
    pub title: String,
    pub description: String,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub due_date: Option<i64>,
    pub done: bool,
    pub done_at: Option<i64>,
    pub priority: i64,
    pub repeat: Option<String>,
    /// `None` only for legacy rows awaiting backfill.
    pub position: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub id: LabelId,
    pub owner: UserId,
    pub title: String,
}

/// Stored attachment, returned byte-for-byte as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    pub task_id: TaskId,
    pub file_name: String,
    pub data: Vec<u8>,
}

/// One directed relation edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationRecord {
    pub task_id: TaskId,
    pub other_task_id: TaskId,
    pub kind: RelationKind,
}
