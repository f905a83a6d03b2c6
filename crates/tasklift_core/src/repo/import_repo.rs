//! Write-side storage contract used by the import pipeline.
//!
//! # Responsibility
//! - Create namespace/list/task/label/relation rows for one import run.
//! - Stay transaction-agnostic: the caller owns the ambient transaction and
//!   hands its connection in.
//!
//! # Invariants
//! - Every create call generates a fresh v4 id; nothing is merged into rows
//!   that existed before the run.
//! - Reminder, label-link and relation inserts are idempotent per key.

use crate::model::canonical::{AttachmentImport, RelationKind, TaskImport};
use crate::model::record::{LabelId, ListId, NamespaceId, TaskId, UserId};
use crate::repo::{bool_to_int, ensure_schema_ready, parse_uuid, StoreResult, TableSpec};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

const REQUIRED_TABLES: &[TableSpec] = &[
    ("namespaces", &["uuid", "owner_uuid", "title"]),
    ("lists", &["uuid", "namespace_uuid", "title"]),
    (
        "tasks",
        &[
            "uuid",
            "list_uuid",
            "title",
            "description",
            "start_date",
            "end_date",
            "due_date",
            "done",
            "done_at",
            "priority",
            "repeat_rule",
            "position",
            "created_at",
        ],
    ),
    ("task_reminders", &["task_uuid", "reminder_at"]),
    ("labels", &["uuid", "owner_uuid", "title"]),
    ("task_labels", &["task_uuid", "label_uuid"]),
    (
        "task_relations",
        &["task_uuid", "other_task_uuid", "relation_kind"],
    ),
    ("task_attachments", &["task_uuid", "file_name", "data"]),
];

/// Storage collaborator for one import run.
pub trait ImportStore {
    /// Creates a namespace owned by `owner`.
    fn create_namespace(&self, owner: UserId, title: &str) -> StoreResult<NamespaceId>;
    /// Creates a list under `namespace_id`.
    fn create_list(&self, namespace_id: NamespaceId, title: &str) -> StoreResult<ListId>;
    /// Creates a task row with an already allocated position.
    fn create_task(&self, list_id: ListId, task: &TaskImport, position: f64)
        -> StoreResult<TaskId>;
    /// Adds one reminder instant to a task.
    fn add_reminder(&self, task_id: TaskId, reminder_at: i64) -> StoreResult<()>;
    /// Stores one opaque attachment.
    fn add_attachment(&self, task_id: TaskId, attachment: &AttachmentImport) -> StoreResult<()>;
    /// Creates a label owned by `owner`.
    fn create_label(&self, owner: UserId, title: &str) -> StoreResult<LabelId>;
    /// Finds the oldest label of `owner` with exactly `title`.
    fn find_label_by_title(&self, owner: UserId, title: &str) -> StoreResult<Option<LabelId>>;
    /// Links a label to a task.
    fn attach_label(&self, task_id: TaskId, label_id: LabelId) -> StoreResult<()>;
    /// Writes one directed relation edge.
    fn create_relation(
        &self,
        task_id: TaskId,
        other_task_id: TaskId,
        kind: RelationKind,
    ) -> StoreResult<()>;
}

/// SQLite-backed import store.
pub struct SqliteImportStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteImportStore<'conn> {
    /// Creates a store over a migrated connection or open transaction.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_schema_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl ImportStore for SqliteImportStore<'_> {
    fn create_namespace(&self, owner: UserId, title: &str) -> StoreResult<NamespaceId> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO namespaces (uuid, owner_uuid, title) VALUES (?1, ?2, ?3);",
            params![id.to_string(), owner.to_string(), title],
        )?;
        Ok(id)
    }

    fn create_list(&self, namespace_id: NamespaceId, title: &str) -> StoreResult<ListId> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO lists (uuid, namespace_uuid, title) VALUES (?1, ?2, ?3);",
            params![id.to_string(), namespace_id.to_string(), title],
        )?;
        Ok(id)
    }

    fn create_task(
        &self,
        list_id: ListId,
        task: &TaskImport,
        position: f64,
    ) -> StoreResult<TaskId> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO tasks (
                uuid,
                list_uuid,
                title,
                description,
                start_date,
                end_date,
                due_date,
                done,
                done_at,
                priority,
                repeat_rule,
                position,
                created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                COALESCE(?13, strftime('%s', 'now') * 1000)
            );",
            params![
                id.to_string(),
                list_id.to_string(),
                task.title.as_str(),
                task.description.as_str(),
                task.start_date,
                task.end_date,
                task.due_date,
                bool_to_int(task.done),
                task.done_at,
                task.priority,
                task.repeat.as_deref(),
                position,
                task.created,
            ],
        )?;
        Ok(id)
    }

    fn add_reminder(&self, task_id: TaskId, reminder_at: i64) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO task_reminders (task_uuid, reminder_at) VALUES (?1, ?2);",
            params![task_id.to_string(), reminder_at],
        )?;
        Ok(())
    }

    fn add_attachment(&self, task_id: TaskId, attachment: &AttachmentImport) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO task_attachments (task_uuid, file_name, data) VALUES (?1, ?2, ?3);",
            params![
                task_id.to_string(),
                attachment.file_name.as_str(),
                attachment.data.as_slice(),
            ],
        )?;
        Ok(())
    }

    fn create_label(&self, owner: UserId, title: &str) -> StoreResult<LabelId> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO labels (uuid, owner_uuid, title) VALUES (?1, ?2, ?3);",
            params![id.to_string(), owner.to_string(), title],
        )?;
        Ok(id)
    }

    fn find_label_by_title(&self, owner: UserId, title: &str) -> StoreResult<Option<LabelId>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT uuid
                 FROM labels
                 WHERE owner_uuid = ?1
                   AND title = ?2
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT 1;",
                params![owner.to_string(), title],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|text| parse_uuid(&text, "labels.uuid"))
            .transpose()
    }

    fn attach_label(&self, task_id: TaskId, label_id: LabelId) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO task_labels (task_uuid, label_uuid) VALUES (?1, ?2);",
            params![task_id.to_string(), label_id.to_string()],
        )?;
        Ok(())
    }

    fn create_relation(
        &self,
        task_id: TaskId,
        other_task_id: TaskId,
        kind: RelationKind,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO task_relations (task_uuid, other_task_uuid, relation_kind)
             VALUES (?1, ?2, ?3);",
            params![task_id.to_string(), other_task_id.to_string(), kind.as_str()],
        )?;
        Ok(())
    }
}
