//! Read-side task queries and position writes.
//!
//! # Responsibility
//! - Load imported namespaces, lists and tasks with their child rows.
//! - Persist position changes for interactive reordering.
//!
//! # Invariants
//! - Task listing is deterministic: `position ASC, seq ASC`, with legacy
//!   rows lacking a position sorted last by insertion sequence.
//! - Position writes never touch other task columns besides `updated_at`.

use crate::model::canonical::RelationKind;
use crate::model::record::{
    AttachmentRecord, LabelRecord, ListId, ListRecord, NamespaceId, NamespaceRecord,
    RelationRecord, TaskId, TaskRecord, UserId,
};
use crate::repo::{ensure_schema_ready, parse_bool, parse_uuid, StoreError, StoreResult, TableSpec};
use rusqlite::{params, Connection, Row};

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    list_uuid,
    seq,
    title,
    description,
    start_date,
    end_date,
    due_date,
    done,
    done_at,
    priority,
    repeat_rule,
    position
FROM tasks";

const REQUIRED_TABLES: &[TableSpec] = &[
    ("namespaces", &["uuid", "owner_uuid", "title", "created_at"]),
    ("lists", &["uuid", "namespace_uuid", "title", "created_at"]),
    ("tasks", &["uuid", "list_uuid", "seq", "position", "updated_at"]),
    ("task_reminders", &["task_uuid", "reminder_at"]),
    ("task_labels", &["task_uuid", "label_uuid"]),
    (
        "task_relations",
        &["task_uuid", "other_task_uuid", "relation_kind"],
    ),
    ("task_attachments", &["task_uuid", "file_name", "data"]),
];

/// Repository interface for task reads and position updates.
pub trait TaskRepository {
    fn list_namespaces(&self, owner: UserId) -> StoreResult<Vec<NamespaceRecord>>;
    /// Lists of one namespace in creation order.
    fn list_lists(&self, namespace_id: NamespaceId) -> StoreResult<Vec<ListRecord>>;
    fn get_list(&self, list_id: ListId) -> StoreResult<Option<ListRecord>>;
    fn get_task(&self, task_id: TaskId) -> StoreResult<Option<TaskRecord>>;
    /// Siblings of one list in position order.
    fn list_tasks(&self, list_id: ListId) -> StoreResult<Vec<TaskRecord>>;
    fn task_labels(&self, task_id: TaskId) -> StoreResult<Vec<LabelRecord>>;
    fn list_labels(&self, owner: UserId) -> StoreResult<Vec<LabelRecord>>;
    fn task_reminders(&self, task_id: TaskId) -> StoreResult<Vec<i64>>;
    fn task_relations(&self, task_id: TaskId) -> StoreResult<Vec<RelationRecord>>;
    fn task_attachments(&self, task_id: TaskId) -> StoreResult<Vec<AttachmentRecord>>;
    /// Overwrites one task's position.
    fn update_position(&self, task_id: TaskId, position: f64) -> StoreResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from a migrated connection or open transaction.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_schema_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn list_namespaces(&self, owner: UserId) -> StoreResult<Vec<NamespaceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, owner_uuid, title, created_at
             FROM namespaces
             WHERE owner_uuid = ?1
             ORDER BY created_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([owner.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get("uuid")?;
            let owner: String = row.get("owner_uuid")?;
            items.push(NamespaceRecord {
                id: parse_uuid(&id, "namespaces.uuid")?,
                owner: parse_uuid(&owner, "namespaces.owner_uuid")?,
                title: row.get("title")?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(items)
    }

    fn list_lists(&self, namespace_id: NamespaceId) -> StoreResult<Vec<ListRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, namespace_uuid, title, created_at
             FROM lists
             WHERE namespace_uuid = ?1
             ORDER BY created_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([namespace_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get("uuid")?;
            let namespace: String = row.get("namespace_uuid")?;
            items.push(ListRecord {
                id: parse_uuid(&id, "lists.uuid")?,
                namespace_id: parse_uuid(&namespace, "lists.namespace_uuid")?,
                title: row.get("title")?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(items)
    }

    fn get_list(&self, list_id: ListId) -> StoreResult<Option<ListRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, namespace_uuid, title, created_at
             FROM lists
             WHERE uuid = ?1;",
        )?;
        let mut rows = stmt.query([list_id.to_string()])?;
        if let Some(row) = rows.next()? {
            let namespace: String = row.get("namespace_uuid")?;
            return Ok(Some(ListRecord {
                id: list_id,
                namespace_id: parse_uuid(&namespace, "lists.namespace_uuid")?,
                title: row.get("title")?,
                created_at: row.get("created_at")?,
            }));
        }
        Ok(None)
    }

    fn get_task(&self, task_id: TaskId) -> StoreResult<Option<TaskRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([task_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_tasks(&self, list_id: ListId) -> StoreResult<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE list_uuid = ?1
             ORDER BY position IS NULL ASC, position ASC, seq ASC;"
        ))?;
        let mut rows = stmt.query([list_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_task_row(row)?);
        }
        Ok(items)
    }

    fn task_labels(&self, task_id: TaskId) -> StoreResult<Vec<LabelRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.uuid, l.owner_uuid, l.title
             FROM task_labels tl
             INNER JOIN labels l ON l.uuid = tl.label_uuid
             WHERE tl.task_uuid = ?1
             ORDER BY l.title ASC, l.uuid ASC;",
        )?;
        let mut rows = stmt.query([task_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_label_row(row)?);
        }
        Ok(items)
    }

    fn list_labels(&self, owner: UserId) -> StoreResult<Vec<LabelRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, owner_uuid, title
             FROM labels
             WHERE owner_uuid = ?1
             ORDER BY title ASC, uuid ASC;",
        )?;
        let mut rows = stmt.query([owner.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_label_row(row)?);
        }
        Ok(items)
    }

    fn task_reminders(&self, task_id: TaskId) -> StoreResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT reminder_at
             FROM task_reminders
             WHERE task_uuid = ?1
             ORDER BY reminder_at ASC;",
        )?;
        let mut rows = stmt.query([task_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(row.get(0)?);
        }
        Ok(items)
    }

    fn task_relations(&self, task_id: TaskId) -> StoreResult<Vec<RelationRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT task_uuid, other_task_uuid, relation_kind
             FROM task_relations
             WHERE task_uuid = ?1
             ORDER BY relation_kind ASC, other_task_uuid ASC;",
        )?;
        let mut rows = stmt.query([task_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let task: String = row.get(0)?;
            let other: String = row.get(1)?;
            let kind_text: String = row.get(2)?;
            let kind = RelationKind::parse(&kind_text).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "invalid relation kind `{kind_text}` in task_relations.relation_kind"
                ))
            })?;
            items.push(RelationRecord {
                task_id: parse_uuid(&task, "task_relations.task_uuid")?,
                other_task_id: parse_uuid(&other, "task_relations.other_task_uuid")?,
                kind,
            });
        }
        Ok(items)
    }

    fn task_attachments(&self, task_id: TaskId) -> StoreResult<Vec<AttachmentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_name, data
             FROM task_attachments
             WHERE task_uuid = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([task_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(AttachmentRecord {
                task_id,
                file_name: row.get(0)?,
                data: row.get(1)?,
            });
        }
        Ok(items)
    }

    fn update_position(&self, task_id: TaskId, position: f64) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET position = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![task_id.to_string(), position],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "task",
                id: task_id,
            });
        }
        Ok(())
    }
}

fn parse_task_row(row: &Row<'_>) -> StoreResult<TaskRecord> {
    let id: String = row.get("uuid")?;
    let list: String = row.get("list_uuid")?;
    Ok(TaskRecord {
        id: parse_uuid(&id, "tasks.uuid")?,
        list_id: parse_uuid(&list, "tasks.list_uuid")?,
        seq: row.get("seq")?,
        title: row.get("title")?,
        description: row.get("description")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        due_date: row.get("due_date")?,
        done: parse_bool(row.get("done")?, "tasks.done")?,
        done_at: row.get("done_at")?,
        priority: row.get("priority")?,
        repeat: row.get("repeat_rule")?,
        position: row.get("position")?,
    })
}

fn parse_label_row(row: &Row<'_>) -> StoreResult<LabelRecord> {
    let id: String = row.get(0)?;
    let owner: String = row.get(1)?;
    Ok(LabelRecord {
        id: parse_uuid(&id, "labels.uuid")?,
        owner: parse_uuid(&owner, "labels.owner_uuid")?,
        title: row.get(2)?,
    })
}
