//! Interactive task reordering on top of the fractional allocator.
//!
//! # Responsibility
//! - Move a task to a target index inside its list.
//! - Rebalance a list on demand and upgrade legacy rows without a position.
//!
//! # Invariants
//! - Every write runs in an IMMEDIATE transaction, so concurrent movers in
//!   one database serialize and re-read neighbours after acquiring the lock.
//! - A moved task lands strictly between its new neighbours.
//! - A rebalance never changes the relative order of siblings.

use crate::model::record::{ListId, TaskId, TaskRecord};
use crate::position::{default_position, initial_sequence, insert_at, Placement, Positioned};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::StoreError;
use log::info;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from reorder operations.
#[derive(Debug)]
pub enum PositionServiceError {
    TaskNotFound(TaskId),
    ListNotFound(ListId),
    /// Repository-level failure.
    Store(StoreError),
}

impl Display for PositionServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::ListNotFound(id) => write!(f, "list not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PositionServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for PositionServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound {
                entity: "task",
                id,
            } => Self::TaskNotFound(id),
            other => Self::Store(other),
        }
    }
}

impl From<rusqlite::Error> for PositionServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value.into())
    }
}

/// Sibling reduced to what the allocator needs.
struct Slot {
    id: TaskId,
    position: f64,
}

impl Positioned for Slot {
    fn position(&self) -> f64 {
        self.position
    }

    fn set_position(&mut self, position: f64) {
        self.position = position;
    }
}

/// Reorder service over one SQLite connection.
pub struct PositionService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> PositionService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Moves `task_id` so it ends up at `target_index` among its siblings.
    ///
    /// Indexes past the end append. Legacy siblings without a position are
    /// backfilled first.
    pub fn move_task(
        &self,
        task_id: TaskId,
        target_index: usize,
    ) -> Result<Placement, PositionServiceError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let repo = SqliteTaskRepository::try_new(&tx)?;

        let task = repo
            .get_task(task_id)?
            .ok_or(PositionServiceError::TaskNotFound(task_id))?;
        let siblings = load_positioned(&repo, task.list_id)?;

        let mut slots: Vec<Slot> = siblings
            .into_iter()
            .filter(|sibling| sibling.id != task_id)
            .map(|sibling| Slot {
                id: sibling.id,
                position: sibling.position.unwrap_or_else(|| default_position(sibling.seq)),
            })
            .collect();
        let placement = insert_at(
            &mut slots,
            target_index,
            Slot {
                id: task_id,
                position: 0.0,
            },
        );

        if placement.rebalanced {
            for slot in &slots {
                repo.update_position(slot.id, slot.position)?;
            }
            info!(
                "event=position_rebalance module=service status=ok list_id={} tasks={} trigger=move",
                task.list_id,
                slots.len()
            );
        } else {
            repo.update_position(task_id, placement.position)?;
        }

        tx.commit()?;
        Ok(placement)
    }

    /// Renumbers every task of `list_id` to `initial_sequence`, keeping order.
    ///
    /// Returns the number of tasks rewritten.
    pub fn rebalance_list(&self, list_id: ListId) -> Result<usize, PositionServiceError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let repo = SqliteTaskRepository::try_new(&tx)?;
        ensure_list_exists(&repo, list_id)?;

        let tasks = load_positioned(&repo, list_id)?;
        let positions = initial_sequence(tasks.len());
        for (task, position) in tasks.iter().zip(positions) {
            repo.update_position(task.id, position)?;
        }

        tx.commit()?;
        info!(
            "event=position_rebalance module=service status=ok list_id={list_id} tasks={} trigger=manual",
            tasks.len()
        );
        Ok(tasks.len())
    }

    /// Assigns `default_position(seq)` to tasks of `list_id` stored without a
    /// position. Returns the number of rows upgraded.
    pub fn backfill_positions(&self, list_id: ListId) -> Result<usize, PositionServiceError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let repo = SqliteTaskRepository::try_new(&tx)?;
        ensure_list_exists(&repo, list_id)?;

        let upgraded = backfill_missing(&repo, &repo.list_tasks(list_id)?)?;
        tx.commit()?;
        if upgraded > 0 {
            info!(
                "event=position_backfill module=service status=ok list_id={list_id} tasks={upgraded}"
            );
        }
        Ok(upgraded)
    }
}

fn ensure_list_exists<R: TaskRepository>(
    repo: &R,
    list_id: ListId,
) -> Result<(), PositionServiceError> {
    if repo.get_list(list_id)?.is_none() {
        return Err(PositionServiceError::ListNotFound(list_id));
    }
    Ok(())
}

/// Lists siblings after upgrading any legacy rows.
fn load_positioned<R: TaskRepository>(
    repo: &R,
    list_id: ListId,
) -> Result<Vec<TaskRecord>, PositionServiceError> {
    let tasks = repo.list_tasks(list_id)?;
    if backfill_missing(repo, &tasks)? == 0 {
        return Ok(tasks);
    }
    Ok(repo.list_tasks(list_id)?)
}

fn backfill_missing<R: TaskRepository>(
    repo: &R,
    tasks: &[TaskRecord],
) -> Result<usize, PositionServiceError> {
    let mut upgraded = 0;
    for task in tasks.iter().filter(|task| task.position.is_none()) {
        repo.update_position(task.id, default_position(task.seq))?;
        upgraded += 1;
    }
    Ok(upgraded)
}
