//! Transactional two-pass import of a canonical namespace.
//!
//! # Responsibility
//! - Persist one `NamespaceImport` for one user as a single unit of work.
//! - Translate external ids into internal ids and resolve relations.
//! - Record migration completion in the same transaction.
//!
//! # Invariants
//! - Either every row of the run is committed, or none is.
//! - A (user, service) pair imports at most once; the IMMEDIATE transaction
//!   plus the status UNIQUE constraint serialize concurrent attempts.
//! - Tasks of one list are created in candidate-position order and receive
//!   strictly increasing, well-spaced positions.
//! - Every stored relation has its inverse edge stored as well.

use crate::migration::MigrationError;
use crate::model::canonical::{NamespaceImport, TaskImport};
use crate::model::record::{LabelId, NamespaceId, TaskId, UserId};
use crate::position::assign_seeded;
use crate::repo::import_repo::{ImportStore, SqliteImportStore};
use crate::repo::status_repo::{MigrationStatusRepository, SqliteMigrationStatusRepository};
use crate::repo::StoreResult;
use crate::service::status_service::normalize_service;
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

/// How label titles map onto label rows during one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Every occurrence creates a new label row.
    #[default]
    PerOccurrence,
    /// Equal titles share one label created during this run.
    ReuseWithinRun,
    /// Equal titles share one label, preferring the user's existing labels.
    ReuseExisting,
}

/// Tunables for one import run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportOptions {
    pub label_policy: LabelPolicy,
    /// Overrides the namespace title chosen by the adapter.
    pub namespace_title: Option<String>,
}

/// Counts of rows written by a committed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub namespace_id: NamespaceId,
    pub lists: usize,
    pub tasks: usize,
    /// Label rows created (reused labels are not counted).
    pub labels: usize,
    /// Source relations written; each also produced its inverse edge.
    pub relations: usize,
}

/// Import use-case over one SQLite connection.
pub struct ImportService<'conn> {
    conn: &'conn Connection,
    options: ImportOptions,
}

impl<'conn> ImportService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_options(conn, ImportOptions::default())
    }

    pub fn with_options(conn: &'conn Connection, options: ImportOptions) -> Self {
        Self { conn, options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Imports `namespace` for `user` and marks `service` as migrated.
    ///
    /// # Errors
    /// - `AlreadyMigrated` when a completion record exists, before or inside
    ///   the transaction.
    /// - `UnresolvedRelation`, `SelfRelation` or `DuplicateExternalId` when
    ///   the batch is inconsistent; nothing is written.
    /// - `Storage` for any database failure or a blank `service`; nothing is
    ///   written. A write lock held past the busy timeout reports
    ///   `storage_busy` as its code.
    pub fn import(
        &self,
        user: UserId,
        service: &str,
        namespace: &NamespaceImport,
    ) -> Result<ImportSummary, MigrationError> {
        let service = normalize_service(service)?;
        let started_at = Instant::now();
        info!(
            "event=migration_import module=service status=start service={service} lists={} tasks={}",
            namespace.lists.len(),
            namespace.task_count()
        );

        let result = self.import_in_transaction(user, service, namespace);

        match &result {
            Ok(summary) => info!(
                "event=migration_import module=service status=ok service={service} duration_ms={} namespace_id={} lists={} tasks={} labels={} relations={}",
                started_at.elapsed().as_millis(),
                summary.namespace_id,
                summary.lists,
                summary.tasks,
                summary.labels,
                summary.relations
            ),
            Err(err) => error!(
                "event=migration_import module=service status=error service={service} duration_ms={} error_code={}",
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }

    fn import_in_transaction(
        &self,
        user: UserId,
        service: &str,
        namespace: &NamespaceImport,
    ) -> Result<ImportSummary, MigrationError> {
        let status = SqliteMigrationStatusRepository::try_new(self.conn)?;
        if status.is_complete(user, service)? {
            return Err(already_migrated(user, service));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let store = SqliteImportStore::try_new(&tx)?;
        let status = SqliteMigrationStatusRepository::try_new(&tx)?;
        let summary = insert_structure(&store, &status, user, service, namespace, &self.options)?;
        tx.commit()?;
        Ok(summary)
    }
}

/// Writes the whole namespace through `store` and marks completion.
///
/// The caller owns the transaction; on error it must be rolled back. A
/// completion row appearing between the check and the final insert surfaces
/// as `AlreadyMigrated`; every other store error is returned unchanged.
pub fn insert_structure<S, T>(
    store: &S,
    status: &T,
    user: UserId,
    service: &str,
    namespace: &NamespaceImport,
    options: &ImportOptions,
) -> Result<ImportSummary, MigrationError>
where
    S: ImportStore,
    T: MigrationStatusRepository,
{
    if status.is_complete(user, service)? {
        return Err(already_migrated(user, service));
    }

    let title = options
        .namespace_title
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(namespace.title.as_str());
    let namespace_id = store.create_namespace(user, title)?;

    let mut labels = LabelResolver::new(options.label_policy, user);
    let mut external_ids: HashMap<&str, TaskId> = HashMap::new();
    let mut created: Vec<(TaskId, &TaskImport)> = Vec::with_capacity(namespace.task_count());

    for list in &namespace.lists {
        let list_id = store.create_list(namespace_id, &list.title)?;

        let mut ordered: Vec<&TaskImport> = list.tasks.iter().collect();
        ordered.sort_by(|left, right| compare_seeds(left.position, right.position));
        let seeds: Vec<Option<f64>> = ordered.iter().map(|task| task.position).collect();
        let positions = assign_seeded(&seeds);

        for (task, position) in ordered.into_iter().zip(positions) {
            let task_id = store.create_task(list_id, task, position)?;
            for &reminder_at in &task.reminders {
                store.add_reminder(task_id, reminder_at)?;
            }
            for attachment in &task.attachments {
                store.add_attachment(task_id, attachment)?;
            }
            for label in &task.labels {
                if let Some(label_id) = labels.resolve(store, &label.title)? {
                    store.attach_label(task_id, label_id)?;
                }
            }
            if let Some(external_id) = task.external_id.as_deref() {
                if external_ids.insert(external_id, task_id).is_some() {
                    return Err(MigrationError::DuplicateExternalId(external_id.to_string()));
                }
            }
            created.push((task_id, task));
        }
    }

    let mut relations = 0;
    for (task_id, task) in &created {
        for (&kind, targets) in &task.relations {
            for target in targets {
                let source = task.external_id.clone().unwrap_or_default();
                let other_task_id = external_ids.get(target.as_str()).copied().ok_or_else(|| {
                    MigrationError::UnresolvedRelation {
                        task: source.clone(),
                        kind,
                        target: target.clone(),
                    }
                })?;
                if other_task_id == *task_id {
                    return Err(MigrationError::SelfRelation { task: source, kind });
                }
                store.create_relation(*task_id, other_task_id, kind)?;
                store.create_relation(other_task_id, *task_id, kind.inverse())?;
                relations += 1;
            }
        }
    }

    status
        .insert_completion(user, service)
        .map_err(|err| {
            if err.is_unique_violation() {
                already_migrated(user, service)
            } else {
                err.into()
            }
        })?;

    Ok(ImportSummary {
        namespace_id,
        lists: namespace.lists.len(),
        tasks: created.len(),
        labels: labels.created,
        relations,
    })
}

fn already_migrated(user: UserId, service: &str) -> MigrationError {
    MigrationError::AlreadyMigrated {
        user,
        service: service.to_string(),
    }
}

/// Stable order on candidate positions; unusable seeds sort last.
fn compare_seeds(left: Option<f64>, right: Option<f64>) -> Ordering {
    let usable = |value: Option<f64>| value.filter(|seed| seed.is_finite());
    match (usable(left), usable(right)) {
        (Some(left), Some(right)) => left.total_cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

struct LabelResolver {
    policy: LabelPolicy,
    owner: UserId,
    by_title: HashMap<String, LabelId>,
    created: usize,
}

impl LabelResolver {
    fn new(policy: LabelPolicy, owner: UserId) -> Self {
        Self {
            policy,
            owner,
            by_title: HashMap::new(),
            created: 0,
        }
    }

    /// Returns the label to attach, or `None` for a blank title.
    fn resolve<S: ImportStore>(&mut self, store: &S, title: &str) -> StoreResult<Option<LabelId>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }
        if self.policy != LabelPolicy::PerOccurrence {
            if let Some(label_id) = self.by_title.get(title) {
                return Ok(Some(*label_id));
            }
        }
        if self.policy == LabelPolicy::ReuseExisting {
            if let Some(label_id) = store.find_label_by_title(self.owner, title)? {
                self.by_title.insert(title.to_string(), label_id);
                return Ok(Some(label_id));
            }
        }

        let label_id = store.create_label(self.owner, title)?;
        self.created += 1;
        if self.policy != LabelPolicy::PerOccurrence {
            self.by_title.insert(title.to_string(), label_id);
        }
        Ok(Some(label_id))
    }
}
