//! Migration status persistence.
//!
//! # Responsibility
//! - Answer "has this user already imported from this service".
//! - Record completion inside the import transaction.
//!
//! # Invariants
//! - At most one row per (user, service), enforced by a UNIQUE constraint.
//! - `mark_complete` is idempotent; repeated calls keep the first row.
//! - `insert_completion` is not: a second row fails on the UNIQUE constraint.
//! - No caching: every read reflects the latest committed state visible to
//!   the connection.

use crate::model::record::UserId;
use crate::model::status::MigrationStatus;
use crate::repo::{ensure_schema_ready, parse_uuid, StoreResult, TableSpec};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

const REQUIRED_TABLES: &[TableSpec] = &[(
    "migration_status",
    &["user_uuid", "service", "finished_at"],
)];

/// Repository interface for migration status tracking.
pub trait MigrationStatusRepository {
    /// Returns whether (user, service) has a completion record.
    fn is_complete(&self, user: UserId, service: &str) -> StoreResult<bool>;
    /// Records completion; a second call is a no-op.
    fn mark_complete(&self, user: UserId, service: &str) -> StoreResult<()>;
    /// Records completion; an existing row is a unique violation.
    fn insert_completion(&self, user: UserId, service: &str) -> StoreResult<()>;
    /// Loads the completion record, if any.
    fn get_status(&self, user: UserId, service: &str) -> StoreResult<Option<MigrationStatus>>;
}

/// SQLite-backed migration status repository.
pub struct SqliteMigrationStatusRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMigrationStatusRepository<'conn> {
    /// Creates repository from a migrated connection or open transaction.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_schema_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl MigrationStatusRepository for SqliteMigrationStatusRepository<'_> {
    fn is_complete(&self, user: UserId, service: &str) -> StoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM migration_status
                WHERE user_uuid = ?1
                  AND service = ?2
            );",
            params![user.to_string(), service],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn mark_complete(&self, user: UserId, service: &str) -> StoreResult<()> {
        let inserted = self.conn.execute(
            "INSERT INTO migration_status (user_uuid, service)
             VALUES (?1, ?2)
             ON CONFLICT (user_uuid, service) DO NOTHING;",
            params![user.to_string(), service],
        )?;
        debug!(
            "event=migration_status_mark module=repo status=ok service={service} inserted={}",
            inserted == 1
        );
        Ok(())
    }

    fn insert_completion(&self, user: UserId, service: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO migration_status (user_uuid, service)
             VALUES (?1, ?2);",
            params![user.to_string(), service],
        )?;
        debug!("event=migration_status_insert module=repo status=ok service={service}");
        Ok(())
    }

    fn get_status(&self, user: UserId, service: &str) -> StoreResult<Option<MigrationStatus>> {
        let row: Option<(String, String, i64)> = self
            .conn
            .query_row(
                "SELECT user_uuid, service, finished_at
                 FROM migration_status
                 WHERE user_uuid = ?1
                   AND service = ?2;",
                params![user.to_string(), service],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(user_text, service, finished_at)| {
            Ok(MigrationStatus {
                user: parse_uuid(&user_text, "migration_status.user_uuid")?,
                service,
                completed: true,
                finished_at,
            })
        })
        .transpose()
    }
}
