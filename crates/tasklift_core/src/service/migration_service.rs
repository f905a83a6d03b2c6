//! Migration entry point: status check, parse, import.
//!
//! # Responsibility
//! - Run one adapter against one export for one user.
//! - Resolve adapters by service name through a `MigratorRegistry`.
//!
//! # Invariants
//! - A completed (user, service) pair is rejected before parsing.
//! - Parse failures never reach storage.

use crate::migration::{MigrationError, Migrator, MigratorRegistry};
use crate::model::record::UserId;
use crate::model::status::MigrationStatus;
use crate::repo::status_repo::SqliteMigrationStatusRepository;
use crate::service::import_service::{ImportOptions, ImportService, ImportSummary};
use crate::service::status_service::{normalize_service, StatusService};
use log::warn;
use rusqlite::Connection;

/// Migration use-case over one SQLite connection.
pub struct MigrationService<'conn> {
    conn: &'conn Connection,
    options: ImportOptions,
}

impl<'conn> MigrationService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_options(conn, ImportOptions::default())
    }

    pub fn with_options(conn: &'conn Connection, options: ImportOptions) -> Self {
        Self { conn, options }
    }

    /// Parses `export` with `migrator` and imports it for `user`.
    pub fn migrate(
        &self,
        user: UserId,
        migrator: &dyn Migrator,
        export: &[u8],
    ) -> Result<ImportSummary, MigrationError> {
        let service = normalize_service(migrator.name())?;
        if self.status_service()?.is_complete(user, service)? {
            return Err(MigrationError::AlreadyMigrated {
                user,
                service: service.to_string(),
            });
        }

        let namespace = migrator.parse(export)?;
        ImportService::with_options(self.conn, self.options.clone()).import(
            user,
            service,
            &namespace,
        )
    }

    /// Same as `migrate`, with the adapter looked up by name.
    pub fn migrate_by_name(
        &self,
        registry: &MigratorRegistry,
        user: UserId,
        service: &str,
        export: &[u8],
    ) -> Result<ImportSummary, MigrationError> {
        let Some(migrator) = registry.get(service) else {
            warn!(
                "event=migration_lookup module=service status=error error_code=unknown_service registered={}",
                registry.len()
            );
            return Err(MigrationError::UnknownService(service.trim().to_string()));
        };
        self.migrate(user, migrator.as_ref(), export)
    }

    /// Completion record for (user, service), if any.
    pub fn status(
        &self,
        user: UserId,
        service: &str,
    ) -> Result<Option<MigrationStatus>, MigrationError> {
        Ok(self.status_service()?.get_status(user, service)?)
    }

    fn status_service(
        &self,
    ) -> Result<StatusService<SqliteMigrationStatusRepository<'conn>>, MigrationError> {
        let repo = SqliteMigrationStatusRepository::try_new(self.conn)?;
        Ok(StatusService::new(repo))
    }
}
