//! Core of the task migration engine.
//!
//! Parses third-party task exports into a canonical model and imports them
//! into the SQLite task store as one transaction per (user, service).

pub mod config;
pub mod db;
pub mod logging;
pub mod migration;
pub mod model;
pub mod position;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, LoggingConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use migration::{MigrationError, Migrator, MigratorRegistry, ParseError, RegistryError};
pub use model::canonical::{
    AttachmentImport, ExternalId, LabelImport, ListImport, NamespaceImport, RelationKind,
    TaskImport,
};
pub use model::record::{
    AttachmentRecord, LabelId, LabelRecord, ListId, ListRecord, NamespaceId, NamespaceRecord,
    RelationRecord, TaskId, TaskRecord, UserId,
};
pub use model::status::MigrationStatus;
pub use position::{Placement, PrecisionExhausted};
pub use repo::{StoreError, StoreResult};
pub use service::import_service::{ImportOptions, ImportService, ImportSummary, LabelPolicy};
pub use service::migration_service::MigrationService;
pub use service::position_service::{PositionService, PositionServiceError};
pub use service::status_service::StatusService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
