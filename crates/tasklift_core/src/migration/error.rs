//! Error types for parsing and importing third-party exports.
//!
//! # Invariants
//! - `ParseError` always identifies the offending record and field.
//! - `MigrationError::Storage` carries the store error unchanged.
//! - Position precision signals never appear here; they are handled inside
//!   the allocator callers.

use crate::model::canonical::{ExternalId, RelationKind};
use crate::model::record::UserId;
use crate::repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_VALUE_CHARS: usize = 64;

/// A field in the source export failed type or format validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based record (line) number in the export.
    pub record: u64,
    /// Column or field name.
    pub field: &'static str,
    /// Offending raw value, single-line and truncated.
    pub value: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(record: u64, field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            record,
            field,
            value: sanitize_value(value),
            reason: reason.into(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "record {} field `{}`: {} (value `{}`)",
            self.record, self.field, self.reason, self.value
        )
    }
}

impl Error for ParseError {}

/// Failure of one migration run. Any variant means nothing was persisted.
#[derive(Debug)]
pub enum MigrationError {
    /// The export could not be parsed.
    MalformedInput(ParseError),
    /// (user, service) already has a completion record.
    AlreadyMigrated { user: UserId, service: String },
    /// A relation points at an external id absent from the batch.
    UnresolvedRelation {
        task: ExternalId,
        kind: RelationKind,
        target: ExternalId,
    },
    /// A task relates to itself.
    SelfRelation { task: ExternalId, kind: RelationKind },
    /// Two tasks of one batch share an external id.
    DuplicateExternalId(ExternalId),
    /// No adapter is registered under this name.
    UnknownService(String),
    /// Storage collaborator failure.
    Storage(StoreError),
}

impl MigrationError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::AlreadyMigrated { .. } => "already_migrated",
            Self::UnresolvedRelation { .. } => "unresolved_relation",
            Self::SelfRelation { .. } => "self_relation",
            Self::DuplicateExternalId(_) => "duplicate_external_id",
            Self::UnknownService(_) => "unknown_service",
            Self::Storage(err) if err.is_busy() => "storage_busy",
            Self::Storage(_) => "storage_failure",
        }
    }
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedInput(err) => write!(f, "malformed input: {err}"),
            Self::AlreadyMigrated { user, service } => {
                write!(f, "user {user} already migrated from `{service}`")
            }
            Self::UnresolvedRelation { task, kind, target } => write!(
                f,
                "task `{task}` has {} relation to unknown task `{target}`",
                kind.as_str()
            ),
            Self::SelfRelation { task, kind } => {
                write!(f, "task `{task}` has {} relation to itself", kind.as_str())
            }
            Self::DuplicateExternalId(id) => write!(f, "external task id `{id}` appears twice"),
            Self::UnknownService(name) => write!(f, "no migrator registered for `{name}`"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedInput(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for MigrationError {
    fn from(value: ParseError) -> Self {
        Self::MalformedInput(value)
    }
}

impl From<StoreError> for MigrationError {
    fn from(value: StoreError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for MigrationError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.into())
    }
}

fn sanitize_value(value: &str) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(MAX_VALUE_CHARS).collect::<String>();
    if normalized.chars().count() > MAX_VALUE_CHARS {
        truncated.push_str("...");
    }
    truncated
}
