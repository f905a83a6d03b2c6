//! Migration adapter contract and registry.
//!
//! # Responsibility
//! - Define what a per-service adapter must provide.
//! - Register adapters by stable service name for lookup by callers.
//!
//! # Invariants
//! - Adapters emit canonical model values only.
//! - `parse` either returns a complete model or the first `ParseError`.
//! - Service names are lowercase `[a-z0-9_-]` and unique per registry.

use crate::model::canonical::NamespaceImport;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod error;
pub mod ticktick;

pub use error::{MigrationError, ParseError};

/// Per-service export parser.
pub trait Migrator: Send + Sync {
    /// Stable service identifier; keys migration status.
    fn name(&self) -> &str;
    /// Parses a raw export into the canonical model.
    fn parse(&self, export: &[u8]) -> Result<NamespaceImport, ParseError>;
}

/// Adapter registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidName(String),
    DuplicateName(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "migrator name is invalid: `{value}`"),
            Self::DuplicateName(value) => write!(f, "migrator already registered: `{value}`"),
        }
    }
}

impl Error for RegistryError {}

/// In-process adapter registry.
#[derive(Default)]
pub struct MigratorRegistry {
    migrators: BTreeMap<String, Arc<dyn Migrator>>,
}

impl MigratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every adapter shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.migrators.insert(
            ticktick::SERVICE_NAME.to_string(),
            Arc::new(ticktick::TickTickMigrator::new()),
        );
        registry
    }

    /// Registers one adapter under its own name.
    pub fn register(&mut self, migrator: Arc<dyn Migrator>) -> Result<(), RegistryError> {
        let name = migrator.name().trim().to_string();
        if !is_valid_name(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        if self.migrators.contains_key(name.as_str()) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.migrators.insert(name, migrator);
        Ok(())
    }

    /// Looks an adapter up by service name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Migrator>> {
        self.migrators.get(name.trim()).cloned()
    }

    /// Returns sorted service names.
    pub fn names(&self) -> Vec<String> {
        self.migrators.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.migrators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrators.is_empty()
    }
}

fn is_valid_name(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
