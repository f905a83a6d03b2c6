//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into migration and reorder use-cases.
//! - Own transaction boundaries; repositories only see `&Connection`.

pub mod import_service;
pub mod migration_service;
pub mod position_service;
pub mod status_service;
