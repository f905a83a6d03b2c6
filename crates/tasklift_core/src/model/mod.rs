//! Domain model for imported task data.
//!
//! # Responsibility
//! - `canonical`: the adapter-to-pipeline contract (external ids, seeds).
//! - `record`: rows as persisted, keyed by internal ids.
//! - `status`: per (user, service) migration completion.
//!
//! # Invariants
//! - Canonical values never carry internal ids; records always do.

pub mod canonical;
pub mod record;
pub mod status;
