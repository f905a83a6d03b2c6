//! Migration status read model.

use crate::model::record::UserId;
use serde::{Deserialize, Serialize};

/// Completion record for one (user, service) pair.
///
/// Absent before the first successful import; written in the same
/// transaction as the imported rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub user: UserId,
    pub service: String,
    pub completed: bool,
    /// Epoch ms of the committing transaction.
    pub finished_at: i64,
}
