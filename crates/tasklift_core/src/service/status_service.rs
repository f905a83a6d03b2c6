//! Migration status queries for callers.
//!
//! # Responsibility
//! - Answer whether a user may still import from a service.
//! - Reject blank service keys before they reach storage.

use crate::model::record::UserId;
use crate::model::status::MigrationStatus;
use crate::repo::status_repo::MigrationStatusRepository;
use crate::repo::{StoreError, StoreResult};

/// Status service facade.
pub struct StatusService<R: MigrationStatusRepository> {
    repo: R,
}

impl<R: MigrationStatusRepository> StatusService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn is_complete(&self, user: UserId, service: &str) -> StoreResult<bool> {
        self.repo.is_complete(user, normalize_service(service)?)
    }

    /// Records completion outside an import run; idempotent.
    pub fn mark_complete(&self, user: UserId, service: &str) -> StoreResult<()> {
        self.repo.mark_complete(user, normalize_service(service)?)
    }

    pub fn get_status(&self, user: UserId, service: &str) -> StoreResult<Option<MigrationStatus>> {
        self.repo.get_status(user, normalize_service(service)?)
    }
}

/// Trims `service`; blank keys are rejected.
pub(crate) fn normalize_service(service: &str) -> StoreResult<&str> {
    let trimmed = service.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidData(
            "service name must not be blank".to_string(),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::StatusService;
    use crate::model::record::UserId;
    use crate::model::status::MigrationStatus;
    use crate::repo::status_repo::MigrationStatusRepository;
    use crate::repo::{StoreError, StoreResult};
    use std::cell::RefCell;
    use uuid::Uuid;

    #[derive(Default)]
    struct MemoryStatusRepo {
        rows: RefCell<Vec<(UserId, String)>>,
    }

    impl MigrationStatusRepository for MemoryStatusRepo {
        fn is_complete(&self, user: UserId, service: &str) -> StoreResult<bool> {
            Ok(self
                .rows
                .borrow()
                .iter()
                .any(|(row_user, row_service)| *row_user == user && row_service == service))
        }

        fn mark_complete(&self, user: UserId, service: &str) -> StoreResult<()> {
            if !self.is_complete(user, service)? {
                self.rows.borrow_mut().push((user, service.to_string()));
            }
            Ok(())
        }

        fn insert_completion(&self, user: UserId, service: &str) -> StoreResult<()> {
            self.rows.borrow_mut().push((user, service.to_string()));
            Ok(())
        }

        fn get_status(&self, user: UserId, service: &str) -> StoreResult<Option<MigrationStatus>> {
            Ok(self.is_complete(user, service)?.then(|| MigrationStatus {
                user,
                service: service.to_string(),
                completed: true,
                finished_at: 0,
            }))
        }
    }

    #[test]
    fn trims_service_and_rejects_blank() {
        let service = StatusService::new(MemoryStatusRepo::default());
        let user = Uuid::new_v4();

        service.mark_complete(user, " ticktick ").unwrap();
        assert!(service.is_complete(user, "ticktick").unwrap());
        assert!(!service.is_complete(Uuid::new_v4(), "ticktick").unwrap());

        let err = service.get_status(user, "   ").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }
}
