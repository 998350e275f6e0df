//! Velero backup deletion requests

use tracing::{error, info};

use crate::adapters::BackupStore;
use crate::metrics;
use crate::velero::BackupRecord;

/// Result of a deletion request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// A new DeleteBackupRequest was created
    Requested,
    /// A previous cycle already asked for this deletion
    AlreadyRequested,
    /// Lookup or creation failed; the next cycle asks again
    Failed,
}

impl DeletionOutcome {
    fn as_label(self) -> &'static str {
        match self {
            DeletionOutcome::Requested => "requested",
            DeletionOutcome::AlreadyRequested => "already_requested",
            DeletionOutcome::Failed => "failed",
        }
    }
}

/// Ask Velero to delete `backup`, unless a request for it already exists.
///
/// The request shares the backup's name and namespace. Failures are logged
/// and never retried here.
pub async fn request_deletion(store: &dyn BackupStore, backup: &BackupRecord) -> DeletionOutcome {
    let name = backup.name.as_str();
    let namespace = backup.namespace.as_str();
    info!(backup = %name, namespace = %namespace, "Deleting backup");

    let outcome = match store.get_deletion_request(name, namespace).await {
        Ok(_) => {
            info!(backup = %name, "DeleteBackupRequest already exists, skip request creation");
            DeletionOutcome::AlreadyRequested
        }
        Err(e) if e.is_not_found() => {
            match store.create_deletion_request(name, namespace, name).await {
                Ok(()) => DeletionOutcome::Requested,
                Err(e) => {
                    error!(backup = %name, error = %e, "Failed to create DeleteBackupRequest");
                    DeletionOutcome::Failed
                }
            }
        }
        Err(e) => {
            error!(backup = %name, error = %e, "Failed to get DeleteBackupRequest");
            DeletionOutcome::Failed
        }
    };

    metrics::DELETION_REQUESTS
        .with_label_values(&[outcome.as_label()])
        .inc();
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::Utc;
    use mockall::predicate::eq;

    use super::*;
    use crate::adapters::MockBackupStore;
    use crate::error::Error;
    use crate::velero::{BackupPhase, DeleteBackupRequest, DeleteBackupRequestSpec};

    fn record() -> BackupRecord {
        BackupRecord {
            name: "acm-resources-schedule-20240101".to_string(),
            namespace: "open-cluster-management-backup".to_string(),
            creation_timestamp: Utc::now(),
            start_timestamp: None,
            phase: BackupPhase::Completed,
        }
    }

    fn existing_request(name: &str) -> DeleteBackupRequest {
        DeleteBackupRequest::new(
            name,
            DeleteBackupRequestSpec {
                backup_name: name.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_creates_request_when_missing() {
        let mut store = MockBackupStore::new();
        store
            .expect_get_deletion_request()
            .with(
                eq("acm-resources-schedule-20240101"),
                eq("open-cluster-management-backup"),
            )
            .returning(|name, _| Err(Error::not_found(name.to_string())));
        store
            .expect_create_deletion_request()
            .with(
                eq("acm-resources-schedule-20240101"),
                eq("open-cluster-management-backup"),
                eq("acm-resources-schedule-20240101"),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));

        assert_eq!(
            request_deletion(&store, &record()).await,
            DeletionOutcome::Requested
        );
    }

    #[tokio::test]
    async fn test_second_request_is_a_no_op() {
        let created = Arc::new(AtomicBool::new(false));
        let mut store = MockBackupStore::new();

        let lookup_state = created.clone();
        store
            .expect_get_deletion_request()
            .times(2)
            .returning(move |name, _| {
                if lookup_state.load(Ordering::SeqCst) {
                    Ok(existing_request(name))
                } else {
                    Err(Error::not_found(name.to_string()))
                }
            });
        let create_state = created.clone();
        store
            .expect_create_deletion_request()
            .times(1)
            .returning(move |_, _, _| {
                create_state.store(true, Ordering::SeqCst);
                Ok(())
            });

        let backup = record();
        assert_eq!(
            request_deletion(&store, &backup).await,
            DeletionOutcome::Requested
        );
        assert_eq!(
            request_deletion(&store, &backup).await,
            DeletionOutcome::AlreadyRequested
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_does_not_create() {
        let mut store = MockBackupStore::new();
        store
            .expect_get_deletion_request()
            .returning(|_, _| Err(Error::config("forbidden")));
        store.expect_create_deletion_request().never();

        assert_eq!(
            request_deletion(&store, &record()).await,
            DeletionOutcome::Failed
        );
    }

    #[tokio::test]
    async fn test_create_failure_is_reported() {
        let mut store = MockBackupStore::new();
        store
            .expect_get_deletion_request()
            .returning(|name, _| Err(Error::not_found(name.to_string())));
        store
            .expect_create_deletion_request()
            .returning(|_, _, _| Err(Error::validation("admission denied")));

        assert_eq!(
            request_deletion(&store, &record()).await,
            DeletionOutcome::Failed
        );
    }
}
