//! Velero backups and delete requests

use async_trait::async_trait;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client};

#[cfg(test)]
use mockall::automock;

use crate::error::{Error, Result};
use crate::velero::{Backup, BackupRecord, DeleteBackupRequest, DeleteBackupRequestSpec};

/// Read access to Velero backups, plus filing delete requests
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Snapshot every backup
    async fn list_backups(&self) -> Result<Vec<BackupRecord>>;

    /// Look up a delete request; a missing request is `Error::NotFound`
    async fn get_deletion_request(&self, name: &str, namespace: &str)
        -> Result<DeleteBackupRequest>;

    /// File a request asking Velero to delete `backup_name`
    async fn create_deletion_request(
        &self,
        name: &str,
        namespace: &str,
        backup_name: &str,
    ) -> Result<()>;
}

/// Backup store backed by the Kubernetes API
pub struct KubeBackupStore {
    client: Client,
    namespace: String,
}

impl KubeBackupStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl BackupStore for KubeBackupStore {
    async fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let api: Api<Backup> = Api::namespaced(self.client.clone(), &self.namespace);
        let backups = api.list(&ListParams::default()).await?;
        Ok(backups.items.iter().map(BackupRecord::from).collect())
    }

    async fn get_deletion_request(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<DeleteBackupRequest> {
        let api: Api<DeleteBackupRequest> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(|e| match e {
            kube::Error::Api(api_err) if api_err.code == 404 => {
                Error::not_found(format!("{}/{}", namespace, name))
            }
            other => Error::Kube(other),
        })
    }

    async fn create_deletion_request(
        &self,
        name: &str,
        namespace: &str,
        backup_name: &str,
    ) -> Result<()> {
        let api: Api<DeleteBackupRequest> = Api::namespaced(self.client.clone(), namespace);
        let mut request = DeleteBackupRequest::new(
            name,
            DeleteBackupRequestSpec {
                backup_name: backup_name.to_string(),
            },
        );
        request.metadata.namespace = Some(namespace.to_string());

        api.create(&PostParams::default(), &request).await?;
        Ok(())
    }
}
