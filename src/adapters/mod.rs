//! Adapters over the Kubernetes API
//!
//! Each collaborator the backup cycle talks to sits behind a trait so the
//! cycle can run against the API server in production and against mocks in
//! tests.

mod backup_store;
mod channels;
mod discovery;
mod schedules;

pub use backup_store::*;
pub use channels::*;
pub use discovery::*;
pub use schedules::*;

use std::sync::Arc;

use kube::Client;

/// Everything a backup cycle reads from or writes to
#[derive(Clone)]
pub struct Collaborators {
    pub discovery: Arc<dyn DiscoveryCatalog>,
    pub backups: Arc<dyn BackupStore>,
    pub channels: Arc<dyn ChannelCatalog>,
    pub schedules: Arc<dyn ScheduleWriter>,
}

impl Collaborators {
    /// Collaborators talking to the cluster behind `client`
    pub fn kube(client: Client, namespace: &str) -> Self {
        Self {
            discovery: Arc::new(KubeDiscovery::new(client.clone())),
            backups: Arc::new(KubeBackupStore::new(client.clone(), namespace)),
            channels: Arc::new(KubeChannelCatalog::new(client.clone())),
            schedules: Arc::new(KubeScheduleWriter::new(client)),
        }
    }
}
