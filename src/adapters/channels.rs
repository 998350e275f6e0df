//! Application channels

use async_trait::async_trait;
use kube::api::ListParams;
use kube::{Api, Client};

#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use crate::velero::{Channel, ChannelRef};

/// Source of the hub's application channels
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChannelCatalog: Send + Sync {
    /// List channels across all namespaces
    async fn list_channels(&self) -> Result<Vec<ChannelRef>>;
}

/// Channel catalog backed by the Kubernetes API
pub struct KubeChannelCatalog {
    client: Client,
}

impl KubeChannelCatalog {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChannelCatalog for KubeChannelCatalog {
    async fn list_channels(&self) -> Result<Vec<ChannelRef>> {
        let api: Api<Channel> = Api::all(self.client.clone());
        let channels = api.list(&ListParams::default()).await?;
        Ok(channels.items.iter().map(ChannelRef::from).collect())
    }
}
