//! API discovery

use async_trait::async_trait;
use kube::Client;

#[cfg(test)]
use mockall::automock;

use crate::backup::ResourceIdentifier;
use crate::error::{Error, Result};

/// An API group and the group versions it serves
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiGroupInfo {
    /// Group name, e.g. `argoproj.io`
    pub name: String,
    /// Served group versions, e.g. `argoproj.io/v1alpha1`
    pub versions: Vec<String>,
}

/// Source of the API server's resource catalog
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DiscoveryCatalog: Send + Sync {
    /// List all API groups served by the cluster
    async fn list_groups(&self) -> Result<Vec<ApiGroupInfo>>;

    /// List the resource kinds served under one group version
    async fn list_resources(&self, group_version: &str) -> Result<Vec<ResourceIdentifier>>;
}

/// Discovery through the Kubernetes API server
pub struct KubeDiscovery {
    client: Client,
}

impl KubeDiscovery {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiscoveryCatalog for KubeDiscovery {
    async fn list_groups(&self) -> Result<Vec<ApiGroupInfo>> {
        let groups = self
            .client
            .list_api_groups()
            .await
            .map_err(|e| Error::discovery(format!("failed to get server groups: {}", e)))?;

        Ok(groups
            .groups
            .into_iter()
            .map(|group| ApiGroupInfo {
                name: group.name,
                versions: group
                    .versions
                    .into_iter()
                    .map(|v| v.group_version)
                    .collect(),
            })
            .collect())
    }

    async fn list_resources(&self, group_version: &str) -> Result<Vec<ResourceIdentifier>> {
        let list = self.client.list_api_group_resources(group_version).await?;
        let group = group_of(group_version);

        Ok(list
            .resources
            .iter()
            // subresources such as `managedclusters/status`
            .filter(|r| !r.name.contains('/'))
            .map(|r| ResourceIdentifier::new(&r.kind, group))
            .collect())
    }
}

fn group_of(group_version: &str) -> &str {
    group_version
        .split_once('/')
        .map_or("", |(group, _)| group)
}
