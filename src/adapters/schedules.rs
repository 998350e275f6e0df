//! Velero schedule publishing

use async_trait::async_trait;
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};

#[cfg(test)]
use mockall::automock;

use crate::error::{Error, Result};
use crate::velero::Schedule;

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "cluster-backup-operator";

/// Sink for the Velero schedules the operator owns
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScheduleWriter: Send + Sync {
    /// Create or update a schedule
    async fn apply_schedule(&self, schedule: &Schedule) -> Result<()>;

    /// Delete a schedule; a missing schedule is `Error::NotFound`
    async fn delete_schedule(&self, name: &str, namespace: &str) -> Result<()>;
}

/// Schedule writer using server-side apply
pub struct KubeScheduleWriter {
    client: Client,
}

impl KubeScheduleWriter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScheduleWriter for KubeScheduleWriter {
    async fn apply_schedule(&self, schedule: &Schedule) -> Result<()> {
        let name = schedule.name_any();
        let namespace = schedule
            .namespace()
            .ok_or_else(|| Error::validation(format!("Schedule {} has no namespace", name)))?;

        let api: Api<Schedule> = Api::namespaced(self.client.clone(), &namespace);
        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(schedule),
        )
        .await?;

        Ok(())
    }

    async fn delete_schedule(&self, name: &str, namespace: &str) -> Result<()> {
        let api: Api<Schedule> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                Err(Error::not_found(format!("{}/{}", namespace, name)))
            }
            Err(e) => Err(Error::Kube(e)),
        }
    }
}
