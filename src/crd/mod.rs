//! Custom Resource Definitions for the Cluster Backup Operator

mod backup_schedule;

pub use backup_schedule::*;

use kube::CustomResourceExt;

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Result<Vec<String>, serde_yaml::Error> {
    Ok(vec![serde_yaml::to_string(&BackupSchedule::crd())?])
}
