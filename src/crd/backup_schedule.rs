//! BackupSchedule Custom Resource Definition

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// BackupSchedule resource specification
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "cluster.open-cluster-management.io",
    version = "v1beta1",
    kind = "BackupSchedule",
    plural = "backupschedules",
    singular = "backupschedule",
    shortname = "bsch",
    namespaced,
    status = "BackupScheduleStatus",
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Schedule", "type": "string", "jsonPath": ".spec.veleroSchedule"}"#,
    printcolumn = r#"{"name": "Max Backups", "type": "integer", "jsonPath": ".spec.maxBackups"}"#,
    printcolumn = r#"{"name": "Last Cycle", "type": "string", "jsonPath": ".status.lastCycleTime"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupScheduleSpec {
    /// Cron schedule for the Velero backups, e.g. `0 */6 * * *`
    pub velero_schedule: String,

    /// Time-to-live of produced backups, e.g. `720h`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velero_ttl: Option<String>,

    /// Number of backup cycles to keep
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,

    /// Also back up every labelled resource no other category owns
    #[serde(default)]
    pub use_generic_resources: bool,

    /// Pause all produced Velero schedules
    #[serde(default)]
    pub paused: bool,
}

fn default_max_backups() -> u32 {
    10
}

/// BackupSchedule status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupScheduleStatus {
    /// Current phase (Enabled, Paused, Failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Time the last backup cycle ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle_time: Option<DateTime<Utc>>,

    /// Names of the Velero schedules produced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub velero_schedules: Vec<String>,

    /// Resources selected for the resources backup in the last cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classified_resources: Option<u64>,

    /// Backups a deletion was requested for in the last cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pruned_backups: Option<u64>,

    /// Whether every backup of the newest Velero cycle has finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_cycle_finished: Option<bool>,

    /// Observed generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,

    /// Status (True, False, Unknown)
    pub status: String,

    /// Last transition time
    pub last_transition_time: DateTime<Utc>,

    /// Reason for the condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
