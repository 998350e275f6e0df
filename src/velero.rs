//! Velero and channel resource views
//!
//! Typed views over resources owned by other controllers. The operator writes
//! Velero `Schedule` and `DeleteBackupRequest` objects and reads `Backup` and
//! `Channel` objects; it never installs their CRDs, so schema generation is
//! disabled for all of them.

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

// =============================================================================
// Backup template
// =============================================================================

/// Velero backup specification, used both as a Schedule's template and as
/// the spec of the Backups the schedule produces.
///
/// List fields behave as insertion-ordered sets: every mutator appends only
/// values that are not present yet, so building the same template twice in a
/// cycle leaves it unchanged. A resource can never be both included and
/// excluded; exclusion wins.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "Backup",
    plural = "backups",
    namespaced,
    status = "BackupStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpecTemplate {
    /// Whether cluster-scoped resources are captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_cluster_resources: Option<bool>,

    /// Resources to capture, as `kind` or `kind.group`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_resources: Vec<String>,

    /// Resources never captured
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_resources: Vec<String>,

    /// Namespaces never captured
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_namespaces: Vec<String>,

    /// Label requirements objects must satisfy
    #[serde(default, skip_serializing_if = "LabelSelector::is_empty")]
    pub label_selector: LabelSelector,

    /// Backup time-to-live, e.g. `720h`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

impl BackupSpecTemplate {
    /// Include a resource unless it is already included or explicitly excluded
    pub fn include_resource(&mut self, resource: impl Into<String>) {
        let resource = resource.into();
        if self.excluded_resources.contains(&resource) {
            return;
        }
        append_unique(&mut self.included_resources, resource);
    }

    /// Exclude a resource, dropping it from the include list if present
    pub fn exclude_resource(&mut self, resource: impl Into<String>) {
        let resource = resource.into();
        self.included_resources.retain(|r| *r != resource);
        append_unique(&mut self.excluded_resources, resource);
    }

    /// Exclude a namespace
    pub fn exclude_namespace(&mut self, namespace: impl Into<String>) {
        append_unique(&mut self.excluded_namespaces, namespace.into());
    }

    /// Require that a label key exists on captured objects
    pub fn require_label(&mut self, key: impl Into<String>) {
        self.label_selector.require(key.into(), LabelSelectorOperator::Exists);
    }
}

/// Append `value` to `values` unless it is already present
pub fn append_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// Label selector limited to match expressions
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Requirements, at most one per key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    /// True when the selector carries no requirement
    pub fn is_empty(&self) -> bool {
        self.match_expressions.is_empty()
    }

    fn require(&mut self, key: String, operator: LabelSelectorOperator) {
        if self.match_expressions.iter().any(|r| r.key == key) {
            return;
        }
        self.match_expressions.push(LabelSelectorRequirement {
            key,
            operator,
            values: Vec::new(),
        });
    }
}

/// A single label requirement
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// Label key
    pub key: String,
    /// Operator applied to the key
    pub operator: LabelSelectorOperator,
    /// Operator values, empty for `Exists`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Label selector operators the operator emits
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum LabelSelectorOperator {
    Exists,
}

// =============================================================================
// Backup
// =============================================================================

/// Velero backup phase
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum BackupPhase {
    #[default]
    New,
    FailedValidation,
    InProgress,
    WaitingForPluginOperations,
    WaitingForPluginOperationsPartiallyFailed,
    Finalizing,
    FinalizingPartiallyFailed,
    Completed,
    PartiallyFailed,
    Failed,
    Deleting,
    #[serde(other)]
    Unknown,
}

impl BackupPhase {
    /// Whether Velero has finished working on the backup
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BackupPhase::Completed | BackupPhase::Failed | BackupPhase::PartiallyFailed
        )
    }
}

/// Velero backup status, only the fields the operator reads
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<BackupPhase>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<DateTime<Utc>>,
}

/// Read-only snapshot of a Velero backup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupRecord {
    pub name: String,
    pub namespace: String,
    pub creation_timestamp: DateTime<Utc>,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub phase: BackupPhase,
}

impl From<&Backup> for BackupRecord {
    fn from(backup: &Backup) -> Self {
        let status = backup.status.as_ref();
        Self {
            name: backup.name_any(),
            namespace: backup.namespace().unwrap_or_default(),
            creation_timestamp: backup
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|t| t.0)
                .unwrap_or_default(),
            start_timestamp: status.and_then(|s| s.start_timestamp),
            phase: status.and_then(|s| s.phase).unwrap_or_default(),
        }
    }
}

/// True when there is at least one backup and all of them reached a terminal phase
pub fn is_backup_finished(backups: &[BackupRecord]) -> bool {
    !backups.is_empty() && backups.iter().all(|b| b.phase.is_terminal())
}

// =============================================================================
// DeleteBackupRequest
// =============================================================================

/// Request asking Velero to delete a backup and its stored data
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "DeleteBackupRequest",
    plural = "deletebackuprequests",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBackupRequestSpec {
    /// Name of the backup to delete
    pub backup_name: String,
}

// =============================================================================
// Schedule
// =============================================================================

/// Velero periodic backup schedule
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "Schedule",
    plural = "schedules",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    /// Cron expression
    pub schedule: String,

    /// Whether the schedule is paused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,

    /// Template for produced backups
    pub template: BackupSpecTemplate,
}

// =============================================================================
// Channel
// =============================================================================

/// Name of the channel whose namespace is regenerated by its owning controller
pub const CHARTS_CHANNEL_NAME: &str = "charts-v1";

/// Application channel, read to find namespaces that must not be captured
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "apps.open-cluster-management.io",
    version = "v1",
    kind = "Channel",
    plural = "channels",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    #[serde(default, rename = "type")]
    pub type_: String,

    #[serde(default)]
    pub pathname: String,
}

/// Name and namespace of a discovered channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelRef {
    pub name: String,
    pub namespace: String,
}

impl From<&Channel> for ChannelRef {
    fn from(channel: &Channel) -> Self {
        Self {
            name: channel.name_any(),
            namespace: channel.namespace().unwrap_or_default(),
        }
    }
}
