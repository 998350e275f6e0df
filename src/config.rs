//! Process-start configuration
//!
//! Everything here is read once when the operator starts and handed to the
//! controllers through their shared context. Nothing in this module is
//! mutated afterwards.

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default namespace holding Velero schedules, backups and delete requests
pub const DEFAULT_BACKUP_NAMESPACE: &str = "open-cluster-management-backup";

/// Default metrics port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Rules deciding which discovered API resources belong in the resources backup.
///
/// Exclusions always win over inclusions. Names in `exclude_resource_names`
/// and `activation_resource_names` may be a bare lowercase kind
/// (`managedcluster`) or a `kind.group` identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRules {
    /// Groups whose name ends with one of these suffixes are included
    pub include_groups_by_suffix: Vec<String>,

    /// Groups included by exact name
    pub include_groups_by_name: Vec<String>,

    /// Groups never backed up, regardless of the include rules
    pub exclude_groups: Vec<String>,

    /// Resources skipped even when their group is included
    pub exclude_resource_names: Vec<String>,

    /// Hub/managed-cluster activation resources, owned by their own category
    pub activation_resource_names: Vec<String>,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            include_groups_by_suffix: strings(&[".open-cluster-management.io"]),
            include_groups_by_name: strings(&["argoproj.io", "app.k8s.io", "core.observatorium.io"]),
            exclude_groups: strings(&[
                "admission.cluster.open-cluster-management.io",
                "admission.work.open-cluster-management.io",
                "internal.open-cluster-management.io",
                "operator.open-cluster-management.io",
                "search.open-cluster-management.io",
                "work.open-cluster-management.io",
            ]),
            // part of included groups, but either not needed or recreated by
            // owner resources that are backed up themselves
            exclude_resource_names: strings(&[
                "clustermanagementaddon",
                "applicationmanager",
                "certpolicycontroller",
                "iampolicycontroller",
                "policycontroller",
                "searchcollector",
                "workmanager",
                "backupschedule",
                "restore",
            ]),
            activation_resource_names: strings(&[
                "managedcluster",
                "klusterletaddonconfig",
                "managedclusteraddon",
                "managedclusterset",
                "managedclustersetbinding",
                "clusterpool",
                "clusterclaim",
                "clustercurator",
                "managedclusterview",
                "clusterstatus",
            ]),
        }
    }
}

impl ClassificationRules {
    /// Decide whether resources of an API group are candidates for backup
    pub fn is_group_eligible(&self, group: &str) -> bool {
        if self.exclude_groups.iter().any(|g| g == group) {
            return false;
        }

        self.include_groups_by_name.iter().any(|g| g == group)
            || self
                .include_groups_by_suffix
                .iter()
                .any(|suffix| group.ends_with(suffix.as_str()))
    }

    /// Whether `kind` (or `kind.group`) is excluded from the resources category
    pub fn is_resource_excluded(&self, kind: &str, qualified: &str) -> bool {
        matches_name(&self.exclude_resource_names, kind, qualified)
            || self.is_activation_resource(kind, qualified)
    }

    /// Whether `kind` (or `kind.group`) is an activation resource
    pub fn is_activation_resource(&self, kind: &str, qualified: &str) -> bool {
        matches_name(&self.activation_resource_names, kind, qualified)
    }
}

fn matches_name(names: &[String], kind: &str, qualified: &str) -> bool {
    names.iter().any(|n| n == kind || n == qualified)
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Operator configuration
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Namespace where Velero objects live
    pub namespace: String,

    /// Port for the metrics and health server
    pub metrics_port: u16,

    /// Resource classification rules
    pub rules: ClassificationRules,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_BACKUP_NAMESPACE.to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
            rules: ClassificationRules::default(),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(namespace) = lookup("BACKUP_NAMESPACE") {
            let namespace = namespace.trim();
            if namespace.is_empty() {
                return Err(Error::config("BACKUP_NAMESPACE must not be empty"));
            }
            config.namespace = namespace.to_string();
        }

        if let Some(port) = lookup("METRICS_PORT") {
            config.metrics_port = port
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("Invalid METRICS_PORT '{}': {}", port, e)))?;
        }

        Ok(config)
    }
}
