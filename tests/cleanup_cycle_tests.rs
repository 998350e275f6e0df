//! Integration tests for catalog collection and retention cleanup
//!
//! Drive the async entry points against in-memory collaborators and check
//! what ends up requested across repeated cycles.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use cluster_backup_operator::adapters::{ApiGroupInfo, BackupStore, DiscoveryCatalog};
use cluster_backup_operator::backup::{
    classify, cleanup_backups, collect_catalog, ResourceIdentifier, RetentionPolicy,
};
use cluster_backup_operator::config::ClassificationRules;
use cluster_backup_operator::velero::{
    BackupPhase, BackupRecord, DeleteBackupRequest, DeleteBackupRequestSpec,
};
use cluster_backup_operator::{Error, Result};

// ============================================================================
// In-memory collaborators
// ============================================================================

#[derive(Default)]
struct InMemoryBackups {
    backups: Vec<BackupRecord>,
    requests: Mutex<BTreeMap<(String, String), String>>,
}

impl InMemoryBackups {
    fn with(backups: Vec<BackupRecord>) -> Self {
        Self {
            backups,
            ..Default::default()
        }
    }

    fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl BackupStore for InMemoryBackups {
    async fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        Ok(self.backups.clone())
    }

    async fn get_deletion_request(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<DeleteBackupRequest> {
        let requests = self.requests.lock().unwrap();
        match requests.get(&(namespace.to_string(), name.to_string())) {
            Some(backup_name) => Ok(DeleteBackupRequest::new(
                name,
                DeleteBackupRequestSpec {
                    backup_name: backup_name.clone(),
                },
            )),
            None => Err(Error::not_found(format!("{}/{}", namespace, name))),
        }
    }

    async fn create_deletion_request(
        &self,
        name: &str,
        namespace: &str,
        backup_name: &str,
    ) -> Result<()> {
        self.requests.lock().unwrap().insert(
            (namespace.to_string(), name.to_string()),
            backup_name.to_string(),
        );
        Ok(())
    }
}

struct StaticDiscovery {
    groups: Vec<(&'static str, &'static str, Vec<&'static str>)>,
    broken: BTreeSet<&'static str>,
}

#[async_trait]
impl DiscoveryCatalog for StaticDiscovery {
    async fn list_groups(&self) -> Result<Vec<ApiGroupInfo>> {
        Ok(self
            .groups
            .iter()
            .map(|(group, version, _)| ApiGroupInfo {
                name: group.to_string(),
                versions: vec![format!("{}/{}", group, version)],
            })
            .collect())
    }

    async fn list_resources(&self, group_version: &str) -> Result<Vec<ResourceIdentifier>> {
        if self.broken.contains(group_version) {
            return Err(Error::discovery(format!("{} unavailable", group_version)));
        }
        Ok(self
            .groups
            .iter()
            .filter(|(group, version, _)| format!("{}/{}", group, version) == group_version)
            .flat_map(|(group, _, kinds)| {
                kinds.iter().map(move |kind| ResourceIdentifier::new(kind, group))
            })
            .collect())
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn backup(name: &str, created: DateTime<Utc>) -> BackupRecord {
    BackupRecord {
        name: name.to_string(),
        namespace: "open-cluster-management-backup".to_string(),
        creation_timestamp: created,
        start_timestamp: Some(created),
        phase: BackupPhase::Completed,
    }
}

fn two_cycles() -> Vec<BackupRecord> {
    let later = t0() + Duration::hours(1);
    vec![
        backup("acm-resources-schedule-old", t0()),
        backup("acm-credentials-schedule-old", t0() + Duration::seconds(2)),
        backup("acm-managed-clusters-schedule-old", t0() - Duration::seconds(1)),
        backup("acm-resources-schedule-new", later),
        backup("acm-credentials-schedule-new", later),
        backup("unrelated-backup", t0()),
    ]
}

// ============================================================================
// Cleanup
// ============================================================================

#[test]
fn cleanup_requests_oldest_cycle() {
    let store = InMemoryBackups::with(two_cycles());

    let summary = tokio_test::block_on(cleanup_backups(&store, RetentionPolicy::new(1)));

    assert_eq!(summary.requested, 3);
    assert_eq!(summary.latest_cycle_finished, Some(true));
    assert_eq!(
        store.requested(),
        vec![
            "acm-credentials-schedule-old",
            "acm-managed-clusters-schedule-old",
            "acm-resources-schedule-old",
        ]
    );
}

#[test]
fn cleanup_is_idempotent_across_cycles() {
    let store = InMemoryBackups::with(two_cycles());
    let policy = RetentionPolicy::new(1);

    let first = tokio_test::block_on(cleanup_backups(&store, policy));
    let second = tokio_test::block_on(cleanup_backups(&store, policy));

    assert_eq!(first.requested, 3);
    assert_eq!(second.requested, 0);
    assert_eq!(store.requested().len(), 3);
}

#[test]
fn cleanup_within_bound_requests_nothing() {
    let store = InMemoryBackups::with(two_cycles());

    let summary = tokio_test::block_on(cleanup_backups(&store, RetentionPolicy::new(2)));

    assert_eq!(summary.requested, 0);
    assert!(store.requested().is_empty());
}

// ============================================================================
// Catalog collection
// ============================================================================

#[test]
fn catalog_skips_broken_group_versions() {
    let discovery = StaticDiscovery {
        groups: vec![
            ("argoproj.io", "v1alpha1", vec!["Application"]),
            (
                "apps.open-cluster-management.io",
                "v1",
                vec!["Channel", "Subscription"],
            ),
            ("policy.open-cluster-management.io", "v1", vec!["Policy"]),
            ("batch", "v1", vec!["Job"]),
        ],
        broken: BTreeSet::from(["policy.open-cluster-management.io/v1"]),
    };
    let rules = ClassificationRules::default();

    let catalog = tokio_test::block_on(collect_catalog(&discovery, &rules)).unwrap();
    let classified: Vec<String> = classify(&catalog, &rules, &BTreeSet::new())
        .iter()
        .map(ToString::to_string)
        .collect();

    assert_eq!(
        classified,
        vec![
            "application.argoproj.io",
            "channel.apps.open-cluster-management.io",
            "subscription.apps.open-cluster-management.io",
        ]
    );
}
