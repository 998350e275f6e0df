//! Integration tests for backup planning
//!
//! Exercise classification, template building and retention through the
//! public API with realistic hub catalogs and backup lists.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use cluster_backup_operator::backup::{
    build_template, classify, prune, BackupCategory, CatalogEntry, ResourceIdentifier,
    RetentionPolicy, TemplateInputs,
};
use cluster_backup_operator::config::ClassificationRules;
use cluster_backup_operator::velero::{BackupPhase, BackupRecord, ChannelRef};

// ============================================================================
// Test Helpers
// ============================================================================

fn entry(group: &str, version: &str, kinds: &[&str]) -> CatalogEntry {
    CatalogEntry {
        group: group.to_string(),
        version: version.to_string(),
        resources: kinds
            .iter()
            .map(|kind| ResourceIdentifier::new(kind, group))
            .collect(),
    }
}

fn hub_catalog() -> Vec<CatalogEntry> {
    vec![
        entry("argoproj.io", "v1alpha1", &["Application", "ApplicationSet", "AppProject"]),
        entry(
            "cluster.open-cluster-management.io",
            "v1beta1",
            &["Placement", "ClusterCurator", "BackupSchedule", "ManagedCluster"],
        ),
        entry(
            "cluster.open-cluster-management.io",
            "v1",
            &["ManagedCluster", "Placement"],
        ),
        entry(
            "admission.cluster.open-cluster-management.io",
            "v1beta1",
            &["AdmissionReview"],
        ),
        entry("config.openshift.io", "v1", &["APIServer"]),
        entry("work.open-cluster-management.io", "v1", &["ManifestWork"]),
        entry("search.open-cluster-management.io", "v1alpha1", &["Search"]),
    ]
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
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

fn names(records: &[BackupRecord]) -> Vec<String> {
    let mut names: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
    names.sort();
    names
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn classify_included_and_excluded_groups() {
    let catalog = vec![
        entry("argoproj.io", "v1alpha1", &["Application"]),
        entry("work.open-cluster-management.io", "v1", &["ManifestWork"]),
    ];

    let result: Vec<String> = classify(&catalog, &ClassificationRules::default(), &BTreeSet::new())
        .iter()
        .map(ToString::to_string)
        .collect();

    assert_eq!(result, vec!["application.argoproj.io"]);
}

#[test]
fn classify_hub_catalog() {
    let result: Vec<String> = classify(&hub_catalog(), &ClassificationRules::default(), &BTreeSet::new())
        .iter()
        .map(ToString::to_string)
        .collect();

    assert_eq!(
        result,
        vec![
            "application.argoproj.io",
            "applicationset.argoproj.io",
            "appproject.argoproj.io",
            "placement.cluster.open-cluster-management.io",
        ]
    );
}

#[test]
fn classify_respects_exclusion_added_to_include_list() {
    let mut rules = ClassificationRules::default();
    rules
        .include_groups_by_name
        .push("work.open-cluster-management.io".to_string());

    let result = classify(&hub_catalog(), &rules, &BTreeSet::new());
    assert!(result
        .iter()
        .all(|r| r.group() != "work.open-cluster-management.io"));
}

// ============================================================================
// Templates
// ============================================================================

#[test]
fn templates_for_a_full_cycle() {
    let rules = ClassificationRules::default();
    let resources = classify(&hub_catalog(), &rules, &BTreeSet::new());
    let channels = vec![ChannelRef {
        name: "charts-v1".to_string(),
        namespace: "open-cluster-management".to_string(),
    }];
    let inputs = TemplateInputs {
        resources: &resources,
        channels: &channels,
        rules: &rules,
    };

    let resources_template = build_template(BackupCategory::Resources, inputs);
    assert_eq!(resources_template.include_cluster_resources, Some(true));
    assert!(resources_template
        .included_resources
        .contains(&"placement.cluster.open-cluster-management.io".to_string()));
    assert!(resources_template
        .excluded_namespaces
        .contains(&"open-cluster-management".to_string()));

    let credentials = build_template(BackupCategory::CredentialsCluster, inputs);
    assert_eq!(credentials.include_cluster_resources, Some(false));
    assert_eq!(credentials.included_resources, vec!["secret".to_string()]);

    let managed = build_template(BackupCategory::ManagedClusters, inputs);
    assert!(managed
        .included_resources
        .contains(&"managedcluster".to_string()));
    assert!(!resources_template
        .included_resources
        .iter()
        .any(|r| r.starts_with("managedcluster.")));

    let generic = build_template(BackupCategory::ResourcesGeneric, inputs);
    assert!(generic.included_resources.is_empty());
    for resource in resources_template.included_resources.iter().chain(&managed.included_resources) {
        assert!(
            generic.excluded_resources.contains(resource),
            "{} should be excluded from generic backups",
            resource
        );
    }
}

#[test]
fn templates_serialize_for_velero() {
    let rules = ClassificationRules::default();
    let template = build_template(
        BackupCategory::CredentialsHive,
        TemplateInputs {
            resources: &[],
            channels: &[],
            rules: &rules,
        },
    );

    let json = serde_json::to_value(&template).unwrap();
    assert_eq!(json["includeClusterResources"], false);
    assert_eq!(
        json["labelSelector"]["matchExpressions"][0]["key"],
        "hive.openshift.io/secret-type"
    );
}

// ============================================================================
// Retention
// ============================================================================

#[test]
fn prune_whole_cycle_with_zero_retention() {
    let backups = vec![
        backup("acm-resources-schedule-20240101", t0()),
        backup("acm-credentials-schedule-20240101", t0() + Duration::seconds(1)),
        backup("acm-managed-clusters-schedule-20240101", t0() + Duration::seconds(1)),
    ];

    let deleted = prune(&backups, RetentionPolicy::new(0));
    assert_eq!(
        names(&deleted),
        vec![
            "acm-credentials-schedule-20240101",
            "acm-managed-clusters-schedule-20240101",
            "acm-resources-schedule-20240101",
        ]
    );
}

#[test]
fn prune_keeps_newest_cycles() {
    let mut backups = Vec::new();
    for day in 1..=5 {
        let start = t0() + Duration::days(day);
        for (category, offset) in [
            (BackupCategory::Credentials, 0),
            (BackupCategory::CredentialsHive, 0),
            (BackupCategory::CredentialsCluster, 1),
            (BackupCategory::Resources, 1),
            (BackupCategory::ManagedClusters, 2),
        ] {
            backup_for(&mut backups, category, day, start + Duration::seconds(offset));
        }
    }

    let deleted = prune(&backups, RetentionPolicy::new(3));
    assert_eq!(deleted.len(), 10);
    assert!(deleted
        .iter()
        .all(|b| b.name.ends_with("-day1") || b.name.ends_with("-day2")));
}

fn backup_for(
    backups: &mut Vec<BackupRecord>,
    category: BackupCategory,
    day: i64,
    created: DateTime<Utc>,
) {
    backups.push(backup(&format!("{}-day{}", category.prefix(), day), created));
}

#[test]
fn prune_ignores_cycles_already_being_deleted() {
    let mut backups = vec![
        backup("acm-resources-schedule-a", t0()),
        backup("acm-resources-schedule-b", t0() + Duration::hours(1)),
    ];
    backups[0].phase = BackupPhase::Deleting;

    assert!(prune(&backups, RetentionPolicy::new(1)).is_empty());
}
