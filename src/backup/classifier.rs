//! Resource classification
//!
//! Decides which discovered API resource kinds belong in the resources
//! backup. Discovery is snapshotted once by [`collect_catalog`]; [`classify`]
//! is a pure function over that snapshot.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info, warn};

use crate::adapters::DiscoveryCatalog;
use crate::config::ClassificationRules;
use crate::error::Result;
use crate::metrics;

/// A resource kind within an API group.
///
/// The kind is stored lowercased; the canonical form is `kind.group`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentifier {
    kind: String,
    group: String,
}

impl ResourceIdentifier {
    /// Create an identifier, lowercasing the kind
    pub fn new(kind: &str, group: &str) -> Self {
        Self {
            kind: kind.to_lowercase(),
            group: group.to_string(),
        }
    }

    /// Lowercased kind
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// API group, empty for the core group
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Canonical `kind.group` form, as Velero expects it
    pub fn qualified(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.group)
    }
}

/// Resources served under one group version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub group: String,
    pub version: String,
    pub resources: Vec<ResourceIdentifier>,
}

/// Snapshot the resources of every group eligible under `rules`.
///
/// Failing to list the groups aborts the snapshot. Failing to list one group
/// version only drops that group version.
pub async fn collect_catalog(
    discovery: &dyn DiscoveryCatalog,
    rules: &ClassificationRules,
) -> Result<Vec<CatalogEntry>> {
    let groups = discovery.list_groups().await.map_err(|e| {
        metrics::DISCOVERY_FAILURES.with_label_values(&["groups"]).inc();
        e
    })?;

    let mut catalog = Vec::new();
    for group in groups.iter().filter(|g| rules.is_group_eligible(&g.name)) {
        for group_version in &group.versions {
            match discovery.list_resources(group_version).await {
                Ok(resources) => catalog.push(CatalogEntry {
                    group: group.name.clone(),
                    version: version_of(group_version).to_string(),
                    resources,
                }),
                Err(e) => {
                    metrics::DISCOVERY_FAILURES
                        .with_label_values(&["resources"])
                        .inc();
                    warn!(
                        group_version = %group_version,
                        error = %e,
                        "Failed to list server resources, skipping group version"
                    );
                }
            }
        }
    }

    debug!(entries = catalog.len(), "Collected discovery catalog");
    Ok(catalog)
}

fn version_of(group_version: &str) -> &str {
    group_version
        .rsplit_once('/')
        .map_or(group_version, |(_, version)| version)
}

/// Resource identifiers from `catalog` that qualify for the resources backup.
///
/// Output follows catalog order with duplicates collapsed. Identifiers in
/// `already_categorized` are owned by another category and skipped.
pub fn classify(
    catalog: &[CatalogEntry],
    rules: &ClassificationRules,
    already_categorized: &BTreeSet<ResourceIdentifier>,
) -> Vec<ResourceIdentifier> {
    let mut seen = BTreeSet::new();
    let mut classified = Vec::new();

    for entry in catalog {
        if !rules.is_group_eligible(&entry.group) {
            continue;
        }

        for resource in &entry.resources {
            let identifier = ResourceIdentifier::new(resource.kind(), &entry.group);
            let qualified = identifier.qualified();

            if rules.is_resource_excluded(identifier.kind(), &qualified)
                || already_categorized.contains(&identifier)
            {
                continue;
            }

            if seen.insert(identifier.clone()) {
                classified.push(identifier);
            }
        }
    }

    info!(count = classified.len(), "Classified resources for backup");
    classified
}
