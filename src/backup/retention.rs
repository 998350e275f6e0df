//! Backup retention
//!
//! A cycle produces one backup per category, each a separate Velero object
//! with its own name and a creation time a moment apart from the others.
//! Cycles are counted through their resources backup; once more cycles exist
//! than the policy allows, the oldest cycles are deleted whole, every backup
//! created within [`CORRELATION_TOLERANCE_SECS`] of the cycle's resources
//! backup included.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::adapters::BackupStore;
use crate::backup::category::BackupCategory;
use crate::backup::deletion::{request_deletion, DeletionOutcome};
use crate::metrics;
use crate::velero::{is_backup_finished, BackupPhase, BackupRecord};

/// Maximum creation time distance between backups of the same cycle
pub const CORRELATION_TOLERANCE_SECS: i64 = 2;

/// How many backup cycles to keep
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_retained_cycles: usize,
}

impl RetentionPolicy {
    pub fn new(max_retained_cycles: usize) -> Self {
        Self {
            max_retained_cycles,
        }
    }
}

/// Select the backups to delete so at most `policy.max_retained_cycles` cycles remain.
///
/// Resources backups already being deleted are not counted. The returned
/// list holds each backup once; its order carries no meaning.
pub fn prune(all_backups: &[BackupRecord], policy: RetentionPolicy) -> Vec<BackupRecord> {
    let primary = primary_backups(all_backups);
    if primary.len() <= policy.max_retained_cycles {
        return Vec::new();
    }

    let expired = primary.len() - policy.max_retained_cycles;
    let mut selected = HashSet::new();
    let mut to_delete = Vec::new();

    for marker in primary.iter().take(expired) {
        for backup in correlated_backups(all_backups, marker.creation_timestamp) {
            if selected.insert((backup.namespace.as_str(), backup.name.as_str())) {
                to_delete.push(backup.clone());
            }
        }
    }

    to_delete
}

/// Backups of the newest cycle, empty when no cycle exists
pub fn latest_cycle(all_backups: &[BackupRecord]) -> Vec<BackupRecord> {
    primary_backups(all_backups)
        .last()
        .map(|marker| {
            correlated_backups(all_backups, marker.creation_timestamp)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Live resources backups, oldest first
fn primary_backups(all_backups: &[BackupRecord]) -> Vec<&BackupRecord> {
    let mut primary: Vec<&BackupRecord> = all_backups
        .iter()
        .filter(|b| BackupCategory::PRIMARY.owns_backup(&b.name))
        .filter(|b| b.phase != BackupPhase::Deleting)
        .collect();

    // backups without a start time sort first
    primary.sort_by(|a, b| {
        a.start_timestamp
            .unwrap_or_default()
            .cmp(&b.start_timestamp.unwrap_or_default())
            .then_with(|| a.name.cmp(&b.name))
    });
    primary
}

/// Every categorized backup created within the tolerance of `marker`, in either direction
fn correlated_backups(
    all_backups: &[BackupRecord],
    marker: DateTime<Utc>,
) -> impl Iterator<Item = &BackupRecord> {
    all_backups.iter().filter(move |b| {
        BackupCategory::from_backup_name(&b.name).is_some()
            && within_tolerance(b.creation_timestamp, marker)
    })
}

fn within_tolerance(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    (a - b).num_milliseconds().abs() <= CORRELATION_TOLERANCE_SECS * 1000
}

/// What a cleanup pass did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Backups a deletion was requested for
    pub requested: usize,
    /// Whether every backup of the newest cycle reached a terminal phase,
    /// `None` when the backups could not be listed
    pub latest_cycle_finished: Option<bool>,
}

/// Run one cleanup pass against the backup store.
///
/// Listing failures skip the pass; the next cycle tries again.
pub async fn cleanup_backups(store: &dyn BackupStore, policy: RetentionPolicy) -> CleanupSummary {
    info!(
        max_backups = policy.max_retained_cycles,
        "Checking if backups need to be removed"
    );

    let backups = match store.list_backups().await {
        Ok(backups) => backups,
        Err(e) => {
            warn!(error = %e, "Failed to list backups, skipping cleanup");
            return CleanupSummary::default();
        }
    };

    let mut summary = CleanupSummary {
        requested: 0,
        latest_cycle_finished: Some(is_backup_finished(&latest_cycle(&backups))),
    };

    let to_delete = prune(&backups, policy);
    if to_delete.is_empty() {
        return summary;
    }

    info!(count = to_delete.len(), "Deleting expired backup cycles");

    for backup in &to_delete {
        if request_deletion(store, backup).await == DeletionOutcome::Requested {
            summary.requested += 1;
        }
    }

    metrics::BACKUPS_PRUNED.inc_by(summary.requested as f64);
    summary
}
