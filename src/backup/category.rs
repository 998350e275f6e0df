//! Backup categories and their Velero naming

use std::fmt;

/// Label on user-provided credentials
pub const BACKUP_CREDS_USER_LABEL: &str = "cluster.open-cluster-management.io/type";

/// Label on hive-created credentials
pub const BACKUP_CREDS_HIVE_LABEL: &str = "hive.openshift.io/secret-type";

/// Label marking cluster credentials and any other object explicitly opted into backup
pub const BACKUP_CREDS_CLUSTER_LABEL: &str = "cluster.open-cluster-management.io/backup";

/// A partition of hub resources backed up by its own Velero schedule.
///
/// Each cycle emits one backup per category. The category prefix names the
/// schedule, and Velero names every produced backup `<prefix>-<timestamp>`,
/// which is how backups are attributed back to a category during cleanup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackupCategory {
    Credentials,
    CredentialsHive,
    CredentialsCluster,
    Resources,
    ResourcesGeneric,
    ManagedClusters,
}

impl BackupCategory {
    /// All categories, in schedule creation order. Credentials go first since
    /// they are the fastest to back up.
    pub const ALL: [BackupCategory; 6] = [
        BackupCategory::Credentials,
        BackupCategory::CredentialsHive,
        BackupCategory::CredentialsCluster,
        BackupCategory::Resources,
        BackupCategory::ResourcesGeneric,
        BackupCategory::ManagedClusters,
    ];

    /// Category counted to decide how many cycles exist
    pub const PRIMARY: BackupCategory = BackupCategory::Resources;

    /// Velero schedule name, and name prefix of every backup it produces
    pub const fn prefix(self) -> &'static str {
        match self {
            BackupCategory::Credentials => "acm-credentials-schedule",
            BackupCategory::CredentialsHive => "acm-credentials-hive-schedule",
            BackupCategory::CredentialsCluster => "acm-credentials-cluster-schedule",
            BackupCategory::Resources => "acm-resources-schedule",
            BackupCategory::ResourcesGeneric => "acm-resources-generic-schedule",
            BackupCategory::ManagedClusters => "acm-managed-clusters-schedule",
        }
    }

    /// Category a backup belongs to, judged by its name
    pub fn from_backup_name(name: &str) -> Option<BackupCategory> {
        Self::ALL
            .into_iter()
            .find(|category| category.owns_backup(name))
    }

    /// Whether the backup named `name` was produced by this category's schedule
    pub fn owns_backup(self, name: &str) -> bool {
        name.starts_with(self.prefix())
    }

    /// Credential flavour for the three credentials categories
    pub fn credential_kind(self) -> Option<CredentialKind> {
        match self {
            BackupCategory::Credentials => Some(CredentialKind::User),
            BackupCategory::CredentialsHive => Some(CredentialKind::Hive),
            BackupCategory::CredentialsCluster => Some(CredentialKind::Cluster),
            BackupCategory::Resources
            | BackupCategory::ResourcesGeneric
            | BackupCategory::ManagedClusters => None,
        }
    }
}

impl fmt::Display for BackupCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Which label selects the secrets of a credentials backup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialKind {
    User,
    Hive,
    Cluster,
}

impl CredentialKind {
    /// Label key that must exist on captured secrets
    pub const fn label_key(self) -> &'static str {
        match self {
            CredentialKind::User => BACKUP_CREDS_USER_LABEL,
            CredentialKind::Hive => BACKUP_CREDS_HIVE_LABEL,
            CredentialKind::Cluster => BACKUP_CREDS_CLUSTER_LABEL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_distinct() {
        let mut prefixes: Vec<_> = BackupCategory::ALL.iter().map(|c| c.prefix()).collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        assert_eq!(prefixes.len(), BackupCategory::ALL.len());
    }

    #[test]
    fn backup_names_map_to_their_category() {
        assert_eq!(
            BackupCategory::from_backup_name("acm-resources-schedule-20240101"),
            Some(BackupCategory::Resources)
        );
        assert_eq!(
            BackupCategory::from_backup_name("acm-resources-generic-schedule-20240101"),
            Some(BackupCategory::ResourcesGeneric)
        );
        assert_eq!(
            BackupCategory::from_backup_name("acm-credentials-hive-schedule-20240101"),
            Some(BackupCategory::CredentialsHive)
        );
        assert_eq!(
            BackupCategory::from_backup_name("acm-credentials-schedule-20240101"),
            Some(BackupCategory::Credentials)
        );
        assert_eq!(BackupCategory::from_backup_name("nightly-20240101"), None);
    }

    #[test]
    fn credentials_prefix_does_not_claim_hive_backups() {
        assert!(!BackupCategory::Credentials.owns_backup("acm-credentials-hive-schedule-1"));
        assert!(BackupCategory::CredentialsHive.owns_backup("acm-credentials-hive-schedule-1"));
    }

    #[test]
    fn only_credentials_have_a_label_kind() {
        assert_eq!(
            BackupCategory::CredentialsHive.credential_kind().map(CredentialKind::label_key),
            Some(BACKUP_CREDS_HIVE_LABEL)
        );
        assert_eq!(BackupCategory::ManagedClusters.credential_kind(), None);
    }
}
