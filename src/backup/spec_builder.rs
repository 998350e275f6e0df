//! Per-category Velero backup templates
//!
//! Every builder only appends to the template it is given, so running a
//! builder twice over the same template is a no-op the second time.

use crate::backup::category::{BackupCategory, CredentialKind, BACKUP_CREDS_CLUSTER_LABEL};
use crate::backup::classifier::ResourceIdentifier;
use crate::config::ClassificationRules;
use crate::velero::{BackupSpecTemplate, ChannelRef, CHARTS_CHANNEL_NAME};

/// Namespace of the hub's own managed cluster, never captured
pub const LOCAL_CLUSTER_NAMESPACE: &str = "local-cluster";

/// Resources captured by the credentials backups
pub const CREDENTIAL_RESOURCES: &[&str] = &["secret"];

/// Hive resources always captured with the hub resources, by kind
pub const EXTRA_BACKUP_RESOURCES: &[&str] = &["clusterdeployment", "machinepool"];

/// Snapshot a cycle builds its templates from
#[derive(Clone, Copy, Debug)]
pub struct TemplateInputs<'a> {
    /// Classifier output
    pub resources: &'a [ResourceIdentifier],
    /// Channels discovered at the start of the cycle
    pub channels: &'a [ChannelRef],
    /// Classification rules, for the activation resources
    pub rules: &'a ClassificationRules,
}

/// Build a fresh template for `category`
pub fn build_template(category: BackupCategory, inputs: TemplateInputs<'_>) -> BackupSpecTemplate {
    let mut template = BackupSpecTemplate::default();
    match category {
        BackupCategory::Credentials
        | BackupCategory::CredentialsHive
        | BackupCategory::CredentialsCluster => {
            if let Some(kind) = category.credential_kind() {
                set_credentials_backup_info(&mut template, kind);
            }
        }
        BackupCategory::Resources => {
            set_resources_backup_info(&mut template, inputs.resources, inputs.channels);
        }
        BackupCategory::ResourcesGeneric => {
            set_generic_resources_backup_info(&mut template, inputs.resources, inputs.rules);
        }
        BackupCategory::ManagedClusters => {
            set_managed_clusters_backup_info(&mut template, inputs.rules);
        }
    }
    template
}

/// Hub resources: everything the classifier selected, cluster-scoped included
pub fn set_resources_backup_info(
    template: &mut BackupSpecTemplate,
    resources: &[ResourceIdentifier],
    channels: &[ChannelRef],
) {
    template.include_cluster_resources = Some(true);
    template.exclude_namespace(LOCAL_CLUSTER_NAMESPACE);

    for resource in EXTRA_BACKUP_RESOURCES {
        template.include_resource(*resource);
    }
    for resource in resources {
        template.include_resource(resource.qualified());
    }

    // contents of the charts channel namespace are regenerated by its owner
    for channel in channels.iter().filter(|c| c.name == CHARTS_CHANNEL_NAME) {
        template.exclude_namespace(channel.namespace.clone());
    }
}

/// Secrets carrying the label of the given credential kind
pub fn set_credentials_backup_info(template: &mut BackupSpecTemplate, kind: CredentialKind) {
    template.include_cluster_resources = Some(false);

    for resource in CREDENTIAL_RESOURCES {
        template.include_resource(*resource);
    }
    template.require_label(kind.label_key());
}

/// Resources needed to re-establish the hub to managed cluster connection
pub fn set_managed_clusters_backup_info(
    template: &mut BackupSpecTemplate,
    rules: &ClassificationRules,
) {
    template.include_cluster_resources = Some(true);

    for resource in &rules.activation_resource_names {
        template.include_resource(resource.clone());
    }
}

/// Anything labelled for backup that no other category already owns
pub fn set_generic_resources_backup_info(
    template: &mut BackupSpecTemplate,
    resources: &[ResourceIdentifier],
    rules: &ClassificationRules,
) {
    template.include_cluster_resources = Some(true);
    template.exclude_namespace(LOCAL_CLUSTER_NAMESPACE);

    for resource in EXTRA_BACKUP_RESOURCES.iter().chain(CREDENTIAL_RESOURCES) {
        template.exclude_resource(*resource);
    }
    for resource in resources {
        template.exclude_resource(resource.qualified());
    }
    for resource in &rules.activation_resource_names {
        template.exclude_resource(resource.clone());
    }

    template.require_label(BACKUP_CREDS_CLUSTER_LABEL);
}
