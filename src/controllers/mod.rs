//! Kubernetes controllers for Cluster Backup CRDs
//!
//! This module contains the controller implementations that watch for CRD changes
//! and trigger reconciliation.

mod backup_schedule_controller;

pub use backup_schedule_controller::run as run_backup_schedule_controller;

use kube::Client;

use crate::adapters::Collaborators;
use crate::config::OperatorConfig;

/// Shared context for all controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,

    /// Process-start configuration
    pub config: OperatorConfig,

    /// Collaborators a backup cycle reads from and writes to
    pub collaborators: Collaborators,
}

impl Context {
    /// Create a new context wired to the cluster behind `client`
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        let collaborators = Collaborators::kube(client.clone(), &config.namespace);
        Self {
            client,
            config,
            collaborators,
        }
    }
}
