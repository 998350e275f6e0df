//! Reconcilers for Cluster Backup CRDs
//!
//! This module contains the business logic for reconciling each CRD type.
//! Reconcilers are responsible for:
//! - Validating CRD specs
//! - Running backup cycles
//! - Updating resource status

pub mod backup_schedule;
