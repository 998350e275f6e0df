//! Open Cluster Management Cluster Backup Operator
//!
//! This operator decides which hub resources are captured by a set of
//! categorized Velero backups, and prunes old backup cycles as a whole.

pub mod adapters;
pub mod backup;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;
pub mod velero;

pub use error::{Error, Result};
