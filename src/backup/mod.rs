//! Backup planning
//!
//! Decides what each backup category captures and which past backup cycles
//! are removed:
//! - [`classifier`] picks the discovered resources for the resources backup
//! - [`spec_builder`] turns them into one Velero template per category
//! - [`retention`] selects whole cycles to delete once the bound is exceeded
//! - [`deletion`] files the delete requests

pub mod category;
pub mod classifier;
pub mod deletion;
pub mod retention;
pub mod spec_builder;

pub use category::{BackupCategory, CredentialKind};
pub use classifier::{classify, collect_catalog, CatalogEntry, ResourceIdentifier};
pub use deletion::{request_deletion, DeletionOutcome};
pub use retention::{cleanup_backups, latest_cycle, prune, CleanupSummary, RetentionPolicy};
pub use spec_builder::{build_template, TemplateInputs};
