//! BackupSchedule reconciler
//!
//! Handles the business logic of a backup cycle:
//! - Spec validation
//! - Resource classification and per-category Velero schedules
//! - Retention cleanup
//! - Status updates

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use kube::{
    api::{Patch, PatchParams},
    Api, Client, ResourceExt,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::adapters::{Collaborators, ScheduleWriter, FIELD_MANAGER};
use crate::backup::{
    build_template, classify, cleanup_backups, collect_catalog, BackupCategory, RetentionPolicy,
    TemplateInputs,
};
use crate::config::OperatorConfig;
use crate::crd::{BackupSchedule, BackupScheduleSpec, BackupScheduleStatus};
use crate::error::{Error, Result};
use crate::metrics;
use crate::velero::{BackupSpecTemplate, Schedule, ScheduleSpec};

/// Label placed on every Velero schedule the operator owns
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Descriptors Velero accepts in place of the five cron fields
const CRON_DESCRIPTORS: &[&str] = &[
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

/// Validate the BackupSchedule spec
pub fn validate(schedule: &BackupSchedule) -> Result<()> {
    let spec = &schedule.spec;

    if spec.velero_schedule.trim().is_empty() {
        return Err(Error::validation("veleroSchedule must be specified"));
    }
    validate_cron(&spec.velero_schedule)?;

    if let Some(ttl) = &spec.velero_ttl {
        if !is_valid_duration(ttl) {
            return Err(Error::validation(format!(
                "Invalid veleroTtl '{}': expected a duration such as 720h or 1h30m",
                ttl
            )));
        }
    }

    Ok(())
}

/// Check a schedule the way Velero parses it: five standard fields, an
/// optional `CRON_TZ=`/`TZ=` prefix, a descriptor such as `@daily`, or
/// `@every <duration>`.
fn validate_cron(schedule: &str) -> Result<()> {
    let invalid = |reason: String| {
        Error::validation(format!("Invalid cron schedule '{}': {}", schedule, reason))
    };

    let mut expression = schedule.trim();
    if expression.starts_with("CRON_TZ=") || expression.starts_with("TZ=") {
        expression = expression
            .split_once(char::is_whitespace)
            .map_or("", |(_, rest)| rest.trim_start());
    }

    if let Some(interval) = expression.strip_prefix("@every ") {
        return if is_valid_duration(interval) {
            Ok(())
        } else {
            Err(invalid(format!("invalid interval '{}'", interval.trim())))
        };
    }
    if expression.starts_with('@') {
        return if CRON_DESCRIPTORS.contains(&expression) {
            Ok(())
        } else {
            Err(invalid(format!("unknown descriptor '{}'", expression)))
        };
    }

    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(invalid(format!("expected 5 fields, found {}", fields.len())));
    }

    // the cron crate wants seconds first and numbers weekdays from 1
    let day_of_month = if fields[2] == "?" { "*" } else { fields[2] };
    let day_of_week = shift_day_of_week(fields[4]).map_err(invalid)?;
    let expression = format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], day_of_month, fields[3], day_of_week
    );
    CronSchedule::from_str(&expression).map_err(|e| invalid(e.to_string()))?;

    Ok(())
}

/// Weekday names Velero accepts, indexed by its day number
const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Velero numbers weekdays 0-6 from Sunday, the cron crate 1-7
fn shift_day_of_week(field: &str) -> std::result::Result<String, String> {
    let parts = field
        .split(',')
        .map(|part| {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (part, None),
            };
            let range = match range {
                "*" | "?" => "*".to_string(),
                _ => range
                    .split('-')
                    .map(shift_weekday)
                    .collect::<std::result::Result<Vec<_>, _>>()?
                    .join("-"),
            };
            Ok(match step {
                Some(step) => format!("{}/{}", range, step),
                None => range,
            })
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;

    Ok(parts.join(","))
}

fn shift_weekday(day: &str) -> std::result::Result<String, String> {
    let number = match day.parse::<u8>() {
        Ok(number) => number,
        Err(_) => WEEKDAY_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(day))
            .map(|index| index as u8)
            .ok_or_else(|| format!("'{}' is not a day of the week", day))?,
    };
    if number > 6 {
        return Err(format!("day of week {} is out of range 0-6", number));
    }
    Ok((number + 1).to_string())
}

/// Accepts Go-style durations made of `<number><unit>` parts, units h, m, s, ms
fn is_valid_duration(value: &str) -> bool {
    let mut rest = value.trim();
    if rest.is_empty() {
        return false;
    }

    while !rest.is_empty() {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];

        let unit = ["ms", "h", "m", "s"]
            .into_iter()
            .find(|unit| rest.starts_with(unit));
        match unit {
            Some(unit) => rest = &rest[unit.len()..],
            None => return false,
        }
    }

    true
}

/// Categories emitted for a schedule
pub fn active_categories(spec: &BackupScheduleSpec) -> Vec<BackupCategory> {
    BackupCategory::ALL
        .into_iter()
        .filter(|c| *c != BackupCategory::ResourcesGeneric || spec.use_generic_resources)
        .collect()
}

/// What a backup cycle did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Velero schedules applied
    pub schedules: Vec<String>,
    /// Resources selected for the resources backup
    pub classified_resources: usize,
    /// Backups a deletion was requested for
    pub pruned_backups: usize,
    /// Whether the newest Velero cycle finished, unknown if backups could not be listed
    pub latest_cycle_finished: Option<bool>,
    /// Non-fatal failures, one message each
    pub errors: Vec<String>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Time left until the next cycle is due, `None` when one should run now.
///
/// A cycle is due when the spec changed since the last recorded cycle or
/// when `interval` has elapsed since it ran.
pub fn next_cycle_in(
    schedule: &BackupSchedule,
    now: DateTime<Utc>,
    interval: std::time::Duration,
) -> Option<std::time::Duration> {
    let status = schedule.status.as_ref()?;
    if status.observed_generation != schedule.metadata.generation {
        return None;
    }
    let last_cycle = status.last_cycle_time?;
    let interval = chrono::Duration::from_std(interval).ok()?;

    let elapsed = now.signed_duration_since(last_cycle);
    if elapsed >= interval {
        return None;
    }
    // a last cycle stamped in the future waits one interval at most
    let remaining = (interval - elapsed.max(chrono::Duration::zero())).to_std().ok()?;
    Some(remaining)
}

/// Whether status already reports this validation failure for the current generation
pub fn failure_recorded(schedule: &BackupSchedule, message: &str) -> bool {
    schedule.status.as_ref().is_some_and(|status| {
        status.observed_generation == schedule.metadata.generation
            && status.phase.as_deref() == Some("Failed")
            && status.message.as_deref() == Some(message)
    })
}

/// Run one backup cycle for `schedule`.
///
/// External state is read once up front. Failures degrade the cycle instead
/// of aborting it: without a discovery catalog the classification-based
/// schedules keep their previous templates, and cleanup runs regardless.
pub async fn run_cycle(
    schedule: &BackupSchedule,
    config: &OperatorConfig,
    collaborators: &Collaborators,
) -> CycleReport {
    let name = schedule.name_any();
    let mut report = CycleReport::default();
    info!(name = %name, "Starting backup cycle");

    let catalog = collect_catalog(collaborators.discovery.as_ref(), &config.rules).await;
    let channels = match collaborators.channels.list_channels().await {
        Ok(channels) => channels,
        Err(e) => {
            warn!(error = %e, "Failed to list channels, no channel namespace is excluded");
            Vec::new()
        }
    };

    let resources = match catalog {
        Ok(catalog) => {
            let resources = classify(&catalog, &config.rules, &BTreeSet::new());
            report.classified_resources = resources.len();
            metrics::CLASSIFIED_RESOURCES.set(resources.len() as f64);
            Some(resources)
        }
        Err(e) => {
            warn!(error = %e, "Resource discovery failed, keeping previous resource schedules");
            report.errors.push(e.to_string());
            None
        }
    };

    for category in active_categories(&schedule.spec) {
        let needs_catalog = matches!(
            category,
            BackupCategory::Resources | BackupCategory::ResourcesGeneric
        );
        let classified = match (&resources, needs_catalog) {
            (Some(resources), _) => resources.as_slice(),
            (None, false) => &[],
            (None, true) => continue,
        };

        let template = build_template(
            category,
            TemplateInputs {
                resources: classified,
                channels: &channels,
                rules: &config.rules,
            },
        );
        let velero = velero_schedule(category, &config.namespace, &schedule.spec, template);

        match collaborators.schedules.apply_schedule(&velero).await {
            Ok(()) => report.schedules.push(category.prefix().to_string()),
            Err(e) => {
                error!(schedule = %category, error = %e, "Failed to apply Velero schedule");
                report
                    .errors
                    .push(format!("schedule {}: {}", category.prefix(), e));
            }
        }
    }

    let policy = RetentionPolicy::new(schedule.spec.max_backups as usize);
    let cleanup = cleanup_backups(collaborators.backups.as_ref(), policy).await;
    report.pruned_backups = cleanup.requested;
    report.latest_cycle_finished = cleanup.latest_cycle_finished;

    let outcome = if report.is_clean() { "success" } else { "degraded" };
    metrics::CYCLES_TOTAL.with_label_values(&[outcome]).inc();
    info!(
        name = %name,
        schedules = report.schedules.len(),
        classified = report.classified_resources,
        pruned = report.pruned_backups,
        outcome = outcome,
        "Backup cycle finished"
    );

    report
}

/// Velero schedule for one category
pub fn velero_schedule(
    category: BackupCategory,
    namespace: &str,
    spec: &BackupScheduleSpec,
    mut template: BackupSpecTemplate,
) -> Schedule {
    template.ttl = spec.velero_ttl.clone();

    let mut schedule = Schedule::new(
        category.prefix(),
        ScheduleSpec {
            schedule: spec.velero_schedule.trim().to_string(),
            paused: Some(spec.paused),
            template,
        },
    );
    schedule.metadata.namespace = Some(namespace.to_string());
    schedule.metadata.labels = Some(BTreeMap::from([(
        MANAGED_BY_LABEL.to_string(),
        FIELD_MANAGER.to_string(),
    )]));
    schedule
}

/// Update status after a cycle
pub async fn update_status_cycle(
    schedule: &BackupSchedule,
    client: &Client,
    namespace: &str,
    report: &CycleReport,
) -> Result<()> {
    let name = schedule.name_any();
    let api: Api<BackupSchedule> = Api::namespaced(client.clone(), namespace);

    let (phase, reason, message) = if !report.is_clean() {
        ("Failed", "CycleDegraded", report.errors.join("; "))
    } else if schedule.spec.paused {
        ("Paused", "SchedulePaused", "Velero schedules are paused".to_string())
    } else {
        ("Enabled", "ScheduleActive", "Velero schedules are active".to_string())
    };
    let ready = if report.is_clean() { "True" } else { "False" };
    let now = Utc::now();
    let transitioned = ready_transition_time(schedule.status.as_ref(), ready, now);

    let status = json!({
        "status": {
            "phase": phase,
            "message": message,
            "lastCycleTime": now,
            "veleroSchedules": report.schedules,
            "classifiedResources": report.classified_resources,
            "prunedBackups": report.pruned_backups,
            "latestCycleFinished": report.latest_cycle_finished,
            "observedGeneration": schedule.metadata.generation,
            "conditions": [{
                "type": "Ready",
                "status": ready,
                "lastTransitionTime": transitioned,
                "reason": reason,
                "message": message
            }]
        }
    });

    api.patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(status))
        .await?;

    Ok(())
}

/// Update status to Failed
pub async fn update_status_failed(
    schedule: &BackupSchedule,
    client: &Client,
    namespace: &str,
    error_message: &str,
) -> Result<()> {
    let name = schedule.name_any();
    let api: Api<BackupSchedule> = Api::namespaced(client.clone(), namespace);

    let transitioned = ready_transition_time(schedule.status.as_ref(), "False", Utc::now());

    let status = json!({
        "status": {
            "phase": "Failed",
            "message": error_message,
            "observedGeneration": schedule.metadata.generation,
            "conditions": [{
                "type": "Ready",
                "status": "False",
                "lastTransitionTime": transitioned,
                "reason": "ValidationFailed",
                "message": error_message
            }]
        }
    });

    api.patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(status))
        .await?;

    Ok(())
}

/// Keep the Ready condition's transition time unless its status flips
fn ready_transition_time(
    previous: Option<&BackupScheduleStatus>,
    ready: &str,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    previous
        .and_then(|status| status.conditions.iter().find(|c| c.type_ == "Ready"))
        .filter(|condition| condition.status == ready)
        .map_or(now, |condition| condition.last_transition_time)
}

/// Delete the Velero schedules of every category from `namespace`.
///
/// Schedules already gone are skipped. Every category is attempted before
/// the first failure is returned. Returns how many schedules were deleted.
pub async fn delete_velero_schedules(writer: &dyn ScheduleWriter, namespace: &str) -> Result<usize> {
    let mut deleted = 0;
    let mut first_error = None;

    for category in BackupCategory::ALL {
        match writer.delete_schedule(category.prefix(), namespace).await {
            Ok(()) => {
                info!(schedule = %category, namespace = %namespace, "Deleted Velero schedule");
                deleted += 1;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                error!(schedule = %category, error = %e, "Failed to delete Velero schedule");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(deleted),
    }
}
