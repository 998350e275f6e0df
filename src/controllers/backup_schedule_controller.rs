//! BackupSchedule controller
//!
//! Watches BackupSchedule resources and runs a backup cycle whenever the spec
//! changes or the cycle interval has passed. Deleting a BackupSchedule
//! removes the Velero schedules it published; existing backups stay.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        finalizer::{finalizer, Event as FinalizerEvent},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use crate::controllers::Context;
use crate::crd::BackupSchedule;
use crate::error::{Error, Result};
use crate::metrics;
use crate::reconcilers::backup_schedule as schedule_reconciler;

/// Finalizer name for BackupSchedule resources
const FINALIZER_NAME: &str = "cluster.open-cluster-management.io/backup-schedule-finalizer";

/// Interval between backup cycles
const CYCLE_INTERVAL: Duration = Duration::from_secs(300);

/// Run the BackupSchedule controller
pub async fn run(client: Client, context: Arc<Context>) {
    let api: Api<BackupSchedule> = Api::all(client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("BackupSchedule CRD not installed: {}", e);
        metrics::OPERATOR_HEALTH.set(0.0);
        return;
    }

    info!("Starting BackupSchedule controller");

    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or("default"),
                        "Reconciled BackupSchedule"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS
                        .with_label_values(&["BackupSchedule"])
                        .inc();
                }
            }
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<BackupSchedule>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&["BackupSchedule"])
        .start_timer();
    metrics::RECONCILIATIONS
        .with_label_values(&["BackupSchedule"])
        .inc();

    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<BackupSchedule> = Api::namespaced(ctx.client.clone(), &namespace);

    finalizer(&api, FINALIZER_NAME, obj, |event| async {
        match event {
            FinalizerEvent::Apply(schedule) => apply(schedule, ctx.clone()).await,
            FinalizerEvent::Cleanup(schedule) => cleanup(schedule, ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::Finalizer(Box::new(e)))
}

/// Apply reconciliation (create/update)
async fn apply(schedule: Arc<BackupSchedule>, ctx: Arc<Context>) -> Result<Action> {
    let name = schedule.name_any();
    let namespace = schedule.namespace().unwrap_or_else(|| "default".to_string());

    info!(
        name = %name,
        namespace = %namespace,
        generation = schedule.metadata.generation.unwrap_or(0),
        "Reconciling BackupSchedule"
    );

    if let Err(e) = schedule_reconciler::validate(&schedule) {
        warn!(error = %e, "Validation failed");
        let message = e.to_string();
        // rewriting an unchanged status would trigger another reconcile
        if !schedule_reconciler::failure_recorded(&schedule, &message) {
            schedule_reconciler::update_status_failed(&schedule, &ctx.client, &namespace, &message)
                .await?;
        }
        return Ok(Action::requeue(Duration::from_secs(300)));
    }

    if let Some(wait) = schedule_reconciler::next_cycle_in(&schedule, Utc::now(), CYCLE_INTERVAL) {
        debug!(wait_secs = wait.as_secs(), "Backup cycle not due yet");
        return Ok(Action::requeue(wait));
    }

    let report = schedule_reconciler::run_cycle(&schedule, &ctx.config, &ctx.collaborators).await;
    schedule_reconciler::update_status_cycle(&schedule, &ctx.client, &namespace, &report).await?;

    Ok(Action::requeue(CYCLE_INTERVAL))
}

/// Cleanup when resource is being deleted
async fn cleanup(schedule: Arc<BackupSchedule>, ctx: Arc<Context>) -> Result<Action> {
    let name = schedule.name_any();
    info!(name = %name, "Cleaning up BackupSchedule");

    let deleted = schedule_reconciler::delete_velero_schedules(
        ctx.collaborators.schedules.as_ref(),
        &ctx.config.namespace,
    )
    .await?;
    info!(name = %name, deleted = deleted, "Removed Velero schedules");

    metrics::CLEANUPS.with_label_values(&["BackupSchedule"]).inc();

    Ok(Action::await_change())
}

/// Error policy for the controller
fn error_policy(obj: Arc<BackupSchedule>, error: &Error, _ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    error!(
        name = %name,
        error = %error,
        "Reconciliation failed, scheduling retry"
    );

    let requeue_duration = match error {
        Error::Kube(_) => Duration::from_secs(30),
        Error::Config(_) | Error::Validation(_) => Duration::from_secs(300),
        Error::Discovery(_) => Duration::from_secs(60),
        _ => Duration::from_secs(30),
    };

    Action::requeue(requeue_duration)
}
