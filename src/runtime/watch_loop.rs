//! # Watch Loop
//!
//! Controller watch loop that monitors InstallationAccessToken resources and
//! triggers reconciliation when changes are detected or a refresh is due.

use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError, Requeue};
use crate::controller::server::ServerState;
use crate::crd::InstallationAccessToken;
use crate::observability::metrics;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::runtime::schedule::{requires_immediate_pass, ReconcileSchedule};
use crate::store::ObjectKey;
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{controller, controller::Action, watcher, Controller};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Context shared by every reconciliation the driver runs
#[derive(Debug)]
pub struct WatchContext {
    pub reconciler: Reconciler,
    pub schedule: ReconcileSchedule,
}

impl WatchContext {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler,
            schedule: ReconcileSchedule::default(),
        }
    }
}

/// Run the controller watch loop until a shutdown signal arrives
///
/// The watch is restarted after a delay whenever its stream ends.
pub async fn run_watch_loop(
    token_requests: Api<InstallationAccessToken>,
    ctx: Arc<WatchContext>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let config = Arc::clone(&ctx.reconciler.config);

    // Mark not ready on SIGINT/SIGTERM so the loop exits instead of restarting
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal, initiating graceful shutdown...");
        shutdown_state.is_ready.store(false, Ordering::Relaxed);
    });

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        info!("Starting controller watch loop...");
        Controller::new(
            token_requests.clone(),
            watcher::Config::default().any_semantic(),
        )
        .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciliations))
        .shutdown_on_signal()
        .run(create_reconcile_fn, handle_reconciliation_error, Arc::clone(&ctx))
        .filter_map(|event| async move {
            match &event {
                Ok((object, _action)) => {
                    debug!(resource = %object.name, "watch.event.success");
                    Some(event)
                }
                Err(e) => handle_watch_stream_error(&format!("{e:?}")).then_some(event),
            }
        })
        .for_each(|_| futures::future::ready(()))
        .instrument(watch_span)
        .await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = config.watch_restart_delay_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Gate a watch event and run the reconciler when a pass is due
async fn create_reconcile_fn(
    obj: Arc<InstallationAccessToken>,
    ctx: Arc<WatchContext>,
) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::of(&obj);

    if !requires_immediate_pass(&obj) {
        if let Some(remaining) = ctx.schedule.remaining(&key, Instant::now()) {
            debug!(
                resource.name = key.name.as_str(),
                resource.namespace = key.namespace.as_str(),
                remaining_secs = remaining.as_secs(),
                "Skipping reconciliation - spec unchanged and next pass not yet due"
            );
            return Ok(Action::requeue(remaining));
        }
    }

    let requeue = reconcile(&ctx.reconciler, &key).await?;
    ctx.schedule.record(&key, requeue, Instant::now());
    metrics::increment_requeues(requeue_reason(&ctx.reconciler, requeue));
    Ok(requeue.into())
}

fn requeue_reason(reconciler: &Reconciler, requeue: Requeue) -> &'static str {
    match requeue {
        Requeue::Never => "done",
        Requeue::After(delay) if delay.is_zero() => "immediate",
        Requeue::After(delay) if delay == reconciler.config.token_refresh_interval() => "refresh",
        Requeue::After(_) => "failure-backoff",
    }
}
