//! # Error Policy
//!
//! Error handling for the controller watch loop.

use crate::controller::reconciler::ReconcilerError;
use crate::crd::InstallationAccessToken;
use crate::observability::metrics;
use crate::runtime::watch_loop::WatchContext;
use crate::store::ObjectKey;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Requeue a resource that could not be read after the fixed failure backoff
pub fn handle_reconciliation_error(
    obj: Arc<InstallationAccessToken>,
    error: &ReconcilerError,
    ctx: Arc<WatchContext>,
) -> Action {
    let name = obj.name_or_unknown();
    let namespace = obj.namespace_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {:?}", name, error);
    metrics::increment_reconciliation_errors("read");

    let backoff = ctx.reconciler.config.failure_requeue_duration();
    ctx.schedule.forget(&ObjectKey::of(&obj));

    info!("🔄 Retrying in {}s", backoff.as_secs());
    metrics::increment_requeues("error");
    Action::requeue(backoff)
}

/// Classify and log a watch stream error; returns whether the event is passed on
pub fn handle_watch_stream_error(error_string: &str) -> bool {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Gone");

    if is_not_found {
        warn!(
            "Resource not found (404) - normal if it was just deleted. Error: {}",
            error_string
        );
        true
    } else if is_410 {
        warn!("Watch resource version expired (410), watch will restart");
        false
    } else {
        error!("Controller stream error: {}", error_string);
        false
    }
}
