//! # Deletion
//!
//! Finalizer-gated cleanup of the materialized Secret.

use crate::controller::reconciler::materialize::is_managed_by;
use crate::controller::reconciler::types::{PipelineError, Reconciler, Requeue};
use crate::crd::InstallationAccessToken;
use crate::observability::metrics;
use crate::store::{ObjectKey, StoreError};
use tracing::{debug, info, warn};

/// Remove the Secret belonging to `iat`
///
/// The recorded `secretRef` is authoritative. Without one, the Secret with
/// the request's own name is removed only if it carries our source label.
async fn delete_materialized_secret(
    reconciler: &Reconciler,
    iat: &InstallationAccessToken,
) -> Result<(), StoreError> {
    let recorded = iat
        .status
        .as_ref()
        .and_then(|s| s.secret_ref.as_ref())
        .map(|r| ObjectKey::new(&r.namespace, &r.name));

    let key = match recorded {
        Some(key) => key,
        None => {
            let key = ObjectKey::of(iat);
            match reconciler.store.get_secret(&key).await? {
                Some(secret) if is_managed_by(&secret, iat) => key,
                Some(_) => {
                    debug!("Secret {} is not managed by this resource, leaving it", key);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    };

    match reconciler.store.delete_secret(&key).await {
        Ok(()) => {
            info!("Deleted secret {}", key);
            metrics::increment_secrets_deleted();
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!("Secret {} already gone", key);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Clean up after a deletion request and release the finalizer
pub async fn reconcile_deletion(reconciler: &Reconciler, iat: &InstallationAccessToken) -> Requeue {
    let backoff = Requeue::After(reconciler.config.failure_requeue_duration());

    if let Err(e) = delete_materialized_secret(reconciler, iat).await {
        let error = PipelineError::from(e);
        warn!("Failed to delete secret, keeping finalizer: {}", error);
        metrics::increment_reconciliation_errors(error.kind().as_str());
        return backoff;
    }

    let mut released = iat.clone();
    if released.remove_finalizer() {
        if let Err(e) = reconciler.store.replace_token_request(&released).await {
            warn!("Failed to remove finalizer: {}", e);
            metrics::increment_reconciliation_errors(PipelineError::from(e).kind().as_str());
            return backoff;
        }
        info!("Removed finalizer, resource can be purged");
    }

    Requeue::Never
}
