//! # Reconciliation
//!
//! The control loop for one InstallationAccessToken.
//!
//! Every invocation reads the resource fresh, classifies it into a [`Phase`]
//! and either attaches the finalizer, runs the full issuance pipeline, or
//! cleans up after a deletion request. The returned [`Requeue`] tells the
//! driver when to come back.

use crate::controller::reconciler::credentials::{resolve_private_key, KeyLocation};
use crate::controller::reconciler::deletion::reconcile_deletion;
use crate::controller::reconciler::materialize::materialize;
use crate::controller::reconciler::status::{
    derive_ready, record_secret_blocked, record_secret_failed, record_secret_written,
    record_token_failed, record_token_issued, write_status,
};
use crate::controller::reconciler::types::{PipelineError, Reconciler, ReconcilerError, Requeue};
use crate::crd::{InstallationAccessToken, InstallationAccessTokenStatus};
use crate::github::{issue_app_jwt, AccessToken};
use crate::observability::metrics;
use crate::store::ObjectKey;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Lifecycle position of a resource, derived from its freshly read state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Absent, or being deleted with the finalizer already released
    Terminal,
    /// Finalizer not attached yet
    Init,
    /// Finalizer attached, nothing issued yet
    FinalizerPending,
    /// Issued at least once; refreshing
    Active,
    /// Deletion requested, finalizer still held
    Deleting,
}

impl Phase {
    #[must_use]
    pub fn of(iat: Option<&InstallationAccessToken>) -> Self {
        let Some(iat) = iat else {
            return Phase::Terminal;
        };
        match (iat.is_deleting(), iat.has_finalizer()) {
            (true, true) => Phase::Deleting,
            (true, false) => Phase::Terminal,
            (false, false) => Phase::Init,
            (false, true) => {
                let has_conditions = iat
                    .status
                    .as_ref()
                    .is_some_and(|s| !s.conditions.is_empty());
                if has_conditions {
                    Phase::Active
                } else {
                    Phase::FinalizerPending
                }
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Terminal => "terminal",
            Phase::Init => "init",
            Phase::FinalizerPending => "finalizer-pending",
            Phase::Active => "active",
            Phase::Deleting => "deleting",
        }
    }
}

/// Reconcile the InstallationAccessToken identified by `key`
pub async fn reconcile(
    reconciler: &Reconciler,
    key: &ObjectKey,
) -> Result<Requeue, ReconcilerError> {
    let span = tracing::info_span!(
        "controller.reconcile",
        resource.name = %key.name,
        resource.namespace = %key.namespace,
    );
    reconcile_inner(reconciler, key).instrument(span).await
}

async fn reconcile_inner(
    reconciler: &Reconciler,
    key: &ObjectKey,
) -> Result<Requeue, ReconcilerError> {
    let start = Instant::now();
    metrics::increment_reconciliations();

    let iat = reconciler
        .store
        .get_token_request(key)
        .await
        .map_err(|source| ReconcilerError::Read {
            key: key.clone(),
            source,
        })?;

    let phase = Phase::of(iat.as_ref());
    debug!("Reconciling {} in phase {}", key, phase.as_str());

    let requeue = match (phase, iat) {
        (Phase::Terminal, _) | (_, None) => {
            debug!("{} needs no further work", key);
            Requeue::Never
        }
        (Phase::Deleting, Some(iat)) => {
            info!("🗑️  Deletion requested for {}", key);
            reconcile_deletion(reconciler, &iat).await
        }
        (Phase::Init, Some(iat)) => attach_finalizer(reconciler, iat).await,
        (Phase::FinalizerPending | Phase::Active, Some(iat)) => {
            if phase == Phase::FinalizerPending {
                info!("🔄 Issuing first token for {}", key);
            } else {
                info!("🔄 Refreshing token for {}", key);
            }
            issue_and_record(reconciler, &iat).await
        }
    };

    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    Ok(requeue)
}

async fn attach_finalizer(reconciler: &Reconciler, mut iat: InstallationAccessToken) -> Requeue {
    iat.add_finalizer();
    match reconciler.store.replace_token_request(&iat).await {
        Ok(_) => {
            info!("Attached finalizer");
            Requeue::now()
        }
        Err(e) => {
            warn!("Failed to attach finalizer: {}", e);
            metrics::increment_reconciliation_errors(PipelineError::from(e).kind().as_str());
            Requeue::After(reconciler.config.failure_requeue_duration())
        }
    }
}

/// Run the issuance pipeline and persist the resulting status
async fn issue_and_record(reconciler: &Reconciler, iat: &InstallationAccessToken) -> Requeue {
    let now = Utc::now();
    let mut status = iat.status.clone().unwrap_or_default();

    let outcome = run_pipeline(reconciler, iat, &mut status, now).await;

    derive_ready(&mut status, now);
    status.observed_generation = iat.metadata.generation;
    write_status(reconciler, iat, &status).await;

    match outcome {
        Ok(()) => {
            info!(
                "✅ Token issued and secret written, refreshing in {}s",
                reconciler.config.token_refresh_interval().as_secs()
            );
            Requeue::After(reconciler.config.token_refresh_interval())
        }
        Err(e) => {
            error!(
                reason = e.reason(),
                "❌ Reconciliation failed: {}", e
            );
            metrics::increment_reconciliation_errors(e.kind().as_str());
            Requeue::After(reconciler.config.failure_requeue_duration())
        }
    }
}

async fn run_pipeline(
    reconciler: &Reconciler,
    iat: &InstallationAccessToken,
    status: &mut InstallationAccessTokenStatus,
    now: DateTime<Utc>,
) -> Result<(), PipelineError> {
    let token = match issue_token(reconciler, iat).await {
        Ok(token) => token,
        Err(e) => {
            record_token_failed(status, e.reason(), &e, now);
            record_secret_blocked(status, e.reason(), &e, now);
            return Err(e);
        }
    };
    record_token_issued(status, &token, now);
    metrics::increment_tokens_issued();

    match materialize(reconciler.store.as_ref(), iat, &token.token, now).await {
        Ok(secret_ref) => {
            record_secret_written(status, secret_ref, now);
            metrics::increment_secrets_written();
            Ok(())
        }
        Err(e) => {
            let e = PipelineError::from(e);
            record_secret_failed(status, e.reason(), &e, now);
            Err(e)
        }
    }
}

/// Resolve the key, sign an app JWT and exchange it for an installation token
async fn issue_token(
    reconciler: &Reconciler,
    iat: &InstallationAccessToken,
) -> Result<AccessToken, PipelineError> {
    let location = KeyLocation::resolve(iat.spec.private_key_ref.as_ref(), &reconciler.config);
    let key = resolve_private_key(reconciler.store.as_ref(), &location).await?;

    let assertion = issue_app_jwt(
        &iat.spec.app_id,
        &key,
        Some(reconciler.config.jwt_lifetime()),
    )?;

    let token = reconciler
        .exchanger
        .create_installation_access_token(
            &iat.spec.installation_id,
            &assertion,
            iat.spec.scope.as_ref(),
        )
        .await?;
    debug!("Token expires at {}", token.expires_at);
    Ok(token)
}
