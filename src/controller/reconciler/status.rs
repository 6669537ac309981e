//! # Status
//!
//! Bookkeeping for the Token, Secret and Ready conditions.
//!
//! All functions mutate an in-memory status; the reconciler writes it once at
//! the end of a pass with [`write_status`].

use crate::controller::reconciler::types::Reconciler;
use crate::crd::{
    Condition, ConditionStatus, ConditionType, InstallationAccessToken,
    InstallationAccessTokenStatus, SecretRef, TokenInfo,
};
use crate::github::AccessToken;
use crate::observability::metrics;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Display;
use tracing::{debug, warn};

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Replace the condition of the same type, or append it
pub fn set_condition(
    status: &mut InstallationAccessTokenStatus,
    condition_type: ConditionType,
    condition_status: ConditionStatus,
    reason: &str,
    message: String,
    now: DateTime<Utc>,
) {
    let condition = Condition {
        r#type: condition_type.as_str().to_string(),
        status: condition_status,
        last_transition_time: Some(timestamp(now)),
        reason: Some(reason.to_string()),
        message: Some(message),
    };

    match status
        .conditions
        .iter_mut()
        .find(|c| c.r#type == condition.r#type)
    {
        Some(existing) => *existing = condition,
        None => status.conditions.push(condition),
    }
}

/// Token=True and the snapshot of the issued token
pub fn record_token_issued(
    status: &mut InstallationAccessTokenStatus,
    token: &AccessToken,
    now: DateTime<Utc>,
) {
    set_condition(
        status,
        ConditionType::Token,
        ConditionStatus::True,
        "Created",
        "Token successfully created".to_string(),
        now,
    );
    status.token = Some(TokenInfo {
        expires_at: Some(timestamp(token.expires_at)),
        permissions: token.permissions.clone(),
        repository_selection: token.repository_selection.clone(),
        repositories: token.repositories.iter().map(|r| r.name.clone()).collect(),
        repository_ids: token.repositories.iter().map(|r| r.id).collect(),
    });
}

/// Token=False; the previous token snapshot is kept
pub fn record_token_failed(
    status: &mut InstallationAccessTokenStatus,
    reason: &str,
    error: &dyn Display,
    now: DateTime<Utc>,
) {
    set_condition(
        status,
        ConditionType::Token,
        ConditionStatus::False,
        reason,
        format!("Failed to create token: {error}"),
        now,
    );
}

/// Secret=True and the reference to the written Secret
pub fn record_secret_written(
    status: &mut InstallationAccessTokenStatus,
    secret_ref: SecretRef,
    now: DateTime<Utc>,
) {
    set_condition(
        status,
        ConditionType::Secret,
        ConditionStatus::True,
        "Updated",
        "Secret successfully created/updated".to_string(),
        now,
    );
    status.secret_ref = Some(secret_ref);
}

/// Secret=False because no token was issued; the secret reference is kept
pub fn record_secret_blocked(
    status: &mut InstallationAccessTokenStatus,
    reason: &str,
    error: &dyn Display,
    now: DateTime<Utc>,
) {
    set_condition(
        status,
        ConditionType::Secret,
        ConditionStatus::False,
        reason,
        format!("Failed to create/update Secret: {error}"),
        now,
    );
}

/// Secret=False after a failed write; clears the secret reference
pub fn record_secret_failed(
    status: &mut InstallationAccessTokenStatus,
    reason: &str,
    error: &dyn Display,
    now: DateTime<Utc>,
) {
    set_condition(
        status,
        ConditionType::Secret,
        ConditionStatus::False,
        reason,
        format!("Failed to create/update Secret: {error}"),
        now,
    );
    status.secret_ref = None;
}

/// Derive Ready from Token and Secret
pub fn derive_ready(status: &mut InstallationAccessTokenStatus, now: DateTime<Utc>) {
    let not_ready = |condition_type: ConditionType, label: &str| {
        if status.is_true(condition_type) {
            return None;
        }
        let detail = status
            .condition(condition_type)
            .and_then(|c| c.message.clone())
            .unwrap_or_else(|| "unknown".to_string());
        Some(format!("{label} is not ready: {detail}"))
    };

    let message = not_ready(ConditionType::Token, "Token")
        .or_else(|| not_ready(ConditionType::Secret, "Secret"));

    match message {
        None => set_condition(
            status,
            ConditionType::Ready,
            ConditionStatus::True,
            "AllReady",
            "InstallationAccessToken is ready for use".to_string(),
            now,
        ),
        Some(message) => set_condition(
            status,
            ConditionType::Ready,
            ConditionStatus::False,
            "NotReady",
            message,
            now,
        ),
    }
}

/// Persist `status` as the full status of `iat`
///
/// Failures are logged and counted; the next scheduled pass retries naturally.
pub async fn write_status(
    reconciler: &Reconciler,
    iat: &InstallationAccessToken,
    status: &InstallationAccessTokenStatus,
) -> bool {
    match reconciler
        .store
        .replace_token_request_status(iat, status)
        .await
    {
        Ok(_) => {
            debug!(
                "Updated status of {}/{}",
                iat.namespace_or_default(),
                iat.name_or_unknown()
            );
            true
        }
        Err(e) => {
            warn!(
                "Failed to update status of {}/{}: {}",
                iat.namespace_or_default(),
                iat.name_or_unknown(),
                e
            );
            metrics::increment_status_update_errors();
            false
        }
    }
}
