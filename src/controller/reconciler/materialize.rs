//! # Materialize
//!
//! Renders the Secret holding an issued token and writes it to the cluster.

use crate::constants::{
    ANNOTATION_APP_ID, ANNOTATION_INSTALLATION_ID, ANNOTATION_LAST_UPDATED,
    ANNOTATION_SOURCE_NAME, ANNOTATION_SOURCE_NAMESPACE, CONTROLLER_NAME, LABEL_MANAGED_BY,
    LABEL_SOURCE, TOKEN_SECRET_KEY,
};
use crate::controller::reconciler::template::{render_values, SecretTemplate, TemplateError};
use crate::crd::{InstallationAccessToken, SecretRef};
use crate::store::{ClusterStore, ObjectKey, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{debug, info};

const DEFAULT_SECRET_TYPE: &str = "Opaque";

#[derive(Debug, thiserror::Error)]
pub enum MaterializationError {
    #[error("failed to render secret template: {0}")]
    Template(#[from] TemplateError),

    #[error("failed to create secret: {0}")]
    Create(#[source] StoreError),

    #[error("failed to update secret: {0}")]
    Update(#[source] StoreError),
}

/// Management labels every materialized Secret carries
pub fn management_labels(iat: &InstallationAccessToken) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_MANAGED_BY.to_string(), CONTROLLER_NAME.to_string()),
        (LABEL_SOURCE.to_string(), iat.source_link()),
    ])
}

fn management_annotations(
    iat: &InstallationAccessToken,
    now: DateTime<Utc>,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            ANNOTATION_LAST_UPDATED.to_string(),
            now.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (ANNOTATION_APP_ID.to_string(), iat.spec.app_id.clone()),
        (
            ANNOTATION_INSTALLATION_ID.to_string(),
            iat.spec.installation_id.clone(),
        ),
        (
            ANNOTATION_SOURCE_NAMESPACE.to_string(),
            iat.namespace_or_default().to_string(),
        ),
        (
            ANNOTATION_SOURCE_NAME.to_string(),
            iat.name_or_unknown().to_string(),
        ),
    ])
}

/// Whether `secret` was materialized for `iat`
pub fn is_managed_by(secret: &Secret, iat: &InstallationAccessToken) -> bool {
    secret
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(LABEL_SOURCE))
        .is_some_and(|link| *link == iat.source_link())
}

/// Build the Secret for `token`, same name and namespace as `iat`
///
/// Template fields replace the defaults they cover, every value is then
/// rendered, and the management labels and annotations are applied last.
pub fn render_secret(
    iat: &InstallationAccessToken,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Secret, MaterializationError> {
    let template = match &iat.spec.template {
        Some(value) => SecretTemplate::decode(value)?,
        None => SecretTemplate::default(),
    };
    let metadata = template.metadata.unwrap_or_default();

    let string_data = match &template.string_data {
        Some(values) => render_values(values, token)?,
        None => BTreeMap::from([(TOKEN_SECRET_KEY.to_string(), token.to_string())]),
    };
    let mut labels = render_values(&metadata.labels.unwrap_or_default(), token)?;
    let mut annotations = render_values(&metadata.annotations.unwrap_or_default(), token)?;

    labels.extend(management_labels(iat));
    annotations.extend(management_annotations(iat, now));

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(iat.name_or_unknown().to_string()),
            namespace: Some(iat.namespace_or_default().to_string()),
            labels: Some(labels),
            annotations: Some(annotations),
            ..ObjectMeta::default()
        },
        type_: Some(
            template
                .type_
                .unwrap_or_else(|| DEFAULT_SECRET_TYPE.to_string()),
        ),
        string_data: Some(string_data),
        ..Secret::default()
    })
}

/// Create the Secret, replacing it wholesale if it already exists
pub async fn write_secret(
    store: &dyn ClusterStore,
    secret: &Secret,
) -> Result<SecretRef, MaterializationError> {
    let key = ObjectKey::new(
        secret.metadata.namespace.clone().unwrap_or_default(),
        secret.metadata.name.clone().unwrap_or_default(),
    );

    match store.create_secret(secret).await {
        Ok(_) => {
            info!("Created secret {}", key);
        }
        Err(e) if e.is_already_exists() => {
            debug!("Secret {} already exists, replacing", key);
            store
                .replace_secret(secret)
                .await
                .map_err(MaterializationError::Update)?;
            info!("Updated secret {}", key);
        }
        Err(e) => return Err(MaterializationError::Create(e)),
    }

    Ok(SecretRef {
        name: key.name,
        namespace: key.namespace,
    })
}

/// Render and write the Secret for a freshly issued token
pub async fn materialize(
    store: &dyn ClusterStore,
    iat: &InstallationAccessToken,
    token: &str,
    now: DateTime<Utc>,
) -> Result<SecretRef, MaterializationError> {
    let secret = render_secret(iat, token, now)?;
    write_secret(store, &secret).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::InstallationAccessTokenSpec;
    use serde_json::json;

    fn token_request(template: Option<serde_json::Value>) -> InstallationAccessToken {
        let mut iat = InstallationAccessToken::new(
            "ci-token",
            InstallationAccessTokenSpec {
                app_id: "123".to_string(),
                installation_id: "456".to_string(),
                template,
                private_key_ref: None,
                scope: None,
            },
        );
        iat.metadata.namespace = Some("ci".to_string());
        iat
    }

    #[test]
    fn test_default_secret() {
        let now = Utc::now();
        let secret = render_secret(&token_request(None), "abc", now).unwrap();

        assert_eq!(secret.metadata.name.as_deref(), Some("ci-token"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("ci"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(
            secret.string_data,
            Some(BTreeMap::from([("token".to_string(), "abc".to_string())]))
        );

        let labels = secret.metadata.labels.unwrap();
        assert_eq!(labels[LABEL_MANAGED_BY], "installation-token-controller");
        assert_eq!(labels[LABEL_SOURCE], "ci.ci-token");

        let annotations = secret.metadata.annotations.unwrap();
        assert_eq!(annotations[ANNOTATION_APP_ID], "123");
        assert_eq!(annotations[ANNOTATION_INSTALLATION_ID], "456");
        assert_eq!(annotations[ANNOTATION_SOURCE_NAMESPACE], "ci");
        assert_eq!(annotations[ANNOTATION_SOURCE_NAME], "ci-token");
        assert_eq!(
            annotations[ANNOTATION_LAST_UPDATED],
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }

    #[test]
    fn test_template_replaces_defaults_and_substitutes() {
        let iat = token_request(Some(json!({
            "metadata": {
                "labels": {"team": "platform", "app.kubernetes.io/managed-by": "someone-else"},
                "annotations": {"hint": "token {{ .Token }}"}
            },
            "type": "kubernetes.io/basic-auth",
            "stringData": {"username": "x-access-token", "password": "tok={{.Token}}"}
        })));

        let secret = render_secret(&iat, "abc", Utc::now()).unwrap();

        assert_eq!(secret.type_.as_deref(), Some("kubernetes.io/basic-auth"));
        let data = secret.string_data.unwrap();
        assert_eq!(data["password"], "tok=abc");
        assert_eq!(data["username"], "x-access-token");
        assert!(!data.contains_key("token"));

        let labels = secret.metadata.labels.unwrap();
        assert_eq!(labels["team"], "platform");
        assert_eq!(labels[LABEL_MANAGED_BY], "installation-token-controller");
        assert_eq!(labels[LABEL_SOURCE], "ci.ci-token");

        let annotations = secret.metadata.annotations.unwrap();
        assert_eq!(annotations["hint"], "token abc");
        assert_eq!(annotations[ANNOTATION_APP_ID], "123");
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        let iat = token_request(Some(json!({"stringData": {"token": "{{ .Nope }}"}})));
        let err = render_secret(&iat, "abc", Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            MaterializationError::Template(TemplateError::UnknownVariable(_))
        ));

        let iat = token_request(Some(json!({"immutable": true})));
        let err = render_secret(&iat, "abc", Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            MaterializationError::Template(TemplateError::Structured(_))
        ));
    }

    #[test]
    fn test_managed_by_link() {
        let iat = token_request(None);
        let secret = render_secret(&iat, "abc", Utc::now()).unwrap();
        assert!(is_managed_by(&secret, &iat));
        assert!(!is_managed_by(&Secret::default(), &iat));
    }
}
