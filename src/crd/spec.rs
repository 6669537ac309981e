//! # InstallationAccessToken Spec
//!
//! InstallationAccessToken spec types.

use crate::constants::FINALIZER_NAME;
use schemars::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// InstallationAccessToken Custom Resource Definition
///
/// Declares a GitHub App installation whose access token should be minted and
/// kept refreshed in a Secret with the same name and namespace.
///
/// # Example
///
/// ```yaml
/// apiVersion: github.octopilot.io/v1alpha1
/// kind: InstallationAccessToken
/// metadata:
///   name: ci-token
///   namespace: ci
/// spec:
///   appId: "123"
///   installationId: "456"
///   privateKeyRef:
///     name: github-app-private-key
///     namespace: github-system
///     key: privateKey
///   template:
///     metadata:
///       labels:
///         team: platform
///     stringData:
///       GITHUB_TOKEN: "{{ .Token }}"
///       .git-credentials: "https://x-access-token:{{ .Token }}@github.com"
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "InstallationAccessToken",
    group = "github.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::InstallationAccessTokenStatus",
    shortname = "iat",
    printcolumn = r#"{"name":"App ID", "type":"string", "jsonPath":".spec.appId"}, {"name":"Installation ID", "type":"string", "jsonPath":".spec.installationId"}, {"name":"Private Key Name", "type":"string", "jsonPath":".spec.privateKeyRef.name"}, {"name":"Private Key Namespace", "type":"string", "jsonPath":".spec.privateKeyRef.namespace"}, {"name":"Secret Name", "type":"string", "jsonPath":".status.secretRef.name"}, {"name":"Secret Namespace", "type":"string", "jsonPath":".status.secretRef.namespace"}, {"name":"Token Expires At", "type":"date", "jsonPath":".status.token.expiresAt"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Token", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Token\")].status"}, {"name":"Secret", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Secret\")].status"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InstallationAccessTokenSpec {
    /// The GitHub App's ID
    pub app_id: String,
    /// The installation ID of the app on the target account or organization
    pub installation_id: String,
    /// Optional template for customizing the generated Secret
    /// Recognized fields: metadata.labels, metadata.annotations, type, stringData
    /// String values may reference the issued token as `{{ .Token }}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "template_schema")]
    pub template: Option<serde_json::Value>,
    /// Reference to the Secret holding the app's PEM-encoded private key
    /// Empty fields fall back to the controller defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_ref: Option<PrivateKeyRef>,
    /// Optional scope narrowing the token's repositories and permissions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<TokenScope>,
}

/// Reference to the private key Secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeyRef {
    /// Name of the Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Namespace of the Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Data key holding the PEM-encoded key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Scope requested for the token
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenScope {
    /// Repository names the token should have access to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<String>,
    /// Repository IDs the token should have access to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repository_ids: Vec<i64>,
    /// Permissions granted to the token (e.g. `contents: read`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, String>,
}

impl TokenScope {
    /// Whether the scope narrows anything at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty() && self.repository_ids.is_empty() && self.permissions.is_empty()
    }
}

fn template_schema(_gen: &mut schemars::SchemaGenerator) -> Schema {
    // Structural schemas cannot describe the free-form overlay; shape is checked at reconcile time
    schemars::json_schema!({
        "type": "object",
        "nullable": true,
        "description": "Optional template for customizing the generated Secret. Recognized fields: metadata.labels, metadata.annotations, type, stringData.",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

impl InstallationAccessToken {
    /// Namespace of the resource, `default` when unset
    #[must_use]
    pub fn namespace_or_default(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    /// Name of the resource
    #[must_use]
    pub fn name_or_unknown(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }

    /// Whether the cleanup finalizer is attached
    #[must_use]
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|name| name == FINALIZER_NAME))
    }

    /// Whether deletion has been requested
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Attach the cleanup finalizer, returns false if it was already present
    pub fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(FINALIZER_NAME.to_string());
        true
    }

    /// Detach the cleanup finalizer, returns false if it was absent
    pub fn remove_finalizer(&mut self) -> bool {
        let Some(finalizers) = self.metadata.finalizers.as_mut() else {
            return false;
        };
        let before = finalizers.len();
        finalizers.retain(|name| name != FINALIZER_NAME);
        before != finalizers.len()
    }

    /// `<namespace>.<name>` link stored on the materialized Secret
    #[must_use]
    pub fn source_link(&self) -> String {
        format!("{}.{}", self.namespace_or_default(), self.name_or_unknown())
    }
}
