//! # Cluster Store
//!
//! Typed persistence seam between the reconciler and the Kubernetes API.
//!
//! The reconciler only talks to [`ClusterStore`]; [`KubeStore`] is the
//! production implementation over `kube::Api`. Tests substitute an in-memory
//! store with the same optimistic concurrency behaviour.

mod kubernetes;

pub use kubernetes::KubeStore;

use crate::crd::{InstallationAccessToken, InstallationAccessTokenStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use std::fmt;

/// Namespace/name identity of a namespaced object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of an InstallationAccessToken
    #[must_use]
    pub fn of(iat: &InstallationAccessToken) -> Self {
        Self::new(iat.namespace_or_default(), iat.name_or_unknown())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Errors surfaced by the cluster store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} \"{key}\" not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    #[error("{kind} \"{key}\" already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    #[error("conflict writing {kind} \"{key}\": {message}")]
    Conflict {
        kind: &'static str,
        key: ObjectKey,
        message: String,
    },

    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),

    #[error("failed to encode {kind}: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Classify a kube client error for the given object
    pub fn from_kube(error: kube::Error, kind: &'static str, key: &ObjectKey) -> Self {
        match &error {
            kube::Error::Api(response) if response.code == 404 => StoreError::NotFound {
                kind,
                key: key.clone(),
            },
            kube::Error::Api(response)
                if response.code == 409 && response.reason == "AlreadyExists" =>
            {
                StoreError::AlreadyExists {
                    kind,
                    key: key.clone(),
                }
            }
            kube::Error::Api(response) if response.code == 409 => StoreError::Conflict {
                kind,
                key: key.clone(),
                message: response.message.clone(),
            },
            _ => StoreError::Api(error),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

/// Persistence operations needed by the reconciler
///
/// Every write is a full replace guarded by the object's `resourceVersion`;
/// a stale version surfaces as [`StoreError::Conflict`].
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Read an InstallationAccessToken, `None` if it does not exist
    async fn get_token_request(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<InstallationAccessToken>, StoreError>;

    /// Replace an InstallationAccessToken's metadata and spec
    async fn replace_token_request(
        &self,
        iat: &InstallationAccessToken,
    ) -> Result<InstallationAccessToken, StoreError>;

    /// Replace the status of an InstallationAccessToken
    ///
    /// `current` is the object as last read; its status is what gets replaced.
    async fn replace_token_request_status(
        &self,
        current: &InstallationAccessToken,
        status: &InstallationAccessTokenStatus,
    ) -> Result<InstallationAccessToken, StoreError>;

    /// Read a Secret, `None` if it does not exist
    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError>;

    /// Create a Secret, [`StoreError::AlreadyExists`] if one is present
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Fully replace an existing Secret
    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Delete a Secret, [`StoreError::NotFound`] if it is absent
    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), StoreError>;
}
