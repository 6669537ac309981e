//! Kubernetes-backed [`ClusterStore`].

use super::{ClusterStore, ObjectKey, StoreError};
use crate::constants::CONTROLLER_NAME;
use crate::crd::{InstallationAccessToken, InstallationAccessTokenStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::{json, Map, Value};

const TOKEN_REQUEST_KIND: &str = "InstallationAccessToken";
const SECRET_KIND: &str = "Secret";

/// [`ClusterStore`] over the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn token_requests(&self, namespace: &str) -> Api<InstallationAccessToken> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..PostParams::default()
        }
    }
}

fn secret_key(secret: &Secret) -> ObjectKey {
    ObjectKey::new(
        secret.metadata.namespace.clone().unwrap_or_default(),
        secret.metadata.name.clone().unwrap_or_default(),
    )
}

/// Build a JSON merge patch that turns `old` into exactly `new`
///
/// Keys present in `old` but missing from `new` are set to `null` so the
/// merge removes them; arrays and scalars are replaced wholesale.
pub(crate) fn replacement_merge_patch(old: &Value, new: &Value) -> Value {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let mut patch = Map::new();
            for key in old_map.keys() {
                if !new_map.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            for (key, new_value) in new_map {
                let value = match old_map.get(key) {
                    Some(old_value) => replacement_merge_patch(old_value, new_value),
                    None => new_value.clone(),
                };
                patch.insert(key.clone(), value);
            }
            Value::Object(patch)
        }
        _ => new.clone(),
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_token_request(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<InstallationAccessToken>, StoreError> {
        self.token_requests(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(e, TOKEN_REQUEST_KIND, key))
    }

    async fn replace_token_request(
        &self,
        iat: &InstallationAccessToken,
    ) -> Result<InstallationAccessToken, StoreError> {
        let key = ObjectKey::of(iat);
        self.token_requests(&key.namespace)
            .replace(&key.name, &Self::post_params(), iat)
            .await
            .map_err(|e| StoreError::from_kube(e, TOKEN_REQUEST_KIND, &key))
    }

    async fn replace_token_request_status(
        &self,
        current: &InstallationAccessToken,
        status: &InstallationAccessTokenStatus,
    ) -> Result<InstallationAccessToken, StoreError> {
        let key = ObjectKey::of(current);
        let encode = |source| StoreError::Encode {
            kind: TOKEN_REQUEST_KIND,
            source,
        };
        let old_status = match &current.status {
            Some(existing) => serde_json::to_value(existing).map_err(encode)?,
            None => Value::Object(Map::new()),
        };
        let new_status = serde_json::to_value(status).map_err(encode)?;

        // resourceVersion in a patch is enforced as a precondition by the API server
        let patch = json!({
            "metadata": { "resourceVersion": current.metadata.resource_version },
            "status": replacement_merge_patch(&old_status, &new_status),
        });
        let params = PatchParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..PatchParams::default()
        };

        self.token_requests(&key.namespace)
            .patch_status(&key.name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(e, TOKEN_REQUEST_KIND, &key))
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        self.secrets(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(e, SECRET_KIND, key))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let key = secret_key(secret);
        self.secrets(&key.namespace)
            .create(&Self::post_params(), secret)
            .await
            .map_err(|e| StoreError::from_kube(e, SECRET_KIND, &key))
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let key = secret_key(secret);
        self.secrets(&key.namespace)
            .replace(&key.name, &Self::post_params(), secret)
            .await
            .map_err(|e| StoreError::from_kube(e, SECRET_KIND, &key))
    }

    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.secrets(&key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, SECRET_KIND, key))
    }
}
