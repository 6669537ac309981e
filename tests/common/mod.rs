//! Common test utilities
//!
//! Provides rustls setup for the Pact tests and in-memory collaborators for
//! driving the reconciler without a cluster or the GitHub API.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use installation_token_controller::config::ControllerConfig;
use installation_token_controller::crd::{
    InstallationAccessToken, InstallationAccessTokenSpec, InstallationAccessTokenStatus,
    TokenScope,
};
use installation_token_controller::github::{AccessToken, ExchangeError, TokenExchanger};
use installation_token_controller::prelude::Reconciler;
use installation_token_controller::store::{ClusterStore, ObjectKey, StoreError};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

pub const PRIVATE_KEY: &str = include_str!("../fixtures/github-app-key.pem");
pub const PUBLIC_KEY: &str = include_str!("../fixtures/github-app-key.pub.pem");

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // ring, as in the controller binary
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// In-memory [`ClusterStore`] with API-server-like optimistic concurrency
///
/// Every stored object carries a `resourceVersion`; writes with a stale
/// version fail with a conflict. Removing the last finalizer from an object
/// being deleted purges it, as the API server does.
///
/// `concurrent_writer` bumps the stored version of a token request right
/// before each write to it, as if another client had updated it in between.
#[derive(Debug, Default)]
pub struct MemoryStore {
    token_requests: Mutex<BTreeMap<ObjectKey, InstallationAccessToken>>,
    secrets: Mutex<BTreeMap<ObjectKey, Secret>>,
    version: AtomicU64,
    pub fail_secret_writes: AtomicBool,
    pub fail_secret_deletes: AtomicBool,
    pub fail_token_request_writes: AtomicBool,
    pub concurrent_writer: AtomicBool,
    pub secret_writes: AtomicUsize,
    pub status_writes: AtomicUsize,
}

fn secret_key(secret: &Secret) -> ObjectKey {
    ObjectKey::new(
        secret.metadata.namespace.clone().unwrap_or_default(),
        secret.metadata.name.clone().unwrap_or_default(),
    )
}

impl MemoryStore {
    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    pub fn insert_token_request(&self, mut iat: InstallationAccessToken) {
        iat.metadata.resource_version = Some(self.next_version());
        self.token_requests
            .lock()
            .unwrap()
            .insert(ObjectKey::of(&iat), iat);
    }

    pub fn insert_secret(&self, mut secret: Secret) {
        secret.metadata.resource_version = Some(self.next_version());
        self.secrets
            .lock()
            .unwrap()
            .insert(secret_key(&secret), secret);
    }

    pub fn token_request(&self, key: &ObjectKey) -> Option<InstallationAccessToken> {
        self.token_requests.lock().unwrap().get(key).cloned()
    }

    pub fn status(&self, key: &ObjectKey) -> InstallationAccessTokenStatus {
        self.token_request(key)
            .and_then(|iat| iat.status)
            .unwrap_or_default()
    }

    pub fn secret(&self, key: &ObjectKey) -> Option<Secret> {
        self.secrets.lock().unwrap().get(key).cloned()
    }

    pub fn secret_count(&self) -> usize {
        self.secrets.lock().unwrap().len()
    }

    /// Mark an object as deleted, keeping it while finalizers remain
    pub fn request_deletion(&self, key: &ObjectKey) {
        let mut token_requests = self.token_requests.lock().unwrap();
        let Some(iat) = token_requests.get_mut(key) else {
            return;
        };
        iat.metadata.deletion_timestamp =
            Some(serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap());
        iat.metadata.resource_version = Some(self.next_version());
        if iat.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
            token_requests.remove(key);
        }
    }

    fn rejected(kind: &'static str, key: &ObjectKey) -> StoreError {
        StoreError::Conflict {
            kind,
            key: key.clone(),
            message: "writes are rejected".to_string(),
        }
    }

    fn interleave(&self, stored: &mut InstallationAccessToken) {
        if self.concurrent_writer.load(Ordering::SeqCst) {
            stored.metadata.resource_version = Some(self.next_version());
        }
    }

    fn check_version(
        kind: &'static str,
        key: &ObjectKey,
        stored: Option<&String>,
        offered: Option<&String>,
    ) -> Result<(), StoreError> {
        if stored == offered {
            return Ok(());
        }
        Err(StoreError::Conflict {
            kind,
            key: key.clone(),
            message: "the object has been modified; please apply your changes to the latest version and try again".to_string(),
        })
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get_token_request(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<InstallationAccessToken>, StoreError> {
        Ok(self.token_request(key))
    }

    async fn replace_token_request(
        &self,
        iat: &InstallationAccessToken,
    ) -> Result<InstallationAccessToken, StoreError> {
        let key = ObjectKey::of(iat);
        if self.fail_token_request_writes.load(Ordering::SeqCst) {
            return Err(Self::rejected("InstallationAccessToken", &key));
        }
        let mut token_requests = self.token_requests.lock().unwrap();
        let stored = token_requests.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            kind: "InstallationAccessToken",
            key: key.clone(),
        })?;
        self.interleave(stored);
        Self::check_version(
            "InstallationAccessToken",
            &key,
            stored.metadata.resource_version.as_ref(),
            iat.metadata.resource_version.as_ref(),
        )?;

        let mut updated = iat.clone();
        updated.status.clone_from(&stored.status);
        updated.metadata.deletion_timestamp.clone_from(&stored.metadata.deletion_timestamp);
        updated.metadata.resource_version = Some(self.next_version());

        let purge = updated.metadata.deletion_timestamp.is_some()
            && updated.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        if purge {
            token_requests.remove(&key);
        } else {
            token_requests.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn replace_token_request_status(
        &self,
        current: &InstallationAccessToken,
        status: &InstallationAccessTokenStatus,
    ) -> Result<InstallationAccessToken, StoreError> {
        let key = ObjectKey::of(current);
        let mut token_requests = self.token_requests.lock().unwrap();
        let stored = token_requests.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            kind: "InstallationAccessToken",
            key: key.clone(),
        })?;
        self.interleave(stored);
        Self::check_version(
            "InstallationAccessToken",
            &key,
            stored.metadata.resource_version.as_ref(),
            current.metadata.resource_version.as_ref(),
        )?;

        stored.status = Some(status.clone());
        stored.metadata.resource_version = Some(self.next_version());
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        Ok(self.secret(key))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let key = secret_key(secret);
        if self.fail_secret_writes.load(Ordering::SeqCst) {
            return Err(Self::rejected("Secret", &key));
        }
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: "Secret", key });
        }
        let mut created = secret.clone();
        created.metadata.resource_version = Some(self.next_version());
        secrets.insert(key, created.clone());
        self.secret_writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let key = secret_key(secret);
        let mut secrets = self.secrets.lock().unwrap();
        if !secrets.contains_key(&key) {
            return Err(StoreError::NotFound { kind: "Secret", key });
        }
        let mut replaced = secret.clone();
        replaced.metadata.resource_version = Some(self.next_version());
        secrets.insert(key, replaced.clone());
        self.secret_writes.fetch_add(1, Ordering::SeqCst);
        Ok(replaced)
    }

    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), StoreError> {
        if self.fail_secret_deletes.load(Ordering::SeqCst) {
            return Err(Self::rejected("Secret", key));
        }
        self.secrets
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                kind: "Secret",
                key: key.clone(),
            })
    }
}

/// What [`StubExchanger`] answers with
#[derive(Debug, Clone)]
pub enum StubResponse {
    Token(String),
    Status(u16, String),
}

/// One recorded exchange
#[derive(Debug, Clone)]
pub struct ExchangeCall {
    pub installation_id: String,
    pub assertion: String,
    pub scope: Option<TokenScope>,
}

/// [`TokenExchanger`] answering with a canned response
#[derive(Debug)]
pub struct StubExchanger {
    response: Mutex<StubResponse>,
    pub calls: Mutex<Vec<ExchangeCall>>,
}

impl StubExchanger {
    pub fn issuing(token: &str) -> Self {
        Self {
            response: Mutex::new(StubResponse::Token(token.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            response: Mutex::new(StubResponse::Status(status, body.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond_with(&self, response: StubResponse) {
        *self.response.lock().unwrap() = response;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<ExchangeCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TokenExchanger for StubExchanger {
    async fn create_installation_access_token(
        &self,
        installation_id: &str,
        assertion: &str,
        scope: Option<&TokenScope>,
    ) -> Result<AccessToken, ExchangeError> {
        self.calls.lock().unwrap().push(ExchangeCall {
            installation_id: installation_id.to_string(),
            assertion: assertion.to_string(),
            scope: scope.cloned(),
        });

        match self.response.lock().unwrap().clone() {
            StubResponse::Token(token) => Ok(serde_json::from_value(serde_json::json!({
                "token": token,
                "expires_at": "2030-01-01T01:00:00Z",
                "permissions": {"contents": "read", "metadata": "read"},
                "repository_selection": "selected",
                "repositories": [{"id": 42, "name": "api"}]
            }))
            .unwrap()),
            StubResponse::Status(status, body) => {
                Err(ExchangeError::UnexpectedStatus { status, body })
            }
        }
    }
}

/// An InstallationAccessToken in namespace `ci` for app 123, installation 456
pub fn token_request(name: &str) -> InstallationAccessToken {
    let mut iat = InstallationAccessToken::new(
        name,
        InstallationAccessTokenSpec {
            app_id: "123".to_string(),
            installation_id: "456".to_string(),
            template: None,
            private_key_ref: None,
            scope: None,
        },
    );
    iat.metadata.namespace = Some("ci".to_string());
    iat.metadata.generation = Some(1);
    iat
}

/// The default private key Secret holding the test key under `privateKey`
pub fn key_secret() -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some("github-app-private-key".to_string()),
            namespace: Some("default".to_string()),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([(
            "privateKey".to_string(),
            ByteString(PRIVATE_KEY.as_bytes().to_vec()),
        )])),
        ..Secret::default()
    }
}

/// A store seeded with the key Secret, plus a reconciler over it
pub fn harness(exchanger: StubExchanger) -> (Arc<MemoryStore>, Arc<StubExchanger>, Reconciler) {
    let store = Arc::new(MemoryStore::default());
    store.insert_secret(key_secret());
    let exchanger = Arc::new(exchanger);
    let reconciler = Reconciler::new(
        Arc::clone(&store) as Arc<dyn ClusterStore>,
        Arc::clone(&exchanger) as Arc<dyn TokenExchanger>,
        ControllerConfig::default(),
    );
    (store, exchanger, reconciler)
}
