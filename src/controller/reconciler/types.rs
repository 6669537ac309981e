//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::reconciler::credentials::CredentialError;
use crate::controller::reconciler::materialize::MaterializationError;
use crate::github::{ExchangeError, SigningError, TokenExchanger};
use crate::store::{ClusterStore, ObjectKey, StoreError};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error returned to the driver; only raised when the resource cannot be read
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to read InstallationAccessToken {key}: {source}")]
    Read {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
}

/// Classification of a failed pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Signing,
    Exchange,
    Materialization,
    Persistence,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Signing => "signing",
            ErrorKind::Exchange => "exchange",
            ErrorKind::Materialization => "materialization",
            ErrorKind::Persistence => "persistence",
        }
    }
}

/// Failure of one stage of the issuance pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] CredentialError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Materialization(#[from] MaterializationError),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl PipelineError {
    /// Reason code recorded on the Token/Secret conditions
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "InvalidConfiguration",
            PipelineError::Signing(_) => "JWTGenerationError",
            PipelineError::Exchange(_) => "TokenCreationError",
            PipelineError::Materialization(_) | PipelineError::Persistence(_) => {
                "SecretUpdateError"
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration(_) => ErrorKind::Configuration,
            PipelineError::Signing(_) => ErrorKind::Signing,
            PipelineError::Exchange(_) => ErrorKind::Exchange,
            PipelineError::Materialization(_) => ErrorKind::Materialization,
            PipelineError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

/// When the driver should invoke the reconciler again for an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    After(Duration),
    Never,
}

impl Requeue {
    /// Requeue immediately
    #[must_use]
    pub fn now() -> Self {
        Requeue::After(Duration::ZERO)
    }
}

impl From<Requeue> for Action {
    fn from(requeue: Requeue) -> Self {
        match requeue {
            Requeue::After(delay) => Action::requeue(delay),
            Requeue::Never => Action::await_change(),
        }
    }
}

/// Shared state handed to every reconciliation
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ClusterStore>,
    pub exchanger: Arc<dyn TokenExchanger>,
    pub config: Arc<ControllerConfig>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        exchanger: Arc<dyn TokenExchanger>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            exchanger,
            config: Arc::new(config),
        }
    }
}
