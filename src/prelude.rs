//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use installation_token_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, ErrorKind, Phase, PipelineError, Reconciler, ReconcilerError, Requeue,
};

// Collaborator seams
pub use crate::github::{AccessToken, ExchangeError, GitHubClient, TokenExchanger};
pub use crate::store::{ClusterStore, KubeStore, ObjectKey, StoreError};

// Config types
pub use crate::config::{ControllerConfig, ServerConfig};
