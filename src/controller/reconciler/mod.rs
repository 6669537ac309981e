//! # Reconciler
//!
//! Core reconciliation logic for `InstallationAccessToken` resources.
//!
//! ## Reconciliation Flow
//!
//! 1. Attach the cleanup finalizer on first sight
//! 2. Resolve the GitHub App private key from its Secret
//! 3. Sign an app JWT and exchange it for an installation access token
//! 4. Render and write the token Secret
//! 5. Record Token, Secret and Ready conditions in one status write
//!
//! On deletion the materialized Secret is removed before the finalizer is
//! released.

pub mod credentials;
pub mod deletion;
pub mod materialize;
pub mod reconcile;
pub mod status;
pub mod template;
pub mod types;

// Re-export public API
pub use reconcile::{reconcile, Phase};
pub use types::{ErrorKind, PipelineError, Reconciler, ReconcilerError, Requeue};
