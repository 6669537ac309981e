//! # Custom Resource Definitions
//!
//! CRD types for the Installation Token Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - InstallationAccessToken spec, key reference and scope
//! - `status.rs` - Status types: conditions, secret reference and token snapshot

mod spec;
mod status;

// Re-export all public types
pub use spec::{InstallationAccessToken, InstallationAccessTokenSpec, PrivateKeyRef, TokenScope};
pub use status::{
    Condition, ConditionStatus, ConditionType, InstallationAccessTokenStatus, SecretRef, TokenInfo,
};
