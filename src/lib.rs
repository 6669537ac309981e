//! Installation Token Controller Library
//!
//! Core functionality of the Installation Token Controller: the
//! `InstallationAccessToken` CRD, the reconciler that issues GitHub App
//! installation tokens into Secrets, and the runtime wiring around it.
//!
//! ## Quick Start
//!
//! ```rust
//! use installation_token_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod github;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod store;
