//! # Configuration
//!
//! Controller-level configuration loaded from environment variables.
//!
//! - `controller`: reconciliation timing, GitHub API access and key defaults
//! - `server`: metrics/probe server settings

mod controller;
mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;
