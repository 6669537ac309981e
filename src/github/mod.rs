//! # GitHub
//!
//! GitHub App authentication primitives.
//!
//! - `jwt.rs` - RS256 app assertions signed with the app's private key
//! - `client.rs` - Installation access token exchange over the REST API

mod client;
mod jwt;

pub use client::{AccessToken, ExchangeError, GitHubClient, Repository, TokenExchanger};
pub use jwt::{issue_app_jwt, AppPrivateKey, SigningError};
