//! # Installation Token Controller
//!
//! A Kubernetes controller that mints GitHub App installation access tokens
//! and keeps them refreshed in Secrets.
//!
//! ## Overview
//!
//! For every `InstallationAccessToken` resource the controller:
//!
//! 1. **Reads the app's private key** from a Kubernetes Secret
//! 2. **Signs an app JWT** and exchanges it for an installation access token
//! 3. **Writes the token to a Secret** with the resource's name and namespace,
//!    optionally shaped by a template
//! 4. **Refreshes the token** before the 60 minute expiry
//! 5. **Deletes the Secret** when the resource is deleted
//!
//! Configuration is read from environment variables, see `config::ControllerConfig`.

use anyhow::Result;
use installation_token_controller::runtime::{initialization, watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialization::initialize().await?;
    watch_loop::run_watch_loop(init.token_requests, init.ctx, init.server_state).await
}
