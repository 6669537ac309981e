//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, ServerConfig};
use crate::constants::GITHUB_TOKEN_LIFETIME_SECS;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{router, ServerState};
use crate::crd::InstallationAccessToken;
use crate::github::GitHubClient;
use crate::observability;
use crate::runtime::watch_loop::WatchContext;
use crate::store::KubeStore;
use anyhow::{Context, Result};
use kube::{api::Api, api::ListParams, Client};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Everything the watch loop needs
pub struct InitializationResult {
    /// API for InstallationAccessToken resources in the watched scope
    pub token_requests: Api<InstallationAccessToken>,
    /// Reconciler context shared with the driver
    pub ctx: Arc<WatchContext>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Install the tracing subscriber, JSON or plain text per `LOG_FORMAT`
fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "installation_token_controller=info".into());

    let result = if log_format == "text" {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before anything opens a TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    let controller_config = ControllerConfig::from_env();
    let server_config = ServerConfig::from_env();
    init_tracing(&controller_config.log_format);

    info!("Starting Installation Token Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    if !controller_config.refresh_precedes_expiry() {
        warn!(
            "TOKEN_REFRESH_INTERVAL_SECS={} is not shorter than the {}s token lifetime; tokens will expire before they are refreshed",
            controller_config.token_refresh_interval_secs, GITHUB_TOKEN_LIFETIME_SECS
        );
    }

    observability::register_metrics()?;

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
    });

    // Bind before spawning so a port clash fails startup instead of a background task
    let addr = format!("0.0.0.0:{}", server_config.metrics_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {addr}"))?;
    info!("HTTP server listening on {}", addr);
    let app = router(Arc::clone(&server_state));
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let token_requests: Api<InstallationAccessToken> = match &controller_config.watch_namespace {
        Some(namespace) => {
            info!("Watching InstallationAccessToken resources in namespace {}", namespace);
            Api::namespaced(client.clone(), namespace)
        }
        None => {
            info!("Watching InstallationAccessToken resources in all namespaces");
            Api::all(client.clone())
        }
    };
    check_crd_queryable(&token_requests).await;

    let github = GitHubClient::new(
        &controller_config.github_api_base_url,
        controller_config.github_api_timeout(),
    )
    .context("Failed to create GitHub API client")?;
    info!("Using GitHub API at {}", github.base_url());

    let reconciler = Reconciler::new(
        Arc::new(KubeStore::new(client)),
        Arc::new(github),
        controller_config,
    );

    server_state.is_ready.store(true, Ordering::Relaxed);
    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        token_requests,
        ctx: Arc::new(WatchContext::new(reconciler)),
        server_state,
    })
}

/// Log whether the CRD is installed; the watch retries on its own if it is not
async fn check_crd_queryable(token_requests: &Api<InstallationAccessToken>) {
    match token_requests.list(&ListParams::default().limit(1)).await {
        Ok(list) => {
            info!(
                "CRD is queryable, found {} InstallationAccessToken resource(s) in the first page",
                list.items.len()
            );
        }
        Err(e) => {
            error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
            error!("Installation: cargo run --bin crdgen | kubectl apply -f -");
            warn!("Continuing despite CRD queryability check failure - controller will retry");
        }
    }
}
