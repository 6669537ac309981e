//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::*;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue interval after a successful issuance (seconds)
    /// Must be shorter than the 60 minute token lifetime so a retry window remains before expiry
    pub token_refresh_interval_secs: u64,
    /// Requeue interval after any failed pass (seconds)
    /// The same fixed delay is used for every failure kind
    pub failure_requeue_secs: u64,
    /// GitHub REST API base URL
    pub github_api_base_url: String,
    /// Timeout for a single GitHub API call (seconds)
    pub github_api_timeout_secs: u64,
    /// Lifetime of the app JWT (seconds)
    pub jwt_lifetime_secs: u64,
    /// Private key Secret name used when `spec.privateKeyRef.name` is empty
    pub default_private_key_secret_name: String,
    /// Private key Secret namespace used when `spec.privateKeyRef.namespace` is empty
    pub default_private_key_secret_namespace: String,
    /// Private key data field used when `spec.privateKeyRef.key` is empty
    pub default_private_key_secret_key: String,
    /// Maximum concurrent reconciliations
    /// Limits how many resources can be reconciled simultaneously
    pub max_concurrent_reconciliations: u16,
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Watch stream restart delay after the stream ends (seconds)
    pub watch_restart_delay_secs: u64,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            token_refresh_interval_secs: DEFAULT_TOKEN_REFRESH_INTERVAL_SECS,
            failure_requeue_secs: DEFAULT_FAILURE_REQUEUE_SECS,
            github_api_base_url: DEFAULT_GITHUB_API_BASE_URL.to_string(),
            github_api_timeout_secs: DEFAULT_GITHUB_API_TIMEOUT_SECS,
            jwt_lifetime_secs: DEFAULT_JWT_LIFETIME_SECS,
            default_private_key_secret_name: DEFAULT_PRIVATE_KEY_SECRET_NAME.to_string(),
            default_private_key_secret_namespace: DEFAULT_PRIVATE_KEY_SECRET_NAMESPACE.to_string(),
            default_private_key_secret_key: DEFAULT_PRIVATE_KEY_SECRET_KEY.to_string(),
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            watch_namespace: None,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let string = |key: &str, default: String| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        Self {
            token_refresh_interval_secs: parsed(
                "TOKEN_REFRESH_INTERVAL_SECS",
                defaults.token_refresh_interval_secs,
            ),
            failure_requeue_secs: parsed("FAILURE_REQUEUE_SECS", defaults.failure_requeue_secs),
            github_api_base_url: string("GITHUB_API_BASE_URL", defaults.github_api_base_url)
                .trim_end_matches('/')
                .to_string(),
            github_api_timeout_secs: parsed(
                "GITHUB_API_TIMEOUT_SECS",
                defaults.github_api_timeout_secs,
            ),
            jwt_lifetime_secs: parsed("JWT_LIFETIME_SECS", defaults.jwt_lifetime_secs),
            default_private_key_secret_name: string(
                "DEFAULT_PRIVATE_KEY_SECRET_NAME",
                defaults.default_private_key_secret_name,
            ),
            default_private_key_secret_namespace: string(
                "DEFAULT_PRIVATE_KEY_SECRET_NAMESPACE",
                defaults.default_private_key_secret_namespace,
            ),
            default_private_key_secret_key: string(
                "DEFAULT_PRIVATE_KEY_SECRET_KEY",
                defaults.default_private_key_secret_key,
            ),
            max_concurrent_reconciliations: lookup("MAX_CONCURRENT_RECONCILIATIONS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_concurrent_reconciliations),
            watch_namespace: lookup("WATCH_NAMESPACE")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            watch_restart_delay_secs: parsed(
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            log_format: string("LOG_FORMAT", defaults.log_format).to_lowercase(),
        }
    }

    /// Get the requeue delay after a successful issuance
    pub fn token_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.token_refresh_interval_secs)
    }

    /// Get the requeue delay after a failed pass
    pub fn failure_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.failure_requeue_secs)
    }

    /// Get the GitHub API call timeout
    pub fn github_api_timeout(&self) -> Duration {
        Duration::from_secs(self.github_api_timeout_secs)
    }

    /// Get the app JWT lifetime
    pub fn jwt_lifetime(&self) -> Duration {
        Duration::from_secs(self.jwt_lifetime_secs)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Whether a refresh happens before the issued token expires
    pub fn refresh_precedes_expiry(&self) -> bool {
        self.token_refresh_interval_secs < GITHUB_TOKEN_LIFETIME_SECS
    }
}
