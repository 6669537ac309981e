//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Name reported in the `app.kubernetes.io/managed-by` label and used as the field manager
pub const CONTROLLER_NAME: &str = "installation-token-controller";

/// Finalizer guarding cleanup of the materialized secret
pub const FINALIZER_NAME: &str = "github.octopilot.io/cleanup-secret";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default refresh interval for successfully issued tokens (seconds)
/// GitHub installation tokens live for 60 minutes; 50 minutes leaves a retry window before expiry
pub const DEFAULT_TOKEN_REFRESH_INTERVAL_SECS: u64 = 50 * 60;

/// Lifetime of a GitHub installation access token (seconds)
pub const GITHUB_TOKEN_LIFETIME_SECS: u64 = 60 * 60;

/// Requeue interval after any failed reconciliation pass (seconds)
pub const DEFAULT_FAILURE_REQUEUE_SECS: u64 = 10;

/// Default lifetime of the app JWT used to authenticate against GitHub (seconds)
pub const DEFAULT_JWT_LIFETIME_SECS: u64 = 10 * 60;

/// Default GitHub REST API base URL
pub const DEFAULT_GITHUB_API_BASE_URL: &str = "https://api.github.com";

/// Default timeout for a single call to the GitHub API (seconds)
pub const DEFAULT_GITHUB_API_TIMEOUT_SECS: u64 = 30;

/// Default Secret holding the GitHub App private key
pub const DEFAULT_PRIVATE_KEY_SECRET_NAME: &str = "github-app-private-key";

/// Default namespace of the GitHub App private key Secret
pub const DEFAULT_PRIVATE_KEY_SECRET_NAMESPACE: &str = "default";

/// Default data key of the PEM-encoded private key inside the key Secret
pub const DEFAULT_PRIVATE_KEY_SECRET_KEY: &str = "privateKey";

/// Data key the token is written under in the materialized Secret
pub const TOKEN_SECRET_KEY: &str = "token";

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default maximum concurrent reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Label marking the materialized Secret as managed by this controller
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Label linking the Secret back to its InstallationAccessToken (`<namespace>.<name>`)
pub const LABEL_SOURCE: &str = "github.octopilot.io/installation-access-token";

/// Annotation with the RFC3339 time of the last write
pub const ANNOTATION_LAST_UPDATED: &str = "github.octopilot.io/last-updated";

/// Annotation with the GitHub App ID
pub const ANNOTATION_APP_ID: &str = "github.octopilot.io/app-id";

/// Annotation with the installation ID
pub const ANNOTATION_INSTALLATION_ID: &str = "github.octopilot.io/installation-id";

/// Annotation with the namespace of the InstallationAccessToken
pub const ANNOTATION_SOURCE_NAMESPACE: &str = "github.octopilot.io/source-namespace";

/// Annotation with the name of the InstallationAccessToken
pub const ANNOTATION_SOURCE_NAME: &str = "github.octopilot.io/source-name";
