// src/config.rs

//! Application configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the service.
//! Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
///
/// Missing configuration is treated as a deployment error,
/// not a recoverable runtime condition.
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .map_err(|_| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used. This macro is appropriate for non-critical
/// tuning parameters where fallback behavior is acceptable.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

/// Reads an optional string environment variable with a default.
macro_rules! optional_env {
    // ---
    ($key:literal, $default:expr) => {
        std::env::var($key).unwrap_or_else(|_| $default.to_string())
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
///
/// This macro is intended for config unit tests only and enforces
/// consistent error messages across failure cases.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Aggregated application configuration.
///
/// This is the single source of truth for startup configuration.
/// All required configuration is validated eagerly during initialization.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: server::ServerConfig,
    pub storage: storage::StorageConfig,
    pub session: session::SessionConfig,
    pub webauthn: webauthn::WebAuthnConfig,
    pub lifetimes: lifetimes::LifetimeConfig,
    pub oauth: oauth::OAuthConfig,
    pub metrics: metrics::MetricsConfig,
}

impl AppConfig {
    /// Loads and validates all application configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    /// This function is intended to be called exactly once at startup.
    pub fn from_env() -> Result<Self> {
        // ---
        Ok(Self {
            server: server::ServerConfig::from_env()?,
            storage: storage::StorageConfig::from_env()?,
            session: session::SessionConfig::from_env()?,
            webauthn: webauthn::WebAuthnConfig::from_env()?,
            lifetimes: lifetimes::LifetimeConfig::from_env(),
            oauth: oauth::OAuthConfig::from_env()?,
            metrics: metrics::MetricsConfig::from_env()?,
        })
    }
}

// ============================================================
// Server configuration
// ============================================================

mod server {
    // ---
    use super::*;
    use std::net::SocketAddr;

    #[derive(Debug, Clone)]
    pub struct ServerConfig {
        /// Listen address. Defaults to 127.0.0.1:8443.
        pub bind_addr: SocketAddr,
    }

    impl ServerConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let raw = optional_env!("AUTH_BIND_ADDR", "127.0.0.1:8443");
            let bind_addr: SocketAddr = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid AUTH_BIND_ADDR {raw:?}: {e}"))?;

            Ok(Self { bind_addr })
        }
    }
}
pub use server::ServerConfig;

// ============================================================
// User storage configuration
// ============================================================

mod storage {
    // ---
    use super::*;
    use crate::infrastructure::storage::S3Settings;
    use std::path::PathBuf;
    use std::str::FromStr;

    /// Which backend holds user records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum UserStorageMode {
        Filesystem,
        S3,
        Memory,
    }

    impl FromStr for UserStorageMode {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> Result<Self> {
            // ---
            match s.to_ascii_lowercase().as_str() {
                "filesystem" | "fs" => Ok(Self::Filesystem),
                "s3" => Ok(Self::S3),
                "memory" => Ok(Self::Memory),
                other => anyhow::bail!("Invalid AUTH_STORAGE_MODE: {other:?}"),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct StorageConfig {
        pub mode: UserStorageMode,

        /// Root of the filesystem backend. Defaults to `./data`.
        pub data_path: PathBuf,

        /// Only consulted when `mode` is `S3`.
        pub s3: S3Settings,
    }

    impl StorageConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let mode: UserStorageMode = optional_env!("AUTH_STORAGE_MODE", "filesystem").parse()?;
            let data_path = PathBuf::from(optional_env!("AUTH_DATA_PATH", "./data"));

            let s3 = S3Settings {
                endpoint: optional_env!("AUTH_S3_ENDPOINT", "http://localhost:9000"),
                bucket: optional_env!("AUTH_S3_BUCKET", "passkey-auth"),
                access_key: optional_env!("AUTH_S3_ACCESS_KEY", "minioadmin"),
                secret_key: optional_env!("AUTH_S3_SECRET_KEY", "minioadmin"),
                region: optional_env!("AUTH_S3_REGION", "us-east-1"),
                use_ssl: optional_env_parse!("AUTH_S3_USE_SSL", bool, false),
            };

            Ok(Self {
                mode,
                data_path,
                s3,
            })
        }
    }
}
pub use storage::{StorageConfig, UserStorageMode};

// ============================================================
// Session storage configuration
// ============================================================

mod session {
    // ---
    use super::*;
    use std::str::FromStr;

    /// Which backend holds ceremonies, sessions and authorization codes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SessionStorageMode {
        Memory,
        Redis,
    }

    impl FromStr for SessionStorageMode {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> Result<Self> {
            // ---
            match s.to_ascii_lowercase().as_str() {
                "memory" => Ok(Self::Memory),
                "redis" => Ok(Self::Redis),
                other => anyhow::bail!("Invalid AUTH_SESSION_MODE: {other:?}"),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct SessionConfig {
        pub mode: SessionStorageMode,

        /// Redis connection string, used when `mode` is `Redis`.
        pub redis_url: String,

        /// Period of the in-memory expiry sweep. Defaults to 5 minutes.
        pub sweep_interval: Duration,
    }

    impl SessionConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let mode: SessionStorageMode = optional_env!("AUTH_SESSION_MODE", "memory").parse()?;
            let redis_url = optional_env!("AUTH_REDIS_URL", "redis://127.0.0.1:6379");
            let sweep_secs = optional_env_parse!("AUTH_SWEEP_INTERVAL_SEC", u64, 300);

            Ok(Self {
                mode,
                redis_url,
                sweep_interval: Duration::from_secs(sweep_secs.max(1)),
            })
        }
    }
}
pub use session::{SessionConfig, SessionStorageMode};

// ============================================================
// WebAuthn configuration
// ============================================================

mod webauthn {
    // ---
    use super::*;

    /// WebAuthn / Passkeys configuration.
    ///
    /// These values define the relying party identity and security
    /// origin used during WebAuthn registration and authentication.
    #[derive(Debug, Clone)]
    pub struct WebAuthnConfig {
        /// Relying Party ID (typically a domain name).
        pub rp_id: String,

        /// Human-readable Relying Party name.
        pub rp_name: String,

        /// Fully-qualified origin (e.g. https://example.com).
        pub origin: String,
    }

    impl WebAuthnConfig {
        /// Builds a [`WebAuthnConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        /// WebAuthn configuration is considered security-critical
        /// and must be explicitly provided.
        pub fn from_env() -> Result<Self> {
            // ---
            let rp_id = required_env!("AUTH_WEBAUTHN_RP_ID");
            let origin = required_env!("AUTH_WEBAUTHN_ORIGIN");

            let rp_name = optional_env!("AUTH_WEBAUTHN_RP_NAME", "Passkey Authentication Service");

            Ok(Self {
                rp_id,
                rp_name,
                origin,
            })
        }
    }
}
pub use webauthn::WebAuthnConfig;

// ============================================================
// Record lifetimes
// ============================================================

mod lifetimes {
    // ---
    use super::*;

    #[derive(Debug, Clone)]
    pub struct LifetimeConfig {
        /// Registration and login challenges. Defaults to 5 minutes.
        pub ceremony_ttl: Duration,

        /// Authenticated sessions. Defaults to 24 hours.
        pub session_ttl: Duration,

        /// Authorization requests and codes. Defaults to 10 minutes.
        pub code_ttl: Duration,
    }

    impl Default for LifetimeConfig {
        fn default() -> Self {
            // ---
            Self {
                ceremony_ttl: Duration::from_secs(300),
                session_ttl: Duration::from_secs(86_400),
                code_ttl: Duration::from_secs(600),
            }
        }
    }

    impl LifetimeConfig {
        pub fn from_env() -> Self {
            // ---
            Self {
                ceremony_ttl: Duration::from_secs(optional_env_parse!(
                    "AUTH_CEREMONY_TTL_SEC",
                    u64,
                    300
                )),
                session_ttl: Duration::from_secs(optional_env_parse!(
                    "AUTH_SESSION_TTL_SEC",
                    u64,
                    86_400
                )),
                code_ttl: Duration::from_secs(optional_env_parse!("AUTH_CODE_TTL_SEC", u64, 600)),
            }
        }
    }
}
pub use lifetimes::LifetimeConfig;

// ============================================================
// OAuth client registry
// ============================================================

mod oauth {
    // ---
    use super::*;
    use crate::domain::{Client, ClientRegistry};
    use anyhow::Context;
    use serde::Deserialize;
    use std::path::Path;

    #[derive(Debug, Clone)]
    pub struct OAuthConfig {
        /// Registered clients, loaded once and never mutated afterwards.
        pub clients: ClientRegistry,
    }

    #[derive(Deserialize)]
    struct ClientsFile {
        #[serde(default)]
        clients: Vec<ClientEntry>,
    }

    #[derive(Deserialize)]
    struct ClientEntry {
        id: Option<String>,
        name: Option<String>,
        redirect_uris: Option<Vec<String>>,
    }

    impl OAuthConfig {
        /// Loads `AUTH_OAUTH_CLIENTS_FILE` if set; otherwise uses the
        /// built-in development clients.
        pub fn from_env() -> Result<Self> {
            // ---
            let clients = match std::env::var("AUTH_OAUTH_CLIENTS_FILE") {
                Ok(path) => load_clients(Path::new(&path))?,
                Err(_) => ClientRegistry::with_defaults(),
            };
            Ok(Self { clients })
        }
    }

    /// Parses a `{"clients": [...]}` document into a registry.
    pub fn parse_clients(json: &str) -> Result<ClientRegistry> {
        // ---
        let file: ClientsFile = serde_json::from_str(json).context("Invalid client registry")?;
        let mut clients = Vec::with_capacity(file.clients.len());

        for (index, entry) in file.clients.into_iter().enumerate() {
            let id = entry
                .id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| anyhow::anyhow!("Client #{index} is missing an id"))?;

            let redirect_uris = entry
                .redirect_uris
                .filter(|uris| !uris.is_empty())
                .ok_or_else(|| anyhow::anyhow!("Client {id:?} has no redirect_uris"))?;

            let mut client = Client::new(&id, entry.name.as_deref().unwrap_or(&id), &[]);
            client.redirect_uris = redirect_uris;
            clients.push(client);
        }

        Ok(ClientRegistry::new(clients))
    }

    pub fn load_clients(path: &Path) -> Result<ClientRegistry> {
        // ---
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read client registry {}", path.display()))?;
        let registry = parse_clients(&json)?;

        tracing::info!("Loaded {} OAuth clients from {}", registry.len(), path.display());
        Ok(registry)
    }
}
pub use oauth::{load_clients, parse_clients, OAuthConfig};

// ============================================================
// Metrics configuration
// ============================================================

mod metrics {
    // ---
    use super::*;
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MetricsType {
        Prometheus,
        Noop,
    }

    impl FromStr for MetricsType {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> Result<Self> {
            // ---
            match s.to_ascii_lowercase().as_str() {
                "prom" | "prometheus" => Ok(Self::Prometheus),
                "noop" => Ok(Self::Noop),
                other => anyhow::bail!("Invalid AUTH_METRICS_TYPE: {other:?}"),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct MetricsConfig {
        pub metrics_type: MetricsType,
    }

    impl MetricsConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let metrics_type: MetricsType = optional_env!("AUTH_METRICS_TYPE", "noop").parse()?;
            Ok(Self { metrics_type })
        }
    }
}
pub use metrics::{MetricsConfig, MetricsType};

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use anyhow::Result;
    use serial_test::serial;
    use std::io::Write;

    const OPTIONAL_KEYS: &[&str] = &[
        "AUTH_BIND_ADDR",
        "AUTH_STORAGE_MODE",
        "AUTH_DATA_PATH",
        "AUTH_S3_ENDPOINT",
        "AUTH_S3_USE_SSL",
        "AUTH_SESSION_MODE",
        "AUTH_REDIS_URL",
        "AUTH_SWEEP_INTERVAL_SEC",
        "AUTH_CEREMONY_TTL_SEC",
        "AUTH_SESSION_TTL_SEC",
        "AUTH_CODE_TTL_SEC",
        "AUTH_OAUTH_CLIENTS_FILE",
        "AUTH_METRICS_TYPE",
        "AUTH_WEBAUTHN_RP_NAME",
    ];

    fn clear_optional() {
        // ---
        for key in OPTIONAL_KEYS {
            std::env::remove_var(key);
        }
    }

    fn set_required() {
        // ---
        std::env::set_var("AUTH_WEBAUTHN_RP_ID", "example.com");
        std::env::set_var("AUTH_WEBAUTHN_ORIGIN", "https://example.com");
    }

    #[test]
    #[serial]
    fn missing_rp_id_fails() -> Result<()> {
        // ---
        std::env::remove_var("AUTH_WEBAUTHN_RP_ID");
        std::env::set_var("AUTH_WEBAUTHN_ORIGIN", "https://example.com");

        assert_missing_config!(WebAuthnConfig::from_env(), "AUTH_WEBAUTHN_RP_ID");

        Ok(())
    }

    #[test]
    #[serial]
    fn missing_origin_fails() -> Result<()> {
        // ---
        clear_optional();
        std::env::set_var("AUTH_WEBAUTHN_RP_ID", "example.com");
        std::env::remove_var("AUTH_WEBAUTHN_ORIGIN");

        assert_missing_config!(AppConfig::from_env(), "AUTH_WEBAUTHN_ORIGIN");

        Ok(())
    }

    #[test]
    #[serial]
    fn app_config_defaults_applied() -> Result<()> {
        // ---
        clear_optional();
        set_required();

        let cfg = AppConfig::from_env()?;
        assert_eq!(cfg.server.bind_addr.to_string(), "127.0.0.1:8443");
        assert_eq!(cfg.webauthn.rp_name, "Passkey Authentication Service");
        assert_eq!(cfg.storage.mode, UserStorageMode::Filesystem);
        assert_eq!(cfg.storage.data_path.to_str(), Some("./data"));
        assert_eq!(cfg.storage.s3.bucket, "passkey-auth");
        assert!(!cfg.storage.s3.use_ssl);
        assert_eq!(cfg.session.mode, SessionStorageMode::Memory);
        assert_eq!(cfg.session.sweep_interval.as_secs(), 300);
        assert_eq!(cfg.lifetimes.ceremony_ttl.as_secs(), 300);
        assert_eq!(cfg.lifetimes.session_ttl.as_secs(), 86_400);
        assert_eq!(cfg.lifetimes.code_ttl.as_secs(), 600);
        assert_eq!(cfg.metrics.metrics_type, MetricsType::Noop);
        assert!(cfg.oauth.clients.get("demo-app").is_some());
        assert!(cfg.oauth.clients.get("test-app").is_some());

        Ok(())
    }

    #[test]
    #[serial]
    fn overrides_defaults() -> Result<()> {
        // ---
        clear_optional();
        set_required();
        std::env::set_var("AUTH_BIND_ADDR", "0.0.0.0:9000");
        std::env::set_var("AUTH_STORAGE_MODE", "s3");
        std::env::set_var("AUTH_S3_USE_SSL", "true");
        std::env::set_var("AUTH_SESSION_MODE", "redis");
        std::env::set_var("AUTH_SESSION_TTL_SEC", "60");
        std::env::set_var("AUTH_METRICS_TYPE", "prom");

        let cfg = AppConfig::from_env()?;
        assert_eq!(cfg.server.bind_addr.port(), 9000);
        assert_eq!(cfg.storage.mode, UserStorageMode::S3);
        assert!(cfg.storage.s3.use_ssl);
        assert_eq!(cfg.session.mode, SessionStorageMode::Redis);
        assert_eq!(cfg.lifetimes.session_ttl.as_secs(), 60);
        assert_eq!(cfg.metrics.metrics_type, MetricsType::Prometheus);

        clear_optional();
        Ok(())
    }

    #[test]
    #[serial]
    fn unknown_storage_mode_fails() {
        // ---
        clear_optional();
        set_required();
        std::env::set_var("AUTH_STORAGE_MODE", "floppy");

        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("AUTH_STORAGE_MODE"));

        clear_optional();
    }

    #[test]
    #[serial]
    fn clients_file_is_loaded() -> Result<()> {
        // ---
        clear_optional();
        set_required();
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{"clients":[{{"id":"wiki","redirect_uris":["https://wiki.example/cb"]}}]}}"#
        )?;
        std::env::set_var("AUTH_OAUTH_CLIENTS_FILE", file.path());

        let cfg = AppConfig::from_env()?;
        let wiki = cfg.oauth.clients.get("wiki").unwrap();
        assert_eq!(wiki.name, "wiki");
        assert!(wiki.allows_redirect("https://wiki.example/cb"));
        assert!(cfg.oauth.clients.get("demo-app").is_none());

        clear_optional();
        Ok(())
    }

    #[test]
    fn client_without_redirect_uris_is_rejected() {
        // ---
        let err = parse_clients(r#"{"clients":[{"id":"bare","redirect_uris":[]}]}"#).unwrap_err();
        assert!(err.to_string().contains("redirect_uris"));

        let err = parse_clients(r#"{"clients":[{"name":"anonymous"}]}"#).unwrap_err();
        assert!(err.to_string().contains("missing an id"));
    }
}
