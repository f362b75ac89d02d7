//! Configuration management for EBMS services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use crate::domain::BoardId;
use chrono::NaiveDate;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Review workflow settings
    #[serde(default)]
    pub review: ReviewConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Activity event publishing
    #[serde(default)]
    pub activity: ActivityConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create tables and indexes on startup
    #[serde(default = "default_apply_schema")]
    pub apply_schema: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewConfig {
    /// Full text retrieved before this date never qualifies for FYI
    #[serde(default = "default_fyi_cutover")]
    pub fyi_cutover: NaiveDate,

    /// Page size for newly opened queues
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Page sizes a queue may be set to
    #[serde(default = "default_page_sizes")]
    pub page_sizes: Vec<usize>,

    /// Extra attempts for a pair that lost a compare-and-swap during commit
    #[serde(default = "default_commit_retries")]
    pub commit_retries: u32,

    /// Boards whose names are preloaded for display
    #[serde(default)]
    pub reference_boards: Vec<BoardId>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActivityConfig {
    /// SQS queue for activity events; events are only logged when unset
    pub queue_url: Option<String>,

    /// Maximum time spent retrying one publish, in seconds
    #[serde(default = "default_publish_retry")]
    pub max_retry_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Authorization header name
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 100 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_apply_schema() -> bool { true }
fn default_fyi_cutover() -> NaiveDate {
    NaiveDate::from_ymd_opt(2016, 2, 1).unwrap_or_default()
}
fn default_page_size() -> usize { 10 }
fn default_page_sizes() -> Vec<usize> { vec![10, 25, 50, 100] }
fn default_commit_retries() -> u32 { 1 }
fn default_publish_retry() -> u64 { 30 }
fn default_jwt_expiration() -> u64 { 3600 }
fn default_auth_header() -> String { "Authorization".to_string() }
fn default_request_id_header() -> String { "X-Request-ID".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "ebms-gateway".to_string() }

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            fyi_cutover: default_fyi_cutover(),
            default_page_size: default_page_size(),
            page_sizes: default_page_sizes(),
            commit_retries: default_commit_retries(),
            reference_boards: Vec::new(),
        }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            queue_url: None,
            max_retry_secs: default_publish_retry(),
        }
    }
}

impl ReviewConfig {
    pub fn is_allowed_page_size(&self, per_page: usize) -> bool {
        self.page_sizes.contains(&per_page)
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("auth.jwt_expiration_secs", 3600)?
            .set_default("observability.log_level", "info")?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__REVIEW__FYI_CUTOVER=2016-02-01
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
                max_concurrent_requests: default_max_concurrent(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/ebms".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                apply_schema: default_apply_schema(),
            },
            review: ReviewConfig::default(),
            auth: AuthConfig {
                jwt_secret: None,
                jwt_expiration_secs: default_jwt_expiration(),
                auth_header: default_auth_header(),
                request_id_header: default_request_id_header(),
            },
            activity: ActivityConfig::default(),
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.review.fyi_cutover,
            NaiveDate::from_ymd_opt(2016, 2, 1).unwrap()
        );
        assert_eq!(config.review.default_page_size, 10);
        assert_eq!(config.review.commit_retries, 1);
        assert!(config.activity.queue_url.is_none());
    }

    #[test]
    fn test_page_sizes() {
        let review = ReviewConfig::default();
        assert!(review.is_allowed_page_size(25));
        assert!(!review.is_allowed_page_size(20));
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/ebms");
    }

    #[test]
    fn test_review_section_is_optional() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "server": {},
            "database": {"url": "postgres://db/ebms"},
            "auth": {},
            "observability": {}
        }))
        .unwrap();
        assert_eq!(config.review.page_sizes, vec![10, 25, 50, 100]);
        assert_eq!(config.activity.max_retry_secs, 30);
    }
}
