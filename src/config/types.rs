// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    pub storage: StorageConfig,
    pub model: ModelConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Seconds allowed for a client to send request headers
    pub header_read_timeout: u64,
    pub max_connections: Option<u64>,
    pub backlog: i32,
    /// Seconds to wait for in-flight requests before cancelling them on shutdown
    pub shutdown_grace_secs: u64,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// Routes configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RoutesConfig {
    /// Health check configuration
    #[serde(default)]
    pub health: HealthConfig,
}

/// Health check configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthConfig {
    /// Enable health check endpoints
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Liveness probe path (default: /healthz)
    #[serde(default = "default_healthz_path")]
    pub liveness_path: String,
    /// Readiness probe path (default: /readyz)
    #[serde(default = "default_readyz_path")]
    pub readiness_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_health_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_healthz_path() -> String {
    "/healthz".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_readyz_path() -> String {
    "/readyz".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            liveness_path: default_healthz_path(),
            readiness_path: default_readyz_path(),
        }
    }
}

/// Local filesystem layout for staged uploads and generated videos
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Directory receiving generated videos
    pub output_dir: String,
    /// Directory holding uploads while the model runs
    pub staging_dir: String,
    /// URL path under which `output_dir` is served by an external file server
    pub public_path: String,
    /// File name prefix of generated videos
    pub output_prefix: String,
}

/// Hosted video effects model
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    pub api_base: String,
    /// Falls back to `REPLICATE_API_TOKEN` when unset
    #[serde(default)]
    pub api_token: Option<String>,
    /// `owner/name:version` or `owner/name`
    pub model: String,
    pub poll_interval_ms: u64,
    /// Delegation deadline; unset means wait indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}
