// Configuration module entry point
// Loads layered configuration and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;
use std::time::Duration;

// Re-export public types
pub use state::AppState;
pub use types::{Config, ModelConfig, StorageConfig};

/// Replicate reference of the dotted video model
pub const DEFAULT_MODEL: &str =
    "lucataco/dotted-video:ea6107f7dc327e05d64eb42241250261af417d41d00c6399b06b0d62cd3c1a2a";

impl Config {
    /// Load configuration from specified file path (extension optional)
    ///
    /// Sources, lowest priority first: defaults, the file, `DOTTED__SECTION__KEY`
    /// environment variables.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("DOTTED").separator("__"))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.header_read_timeout", 30)?
            .set_default("performance.backlog", 128)?
            .set_default("performance.shutdown_grace_secs", 30)?
            .set_default("http.server_name", "dotted-relay/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 104_857_600)? // 100MB
            .set_default("storage.output_dir", "uploads/videos")?
            .set_default("storage.staging_dir", "uploads/tmp")?
            .set_default("storage.public_path", "/uploads/videos")?
            .set_default("storage.output_prefix", "dotted_")?
            .set_default("model.api_base", "https://api.replicate.com/v1")?
            .set_default("model.model", DEFAULT_MODEL)?
            .set_default("model.poll_interval_ms", 1000)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

impl ModelConfig {
    /// Explicit token, else `REPLICATE_API_TOKEN` from the environment
    pub fn resolve_token(&self) -> Option<String> {
        self.api_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("REPLICATE_API_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Zero is treated as "no deadline"
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
