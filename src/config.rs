use serde::{Deserialize, Serialize};
use tracing::{info, error};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origin for the frontend
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Database URL
    pub db_url: Option<String>,

    /// Clip lifetime in seconds, counted from creation. Never extended.
    #[serde(default = "default_clip_ttl_seconds")]
    pub clip_ttl_seconds: u64,

    /// Quiet period before an edit burst is persisted
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How often the expired-row sweeper runs
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,

    /// Maximum clip content size in bytes
    #[serde(default = "default_max_clip_bytes")]
    pub max_clip_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        // Load from environment variables using envy
        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn clip_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.clip_ttl_seconds)
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }

    /// Origin used when building shareable clip URLs
    pub fn frontend_base(&self) -> &str {
        self.cors_origins.as_deref().unwrap_or("http://localhost:5173")
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            db_url: None,
            clip_ttl_seconds: default_clip_ttl_seconds(),
            debounce_ms: default_debounce_ms(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            max_clip_bytes: default_max_clip_bytes(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_clip_ttl_seconds() -> u64 {
    900
}

fn default_debounce_ms() -> u64 {
    1500
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

fn default_max_clip_bytes() -> usize {
    100 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_product_limits() {
        let config = Config::default();
        assert_eq!(config.clip_ttl_seconds, 900);
        assert_eq!(config.debounce_ms, 1500);
        assert_eq!(config.max_clip_bytes, 102_400);
    }
}
