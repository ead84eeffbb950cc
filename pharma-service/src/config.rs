//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `PHARMA_`, nested keys separated by `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/pharma-service/config.toml
//! 4. System directory: /etc/pharma-service/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "PHARMA_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// List endpoint paging limits
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Activity log queue configuration
    #[serde(default)]
    pub activity: ActivityConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error) or a full `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Maximum request body size in megabytes
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// CORS mode: "permissive", "restrictive" or "disabled"
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            body_limit_mb: default_body_limit_mb(),
            cors_mode: default_cors_mode(),
        }
    }
}

/// Paging limits applied to every list endpoint unless a resource overrides them
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Page size used when the client sends no `limit`
    #[serde(default = "default_page_limit")]
    pub default_limit: u32,

    /// Upper bound for a client supplied `limit`
    #[serde(default = "default_max_page_limit")]
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_page_limit(),
        }
    }
}

/// Activity log worker configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityConfig {
    /// Capacity of the bounded queue between handlers and the writer task
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long shutdown waits for queued entries to be written
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

impl ActivityConfig {
    /// Drain timeout as a [`Duration`]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_body_limit_mb() -> usize {
    10
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

fn default_page_limit() -> u32 {
    10
}

fn default_max_page_limit() -> u32 {
    100
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_drain_timeout() -> u64 {
    5
}

impl Config {
    /// Load configuration from the default locations and the environment
    pub fn load() -> Result<Self> {
        let config_paths = Self::find_config_paths();

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so later files override earlier ones
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Candidate config files, highest priority first
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix("pharma-service");
        if let Ok(path) = xdg_dirs.place_config_file("config.toml") {
            paths.push(path);
        }

        paths.push(PathBuf::from("/etc/pharma-service/config.toml"));
        paths
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }

    /// Request body limit in bytes
    pub fn body_limit_bytes(&self) -> usize {
        self.middleware.body_limit_mb * 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "pharma-service".to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: default_environment(),
            },
            middleware: MiddlewareConfig::default(),
            pagination: PaginationConfig::default(),
            activity: ActivityConfig::default(),
        }
    }
}
