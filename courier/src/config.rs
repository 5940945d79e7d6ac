//! Service configuration.
//!
//! Loaded from a TOML file resolved in precedence order:
//! 1. `COURIER_CONFIG` environment variable
//! 2. ./courier.config.toml (current working directory)
//! 3. /etc/courier/courier.config.toml (system-wide config)
//!
//! Every section and field is optional; a missing file runs the service on
//! defaults (in-memory store, local listener).

use std::path::PathBuf;

use courier_routing::{CircuitBreakerConfig, RoutingPolicy};
use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub store: StoreConfig,
    pub routing: RoutingPolicy,
    pub breaker: CircuitBreakerConfig,
    pub providers: ProvidersConfig,
    pub server: ServerConfig,
}

/// Shared routing state backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis connection URL. When absent, routing state lives in process
    /// memory and is lost on restart.
    pub redis_url: Option<String>,

    /// Latency samples retained per provider for the median prediction.
    pub latency_history_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            latency_history_size: defaults::latency_history_size(),
        }
    }
}

/// Provider adapter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Sender address used when a request carries none.
    pub default_from: String,

    pub sendgrid: SendGridConfig,
    pub ses: SesConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_from: defaults::default_from(),
            sendgrid: SendGridConfig::default(),
            ses: SesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SendGridConfig {
    /// Environment variable holding the API key. The key itself never lives
    /// in the config file.
    pub api_key_env: String,
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            api_key_env: defaults::sendgrid_api_key_env(),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SesConfig {
    /// AWS region override. When absent, the ambient AWS environment
    /// decides.
    pub region: Option<String>,
}

/// HTTP ingress settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,

    /// Bounded depth of the in-process delivery queue.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: defaults::listen_address(),
            queue_capacity: defaults::queue_capacity(),
        }
    }
}

mod defaults {
    pub const fn latency_history_size() -> usize {
        10
    }

    pub fn default_from() -> String {
        "noreply@localhost".to_string()
    }

    pub fn sendgrid_api_key_env() -> String {
        "SENDGRID_API_KEY".to_string()
    }

    pub fn listen_address() -> String {
        "127.0.0.1:8080".to_string()
    }

    pub const fn queue_capacity() -> usize {
        1024
    }
}

impl CourierConfig {
    /// Load configuration from the first file found in precedence order,
    /// falling back to defaults when none exists.
    pub fn load() -> anyhow::Result<Self> {
        let Some(path) = find_config_file()? else {
            tracing::info!("no configuration file found, using defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path).map_err(|error| {
            anyhow::anyhow!("failed to read config from {}: {error}", path.display())
        })?;
        let config = toml::from_str(&content).map_err(|error| {
            anyhow::anyhow!("invalid config at {}: {error}", path.display())
        })?;

        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

fn find_config_file() -> anyhow::Result<Option<PathBuf>> {
    if let Ok(env_path) = std::env::var("COURIER_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!("COURIER_CONFIG points to non-existent file: {}", path.display());
    }

    let default_paths = [
        PathBuf::from("./courier.config.toml"),
        PathBuf::from("/etc/courier/courier.config.toml"),
    ];

    Ok(default_paths.into_iter().find(|path| path.exists()))
}
