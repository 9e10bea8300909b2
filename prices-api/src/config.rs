//! Application settings and configuration

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use prices_worker::{DatabaseSettings, QueueConfig};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,
    /// Database configuration
    pub database: DatabaseSettings,
    /// Worker pool configuration
    #[serde(default)]
    pub queue: QueueConfig,
    /// Request-side wait configuration
    #[serde(default)]
    pub dispatcher: DispatcherSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path prefix for the endpoint, e.g. `/internal`
    #[serde(default)]
    pub route_prefix: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            route_prefix: String::new(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, SettingsError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| SettingsError::invalid("server.bind_address", "not a valid socket address"))
    }
}

/// How long a request waits for its background task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSettings {
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

fn default_wait_timeout_secs() -> u64 {
    10
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

impl DispatcherSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

/// Settings loading and validation errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SettingsError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_with_prefix("PRICE_API")
    }

    /// Load settings with a custom environment variable prefix
    ///
    /// Sources, later ones winning: `{dir}/default`, `{dir}/{RUN_MODE}`,
    /// `{dir}/local`, `{PREFIX}__SECTION__KEY` variables, `DATABASE_URL`.
    pub fn load_with_prefix(env_prefix: &str) -> Result<Self, SettingsError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = Self::config_dir();

        let mut builder = Config::builder()
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Get the configuration directory path
    fn config_dir() -> String {
        std::env::var("PRICE_API_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.database.url.trim().is_empty() {
            return Err(SettingsError::invalid("database.url", "must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(SettingsError::invalid(
                "database.max_connections",
                "must be greater than 0",
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(SettingsError::invalid(
                "database.min_connections",
                "must not exceed max_connections",
            ));
        }
        if self.queue.workers == 0 {
            return Err(SettingsError::invalid("queue.workers", "must be greater than 0"));
        }
        if self.queue.capacity == 0 {
            return Err(SettingsError::invalid("queue.capacity", "must be greater than 0"));
        }
        if self.dispatcher.wait_timeout_secs == 0 {
            return Err(SettingsError::invalid(
                "dispatcher.wait_timeout_secs",
                "must be greater than 0",
            ));
        }
        if !self.server.route_prefix.is_empty() && !self.server.route_prefix.starts_with('/') {
            return Err(SettingsError::invalid(
                "server.route_prefix",
                "must start with '/'",
            ));
        }
        self.server.socket_addr()?;
        Ok(())
    }

    /// Create default settings (useful for testing)
    pub fn default_settings() -> Self {
        Settings {
            database: DatabaseSettings::new(
                std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/prices".into()),
            ),
            server: ServerSettings::default(),
            queue: QueueConfig::default(),
            dispatcher: DispatcherSettings::default(),
        }
    }
}
