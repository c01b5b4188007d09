//! Configuration Management
//!
//! Handles persistent configuration storage for sempctl. Secrets are never
//! written to disk; passwords and API tokens come from flags or the
//! environment only.

use crate::object::DEFAULT_MAX_PAGES;
use crate::semp::{Backend, BrokerConnection};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Value of the `x-broker-name` routing header
    #[serde(default)]
    pub broker_name: Option<String>,
    #[serde(default)]
    pub backend: Option<Backend>,
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub base_path: Option<String>,
}

/// Connection values given on the command line or via the environment.
///
/// Anything set here wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secure: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub broker_name: Option<String>,
    pub backend: Option<Backend>,
    pub base_path: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sempctl").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective page limit (config > default)
    pub fn effective_max_pages(&self) -> usize {
        self.max_pages.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_PAGES)
    }

    /// Build the connection (CLI/env > config > default)
    pub fn connection(&self, overrides: &ConnectionOverrides) -> Result<BrokerConnection> {
        let backend = overrides.backend.or(self.backend).unwrap_or_default();

        let mut connection = match backend {
            Backend::Broker => {
                let host = overrides
                    .host
                    .clone()
                    .or_else(|| self.host.clone())
                    .unwrap_or_else(|| DEFAULT_HOST.to_string());
                let port = overrides.port.or(self.port).unwrap_or(DEFAULT_PORT);
                let username = overrides
                    .username
                    .clone()
                    .or_else(|| self.username.clone())
                    .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
                let password = overrides
                    .password
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PASSWORD.to_string());
                BrokerConnection::broker(&host, port, &username, &password)
                    .with_secure(overrides.secure.or(self.secure).unwrap_or(false))
            }
            Backend::Cloud => {
                let Some(token) = overrides.api_token.as_deref().filter(|t| !t.is_empty()) else {
                    bail!(
                        "the cloud backend requires an API token (--api-token or SEMPCTL_API_TOKEN)"
                    );
                };
                let mut connection = BrokerConnection::cloud(token);
                if let Some(host) = overrides.host.clone().or_else(|| self.host.clone()) {
                    let port = overrides.port.or(self.port).unwrap_or(connection.port);
                    connection = connection.with_host(&host, port);
                }
                if let Some(secure) = overrides.secure.or(self.secure) {
                    connection = connection.with_secure(secure);
                }
                connection
            }
        };

        if let Some(secs) = overrides.timeout_secs.or(self.timeout_secs) {
            connection = connection.with_timeout(Duration::from_secs(secs));
        }

        Ok(connection
            .with_broker_name(overrides.broker_name.clone().or_else(|| self.broker_name.clone()))
            .with_base_path(overrides.base_path.clone().or_else(|| self.base_path.clone())))
    }
}
