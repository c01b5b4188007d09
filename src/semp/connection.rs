//! Broker connection settings
//!
//! A [`BrokerConnection`] is built once per invocation and shared by
//! reference with the request executor and both engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default per-request timeout against a broker
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-request timeout against the cloud management API
pub const DEFAULT_CLOUD_TIMEOUT: Duration = Duration::from_secs(60);

/// Path prefix of the SEMP v2 API on a broker
pub const SEMP_BASE_PATH: &str = "/SEMP/v2";

/// Path prefix of the cloud management API
pub const CLOUD_BASE_PATH: &str = "/api/v0";

/// Host of the cloud management API
pub const CLOUD_API_HOST: &str = "api.solace.cloud";

/// Which administrative API the connection targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// SEMP v2 served directly by the broker
    #[default]
    Broker,
    /// Cloud-hosted broker management API
    Cloud,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Broker => write!(f, "broker"),
            Backend::Cloud => write!(f, "cloud"),
        }
    }
}

/// API surface of a SEMP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiSurface {
    /// Authoritative, mutable configuration
    #[default]
    Config,
    /// Read-only runtime state
    Monitor,
}

impl ApiSurface {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiSurface::Config => "config",
            ApiSurface::Monitor => "monitor",
        }
    }
}

impl fmt::Display for ApiSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication material
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer { token: String },
}

// Security: never print secrets, even in debug logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}

/// Everything needed to reach one broker (or the cloud API)
#[derive(Debug, Clone)]
pub struct BrokerConnection {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub backend: Backend,
    /// Forwarded as `x-broker-name` so a reverse proxy can route the request
    pub broker_name: Option<String>,
    /// Replaces the backend's default path prefix
    pub base_path: Option<String>,
}

impl BrokerConnection {
    /// Connection to a broker's SEMP v2 API with basic authentication
    pub fn broker(host: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            secure: false,
            credentials: Credentials::Basic {
                username: username.to_string(),
                password: password.to_string(),
            },
            timeout: DEFAULT_TIMEOUT,
            backend: Backend::Broker,
            broker_name: None,
            base_path: None,
        }
    }

    /// Connection to the cloud management API with a bearer token
    pub fn cloud(api_token: &str) -> Self {
        Self {
            host: CLOUD_API_HOST.to_string(),
            port: 443,
            secure: true,
            credentials: Credentials::Bearer {
                token: api_token.to_string(),
            },
            timeout: DEFAULT_CLOUD_TIMEOUT,
            backend: Backend::Cloud,
            broker_name: None,
            base_path: None,
        }
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_host(mut self, host: &str, port: u16) -> Self {
        self.host = host.to_string();
        self.port = port;
        self
    }

    pub fn with_broker_name(mut self, broker_name: Option<String>) -> Self {
        self.broker_name = broker_name.filter(|n| !n.is_empty());
        self
    }

    pub fn with_base_path(mut self, base_path: Option<String>) -> Self {
        self.base_path = base_path.map(|p| p.trim_end_matches('/').to_string());
        self
    }

    /// `scheme://host:port`
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Path prefix for the given API surface.
    ///
    /// The cloud API has a single surface, so `surface` only matters for
    /// the broker backend.
    pub fn api_prefix(&self, surface: ApiSurface) -> String {
        match self.backend {
            Backend::Broker => {
                let base = self.base_path.as_deref().unwrap_or(SEMP_BASE_PATH);
                format!("{}/{}", base, surface)
            }
            Backend::Cloud => self
                .base_path
                .clone()
                .unwrap_or_else(|| CLOUD_BASE_PATH.to_string()),
        }
    }
}
