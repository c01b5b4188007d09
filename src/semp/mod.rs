//! SEMP API interaction module
//!
//! This module provides the transport layer for talking to a broker's
//! administrative REST API (SEMP v2) or to the cloud management API.
//!
//! # Module Structure
//!
//! - [`connection`] - Connection settings (host, credentials, backend flavor)
//! - [`error`] - Classification of failed requests
//! - [`http`] - The request executor
//! - [`about`] - Broker metadata queries
//!
//! # Example
//!
//! ```ignore
//! use sempctl::semp::{ApiSurface, BrokerConnection, SempClient};
//!
//! async fn example() -> Result<(), sempctl::semp::ApiError> {
//!     let connection = BrokerConnection::broker("localhost", 8080, "admin", "admin");
//!     let client = SempClient::new(&connection)?;
//!     let vpns = client.get(ApiSurface::Config, &["msgVpns".to_string()]).await?;
//!     Ok(())
//! }
//! ```

pub mod about;
pub mod connection;
pub mod error;
pub mod http;

pub use connection::{ApiSurface, Backend, BrokerConnection, Credentials};
pub use error::ApiError;
pub use http::{response_data, SempClient};
