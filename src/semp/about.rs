//! Broker metadata
//!
//! Functions for querying what the broker reports about itself.

use super::connection::ApiSurface;
use super::error::ApiError;
use super::http::{response_data, SempClient};
use serde_json::Value;

/// Read the SEMP API version (`about/api` -> `sempVersion`)
pub async fn semp_version(client: &SempClient) -> Result<String, ApiError> {
    let path = vec!["about".to_string(), "api".to_string()];
    let body = client.get(ApiSurface::Config, &path).await?;

    response_data(&body)
        .get("sempVersion")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ApiError::Server {
            status: 200,
            detail: match body {
                Value::Null => Value::String("empty about/api response".to_string()),
                other => other,
            },
        })
}
