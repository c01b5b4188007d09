//! Request executor for SEMP REST API calls

use super::connection::{ApiSurface, Backend, BrokerConnection, Credentials};
use super::error::ApiError;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{Map, Value};
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Percent-encode one path segment.
///
/// Commas stay literal: SEMP addresses objects with composite keys such as
/// `bridgeName,virtualRouter`.
fn escape_segment(segment: &str) -> String {
    urlencoding::encode(segment).replace("%2C", ",")
}

/// Join path segments, escaping each one
pub fn compose_path(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| escape_segment(s))
        .collect::<Vec<_>>()
        .join("/")
}

/// Extract the `data` member of a SEMP/cloud response.
///
/// Responses without `data` (e.g. DELETE) yield an empty object.
pub fn response_data(body: &Value) -> Value {
    body.get("data")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// HTTP client bound to one broker connection
#[derive(Clone)]
pub struct SempClient {
    client: Client,
    connection: BrokerConnection,
}

impl SempClient {
    /// Create a new client; the connection's timeout applies to every request
    pub fn new(connection: &BrokerConnection) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("sempctl/", env!("CARGO_PKG_VERSION")))
            .timeout(connection.timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            connection: connection.clone(),
        })
    }

    pub fn connection(&self) -> &BrokerConnection {
        &self.connection
    }

    pub fn backend(&self) -> Backend {
        self.connection.backend
    }

    /// Full URL for the given surface and path segments
    pub fn url_for(&self, surface: ApiSurface, segments: &[String]) -> String {
        let path = compose_path(segments);
        if path.is_empty() {
            format!("{}{}", self.connection.base_url(), self.connection.api_prefix(surface))
        } else {
            format!(
                "{}{}/{}",
                self.connection.base_url(),
                self.connection.api_prefix(surface),
                path
            )
        }
    }

    /// Issue one request and classify the outcome
    pub async fn execute(
        &self,
        method: Method,
        surface: ApiSurface,
        segments: &[String],
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = self.url_for(surface, segments);
        self.send(method, &url, query, body).await
    }

    pub async fn get(&self, surface: ApiSurface, segments: &[String]) -> Result<Value, ApiError> {
        self.execute(Method::GET, surface, segments, &[], None).await
    }

    pub async fn post(&self, segments: &[String], body: &Value) -> Result<Value, ApiError> {
        self.execute(Method::POST, ApiSurface::Config, segments, &[], Some(body))
            .await
    }

    pub async fn patch(&self, segments: &[String], body: &Value) -> Result<Value, ApiError> {
        self.execute(Method::PATCH, ApiSurface::Config, segments, &[], Some(body))
            .await
    }

    pub async fn delete(&self, segments: &[String]) -> Result<Value, ApiError> {
        self.execute(Method::DELETE, ApiSurface::Config, segments, &[], None)
            .await
    }

    /// GET an absolute URI, or one relative to the connection's base URL.
    ///
    /// The URI is used exactly as given (continuation cursors are opaque).
    pub async fn execute_uri(&self, uri: &str) -> Result<Value, ApiError> {
        let base = Url::parse(&self.connection.base_url())
            .map_err(|e| ApiError::Transport(format!("invalid base URL: {}", e)))?;
        let url = base.join(uri).map_err(|e| ApiError::Server {
            status: StatusCode::OK.as_u16(),
            detail: Value::String(format!("invalid continuation URI '{}': {}", uri, e)),
        })?;
        self.send(Method::GET, url.as_str(), &[], None).await
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.connection.credentials {
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Credentials::Bearer { token } => request.bearer_auth(token),
        };
        match &self.connection.broker_name {
            Some(name) => request.header("x-broker-name", name),
            None => request,
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.authorize(self.client.request(method.clone(), url));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("{} {} failed: {}", method, url, e);
            ApiError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let err = ApiError::from_response(status, &text);
            if err.is_not_found() {
                tracing::debug!("{} {} -> not found", method, url);
            } else {
                // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
                tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
            }
            return Err(err);
        }

        // Handle empty response
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!("Unparsable response from {}: {}", url, e);
            ApiError::Server {
                status: status.as_u16(),
                detail: Value::String(text),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segments(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compose_path_escapes_wildcards() {
        let path = compose_path(&segments(&[
            "msgVpns",
            "default",
            "queues",
            "q1",
            "subscriptions",
            "a/b/#",
        ]));
        assert_eq!(path, "msgVpns/default/queues/q1/subscriptions/a%2Fb%2F%23");
    }

    #[test]
    fn test_compose_path_keeps_commas() {
        let path = compose_path(&segments(&["msgVpns", "v", "bridges", "br1,primary"]));
        assert_eq!(path, "msgVpns/v/bridges/br1,primary");
    }

    #[test]
    fn test_url_for_broker_config() {
        let conn = BrokerConnection::broker("localhost", 8080, "admin", "admin");
        let client = SempClient::new(&conn).unwrap();
        assert_eq!(
            client.url_for(ApiSurface::Config, &segments(&["msgVpns", "default"])),
            "http://localhost:8080/SEMP/v2/config/msgVpns/default"
        );
        assert_eq!(
            client.url_for(ApiSurface::Monitor, &segments(&["msgVpns"])),
            "http://localhost:8080/SEMP/v2/monitor/msgVpns"
        );
    }

    #[test]
    fn test_response_data() {
        assert_eq!(response_data(&json!({"data": {"a": 1}, "meta": {}})), json!({"a": 1}));
        assert_eq!(response_data(&json!({"meta": {"responseCode": 200}})), json!({}));
        assert_eq!(response_data(&Value::Null), json!({}));
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(500);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.contains("truncated, 500 bytes total"));
        assert!(sanitized.len() < 300);
    }
}
