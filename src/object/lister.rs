//! Paginated Listing Engine
//!
//! Fetches every member of a collection, following the broker's
//! continuation cursors until the last page.

use super::adapter::{AdapterError, Listable, PathParams};
use crate::semp::{ApiError, ApiSurface, SempClient};
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

/// Upper bound on pages fetched by one listing
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Query passed through to the broker, never interpreted locally
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub api: ApiSurface,
    /// Filter expressions, ANDed by the broker (e.g. `queueName==q*`)
    pub where_clauses: Vec<String>,
    /// Attribute names to return
    pub select: Vec<String>,
    /// Page size hint
    pub count: Option<u32>,
}

impl ListQuery {
    pub fn new(api: ApiSurface) -> Self {
        Self {
            api,
            ..Self::default()
        }
    }

    pub fn with_where(mut self, clause: &str) -> Self {
        self.where_clauses.push(clause.to_string());
        self
    }

    pub fn with_select(mut self, field: &str) -> Self {
        self.select.push(field.to_string());
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    fn query_params(&self, paging: bool) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.where_clauses.is_empty() {
            params.push(("where".to_string(), self.where_clauses.join(",")));
        }
        if !self.select.is_empty() {
            params.push(("select".to_string(), self.select.join(",")));
        }
        if let (true, Some(count)) = (paging, self.count) {
            params.push(("count".to_string(), count.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListOptions {
    pub max_pages: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// One page of a collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub cursor: Option<String>,
}

impl Page {
    /// Split a response body into items and continuation cursor.
    ///
    /// The cursor is dropped for collections that do not page.
    pub fn from_body(body: &Value, paging: bool) -> Self {
        let items = match body.get("data") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single.clone()],
        };

        let cursor = if paging {
            body.pointer("/meta/paging/cursorUri")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        } else {
            None
        };

        Self { items, cursor }
    }
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("page {page} failed: {source}")]
    Api {
        page: usize,
        #[source]
        source: ApiError,
    },

    #[error("listing still had a continuation cursor after {max_pages} pages")]
    TooManyPages { max_pages: usize },

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl ListError {
    /// Broker detail verbatim for API failures, the message otherwise
    pub fn detail(&self) -> Value {
        match self {
            ListError::Api { source, .. } => source.detail(),
            other => Value::String(other.to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ListError::Api { source, .. } if source.is_retryable())
    }
}

fn ensure_supported(
    adapter: &dyn Listable,
    client: &SempClient,
    api: ApiSurface,
) -> Result<(), AdapterError> {
    if !adapter.supports_api(api) {
        return Err(AdapterError::UnsupportedApi {
            kind: adapter.kind().to_string(),
            api,
        });
    }
    if !adapter.supports_backend(client.backend()) {
        return Err(AdapterError::UnsupportedBackend {
            kind: adapter.kind().to_string(),
            backend: client.backend(),
        });
    }
    Ok(())
}

/// Fetch the first page of a collection
pub async fn fetch_page(
    client: &SempClient,
    adapter: &dyn Listable,
    params: &PathParams,
    query: &ListQuery,
) -> Result<Page, ListError> {
    ensure_supported(adapter, client, query.api)?;
    let path = adapter.collection_path(params)?;
    let paging = adapter.supports_paging();
    let body = client
        .execute(Method::GET, query.api, &path, &query.query_params(paging), None)
        .await
        .map_err(|source| ListError::Api { page: 1, source })?;
    Ok(Page::from_body(&body, paging))
}

/// Fetch every member of a collection, in broker order.
///
/// Any failing page fails the whole listing; partial results are discarded.
pub async fn list_all(
    client: &SempClient,
    adapter: &dyn Listable,
    params: &PathParams,
    query: &ListQuery,
    options: ListOptions,
) -> Result<Vec<Value>, ListError> {
    let first = fetch_page(client, adapter, params, query).await?;
    let mut all_items = first.items;
    let mut cursor = first.cursor;
    let mut pages = 1;

    while let Some(uri) = cursor {
        if pages >= options.max_pages {
            return Err(ListError::TooManyPages {
                max_pages: options.max_pages,
            });
        }
        pages += 1;
        let body = client
            .execute_uri(&uri)
            .await
            .map_err(|source| ListError::Api { page: pages, source })?;
        let page = Page::from_body(&body, true);
        all_items.extend(page.items);
        cursor = page.cursor;
    }

    tracing::debug!(
        "list: kind={}, pages={}, items={}",
        adapter.kind(),
        pages,
        all_items.len()
    );

    Ok(all_items)
}
