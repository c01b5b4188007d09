//! List Reconciliation
//!
//! Converges the membership of a whole collection towards a list of names,
//! e.g. the topic subscriptions of one queue. The collection is listed once
//! through the config API, then each missing name is created and each
//! unwanted one deleted.

use super::adapter::{AdapterError, ObjectAdapter, PathParams, Reconcilable};
use super::lister::{list_all, ListError, ListOptions, ListQuery, DEFAULT_MAX_PAGES};
use super::reconcile::{Operation, ReconcileError};
use super::settings::merge_payload;
use crate::semp::{response_data, ApiSurface, SempClient};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Which members the collection should end up with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListPresence {
    /// The named members exist; others are left alone
    #[default]
    Present,
    /// None of the named members exist
    Absent,
    /// Exactly the named members exist
    PresentOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct ListReconcileOptions {
    pub check_mode: bool,
    pub max_pages: usize,
}

impl Default for ListReconcileOptions {
    fn default() -> Self {
        Self {
            check_mode: false,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// What list reconciliation did (or would do, in check mode)
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListReconcileOutcome {
    pub changed: bool,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    /// One entry per request sent, in order
    pub responses: Vec<Value>,
    pub check_mode: bool,
}

#[derive(Debug, Error)]
pub enum ListReconcileError {
    #[error(transparent)]
    List(#[from] ListError),

    #[error("'{name}': {source}")]
    Member {
        name: String,
        #[source]
        source: ReconcileError,
    },

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl ListReconcileError {
    fn member(name: &str) -> impl FnOnce(ReconcileError) -> Self + '_ {
        move |source| ListReconcileError::Member {
            name: name.to_string(),
            source,
        }
    }

    /// Broker detail verbatim for API failures, the message otherwise
    pub fn detail(&self) -> Value {
        match self {
            ListReconcileError::List(err) => err.detail(),
            ListReconcileError::Member { source, .. } => source.detail(),
            other => Value::String(other.to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ListReconcileError::List(err) => err.is_retryable(),
            ListReconcileError::Member { source, .. } => source.is_retryable(),
            ListReconcileError::Adapter(_) => false,
        }
    }
}

/// Lookup key values of the listed members, in broker order
fn member_names(items: &[Value], key: &str) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.get(key))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// First occurrence of each name, order kept
fn dedup(names: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !seen.contains(name) {
            seen.push(name.clone());
        }
    }
    seen
}

/// Split the targets into members to create and members to delete
fn plan(
    target: ListPresence,
    wanted: &[String],
    existing: &[String],
) -> (Vec<String>, Vec<String>) {
    let missing = || -> Vec<String> {
        wanted.iter().filter(|n| !existing.contains(n)).cloned().collect()
    };
    match target {
        ListPresence::Present => (missing(), Vec::new()),
        ListPresence::Absent => (
            Vec::new(),
            wanted.iter().filter(|n| existing.contains(n)).cloned().collect(),
        ),
        ListPresence::PresentOnly => (
            missing(),
            existing.iter().filter(|n| !wanted.contains(n)).cloned().collect(),
        ),
    }
}

async fn create_member(
    client: &SempClient,
    adapter: &dyn Reconcilable,
    params: &PathParams,
    name: &str,
) -> Result<Value, ReconcileError> {
    let mandatory = adapter.mandatory_fields(params, name)?;
    let payload = Value::Object(merge_payload(adapter.defaults(), &Map::new(), &mandatory));
    let body = client
        .post(&adapter.collection_path(params)?, &payload)
        .await
        .map_err(|source| ReconcileError::Api {
            operation: Operation::Create,
            source,
        })?;
    tracing::info!("reconcile_list: kind={}, added={}", adapter.kind(), name);
    Ok(json!({ "added": name, "response": response_data(&body) }))
}

async fn delete_member(
    client: &SempClient,
    adapter: &dyn Reconcilable,
    params: &PathParams,
    name: &str,
) -> Result<Value, ReconcileError> {
    let body = client
        .delete(&adapter.object_path(params, name)?)
        .await
        .map_err(|source| ReconcileError::Api {
            operation: Operation::Delete,
            source,
        })?;
    tracing::info!("reconcile_list: kind={}, deleted={}", adapter.kind(), name);
    Ok(json!({ "deleted": name, "response": response_data(&body) }))
}

/// Converge the members of one collection towards `names`.
///
/// Members are created with the adapter's defaults and their path identity
/// only. The first failing request stops the run; members changed before it
/// stay changed.
pub async fn reconcile_list(
    client: &SempClient,
    adapter: &ObjectAdapter,
    params: &PathParams,
    names: &[String],
    target: ListPresence,
    options: ListReconcileOptions,
) -> Result<ListReconcileOutcome, ListReconcileError> {
    let members = adapter.as_reconcilable()?;
    let collection = adapter.as_listable()?;

    let wanted = dedup(names);
    for name in &wanted {
        members.object_path(params, name)?;
    }

    let items = list_all(
        client,
        collection,
        params,
        &ListQuery::new(ApiSurface::Config),
        ListOptions {
            max_pages: options.max_pages,
        },
    )
    .await?;
    let existing = member_names(&items, members.lookup_key());

    let (to_add, to_delete) = plan(target, &wanted, &existing);
    let mut outcome = ListReconcileOutcome {
        changed: !(to_add.is_empty() && to_delete.is_empty()),
        check_mode: options.check_mode,
        ..ListReconcileOutcome::default()
    };

    if !options.check_mode {
        for name in &to_add {
            let response = create_member(client, members, params, name)
                .await
                .map_err(ListReconcileError::member(name))?;
            outcome.responses.push(response);
        }
        for name in &to_delete {
            let response = delete_member(client, members, params, name)
                .await
                .map_err(ListReconcileError::member(name))?;
            outcome.responses.push(response);
        }
    }

    tracing::info!(
        "reconcile_list: kind={}, target={:?}, existing={}, add={}, delete={}, check_mode={}",
        adapter.kind,
        target,
        existing.len(),
        to_add.len(),
        to_delete.len(),
        options.check_mode
    );

    outcome.added = to_add;
    outcome.deleted = to_delete;
    Ok(outcome)
}
