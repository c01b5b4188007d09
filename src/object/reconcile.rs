//! Reconciliation Engine
//!
//! Converges one remote object towards a declared state with at most one
//! mutating request: read the object, decide, then create, update, delete or
//! leave it alone.

use super::adapter::{AdapterError, PathParams, Reconcilable};
use super::settings::{diff_settings, merge_payload, normalize_settings, with_required_together};
use crate::semp::{response_data, ApiError, ApiSurface, SempClient};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Whether the object should exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Present,
    Absent,
}

/// The object a caller wants, addressed by path parameters and name
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    pub params: PathParams,
    /// Value of the adapter's lookup key
    pub name: String,
    pub settings: Map<String, Value>,
}

impl DesiredState {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, param: &str, value: &str) -> Self {
        self.params.insert(param.to_string(), value.to_string());
        self
    }

    pub fn with_settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings = settings;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Decide but do not send the mutating request
    pub check_mode: bool,
}

/// What reconciliation did (or would do, in check mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    NoChange,
    Created,
    Updated,
    Deleted,
    AbsentNoop,
}

impl OutcomeKind {
    pub fn is_change(self) -> bool {
        matches!(self, OutcomeKind::Created | OutcomeKind::Updated | OutcomeKind::Deleted)
    }
}

/// Terminal result of one reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub kind: OutcomeKind,
    pub changed: bool,
    /// Broker response `data` (the actual object for `NoChange`)
    pub response: Value,
    /// Payload sent, or that would have been sent in check mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    pub check_mode: bool,
}

impl ReconcileOutcome {
    fn new(kind: OutcomeKind, response: Value, request: Option<Value>, check_mode: bool) -> Self {
        Self {
            kind,
            changed: kind.is_change(),
            response,
            request,
            check_mode,
        }
    }
}

/// Request that failed during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{operation} failed: {source}")]
    Api {
        operation: Operation,
        #[source]
        source: ApiError,
    },

    #[error("identity conflict on '{field}': path requires {expected:?}, settings have {actual}")]
    Conflict {
        field: String,
        expected: String,
        actual: Value,
    },

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl ReconcileError {
    fn api(operation: Operation) -> impl FnOnce(ApiError) -> Self {
        move |source| ReconcileError::Api { operation, source }
    }

    /// Broker detail verbatim for API failures, the message otherwise
    pub fn detail(&self) -> Value {
        match self {
            ReconcileError::Api { source, .. } => source.detail(),
            other => Value::String(other.to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileError::Api { source, .. } if source.is_retryable())
    }
}

/// Refuse settings that contradict the identity implied by the path
fn check_identity(
    mandatory: &Map<String, Value>,
    settings: &Map<String, Value>,
) -> Result<(), ReconcileError> {
    for (field, expected) in mandatory {
        let Some(actual) = settings.get(field) else {
            continue;
        };
        let expected = expected.as_str().unwrap_or_default();
        let matches = match actual {
            Value::String(s) => s == expected,
            other => other.to_string() == expected,
        };
        if !matches {
            return Err(ReconcileError::Conflict {
                field: field.clone(),
                expected: expected.to_string(),
                actual: actual.clone(),
            });
        }
    }
    Ok(())
}

fn ensure_supported(adapter: &dyn Reconcilable, client: &SempClient) -> Result<(), AdapterError> {
    if !adapter.supports_api(ApiSurface::Config) {
        return Err(AdapterError::UnsupportedApi {
            kind: adapter.kind().to_string(),
            api: ApiSurface::Config,
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

/// Current settings, or `None` if the object does not exist
async fn read_current(
    client: &SempClient,
    path: &[String],
) -> Result<Option<Map<String, Value>>, ReconcileError> {
    match client.get(ApiSurface::Config, path).await {
        Ok(body) => Ok(Some(
            response_data(&body).as_object().cloned().unwrap_or_default(),
        )),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(ReconcileError::Api {
            operation: Operation::Read,
            source: err,
        }),
    }
}

/// Converge one object towards `target`
pub async fn reconcile(
    client: &SempClient,
    adapter: &dyn Reconcilable,
    desired: &DesiredState,
    target: Presence,
    options: ReconcileOptions,
) -> Result<ReconcileOutcome, ReconcileError> {
    ensure_supported(adapter, client)?;

    let mandatory = adapter.mandatory_fields(&desired.params, &desired.name)?;
    check_identity(&mandatory, &desired.settings)?;
    let object_path = adapter.object_path(&desired.params, &desired.name)?;
    let collection_path = adapter.collection_path(&desired.params)?;
    let settings = normalize_settings(&desired.settings, client.backend());

    let current = read_current(client, &object_path).await?;
    let check_mode = options.check_mode;

    let outcome = match (current, target) {
        (None, Presence::Absent) => {
            ReconcileOutcome::new(OutcomeKind::AbsentNoop, Value::Null, None, check_mode)
        }
        (Some(_), Presence::Absent) => {
            let response = if check_mode {
                Value::Null
            } else {
                let body = client
                    .delete(&object_path)
                    .await
                    .map_err(ReconcileError::api(Operation::Delete))?;
                response_data(&body)
            };
            ReconcileOutcome::new(OutcomeKind::Deleted, response, None, check_mode)
        }
        (None, Presence::Present) => {
            let payload = Value::Object(merge_payload(adapter.defaults(), &settings, &mandatory));
            let response = if check_mode {
                Value::Null
            } else {
                let body = client
                    .post(&collection_path, &payload)
                    .await
                    .map_err(ReconcileError::api(Operation::Create))?;
                response_data(&body)
            };
            ReconcileOutcome::new(OutcomeKind::Created, response, Some(payload), check_mode)
        }
        (Some(actual), Presence::Present) => {
            let delta = diff_settings(&settings, &actual, adapter.ignore_fields());
            if delta.is_empty() {
                let response = Value::Object(actual);
                ReconcileOutcome::new(OutcomeKind::NoChange, response, None, check_mode)
            } else {
                let delta = with_required_together(delta, &settings, adapter.required_together());
                let payload = Value::Object(delta);
                let response = if check_mode {
                    Value::Null
                } else {
                    let body = client
                        .patch(&object_path, &payload)
                        .await
                        .map_err(ReconcileError::api(Operation::Update))?;
                    response_data(&body)
                };
                ReconcileOutcome::new(OutcomeKind::Updated, response, Some(payload), check_mode)
            }
        }
    };

    tracing::info!(
        "reconcile: kind={}, name={}, target={:?}, outcome={:?}, check_mode={}",
        adapter.kind(),
        desired.name,
        target,
        outcome.kind,
        check_mode
    );

    Ok(outcome)
}

/// Fetch one object; a missing object is an error here
pub async fn get_object(
    client: &SempClient,
    adapter: &dyn Reconcilable,
    params: &PathParams,
    name: &str,
    api: ApiSurface,
) -> Result<Value, ReconcileError> {
    if !adapter.supports_api(api) {
        return Err(AdapterError::UnsupportedApi {
            kind: adapter.kind().to_string(),
            api,
        }
        .into());
    }
    if !adapter.supports_backend(client.backend()) {
        return Err(AdapterError::UnsupportedBackend {
            kind: adapter.kind().to_string(),
            backend: client.backend(),
        }
        .into());
    }
    let path = adapter.object_path(params, name)?;
    let body = client
        .get(api, &path)
        .await
        .map_err(ReconcileError::api(Operation::Read))?;
    Ok(response_data(&body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_check_identity_accepts_matching_values() {
        let mandatory = obj(json!({"msgVpnName": "foo", "queueName": "q"}));
        let settings = obj(json!({"msgVpnName": "foo", "maxMsgSize": 10}));
        assert!(check_identity(&mandatory, &settings).is_ok());
    }

    #[test]
    fn test_check_identity_rejects_conflict() {
        let mandatory = obj(json!({"msgVpnName": "foo"}));
        let settings = obj(json!({"msgVpnName": "other"}));
        let err = check_identity(&mandatory, &settings).unwrap_err();
        match err {
            ReconcileError::Conflict { field, expected, actual } => {
                assert_eq!(field, "msgVpnName");
                assert_eq!(expected, "foo");
                assert_eq!(actual, json!("other"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_identity_compares_non_strings_textually() {
        let mandatory = obj(json!({"remoteNodeName": "42"}));
        let settings = obj(json!({"remoteNodeName": 42}));
        assert!(check_identity(&mandatory, &settings).is_ok());
    }

    #[test]
    fn test_outcome_changed_flag() {
        assert!(OutcomeKind::Created.is_change());
        assert!(OutcomeKind::Updated.is_change());
        assert!(OutcomeKind::Deleted.is_change());
        assert!(!OutcomeKind::NoChange.is_change());
        assert!(!OutcomeKind::AbsentNoop.is_change());
    }

    #[test]
    fn test_error_detail_is_verbatim() {
        let broker_body = json!({"meta": {"error": {"code": 11, "description": "Already exists"}}});
        let err = ReconcileError::Api {
            operation: Operation::Create,
            source: ApiError::Client {
                status: 400,
                detail: broker_body.clone(),
            },
        };
        assert_eq!(err.detail(), broker_body);
        assert!(!err.is_retryable());
    }
}
