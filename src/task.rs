//! Caller-facing task results
//!
//! Every CLI invocation ends by printing one [`TaskResult`] as JSON.

use crate::object::{
    ListError, ListReconcileError, ListReconcileOutcome, Operation, OutcomeKind, ReconcileError,
    ReconcileOutcome,
};
use crate::semp::ApiError;
use serde::Serialize;
use serde_json::Value;

/// Failure category reported next to `msg`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Client,
    Server,
    Transport,
    Conflict,
    Adapter,
    TooManyPages,
}

impl From<&ApiError> for ErrorKind {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::Client { .. } => ErrorKind::Client,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Transport(_) => ErrorKind::Transport,
        }
    }
}

/// Where and how a task failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Request that failed, for reconciliation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    /// 1-based page that failed, for listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// Collection member that failed, for list reconciliation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
}

impl TaskError {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            retryable: false,
            status: None,
            operation: None,
            page: None,
            member: None,
        }
    }

    fn api(source: &ApiError) -> Self {
        Self {
            retryable: source.is_retryable(),
            status: source.status(),
            ..Self::new(source.into())
        }
    }
}

impl From<&ApiError> for TaskError {
    fn from(err: &ApiError) -> Self {
        Self::api(err)
    }
}

impl From<&ReconcileError> for TaskError {
    fn from(err: &ReconcileError) -> Self {
        match err {
            ReconcileError::Api { operation, source } => Self {
                operation: Some(*operation),
                ..Self::api(source)
            },
            ReconcileError::Conflict { .. } => Self::new(ErrorKind::Conflict),
            ReconcileError::Adapter(_) => Self::new(ErrorKind::Adapter),
        }
    }
}

impl From<&ListError> for TaskError {
    fn from(err: &ListError) -> Self {
        match err {
            ListError::Api { page, source } => Self {
                page: Some(*page),
                ..Self::api(source)
            },
            ListError::TooManyPages { .. } => Self::new(ErrorKind::TooManyPages),
            ListError::Adapter(_) => Self::new(ErrorKind::Adapter),
        }
    }
}

impl From<&ListReconcileError> for TaskError {
    fn from(err: &ListReconcileError) -> Self {
        match err {
            ListReconcileError::List(source) => source.into(),
            ListReconcileError::Member { name, source } => Self {
                member: Some(name.clone()),
                ..source.into()
            },
            ListReconcileError::Adapter(_) => Self::new(ErrorKind::Adapter),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub changed: bool,
    pub rc: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeKind>,
    pub response: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_list: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_list_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl TaskResult {
    pub fn from_outcome(outcome: ReconcileOutcome) -> Self {
        Self {
            changed: outcome.changed,
            rc: 0,
            outcome: Some(outcome.kind),
            response: outcome.response,
            request: outcome.request,
            result_list: None,
            result_list_count: None,
            msg: None,
            error: None,
        }
    }

    pub fn from_list(items: Vec<Value>) -> Self {
        Self {
            changed: false,
            rc: 0,
            outcome: None,
            response: Value::Null,
            request: None,
            result_list_count: Some(items.len()),
            result_list: Some(items),
            msg: None,
            error: None,
        }
    }

    /// Single successful read (`version`, object fetch)
    pub fn from_value(response: Value) -> Self {
        Self {
            changed: false,
            rc: 0,
            outcome: None,
            response,
            request: None,
            result_list: None,
            result_list_count: None,
            msg: None,
            error: None,
        }
    }

    /// Membership changes of one collection; `response` lists every request sent
    pub fn from_list_outcome(outcome: ListReconcileOutcome) -> Self {
        Self {
            changed: outcome.changed,
            rc: 0,
            outcome: None,
            response: Value::Array(outcome.responses),
            request: Some(serde_json::json!({
                "added": outcome.added,
                "deleted": outcome.deleted,
            })),
            result_list: None,
            result_list_count: None,
            msg: None,
            error: None,
        }
    }

    /// Failure carrying `msg` verbatim
    pub fn failed(msg: Value) -> Self {
        Self {
            changed: false,
            rc: 1,
            outcome: None,
            response: Value::Null,
            request: None,
            result_list: None,
            result_list_count: None,
            msg: Some(msg),
            error: None,
        }
    }

    pub fn with_error(mut self, error: TaskError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.rc != 0
    }
}

impl From<ReconcileError> for TaskResult {
    fn from(err: ReconcileError) -> Self {
        Self::failed(err.detail()).with_error((&err).into())
    }
}

impl From<ListError> for TaskResult {
    fn from(err: ListError) -> Self {
        Self::failed(err.detail()).with_error((&err).into())
    }
}

impl From<ListReconcileError> for TaskResult {
    fn from(err: ListReconcileError) -> Self {
        Self::failed(err.detail()).with_error((&err).into())
    }
}

impl From<ApiError> for TaskResult {
    fn from(err: ApiError) -> Self {
        Self::failed(err.detail()).with_error((&err).into())
    }
}
