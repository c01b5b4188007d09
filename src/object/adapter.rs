//! Object adapters
//!
//! An [`ObjectAdapter`] is the static description of one manageable object
//! type: where its collection lives, which field identifies an instance and
//! what the engines may do with it. Adapters are plain data (see
//! [`super::registry`]); the engines only see them through the [`Listable`]
//! and [`Reconcilable`] capability traits.

use crate::semp::{ApiSurface, Backend};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Path parameters supplied by the caller, e.g. `msg_vpn -> default`
pub type PathParams = BTreeMap<String, String>;

/// Placeholder that refers to the object's own lookup key value
pub const NAME_PARAM: &str = "name";

/// Problems resolving an adapter against caller input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("unknown object kind '{0}'")]
    UnknownKind(String),

    #[error("{kind}: missing path parameter '{param}'")]
    MissingParam { kind: String, param: String },

    #[error("{kind}: path segment '{template}' resolves to an empty string")]
    EmptySegment { kind: String, template: String },

    #[error("{kind}: object name must not be empty")]
    EmptyName { kind: String },

    #[error("{kind}: operation '{capability}' not supported")]
    UnsupportedCapability { kind: String, capability: Capability },

    #[error("{kind}: API surface '{api}' not supported")]
    UnsupportedApi { kind: String, api: ApiSurface },

    #[error("{kind}: backend '{backend}' not supported")]
    UnsupportedBackend { kind: String, backend: Backend },
}

/// What the engines may do with an object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    List,
    Reconcile,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::List => write!(f, "list"),
            Capability::Reconcile => write!(f, "reconcile"),
        }
    }
}

/// One path segment: either literal text or a `{param}` template
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Segment {
    Literal(String),
    Template(String),
}

impl From<String> for Segment {
    fn from(raw: String) -> Self {
        if raw.contains('{') {
            Segment::Template(raw)
        } else {
            Segment::Literal(raw)
        }
    }
}

impl From<&str> for Segment {
    fn from(raw: &str) -> Self {
        Segment::from(raw.to_string())
    }
}

impl Segment {
    fn render(
        &self,
        kind: &str,
        params: &PathParams,
        name: Option<&str>,
    ) -> Result<String, AdapterError> {
        let rendered = match self {
            Segment::Literal(text) => text.clone(),
            Segment::Template(template) => render_template(kind, template, params, name)?,
        };
        if rendered.is_empty() {
            let template = match self {
                Segment::Literal(t) | Segment::Template(t) => t.clone(),
            };
            return Err(AdapterError::EmptySegment {
                kind: kind.to_string(),
                template,
            });
        }
        Ok(rendered)
    }
}

/// Substitute `{param}` placeholders; `{name}` is the object's own key value
fn render_template(
    kind: &str,
    template: &str,
    params: &PathParams,
    name: Option<&str>,
) -> Result<String, AdapterError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            // Unbalanced brace: keep the remainder as literal text
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let param = &after[..end];
        let value = match (param, name) {
            (NAME_PARAM, Some(name)) => name,
            _ => params.get(param).map(|s| s.as_str()).ok_or_else(|| AdapterError::MissingParam {
                kind: kind.to_string(),
                param: param.to_string(),
            })?,
        };
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Capability: the object type has a collection that can be listed
pub trait Listable {
    fn kind(&self) -> &str;

    /// Resolved collection path segments (without the API prefix)
    fn collection_path(&self, params: &PathParams) -> Result<Vec<String>, AdapterError>;

    /// Whether the collection honours continuation cursors
    fn supports_paging(&self) -> bool;

    fn supports_api(&self, api: ApiSurface) -> bool;

    fn supports_backend(&self, backend: Backend) -> bool;
}

/// Capability: single instances can be created, updated and deleted
pub trait Reconcilable: Listable {
    /// Field that uniquely identifies an instance within its collection
    fn lookup_key(&self) -> &str;

    /// Resolved path segments of one instance
    fn object_path(&self, params: &PathParams, name: &str) -> Result<Vec<String>, AdapterError>;

    /// Identity fields the path implies; these always win over caller settings
    fn mandatory_fields(
        &self,
        params: &PathParams,
        name: &str,
    ) -> Result<Map<String, Value>, AdapterError>;

    /// Creation defaults, overridden by caller settings
    fn defaults(&self) -> &Map<String, Value>;

    /// Fields excluded from comparison (write-only or broker-computed)
    fn ignore_fields(&self) -> &[String];

    /// Groups of fields the broker only accepts together in an update
    fn required_together(&self) -> &[Vec<String>];
}

fn default_apis() -> Vec<ApiSurface> {
    vec![ApiSurface::Config]
}

fn default_backends() -> Vec<Backend> {
    vec![Backend::Broker]
}

fn default_capabilities() -> Vec<Capability> {
    vec![Capability::List, Capability::Reconcile]
}

fn default_true() -> bool {
    true
}

fn default_object_segment() -> Segment {
    Segment::Template(format!("{{{}}}", NAME_PARAM))
}

/// Data-driven description of one object type
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectAdapter {
    /// Registry key, filled in by the registry
    #[serde(skip)]
    pub kind: String,
    pub display_name: String,
    /// Collection path template
    pub path: Vec<Segment>,
    /// Lookup key field
    pub key: String,
    /// Template of the instance's own segment under the collection
    #[serde(default = "default_object_segment")]
    pub object_segment: Segment,
    /// Payload field -> path parameter it must equal
    #[serde(default)]
    pub identity: BTreeMap<String, String>,
    #[serde(default = "default_apis")]
    pub apis: Vec<ApiSurface>,
    #[serde(default = "default_true")]
    pub paging: bool,
    #[serde(default = "default_backends")]
    pub backends: Vec<Backend>,
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub defaults: Map<String, Value>,
    #[serde(default)]
    pub ignore_fields: Vec<String>,
    #[serde(default)]
    pub required_together: Vec<Vec<String>>,
}

impl ObjectAdapter {
    /// Minimal adapter: config API, broker backend, paging, list + reconcile
    pub fn new(kind: &str, path: &[&str], key: &str) -> Self {
        Self {
            kind: kind.to_string(),
            display_name: kind.to_string(),
            path: path.iter().map(|s| Segment::from(*s)).collect(),
            key: key.to_string(),
            object_segment: default_object_segment(),
            identity: BTreeMap::new(),
            apis: default_apis(),
            paging: true,
            backends: default_backends(),
            capabilities: default_capabilities(),
            defaults: Map::new(),
            ignore_fields: Vec::new(),
            required_together: Vec::new(),
        }
    }

    pub fn with_identity(mut self, field: &str, param: &str) -> Self {
        self.identity.insert(field.to_string(), param.to_string());
        self
    }

    pub fn with_object_segment(mut self, template: &str) -> Self {
        self.object_segment = Segment::from(template);
        self
    }

    pub fn with_apis(mut self, apis: &[ApiSurface]) -> Self {
        self.apis = apis.to_vec();
        self
    }

    pub fn with_backends(mut self, backends: &[Backend]) -> Self {
        self.backends = backends.to_vec();
        self
    }

    pub fn with_paging(mut self, paging: bool) -> Self {
        self.paging = paging;
        self
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    pub fn with_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_ignore_fields(mut self, fields: &[&str]) -> Self {
        self.ignore_fields = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_required_together(mut self, group: &[&str]) -> Self {
        self.required_together
            .push(group.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// View this adapter as a listable collection, if it declares that capability
    pub fn as_listable(&self) -> Result<&dyn Listable, AdapterError> {
        self.require(Capability::List)?;
        Ok(self)
    }

    /// View this adapter as reconcilable, if it declares that capability
    pub fn as_reconcilable(&self) -> Result<&dyn Reconcilable, AdapterError> {
        self.require(Capability::Reconcile)?;
        Ok(self)
    }

    fn require(&self, capability: Capability) -> Result<(), AdapterError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(AdapterError::UnsupportedCapability {
                kind: self.kind.clone(),
                capability,
            })
        }
    }

    /// Names of the path parameters this adapter needs (excluding `name`)
    pub fn required_params(&self) -> Vec<String> {
        let mut params = Vec::new();
        for segment in self.path.iter().chain(std::iter::once(&self.object_segment)) {
            if let Segment::Template(template) = segment {
                for param in placeholders(template) {
                    if param != NAME_PARAM && !params.iter().any(|p| p == param) {
                        params.push(param.to_string());
                    }
                }
            }
        }
        params
    }
}

fn placeholders(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        found.push(&after[..end]);
        rest = &after[end + 1..];
    }
    found
}

impl Listable for ObjectAdapter {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn collection_path(&self, params: &PathParams) -> Result<Vec<String>, AdapterError> {
        self.path
            .iter()
            .map(|segment| segment.render(&self.kind, params, None))
            .collect()
    }

    fn supports_paging(&self) -> bool {
        self.paging
    }

    fn supports_api(&self, api: ApiSurface) -> bool {
        self.apis.contains(&api)
    }

    fn supports_backend(&self, backend: Backend) -> bool {
        self.backends.contains(&backend)
    }
}

impl Reconcilable for ObjectAdapter {
    fn lookup_key(&self) -> &str {
        &self.key
    }

    fn object_path(&self, params: &PathParams, name: &str) -> Result<Vec<String>, AdapterError> {
        if name.is_empty() {
            return Err(AdapterError::EmptyName {
                kind: self.kind.clone(),
            });
        }
        let mut path = self.collection_path(params)?;
        path.push(self.object_segment.render(&self.kind, params, Some(name))?);
        Ok(path)
    }

    fn mandatory_fields(
        &self,
        params: &PathParams,
        name: &str,
    ) -> Result<Map<String, Value>, AdapterError> {
        let mut fields = Map::new();
        for (field, param) in &self.identity {
            let value = params.get(param).ok_or_else(|| AdapterError::MissingParam {
                kind: self.kind.clone(),
                param: param.clone(),
            })?;
            fields.insert(field.clone(), Value::String(value.clone()));
        }
        fields.insert(self.key.clone(), Value::String(name.to_string()));
        Ok(fields)
    }

    fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }

    fn ignore_fields(&self) -> &[String] {
        &self.ignore_fields
    }

    fn required_together(&self) -> &[Vec<String>] {
        &self.required_together
    }
}
