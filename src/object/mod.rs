//! Object abstraction layer
//!
//! This module provides a data-driven approach to managing broker objects.
//! Adapter definitions are loaded from JSON files at compile time, so new
//! object types can be added without code changes.
//!
//! # Architecture
//!
//! - [`adapter`] - Object type descriptions and the `Listable` / `Reconcilable` capabilities
//! - [`registry`] - Loads and caches adapter definitions from embedded JSON
//! - [`settings`] - Settings normalization, diffing and payload assembly
//! - [`reconcile`] - Converges one object towards a declared state
//! - [`lister`] - Fetches whole collections, following continuation cursors
//! - [`list_reconcile`] - Converges collection membership towards a list of names
//!
//! # Adapter Definitions
//!
//! Adapters are defined in JSON files under `src/objects/`:
//! - `broker.json` - SEMP v2 objects (VPNs, queues, ACL profiles, bridges, ...)
//! - `cloud.json` - Cloud management API collections
//!
//! # Example
//!
//! ```ignore
//! use sempctl::object::{adapter, reconcile, DesiredState, Presence, ReconcileOptions};
//!
//! async fn ensure_queue(client: &sempctl::semp::SempClient) -> anyhow::Result<()> {
//!     let queue = adapter("queue")?.as_reconcilable()?;
//!     let desired = DesiredState::new("q1").with_param("msg_vpn", "default");
//!     reconcile(client, queue, &desired, Presence::Present, ReconcileOptions::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod list_reconcile;
pub mod lister;
pub mod reconcile;
mod registry;
pub mod settings;

pub use adapter::{AdapterError, Capability, Listable, ObjectAdapter, PathParams, Reconcilable};
pub use list_reconcile::{
    reconcile_list, ListPresence, ListReconcileError, ListReconcileOptions, ListReconcileOutcome,
};
pub use lister::{fetch_page, list_all, ListError, ListOptions, ListQuery, Page, DEFAULT_MAX_PAGES};
pub use reconcile::{
    get_object, reconcile, DesiredState, Operation, OutcomeKind, Presence, ReconcileError,
    ReconcileOptions, ReconcileOutcome,
};
pub use registry::*;
