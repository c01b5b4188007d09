//! Object Registry - Load adapter definitions from JSON
//!
//! This module loads all object adapters from embedded JSON files and
//! provides lookup functions for the rest of the application.

use super::adapter::{AdapterError, ObjectAdapter};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Embedded adapter JSON files (compiled into the binary)
const OBJECT_FILES: &[&str] = &[
    include_str!("../objects/broker.json"),
    include_str!("../objects/cloud.json"),
];

/// Root structure of objects/*.json
#[derive(Debug, Clone, Deserialize)]
struct AdapterTable {
    #[serde(default)]
    objects: BTreeMap<String, ObjectAdapter>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<BTreeMap<String, ObjectAdapter>> = OnceLock::new();

/// Get the adapter registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static BTreeMap<String, ObjectAdapter> {
    REGISTRY.get_or_init(|| {
        let mut registry = BTreeMap::new();

        for content in OBJECT_FILES {
            let table: AdapterTable = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded object JSON: {}", e));
            for (kind, mut adapter) in table.objects {
                adapter.kind = kind.clone();
                registry.insert(kind, adapter);
            }
        }

        registry
    })
}

/// Get an adapter by kind
pub fn get_adapter(kind: &str) -> Option<&'static ObjectAdapter> {
    get_registry().get(kind)
}

/// Get an adapter by kind, failing with [`AdapterError::UnknownKind`]
pub fn adapter(kind: &str) -> Result<&'static ObjectAdapter, AdapterError> {
    get_adapter(kind).ok_or_else(|| AdapterError::UnknownKind(kind.to_string()))
}

/// Get all registered kinds, sorted
pub fn get_all_kinds() -> Vec<&'static str> {
    get_registry().keys().map(|s| s.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::adapter::{Capability, Listable, PathParams, Reconcilable};
    use crate::semp::{ApiSurface, Backend};

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(!registry.is_empty(), "Registry should have adapters");
    }

    #[test]
    fn test_replay_log_adapter() {
        let adapter = get_adapter("replay-log").expect("replay-log should exist");
        assert_eq!(adapter.kind, "replay-log");
        assert_eq!(adapter.lookup_key(), "replayLogName");
        assert!(adapter.supports_backend(Backend::Broker));
        assert!(!adapter.supports_backend(Backend::Cloud));
    }

    #[test]
    fn test_unknown_kind() {
        assert_eq!(
            adapter("no-such-thing").unwrap_err(),
            AdapterError::UnknownKind("no-such-thing".to_string())
        );
    }

    #[test]
    fn test_every_adapter_resolves_with_its_params() {
        for (kind, adapter) in get_registry() {
            let params: PathParams = adapter
                .required_params()
                .into_iter()
                .map(|p| (p.clone(), format!("{}-value", p)))
                .collect();
            let collection = adapter
                .collection_path(&params)
                .unwrap_or_else(|e| panic!("{}: {}", kind, e));
            assert!(!collection.is_empty(), "{} has an empty path", kind);
            if adapter.supports(Capability::Reconcile) {
                let object = adapter
                    .object_path(&params, "obj")
                    .unwrap_or_else(|e| panic!("{}: {}", kind, e));
                assert_eq!(object.len(), collection.len() + 1, "{}", kind);
                adapter
                    .mandatory_fields(&params, "obj")
                    .unwrap_or_else(|e| panic!("{}: {}", kind, e));
            }
            assert!(!adapter.apis.is_empty(), "{} has no API surface", kind);
        }
    }

    #[test]
    fn test_monitor_only_collection() {
        let adapter = get_adapter("client").expect("client should exist");
        assert!(adapter.supports_api(ApiSurface::Monitor));
        assert!(!adapter.supports_api(ApiSurface::Config));
        assert!(adapter.as_reconcilable().is_err());
    }

    #[test]
    fn test_cloud_services_are_single_page() {
        let adapter = get_adapter("cloud-service").expect("cloud-service should exist");
        assert!(!adapter.supports_paging());
        assert!(adapter.supports_backend(Backend::Cloud));
    }

    #[test]
    fn test_semp_kinds_stay_off_the_cloud_api() {
        for (kind, adapter) in get_registry() {
            let broker = adapter.supports_backend(Backend::Broker);
            let cloud = adapter.supports_backend(Backend::Cloud);
            assert!(!(broker && cloud), "{} claims both backends", kind);
        }
        let queue = get_adapter("queue").expect("queue should exist");
        assert!(!queue.supports_backend(Backend::Cloud));
    }

    #[test]
    fn test_creation_defaults() {
        for kind in ["vpn", "client-username", "dmr-cluster"] {
            let adapter = get_adapter(kind).expect("kind should exist");
            assert_eq!(
                adapter.defaults().get("enabled"),
                Some(&serde_json::Value::Bool(true)),
                "{}",
                kind
            );
        }
        assert!(get_adapter("queue").expect("queue should exist").defaults().is_empty());
    }

    #[test]
    fn test_topic_exception_syntax_comes_from_path() {
        let adapter = get_adapter("acl-publish-topic-exception").expect("kind should exist");
        let params: PathParams = [("msg_vpn", "v"), ("acl_profile", "p"), ("topic_syntax", "smf")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let fields = adapter.mandatory_fields(&params, "a/b").unwrap();
        assert_eq!(
            fields.get("publishTopicExceptionSyntax"),
            Some(&serde_json::Value::String("smf".to_string()))
        );
        assert_eq!(
            adapter.object_path(&params, "a/b").unwrap().last().map(String::as_str),
            Some("smf,a/b")
        );
    }

    #[test]
    fn test_bridge_declares_required_together() {
        let adapter = get_adapter("bridge").expect("bridge should exist");
        assert!(!adapter.required_together().is_empty());
        assert!(adapter
            .ignore_fields()
            .iter()
            .any(|f| f == "remoteAuthenticationBasicPassword"));
    }

    #[test]
    fn test_get_all_kinds_sorted() {
        let kinds = get_all_kinds();
        assert!(kinds.contains(&"queue"));
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
    }
}
