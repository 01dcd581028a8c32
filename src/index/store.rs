//! Concurrency-safe resource index keyed by kind/namespace/name

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::debug;

use crate::index::types::{ResourceKey, ResourceRecord};
use crate::rules::SymbolClass;

type ResourceMap = BTreeMap<ResourceKey, Arc<ResourceRecord>>;

/// Resource index.
///
/// Records are replaced wholesale when re-indexed under the same key and are
/// never removed. Scans hold the read lock for their whole pass.
#[derive(Debug, Default)]
pub struct Store {
    resources: RwLock<ResourceMap>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_resources(&self) -> RwLockReadGuard<'_, ResourceMap> {
        self.resources.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or overwrite the record under its key
    pub fn add(&self, record: ResourceRecord) {
        let key = record.key();
        debug!("Adding resource {} to store", key);
        let mut resources = self.resources.write().unwrap_or_else(|e| e.into_inner());
        resources.insert(key, Arc::new(record));
    }

    /// Lookup by exact key; an empty namespace means the default namespace
    pub fn get(&self, kind: &str, namespace: &str, name: &str) -> Option<Arc<ResourceRecord>> {
        let key = ResourceKey::new(kind, namespace, name);
        debug!("Getting resource {} from store", key);
        self.read_resources().get(&key).cloned()
    }

    /// Records carrying `labels[key] == value`
    pub fn find_by_label(&self, key: &str, value: &str) -> Vec<Arc<ResourceRecord>> {
        self.read_resources()
            .values()
            .filter(|record| record.labels.get(key).is_some_and(|v| v == value))
            .cloned()
            .collect()
    }

    /// Records holding at least one reference to (`kind`, `name`), any namespace
    pub fn find_referencing(&self, kind: &str, name: &str) -> Vec<Arc<ResourceRecord>> {
        self.read_resources()
            .values()
            .filter(|record| {
                record
                    .references
                    .iter()
                    .any(|reference| reference.target_kind == kind && reference.value == name)
            })
            .cloned()
            .collect()
    }

    /// Records holding a label reference (selector entry) `key: value`
    pub fn find_label_references(&self, key: &str, value: &str) -> Vec<Arc<ResourceRecord>> {
        self.read_resources()
            .values()
            .filter(|record| {
                record.references.iter().any(|reference| {
                    reference.symbol == SymbolClass::Label
                        && reference.key == key
                        && reference.value == value
                })
            })
            .cloned()
            .collect()
    }

    /// Every record of `kind`, ordered by namespace then name
    pub fn list_by_kind(&self, kind: &str) -> Vec<Arc<ResourceRecord>> {
        self.read_resources()
            .values()
            .filter(|record| record.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_resources().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_resources().is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::index::types::Reference;
    use indexmap::IndexMap;
    use tower_lsp::lsp_types::{Position, Range, Url};

    pub(crate) fn range(line: u32, start: u32, end: u32) -> Range {
        Range {
            start: Position {
                line,
                character: start,
            },
            end: Position {
                line,
                character: end,
            },
        }
    }

    pub(crate) fn record(kind: &str, namespace: &str, name: &str, file: &str) -> ResourceRecord {
        ResourceRecord {
            api_version: "v1".to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels: IndexMap::new(),
            references: Vec::new(),
            uri: Url::parse(&format!("file://{}", file)).unwrap(),
            range: range(3, 8, 8 + name.len() as u32),
        }
    }

    pub(crate) fn reference(symbol: SymbolClass, target_kind: &str, value: &str, line: u32) -> Reference {
        Reference {
            target_kind: target_kind.to_string(),
            value: value.to_string(),
            namespace: "default".to_string(),
            symbol,
            key: String::new(),
            range: range(line, 10, 10 + value.len() as u32),
        }
    }

    #[test]
    fn get_treats_empty_namespace_as_default() {
        let store = Store::new();
        store.add(record("ConfigMap", "", "settings", "/tmp/cm.yaml"));

        assert!(store.get("ConfigMap", "default", "settings").is_some());
        assert!(store.get("ConfigMap", "", "settings").is_some());
        assert!(store.get("ConfigMap", "prod", "settings").is_none());
    }

    #[test]
    fn add_overwrites_same_key() {
        let store = Store::new();
        store.add(record("Service", "prod", "web", "/tmp/a.yaml"));
        store.add(record("Service", "prod", "web", "/tmp/b.yaml"));

        let found = store.get("Service", "prod", "web").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(found.uri.path(), "/tmp/b.yaml");
    }

    #[test]
    fn find_by_label_matches_key_and_value() {
        let store = Store::new();
        let mut labelled = record("Deployment", "", "web", "/tmp/deploy.yaml");
        labelled.labels.insert("app".to_string(), "web".to_string());
        store.add(labelled);
        store.add(record("Deployment", "", "other", "/tmp/other.yaml"));

        let found = store.find_by_label("app", "web");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "web");
        assert!(store.find_by_label("app", "api").is_empty());
    }

    #[test]
    fn find_referencing_ignores_namespace() {
        let store = Store::new();
        let mut prod = record("Deployment", "prod", "api", "/tmp/api.yaml");
        prod.references.push(reference(SymbolClass::ResourceName, "ConfigMap", "settings", 12));
        let mut dev = record("Deployment", "dev", "api", "/tmp/api-dev.yaml");
        dev.references.push(reference(SymbolClass::ResourceName, "ConfigMap", "settings", 12));
        store.add(prod);
        store.add(dev);

        assert_eq!(store.find_referencing("ConfigMap", "settings").len(), 2);
        assert!(store.find_referencing("Secret", "settings").is_empty());
    }

    #[test]
    fn find_label_references_requires_label_symbol() {
        let store = Store::new();
        let mut service = record("Service", "", "web", "/tmp/svc.yaml");
        let mut selector = reference(SymbolClass::Label, "", "web", 8);
        selector.key = "app".to_string();
        service.references.push(selector);
        let mut deploy = record("Deployment", "", "web", "/tmp/deploy.yaml");
        deploy.references.push(reference(SymbolClass::ResourceName, "Service", "web", 20));
        store.add(service);
        store.add(deploy);

        let found = store.find_label_references("app", "web");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "Service");
        assert!(store.find_label_references("tier", "web").is_empty());
    }

    #[test]
    fn list_by_kind_filters_kind() {
        let store = Store::new();
        store.add(record("Service", "", "a", "/tmp/a.yaml"));
        store.add(record("Service", "prod", "b", "/tmp/b.yaml"));
        store.add(record("ConfigMap", "", "c", "/tmp/c.yaml"));

        let names: Vec<String> = store
            .list_by_kind("Service")
            .iter()
            .map(|record| record.name.clone())
            .collect();

        assert_eq!(names, ["a", "b"]);
        assert!(!store.is_empty());
    }

    #[test]
    fn concurrent_add_and_get() {
        let store = Arc::new(Store::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let name = format!("svc-{}", i);
                    store.add(record("Service", "", &name, "/tmp/svc.yaml"));
                    store.get("Service", "", &name).is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(store.len(), 16);
    }
}
