//! ConfigMap / Secret usages that need sibling fields to be understood
//! (a name next to its `items[].key`, a key ref next to its name).

use crate::index::pod_spec::{all_containers, is_workload_kind, pod_spec, volumes};
use crate::index::types::Reference;
use crate::parser::YamlNode;
use crate::rules::SymbolClass;

pub const CONFIG_MAP: &str = "ConfigMap";
pub const SECRET: &str = "Secret";

struct Collector<'a> {
    namespace: &'a str,
    references: Vec<Reference>,
}

impl Collector<'_> {
    fn push(&mut self, kind: &str, name: &YamlNode, key: Option<&YamlNode>) {
        let token = key.unwrap_or(name);
        self.references.push(Reference {
            target_kind: kind.to_string(),
            value: name.value.clone(),
            namespace: self.namespace.to_string(),
            symbol: SymbolClass::ResourceName,
            key: key.map(|k| k.value.clone()).unwrap_or_default(),
            range: token.range(),
        });
    }

    /// `{<name_field>: x, items: [{key: k}]}`: whole-payload plus per-key usages
    fn source(&mut self, kind: &str, source: Option<&YamlNode>, name_field: &str) {
        let Some(name) = source.and_then(|s| s.get_scalar(name_field)) else {
            return;
        };
        self.push(kind, name, None);

        let items = source.and_then(|s| s.get("items"));
        for item in items.map(|i| i.items()).unwrap_or(&[]) {
            if let Some(key) = item.get_scalar("key") {
                self.push(kind, name, Some(key));
            }
        }
    }
}

/// Payload usages inside the pod spec of a workload document.
///
/// `namespace` must already be normalized.
pub fn extract_payload_references(root: &YamlNode, kind: &str, namespace: &str) -> Vec<Reference> {
    if !is_workload_kind(kind) {
        return Vec::new();
    }
    let Some(spec) = pod_spec(root, kind) else {
        return Vec::new();
    };

    let mut collector = Collector {
        namespace,
        references: Vec::new(),
    };

    for volume in volumes(spec) {
        collector.source(CONFIG_MAP, volume.get("configMap"), "name");
        collector.source(SECRET, volume.get("secret"), "secretName");

        let sources = volume.get_path(&["projected", "sources"]);
        for source in sources.map(|s| s.items()).unwrap_or(&[]) {
            collector.source(CONFIG_MAP, source.get("configMap"), "name");
            collector.source(SECRET, source.get("secret"), "name");
        }
    }

    for container in all_containers(spec) {
        for env_from in container.get("envFrom").map(|e| e.items()).unwrap_or(&[]) {
            if let Some(name) = env_from.get_path(&["configMapRef", "name"]).filter(|n| n.is_scalar()) {
                collector.push(CONFIG_MAP, name, None);
            }
            if let Some(name) = env_from.get_path(&["secretRef", "name"]).filter(|n| n.is_scalar()) {
                collector.push(SECRET, name, None);
            }
        }

        for env in container.get("env").map(|e| e.items()).unwrap_or(&[]) {
            for (kind, ref_field) in [(CONFIG_MAP, "configMapKeyRef"), (SECRET, "secretKeyRef")] {
                let Some(key_ref) = env.get_path(&["valueFrom", ref_field]) else {
                    continue;
                };
                let Some(name) = key_ref.get_scalar("name") else {
                    continue;
                };
                collector.push(kind, name, None);
                if let Some(key) = key_ref.get_scalar("key") {
                    collector.push(kind, name, Some(key));
                }
            }
        }
    }

    collector.references
}
