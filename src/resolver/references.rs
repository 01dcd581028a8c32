use std::collections::HashSet;
use std::sync::Arc;

use tower_lsp::lsp_types::{Location, Position, Url};
use tracing::{debug, warn};

use crate::index::pod_spec::{all_containers, pod_spec, volume_by_name, volumes};
use crate::index::payload::{CONFIG_MAP, SECRET};
use crate::index::{DEFAULT_NAMESPACE, ResourceRecord, normalize_namespace};
use crate::parser::YamlNode;
use crate::resolver::{
    Cursor, EmbeddedUri, NAMESPACE_KIND, PayloadKey, Resolver, dedupe_locations,
    filter_out_position, locate, payload_key, payload_sections, virtual_range,
};
use crate::rules::SymbolClass;

/// A ConfigMap or Secret projected into a volume
struct PayloadSource<'a> {
    kind: &'static str,
    name: &'a str,
    items: Option<&'a YamlNode>,
}

impl Resolver {
    /// Find-usages at `position` (0-based) of `text`, the body of `uri`.
    ///
    /// The query site itself is never part of the result.
    pub fn resolve_references(&self, text: &str, uri: &Url, position: Position) -> Vec<Location> {
        let documents = self.parse(text);
        let Some(cursor) = locate(&documents, position.line, position.character) else {
            return Vec::new();
        };

        // subPath results point into other files and at virtual files
        if let Some(locations) = self.sub_path_references(&cursor) {
            return locations;
        }

        let mut locations = self.collect_references(&cursor, uri);
        dedupe_locations(&mut locations);
        let locations = filter_out_position(locations, uri, position);
        // From a key, the paired value is the query site too
        match cursor.hit.key_value() {
            Some(value) => filter_out_position(locations, uri, value.range().start),
            None => locations,
        }
    }

    fn collect_references(&self, cursor: &Cursor, uri: &Url) -> Vec<Location> {
        if let Some(payload) = payload_key(cursor) {
            return self.payload_usages(&payload);
        }

        if let Some(locations) = claim_references(cursor, uri) {
            return locations;
        }

        let kind = cursor.kind();
        let path: Vec<&str> = cursor.hit.path.iter().map(String::as_str).collect();
        let node = cursor.hit.node;
        let document_namespace = cursor.document.namespace();

        match path.as_slice() {
            ["metadata", "name"] => {
                let name = cursor.document.name();
                let definition = self.store.get(kind, document_namespace, name);
                return self.gather(kind, name, definition);
            }
            ["metadata", "namespace"] => {
                let namespace = cursor.document.namespace();
                let definition = self.store.get(NAMESPACE_KIND, "", namespace);
                return self.gather(NAMESPACE_KIND, namespace, definition);
            }
            _ => {}
        }

        let rules = self.rules.read();
        let label_key = cursor.hit.last_segment().unwrap_or_default();

        if node.is_scalar()
            && rules
                .matching_symbols(kind, &cursor.hit.path, true)
                .contains(&&SymbolClass::Label)
        {
            return self.label_references(label_key, &node.value);
        }

        for rule in rules.matching_references(kind, &cursor.hit.path, true) {
            let locations = match &rule.symbol {
                SymbolClass::Label => {
                    let mut locations: Vec<Location> = self
                        .store
                        .find_by_label(label_key, &node.value)
                        .iter()
                        .map(|record| record.location())
                        .collect();
                    locations.extend(self.label_references(label_key, &node.value));
                    locations
                }
                SymbolClass::ResourceName if !rule.target_kind.is_empty() => {
                    let definition = self.lookup_target(
                        &rule.target_kind,
                        &node.value,
                        cursor.hit.parent,
                        document_namespace,
                    );
                    self.gather(&rule.target_kind, &node.value, definition)
                }
                _ => Vec::new(),
            };
            if !locations.is_empty() {
                return locations;
            }
        }

        Vec::new()
    }

    /// `definition` plus every stored usage of (`kind`, `name`)
    fn gather(
        &self,
        kind: &str,
        name: &str,
        definition: Option<Arc<ResourceRecord>>,
    ) -> Vec<Location> {
        let mut locations: Vec<Location> = definition.iter().map(|record| record.location()).collect();

        for record in self.store.find_referencing(kind, name) {
            locations.extend(
                record
                    .references
                    .iter()
                    .filter(|r| r.target_kind == kind && r.value == name)
                    .map(|r| record.reference_location(r)),
            );
        }
        debug!("Gathered {} locations for {} {}", locations.len(), kind, name);
        locations
    }

    /// Selector entries `key: value`
    fn label_references(&self, key: &str, value: &str) -> Vec<Location> {
        self.store
            .find_label_references(key, value)
            .iter()
            .flat_map(|record| {
                record
                    .references
                    .iter()
                    .filter(|r| r.symbol == SymbolClass::Label && r.key == key && r.value == value)
                    .map(|r| record.reference_location(r))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Workloads consuming a payload entry, whole-payload usages included
    fn payload_usages(&self, payload: &PayloadKey) -> Vec<Location> {
        let key = payload.key.value.as_str();
        self.store
            .find_referencing(payload.kind, &payload.name)
            .iter()
            .flat_map(|record| {
                record
                    .references
                    .iter()
                    .filter(|r| {
                        r.target_kind == payload.kind
                            && r.value == payload.name
                            && normalize_namespace(&r.namespace) == payload.namespace
                            && (r.key.is_empty() || r.key == key)
                    })
                    .map(|r| record.reference_location(r))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// `volumeMounts[].subPath` → payload key of the mounted ConfigMap or
    /// Secret, plus its virtual file
    fn sub_path_references(&self, cursor: &Cursor) -> Option<Vec<Location>> {
        let path = &cursor.hit.path;
        if !path.ends_with(&["volumeMounts".to_string(), "subPath".to_string()]) || cursor.hit.is_key() {
            return None;
        }
        let mount = cursor.hit.parent?;
        let sub_path = cursor.hit.node.value.as_str();
        let spec = pod_spec(cursor.root, cursor.kind())?;
        let volume = volume_by_name(spec, &mount.get_scalar("name")?.value)?;
        let namespace = cursor.document.namespace();

        for source in payload_sources(volume) {
            let Some(key) = key_from_items(source.items, sub_path) else {
                continue;
            };
            let Some(record) = self
                .store
                .get(source.kind, namespace, source.name)
                .or_else(|| self.store.get(source.kind, DEFAULT_NAMESPACE, source.name))
            else {
                debug!("{} {} is not indexed", source.kind, source.name);
                continue;
            };
            if let Some(locations) = self.payload_key_locations(&record, &key) {
                return Some(locations);
            }
        }
        None
    }

    /// Key token of `key` inside the file that defines `record`, and the
    /// matching virtual file
    fn payload_key_locations(&self, record: &Arc<ResourceRecord>, key: &str) -> Option<Vec<Location>> {
        let path = record.uri.to_file_path().ok()?;
        let text = std::fs::read_to_string(&path)
            .inspect_err(|e| warn!("Failed to read {:?}: {}", path, e))
            .ok()?;
        let documents = self.parse(&text);
        let root = documents
            .iter()
            .find(|document| {
                document.kind() == record.kind
                    && document.name() == record.name
                    && normalize_namespace(document.namespace()) == normalize_namespace(&record.namespace)
            })?
            .root_mapping()?;

        let key_node = payload_sections(&record.kind)
            .iter()
            .find_map(|section| root.get(section)?.get_key(key))?;

        let embedded = EmbeddedUri::new(
            normalize_namespace(&record.namespace),
            &record.name,
            key,
            &record.uri,
        );
        let virtual_uri = embedded
            .to_url()
            .inspect_err(|e| warn!("Failed to build embedded file URI: {}", e))
            .ok()?;

        Some(vec![
            Location {
                uri: record.uri.clone(),
                range: key_node.range(),
            },
            Location {
                uri: virtual_uri,
                range: virtual_range(),
            },
        ])
    }
}

/// ConfigMaps and Secrets a volume mounts, directly or projected
fn payload_sources(volume: &YamlNode) -> Vec<PayloadSource<'_>> {
    let mut sources = vec![
        payload_source(CONFIG_MAP, volume.get("configMap"), "name"),
        payload_source(SECRET, volume.get("secret"), "secretName"),
    ];
    if let Some(projected) = volume.get_path(&["projected", "sources"]) {
        for source in projected.items() {
            sources.push(payload_source(CONFIG_MAP, source.get("configMap"), "name"));
            sources.push(payload_source(SECRET, source.get("secret"), "name"));
        }
    }
    sources.into_iter().flatten().collect()
}

fn payload_source<'a>(
    kind: &'static str,
    node: Option<&'a YamlNode>,
    name_field: &str,
) -> Option<PayloadSource<'a>> {
    let node = node?;
    Some(PayloadSource {
        kind,
        name: &node.get_scalar(name_field)?.value,
        items: node.get("items"),
    })
}

/// Payload key mounted as file `sub_path`: verbatim without `items`,
/// otherwise the item whose `path` (or `key`) is `sub_path`.
fn key_from_items(items: Option<&YamlNode>, sub_path: &str) -> Option<String> {
    let Some(items) = items.filter(|items| items.is_sequence()) else {
        return Some(sub_path.to_string());
    };

    items.items().iter().find_map(|item| {
        let key = item.get_scalar("key")?;
        let file_name = item.get_scalar("path").unwrap_or(key);
        (file_name.value == sub_path).then(|| key.value.clone())
    })
}

/// `persistentVolumeClaim.claimName` → volumes bound to the claim and the
/// mounts using them
fn claim_references(cursor: &Cursor, uri: &Url) -> Option<Vec<Location>> {
    let path = &cursor.hit.path;
    let suffix = ["volumes", "persistentVolumeClaim", "claimName"].map(String::from);
    if !path.ends_with(&suffix) || cursor.hit.is_key() {
        return None;
    }
    let claim = cursor.hit.node.value.as_str();
    let spec = pod_spec(cursor.root, cursor.kind())?;

    let mut locations = Vec::new();
    let mut names = HashSet::new();
    for volume in volumes(spec) {
        let bound = volume
            .get_path(&["persistentVolumeClaim", "claimName"])
            .is_some_and(|name| name.value == claim);
        if let Some(name) = volume.get_scalar("name").filter(|_| bound) {
            names.insert(name.value.as_str());
            locations.push(Location {
                uri: uri.clone(),
                range: name.range(),
            });
        }
    }

    for container in all_containers(spec) {
        let mounts = container.get("volumeMounts").map(|m| m.items()).unwrap_or(&[]);
        for name in mounts.iter().filter_map(|mount| mount.get_scalar("name")) {
            if names.contains(name.value.as_str()) {
                locations.push(Location {
                    uri: uri.clone(),
                    range: name.range(),
                });
            }
        }
    }
    Some(locations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::{resolver, uri};
    use rstest::rstest;
    use std::io::Write;
    use std::path::Path;

    const SERVICE: &str = r#"apiVersion: v1
kind: Service
metadata:
  name: my-service
spec:
  selector:
    app: web
"#;

    const INGRESS: &str = r#"kind: Ingress
metadata:
  name: entry
spec:
  rules:
    - http:
        paths:
          - backend:
              service:
                name: my-service
"#;

    const CONFIG_MAP_DOC: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: app-config
data:
  a.conf: |
    x=1
  b.conf: |
    y=2
"#;

    const WORKLOAD: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  labels:
    app: web
spec:
  template:
    spec:
      containers:
        - name: app
          env:
            - name: LEVEL
              valueFrom:
                configMapKeyRef:
                  name: app-config
                  key: a.conf
          volumeMounts:
            - name: config
              mountPath: /etc/app/a.conf
              subPath: a.conf
            - name: data
              mountPath: /data
      initContainers:
        - name: init
          volumeMounts:
            - name: data
              mountPath: /seed
      volumes:
        - name: config
          configMap:
            name: app-config
        - name: data
          persistentVolumeClaim:
            claimName: storage
"#;

    fn position(line: u32, character: u32) -> Position {
        Position { line, character }
    }

    #[test]
    fn resolve_references_from_definition_lists_usages() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/service.yaml"), SERVICE);
        indexer.index_content(Path::new("/tmp/ingress.yaml"), INGRESS);

        let locations =
            resolver.resolve_references(SERVICE, &uri("/tmp/service.yaml"), position(3, 10));

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri, uri("/tmp/ingress.yaml"));
        assert_eq!(locations[0].range.start, position(9, 22));
    }

    #[test]
    fn resolve_references_from_usage_includes_definition() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/service.yaml"), SERVICE);
        indexer.index_content(Path::new("/tmp/ingress.yaml"), INGRESS);
        indexer.index_content(
            Path::new("/tmp/ingress-2.yaml"),
            &INGRESS.replace("name: entry", "name: entry-2"),
        );

        let locations =
            resolver.resolve_references(INGRESS, &uri("/tmp/ingress.yaml"), position(9, 24));

        let uris: Vec<&str> = locations.iter().map(|l| l.uri.path()).collect();
        assert_eq!(uris, ["/tmp/service.yaml", "/tmp/ingress-2.yaml"]);
    }

    #[test]
    fn resolve_references_from_name_key_matches_value() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/service.yaml"), SERVICE);
        indexer.index_content(Path::new("/tmp/ingress.yaml"), INGRESS);

        let locations =
            resolver.resolve_references(SERVICE, &uri("/tmp/service.yaml"), position(3, 3));

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri, uri("/tmp/ingress.yaml"));
        assert_eq!(locations[0].range.start, position(9, 22));
    }

    #[test]
    fn resolve_references_falls_back_to_default_namespace_definition() {
        let (resolver, indexer) = resolver();
        indexer.index_content(
            Path::new("/tmp/sa.yaml"),
            "kind: ServiceAccount\nmetadata:\n  name: runner\n",
        );
        let text = "kind: Deployment\nmetadata:\n  name: job\n  namespace: batch\nspec:\n  template:\n    spec:\n      serviceAccountName: runner\n";
        indexer.index_content(Path::new("/tmp/job.yaml"), text);

        let locations = resolver.resolve_references(text, &uri("/tmp/job.yaml"), position(7, 28));

        let uris: Vec<&str> = locations.iter().map(|l| l.uri.path()).collect();
        assert_eq!(uris, ["/tmp/sa.yaml"]);
        assert_eq!(locations[0].range.start, position(2, 8));
    }

    #[test]
    fn resolve_references_from_other_document_counts_every_usage() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/service.yaml"), SERVICE);
        indexer.index_content(Path::new("/tmp/ingress.yaml"), INGRESS);
        indexer.index_content(
            Path::new("/tmp/ingress-2.yaml"),
            &INGRESS.replace("name: entry", "name: entry-2"),
        );

        let locations =
            resolver.resolve_references(SERVICE, &uri("/tmp/copy.yaml"), position(3, 10));

        assert_eq!(locations.len(), 3);
    }

    #[test]
    fn resolve_references_lists_payload_usages() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/cm.yaml"), CONFIG_MAP_DOC);
        indexer.index_content(Path::new("/tmp/web.yaml"), WORKLOAD);

        let locations =
            resolver.resolve_references(CONFIG_MAP_DOC, &uri("/tmp/cm.yaml"), position(5, 4));

        // env name + env key + whole-volume reference
        assert_eq!(locations.len(), 3);
        assert!(locations.iter().all(|l| l.uri == uri("/tmp/web.yaml")));
        assert!(locations.iter().any(|l| l.range.start == position(16, 23)));
    }

    #[test]
    fn resolve_references_skips_usages_of_other_keys() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/cm.yaml"), CONFIG_MAP_DOC);
        indexer.index_content(Path::new("/tmp/web.yaml"), WORKLOAD);

        let locations =
            resolver.resolve_references(CONFIG_MAP_DOC, &uri("/tmp/cm.yaml"), position(7, 4));

        assert!(locations.iter().all(|l| l.range.start != position(16, 23)));
        assert_eq!(locations.len(), 2);
    }

    #[test]
    fn resolve_references_follows_sub_path_to_payload_key() {
        let dir = tempfile::tempdir().unwrap();
        let cm_path = dir.path().join("cm.yaml");
        std::fs::File::create(&cm_path)
            .unwrap()
            .write_all(CONFIG_MAP_DOC.as_bytes())
            .unwrap();
        let (resolver, indexer) = resolver();
        assert!(indexer.index_file(&cm_path));

        let locations =
            resolver.resolve_references(WORKLOAD, &uri("/tmp/web.yaml"), position(20, 23));

        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].uri, Url::from_file_path(&cm_path).unwrap());
        assert_eq!(locations[0].range.start, position(5, 2));
        assert_eq!(locations[1].uri.scheme(), "k8s-embedded");
        assert_eq!(locations[1].uri.path(), "/app-config/a.conf");
    }

    #[test]
    fn resolve_references_collects_claim_mounts() {
        let (resolver, _) = resolver();

        let locations =
            resolver.resolve_references(WORKLOAD, &uri("/tmp/web.yaml"), position(34, 25));

        let lines: Vec<u32> = locations.iter().map(|l| l.range.start.line).collect();
        assert_eq!(lines, [32, 21, 26]);
    }

    #[test]
    fn resolve_references_on_namespace_gathers_namespace_usages() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/ns.yaml"), "kind: Namespace\nmetadata:\n  name: prod\n");
        let service = "kind: Service\nmetadata:\n  name: api\n  namespace: prod\n";
        indexer.index_content(Path::new("/tmp/api.yaml"), service);

        let locations = resolver.resolve_references(service, &uri("/tmp/other.yaml"), position(3, 14));

        let uris: Vec<&str> = locations.iter().map(|l| l.uri.path()).collect();
        assert_eq!(uris, ["/tmp/ns.yaml", "/tmp/api.yaml"]);
    }

    #[test]
    fn resolve_references_on_label_lists_selectors() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/service.yaml"), SERVICE);

        let locations =
            resolver.resolve_references(WORKLOAD, &uri("/tmp/web.yaml"), position(5, 10));

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri, uri("/tmp/service.yaml"));
        assert_eq!(locations[0].range.start, position(6, 9));
    }

    #[test]
    fn resolve_references_on_selector_lists_labelled_resources() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/web.yaml"), WORKLOAD);

        let locations =
            resolver.resolve_references(SERVICE, &uri("/tmp/service.yaml"), position(6, 10));

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri, uri("/tmp/web.yaml"));
    }

    #[rstest]
    #[case(None, "a.conf", Some("a.conf"))]
    #[case(Some("items:\n  - key: a.conf\n    path: main.conf\n"), "main.conf", Some("a.conf"))]
    #[case(Some("items:\n  - key: a.conf\n"), "a.conf", Some("a.conf"))]
    #[case(Some("items:\n  - key: a.conf\n    path: main.conf\n"), "a.conf", None)]
    fn key_from_items_maps_file_names(
        #[case] items: Option<&str>,
        #[case] sub_path: &str,
        #[case] expected: Option<&str>,
    ) {
        let docs = items.map(|items| crate::parser::parse_documents(items).unwrap());
        let node = docs
            .as_ref()
            .and_then(|docs| docs[0].root_mapping())
            .and_then(|root| root.get("items"));

        assert_eq!(key_from_items(node, sub_path).as_deref(), expected);
    }
}
