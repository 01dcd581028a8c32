use tower_lsp::lsp_types::{LocationLink, Position, Range, Url};
use tracing::{debug, warn};

use crate::index::pod_spec::{pod_spec, volume_by_name};
use crate::rules::SymbolClass;
use crate::resolver::{Cursor, Resolver, locate, payload_key, virtual_range};

impl Resolver {
    /// Go-to-definition at `position` (0-based) of `text`, the body of `uri`
    pub fn resolve_definition(&self, text: &str, uri: &Url, position: Position) -> Vec<LocationLink> {
        let documents = self.parse(text);
        let Some(cursor) = locate(&documents, position.line, position.character) else {
            debug!("No node at {}:{}", position.line, position.character);
            return Vec::new();
        };
        let origin = cursor.hit.node.range();

        if let Some(link) = self.volume_mount_definition(&cursor, uri) {
            return vec![link];
        }

        if let Some(payload) = payload_key(&cursor) {
            return match payload.embedded_uri(uri).to_url() {
                Ok(target) => vec![link(origin, target, virtual_range())],
                Err(e) => {
                    warn!("Failed to build embedded file URI: {}", e);
                    Vec::new()
                }
            };
        }

        let kind = cursor.kind();
        let path = &cursor.hit.path;
        let rules = self.rules.read();

        if !rules.matching_symbols(kind, path, false).is_empty() {
            debug!("{:?} is a definition site of {}", path, kind);
            return vec![link(origin, uri.clone(), origin)];
        }

        let node = cursor.hit.node;
        for rule in rules.matching_references(kind, path, true) {
            match &rule.symbol {
                SymbolClass::Label => {
                    let Some(label_key) = cursor.hit.last_segment() else {
                        continue;
                    };
                    return self
                        .store
                        .find_by_label(label_key, &node.value)
                        .iter()
                        .map(|record| link(origin, record.uri.clone(), record.range))
                        .collect();
                }
                SymbolClass::ResourceName if !rule.target_kind.is_empty() => {
                    if let Some(record) = self.lookup_target(
                        &rule.target_kind,
                        &node.value,
                        cursor.hit.parent,
                        cursor.document.namespace(),
                    ) {
                        return vec![link(origin, record.uri.clone(), record.range)];
                    }
                }
                _ => {}
            }
        }

        Vec::new()
    }

    /// `volumeMounts[].name` → `volumes[].name` in the same document
    fn volume_mount_definition(&self, cursor: &Cursor, uri: &Url) -> Option<LocationLink> {
        let path = &cursor.hit.path;
        if !path.ends_with(&["volumeMounts".to_string(), "name".to_string()]) || cursor.hit.is_key() {
            return None;
        }

        let spec = pod_spec(cursor.root, cursor.kind())?;
        let volume = volume_by_name(spec, &cursor.hit.node.value)?;
        let name = volume.get_scalar("name")?;
        Some(link(cursor.hit.node.range(), uri.clone(), name.range()))
    }
}

fn link(origin: Range, target_uri: Url, target_range: Range) -> LocationLink {
    LocationLink {
        origin_selection_range: Some(origin),
        target_uri,
        target_range,
        target_selection_range: target_range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::{resolver, uri};
    use std::path::Path;

    const SERVICE: &str = r#"apiVersion: v1
kind: Service
metadata:
  name: my-service
spec:
  selector:
    app: web
"#;

    const INGRESS: &str = r#"apiVersion: networking.k8s.io/v1
kind: Ingress
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

    const DEPLOYMENT: &str = r#"apiVersion: apps/v1
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
          volumeMounts:
            - name: config
              mountPath: /etc/app
      volumes:
        - name: config
          configMap:
            name: settings
"#;

    fn position(line: u32, character: u32) -> Position {
        Position { line, character }
    }

    #[test]
    fn resolve_definition_follows_resource_name_reference() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/service.yaml"), SERVICE);

        let links = resolver.resolve_definition(INGRESS, &uri("/tmp/ingress.yaml"), position(10, 24));

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_uri, uri("/tmp/service.yaml"));
        assert_eq!(links[0].target_range.start, position(3, 8));
        assert_eq!(links[0].origin_selection_range.unwrap().start, position(10, 22));
    }

    #[test]
    fn resolve_definition_after_multibyte_text_on_the_line() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/service.yaml"), SERVICE);
        let text = "kind: Ingress\nspec:\n  rules:\n    - http:\n        paths:\n          - backend:\n              service: {x: é, name: my-service}\n";

        let links = resolver.resolve_definition(text, &uri("/tmp/ingress.yaml"), position(6, 36));

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_uri, uri("/tmp/service.yaml"));
        let origin = links[0].origin_selection_range.unwrap();
        assert_eq!((origin.start, origin.end), (position(6, 36), position(6, 46)));
    }

    #[test]
    fn resolve_definition_on_name_points_at_itself() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/service.yaml"), SERVICE);

        let links = resolver.resolve_definition(SERVICE, &uri("/tmp/service.yaml"), position(3, 10));

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_uri, uri("/tmp/service.yaml"));
        assert_eq!(links[0].target_range, links[0].origin_selection_range.unwrap());
    }

    #[test]
    fn resolve_definition_fans_out_over_label_selector() {
        let (resolver, indexer) = resolver();
        indexer.index_content(Path::new("/tmp/deploy.yaml"), DEPLOYMENT);
        indexer.index_content(
            Path::new("/tmp/pod.yaml"),
            "kind: Pod\nmetadata:\n  name: single\n  labels:\n    app: web\n",
        );

        let links = resolver.resolve_definition(SERVICE, &uri("/tmp/service.yaml"), position(6, 10));

        assert_eq!(links.len(), 2);
    }

    #[test]
    fn resolve_definition_on_unmatched_selector_is_empty() {
        let (resolver, _) = resolver();

        let links = resolver.resolve_definition(SERVICE, &uri("/tmp/service.yaml"), position(6, 10));

        assert!(links.is_empty());
    }

    #[test]
    fn resolve_definition_jumps_from_mount_to_volume() {
        let (resolver, _) = resolver();

        let links = resolver.resolve_definition(DEPLOYMENT, &uri("/tmp/deploy.yaml"), position(12, 22));

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_uri, uri("/tmp/deploy.yaml"));
        assert_eq!(links[0].target_range.start, position(15, 16));
    }

    #[test]
    fn resolve_definition_opens_embedded_file() {
        let (resolver, _) = resolver();
        let text = "kind: ConfigMap\nmetadata:\n  name: settings\n  namespace: prod\ndata:\n  app.conf: |\n    a=1\n";

        let links = resolver.resolve_definition(text, &uri("/tmp/cm.yaml"), position(5, 4));

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_uri.scheme(), "k8s-embedded");
        assert_eq!(links[0].target_uri.host_str(), Some("prod"));
        assert_eq!(links[0].target_uri.path(), "/settings/app.conf");
        assert_eq!(links[0].target_range, Range::default());
    }

    #[test]
    fn resolve_definition_falls_back_to_default_namespace() {
        let (resolver, indexer) = resolver();
        indexer.index_content(
            Path::new("/tmp/sa.yaml"),
            "kind: ServiceAccount\nmetadata:\n  name: runner\n",
        );
        let text = "kind: Deployment\nmetadata:\n  name: job\n  namespace: batch\nspec:\n  template:\n    spec:\n      serviceAccountName: runner\n";

        let links = resolver.resolve_definition(text, &uri("/tmp/job.yaml"), position(7, 28));

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_uri, uri("/tmp/sa.yaml"));
    }

    #[test]
    fn resolve_definition_outside_nodes_is_empty() {
        let (resolver, _) = resolver();

        assert!(resolver
            .resolve_definition(SERVICE, &uri("/tmp/service.yaml"), position(40, 0))
            .is_empty());
    }
}
