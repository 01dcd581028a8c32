use serde_json::json;
use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position, Range, Url};
use tracing::warn;

use crate::index::{ResourceRecord, normalize_namespace};
use crate::resolver::{Cursor, Resolver, locate, payload_key};
use crate::rules::SymbolClass;

pub const OPEN_EMBEDDED_FILE_COMMAND: &str = "k8sLsp.openEmbeddedFile";
pub const FIND_EMBEDDED_FILE_USAGES_COMMAND: &str = "k8sLsp.findEmbeddedFileUsages";

impl Resolver {
    pub fn resolve_hover(&self, text: &str, uri: &Url, position: Position) -> Option<Hover> {
        let documents = self.parse(text);
        let cursor = locate(&documents, position.line, position.character)?;
        let range = cursor.hit.node.range();

        if let Some(payload) = payload_key(&cursor) {
            let embedded = payload
                .embedded_uri(uri)
                .to_url()
                .inspect_err(|e| warn!("Failed to build embedded file URI: {}", e))
                .ok()?;
            return Some(markdown(
                embedded_file_markdown(&payload.key.value, &embedded, uri, position),
                range,
            ));
        }

        let record = self.hovered_resource(&cursor)?;
        Some(markdown(resource_markdown(&record), range))
    }

    /// Target of the first resource-name reference rule that resolves
    fn hovered_resource(&self, cursor: &Cursor) -> Option<std::sync::Arc<ResourceRecord>> {
        let node = cursor.hit.node;
        if !node.is_scalar() || cursor.hit.is_key() {
            return None;
        }

        let rules = self.rules.read();
        rules
            .matching_references(cursor.kind(), &cursor.hit.path, false)
            .into_iter()
            .filter(|rule| rule.symbol == SymbolClass::ResourceName && !rule.target_kind.is_empty())
            .find_map(|rule| {
                self.lookup_target(
                    &rule.target_kind,
                    &node.value,
                    cursor.hit.parent,
                    cursor.document.namespace(),
                )
            })
    }
}

fn markdown(value: String, range: Range) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(range),
    }
}

fn embedded_file_markdown(key: &str, embedded: &Url, uri: &Url, position: Position) -> String {
    let open = json!({ "uri": embedded.as_str() }).to_string();
    let usages = json!({
        "uri": uri.as_str(),
        "position": { "line": position.line, "character": position.character },
    })
    .to_string();

    format!(
        "Embedded File: **{}**\n\n[Open File](command:{}?{}) · [Find Usages](command:{}?{})",
        key,
        OPEN_EMBEDDED_FILE_COMMAND,
        urlencoding::encode(&open),
        FIND_EMBEDDED_FILE_USAGES_COMMAND,
        urlencoding::encode(&usages),
    )
}

fn resource_markdown(record: &ResourceRecord) -> String {
    let file = record
        .uri
        .to_file_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| record.uri.to_string());
    format!(
        "**{}**\n\nKind: {}\nNamespace: {}\nFile: {}",
        record.name,
        record.kind,
        normalize_namespace(&record.namespace),
        file
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::{resolver, uri};
    use std::path::Path;

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

    fn value(hover: Hover) -> String {
        match hover.contents {
            HoverContents::Markup(markup) => markup.value,
            other => panic!("unexpected hover contents {:?}", other),
        }
    }

    #[test]
    fn resolve_hover_summarizes_referenced_resource() {
        let (resolver, indexer) = resolver();
        indexer.index_content(
            Path::new("/tmp/service.yaml"),
            "kind: Service\nmetadata:\n  name: my-service\n",
        );

        let hover = resolver
            .resolve_hover(INGRESS, &uri("/tmp/ingress.yaml"), Position { line: 9, character: 24 })
            .unwrap();

        assert_eq!(
            value(hover),
            "**my-service**\n\nKind: Service\nNamespace: default\nFile: /tmp/service.yaml"
        );
    }

    #[test]
    fn resolve_hover_links_embedded_file_commands() {
        let (resolver, _) = resolver();
        let text = "kind: ConfigMap\nmetadata:\n  name: settings\ndata:\n  app.conf: |\n    a=1\n";

        let hover = resolver
            .resolve_hover(text, &uri("/tmp/cm.yaml"), Position { line: 4, character: 3 })
            .unwrap();
        let value = value(hover);

        assert!(value.starts_with("Embedded File: **app.conf**\n\n[Open File](command:k8sLsp.openEmbeddedFile?"));
        assert!(value.contains("%22uri%22%3A%22k8s-embedded%3A%2F%2Fdefault%2Fsettings%2Fapp.conf"));
        assert!(value.contains("[Find Usages](command:k8sLsp.findEmbeddedFileUsages?"));
        assert!(value.contains("%22line%22%3A4"));
    }

    #[test]
    fn resolve_hover_on_unresolved_reference_is_none() {
        let (resolver, _) = resolver();

        let hover =
            resolver.resolve_hover(INGRESS, &uri("/tmp/ingress.yaml"), Position { line: 9, character: 24 });

        assert!(hover.is_none());
    }

    #[test]
    fn resolve_hover_on_plain_field_is_none() {
        let (resolver, _) = resolver();

        let hover =
            resolver.resolve_hover(INGRESS, &uri("/tmp/ingress.yaml"), Position { line: 2, character: 9 });

        assert!(hover.is_none());
    }
}
