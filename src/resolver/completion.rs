use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Position};
use tracing::debug;

use crate::index::normalize_namespace;
use crate::resolver::{Resolver, locate};
use crate::rules::SymbolClass;

impl Resolver {
    /// Names of stored resources for the resource-name reference under the
    /// cursor, including an unwritten value right after `key: `
    pub fn completion(&self, text: &str, position: Position) -> Vec<CompletionItem> {
        let documents = self.parse(text);
        let Some(cursor) = locate(&documents, position.line, position.character) else {
            return Vec::new();
        };

        let rules = self.rules.read();
        let Some(rule) = rules
            .matching_references(cursor.kind(), &cursor.hit.path, false)
            .into_iter()
            .find(|rule| rule.symbol == SymbolClass::ResourceName && !rule.target_kind.is_empty())
        else {
            return Vec::new();
        };

        let items: Vec<CompletionItem> = self
            .store
            .list_by_kind(&rule.target_kind)
            .iter()
            .map(|record| CompletionItem {
                label: record.name.clone(),
                kind: Some(CompletionItemKind::REFERENCE),
                detail: Some(format!("Namespace: {}", normalize_namespace(&record.namespace))),
                ..Default::default()
            })
            .collect();
        debug!(
            "{} completion items for {} ({})",
            items.len(),
            rule.target_kind,
            rule.name
        );
        items
    }
}
