//! Unresolved-reference and unmatched-selector warnings

use std::path::Path;
use std::sync::Arc;

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity};
use tracing::{debug, info, warn};

use crate::diagnostics::types::{Check, CheckType, ValidationConfig, ValidationRule};
use crate::index::{DEFAULT_NAMESPACE, Store, normalize_namespace};
use crate::parser::{DocumentParser, TreeSitterYamlParser, YamlNode};
use crate::rules::RulesError;

pub const DIAGNOSTIC_SOURCE: &str = "k8s-lsp";

pub struct DiagnosticsEngine {
    rules: Vec<ValidationRule>,
    store: Arc<Store>,
    parser: Arc<dyn DocumentParser>,
}

/// Decode a validation file; an empty file has no rules
pub fn load_validation_file(path: &Path) -> Result<ValidationConfig, RulesError> {
    let content = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(ValidationConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|source| RulesError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

impl DiagnosticsEngine {
    pub fn new(config: ValidationConfig, store: Arc<Store>) -> Self {
        Self::with_parser(config, store, Arc::new(TreeSitterYamlParser::new()))
    }

    pub fn with_parser(
        config: ValidationConfig,
        store: Arc<Store>,
        parser: Arc<dyn DocumentParser>,
    ) -> Self {
        Self {
            rules: config.rules,
            store,
            parser,
        }
    }

    /// Engine for `path`; missing or broken files give an engine without
    /// checks
    pub fn load(path: &Path, store: Arc<Store>) -> Self {
        let config = if path.is_file() {
            load_validation_file(path)
                .inspect_err(|e| warn!("Ignoring validation rules: {}", e))
                .unwrap_or_default()
        } else {
            debug!("No validation rules at {:?}", path);
            ValidationConfig::default()
        };
        info!("Loaded {} validation rules", config.rules.len());
        Self::new(config, store)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Warnings for every sub-document of `content`
    pub fn validate(&self, content: &str) -> Vec<Diagnostic> {
        let documents = self
            .parser
            .parse(content)
            .inspect_err(|e| warn!("Failed to parse document: {}", e))
            .unwrap_or_default();

        let mut diagnostics = Vec::new();
        for document in &documents {
            let Some(root) = document.root_mapping() else {
                continue;
            };
            let kind = document.kind();
            let namespace = normalize_namespace(document.namespace());

            let checks = self
                .rules
                .iter()
                .filter(|rule| rule.kind == kind)
                .flat_map(|rule| &rule.checks)
                .filter(|check| check.check_type == CheckType::Reference);
            for check in checks {
                diagnostics.extend(self.check_reference(root, check, namespace));
            }
        }
        debug!("Produced {} diagnostics", diagnostics.len());
        diagnostics
    }

    fn check_reference(&self, root: &YamlNode, check: &Check, namespace: &str) -> Vec<Diagnostic> {
        find_nodes(root, &check.path)
            .into_iter()
            .filter_map(|node| {
                if node.is_scalar() {
                    if self.resolves(&check.target_kind, namespace, &node.value) {
                        return None;
                    }
                    let message = format!(
                        "{} (Kind: {}, Name: {})",
                        check.message, check.target_kind, node.value
                    );
                    return Some(warning(node, message));
                }

                if node.is_mapping() {
                    let selector: Vec<(&str, &str)> = node
                        .entries()
                        .map(|(k, v)| (k.value.as_str(), v.value.as_str()))
                        .collect();
                    if selector.is_empty() || self.selector_matches(&check.target_kind, &selector) {
                        return None;
                    }
                    let message = format!("{} (Kind: {})", check.message, check.target_kind);
                    return Some(warning(node, message));
                }
                None
            })
            .collect()
    }

    fn resolves(&self, kind: &str, namespace: &str, name: &str) -> bool {
        self.store.get(kind, namespace, name).is_some()
            || (namespace != DEFAULT_NAMESPACE
                && self.store.get(kind, DEFAULT_NAMESPACE, name).is_some())
    }

    /// Some stored resource of `kind` carries every selector pair
    fn selector_matches(&self, kind: &str, selector: &[(&str, &str)]) -> bool {
        self.store.list_by_kind(kind).iter().any(|record| {
            selector
                .iter()
                .all(|(key, value)| record.labels.get(*key).is_some_and(|v| v == value))
        })
    }
}

fn warning(node: &YamlNode, message: String) -> Diagnostic {
    Diagnostic {
        range: node.range(),
        severity: Some(DiagnosticSeverity::WARNING),
        message,
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        ..Default::default()
    }
}

/// Nodes at dotted `path`; sequences are searched element-wise and `*`
/// selects every element.
pub fn find_nodes<'a>(root: &'a YamlNode, path: &str) -> Vec<&'a YamlNode> {
    let mut current = vec![root];
    for part in path.split('.') {
        let mut next = Vec::new();
        for node in current {
            if node.is_mapping() {
                next.extend(node.entries().filter(|(k, _)| k.value == part).map(|(_, v)| v));
            } else if node.is_sequence() {
                if part == "*" {
                    next.extend(node.items());
                } else {
                    next.extend(node.items().iter().filter_map(|item| item.get(part)));
                }
            }
        }
        if next.is_empty() {
            return Vec::new();
        }
        current = next;
    }
    current
}
