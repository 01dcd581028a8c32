//! Builds [`ResourceRecord`]s from manifest files and feeds the [`Store`]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use tower_lsp::lsp_types::{Range, Url};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::index::error::IndexError;
use crate::index::payload::extract_payload_references;
use crate::index::store::Store;
use crate::index::types::{Reference, ResourceRecord, normalize_namespace, path_to_uri};
use crate::parser::{DocumentParser, TreeSitterYamlParser, YamlDocument, YamlNode, visit};
use crate::rules::{ReferenceRule, Rules, SymbolClass, is_yaml_file};

/// Kind whose documents declare new kinds
pub const CRD_KIND: &str = "CustomResourceDefinition";

pub struct Indexer {
    store: Arc<Store>,
    rules: Arc<Rules>,
    parser: Arc<dyn DocumentParser>,
}

impl Indexer {
    pub fn new(store: Arc<Store>, rules: Arc<Rules>) -> Self {
        Self::with_parser(store, rules, Arc::new(TreeSitterYamlParser::new()))
    }

    pub fn with_parser(
        store: Arc<Store>,
        rules: Arc<Rules>,
        parser: Arc<dyn DocumentParser>,
    ) -> Self {
        Self {
            store,
            rules,
            parser,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn rules(&self) -> &Arc<Rules> {
        &self.rules
    }

    /// Index every YAML file below `root`, skipping hidden directories.
    ///
    /// Returns whether at least one resource was indexed.
    pub fn scan_workspace(&self, root: &Path) -> bool {
        info!("Scanning workspace {:?}", root);
        let mut files_found = 0usize;
        let mut files_indexed = 0usize;

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to walk workspace entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_yaml_file(entry.path()) {
                continue;
            }
            files_found += 1;
            if self.index_file(entry.path()) {
                files_indexed += 1;
            }
        }

        info!(
            "Workspace scan completed: {} files found, {} indexed, {} resources in store",
            files_found,
            files_indexed,
            self.store.len()
        );
        files_indexed > 0
    }

    /// Read and index one file
    pub fn index_file(&self, path: &Path) -> bool {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(source) => {
                let e = IndexError::Io {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{}", e);
                return false;
            }
        };
        self.index_content(path, &content)
    }

    /// Index `content` as the body of `path`
    pub fn index_content(&self, path: &Path, content: &str) -> bool {
        self.try_index_content(path, content)
            .inspect_err(|e| warn!("{}", e))
            .unwrap_or(false)
    }

    fn try_index_content(&self, path: &Path, content: &str) -> Result<bool, IndexError> {
        let uri = path_to_uri(path).ok_or_else(|| IndexError::InvalidPath(path.to_path_buf()))?;
        let documents = self
            .parser
            .parse(content)
            .map_err(|source| IndexError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut indexed = false;
        for document in &documents {
            if let Some(record) = self.index_document(document, &uri) {
                debug!(
                    "Indexed {} {} from {:?}",
                    record.kind, record.name, path
                );
                self.store.add(record);
                indexed = true;
            }
        }
        Ok(indexed)
    }

    /// Extract the record of one sub-document; `None` when it has no name
    pub(crate) fn index_document(
        &self,
        document: &YamlDocument,
        uri: &Url,
    ) -> Option<ResourceRecord> {
        let root = document.root_mapping()?;
        let kind = document.kind();
        if kind.is_empty() {
            return None;
        }

        if kind == CRD_KIND {
            self.register_custom_kind(root);
        }

        let namespace = normalize_namespace(document.namespace()).to_string();
        let mut record = ResourceRecord {
            api_version: document.api_version().to_string(),
            kind: kind.to_string(),
            name: String::new(),
            namespace: document.namespace().to_string(),
            labels: IndexMap::new(),
            references: Vec::new(),
            uri: uri.clone(),
            range: Range::default(),
        };

        {
            let rules = self.rules.read();
            visit(root, &mut |node, parent, path| {
                for symbol in rules.matching_symbols(kind, path, false) {
                    match symbol {
                        SymbolClass::ResourceName if node.is_scalar() => {
                            record.name = node.value.clone();
                            record.range = node.range();
                        }
                        SymbolClass::Label => {
                            for (key, value) in node.entries() {
                                record.labels.insert(key.value.clone(), value.value.clone());
                            }
                        }
                        _ => {}
                    }
                }

                for rule in rules.matching_references(kind, path, false) {
                    if rule.symbol.is_label() && node.is_mapping() {
                        for (key, value) in node.entries() {
                            record.references.push(Reference {
                                target_kind: rule.target_kind.clone(),
                                value: value.value.clone(),
                                namespace: namespace.clone(),
                                symbol: SymbolClass::Label,
                                key: key.value.clone(),
                                range: value.range(),
                            });
                        }
                        continue;
                    }
                    if !node.is_scalar() {
                        continue;
                    }
                    record.references.push(Reference {
                        target_kind: rule.target_kind.clone(),
                        value: node.value.clone(),
                        namespace: reference_namespace(rule, parent, &namespace),
                        symbol: rule.symbol.clone(),
                        key: String::new(),
                        range: node.range(),
                    });
                }
            });
        }

        record
            .references
            .extend(extract_payload_references(root, kind, &namespace));
        dedupe_references(&mut record.references);

        if record.name.is_empty() {
            debug!("Skipping {} without a name in {}", kind, uri);
            return None;
        }
        Some(record)
    }

    /// Register `spec.names.kind` of a CustomResourceDefinition
    fn register_custom_kind(&self, root: &YamlNode) {
        let Some(custom_kind) = root
            .get_path(&["spec", "names", "kind"])
            .filter(|node| node.is_scalar() && !node.value.is_empty())
        else {
            return;
        };
        self.rules.register_kind(&custom_kind.value);
    }
}

/// Namespace a rule-driven usage resolves in: a sibling `namespace` field
/// wins over the document's; `Namespace` targets have none.
fn reference_namespace(rule: &ReferenceRule, parent: Option<&YamlNode>, document_namespace: &str) -> String {
    if rule.target_kind == "Namespace" {
        return String::new();
    }
    parent
        .and_then(|parent| parent.get_scalar("namespace"))
        .filter(|ns| !ns.value.is_empty())
        .map(|ns| ns.value.clone())
        .unwrap_or_else(|| document_namespace.to_string())
}

fn dedupe_references(references: &mut Vec<Reference>) {
    let mut seen = HashSet::new();
    references.retain(|r| {
        seen.insert((
            r.target_kind.clone(),
            r.namespace.clone(),
            r.value.clone(),
            r.key.clone(),
            r.symbol.clone(),
            r.range.start.line,
            r.range.start.character,
        ))
    });
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
