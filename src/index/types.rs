//! Indexed facts: resources and the references they carry

use std::path::Path;

use indexmap::IndexMap;
use tower_lsp::lsp_types::{Location, Range, Url};

use crate::rules::SymbolClass;

pub const DEFAULT_NAMESPACE: &str = "default";

/// Empty namespaces share the default bucket
pub fn normalize_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    }
}

/// Store key; the namespace is always normalized
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: normalize_namespace(namespace).to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// One symbolic usage inside a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Kind of the referenced resource; empty when unconstrained
    pub target_kind: String,
    /// Referenced name, or label value for label references
    pub value: String,
    /// Namespace the usage resolves in (normalized)
    pub namespace: String,
    pub symbol: SymbolClass,
    /// Payload key for per-entry usages, label key for label references
    pub key: String,
    /// Range of the usage token
    pub range: Range,
}

/// One indexed resource instance
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// Namespace as written; empty for cluster-scoped or omitted
    pub namespace: String,
    pub labels: IndexMap<String, String>,
    pub references: Vec<Reference>,
    pub uri: Url,
    /// Range of the name token
    pub range: Range,
}

impl ResourceRecord {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.kind, &self.namespace, &self.name)
    }

    /// Location of the name token
    pub fn location(&self) -> Location {
        Location {
            uri: self.uri.clone(),
            range: self.range,
        }
    }

    /// Location of one of this record's references
    pub fn reference_location(&self, reference: &Reference) -> Location {
        Location {
            uri: self.uri.clone(),
            range: reference.range,
        }
    }
}

/// `file://` URI for a path, resolving relative paths against the working
/// directory
pub fn path_to_uri(path: &Path) -> Option<Url> {
    if path.is_absolute() {
        return Url::from_file_path(path).ok();
    }
    let absolute = std::env::current_dir().ok()?.join(path);
    Url::from_file_path(absolute).ok()
}
