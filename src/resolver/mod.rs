//! Request-facing resolution over one document body plus the [`Store`]
//! - definition.rs: Go-to-definition
//! - references.rs: Find-usages, including the multi-hop volume chains
//! - hover.rs: Hover summaries
//! - completion.rs: Resource name completion
//! - embedded.rs: Read / rewrite of ConfigMap and Secret payload entries
//! - virtual_uri.rs: `k8s-embedded://` identifiers

pub mod completion;
pub mod definition;
pub mod embedded;
pub mod hover;
pub mod references;
pub mod virtual_uri;

use std::sync::Arc;

use tower_lsp::lsp_types::{Location, Position, Range, Url};
use tracing::{debug, warn};

use crate::index::payload::{CONFIG_MAP, SECRET};
use crate::index::{DEFAULT_NAMESPACE, ResourceRecord, Store, normalize_namespace};
use crate::parser::{
    DocumentParser, PointHit, TreeSitterYamlParser, YamlDocument, YamlNode, point_query,
};
use crate::rules::Rules;

pub use embedded::{EmbeddedError, normalize_content};
pub use virtual_uri::{EMBEDDED_SCHEME, EmbeddedUri, VirtualUriError};

pub const NAMESPACE_KIND: &str = "Namespace";

pub struct Resolver {
    store: Arc<Store>,
    rules: Arc<Rules>,
    parser: Arc<dyn DocumentParser>,
}

/// Point query result together with the sub-document it landed in
pub(crate) struct Cursor<'a> {
    pub document: &'a YamlDocument,
    pub root: &'a YamlNode,
    pub hit: PointHit<'a>,
}

impl Cursor<'_> {
    pub fn kind(&self) -> &str {
        self.document.kind()
    }
}

/// A payload entry under the cursor: `data: {<key>: |...}`
pub(crate) struct PayloadKey<'a> {
    pub kind: &'a str,
    pub namespace: String,
    pub name: String,
    pub key: &'a YamlNode,
}

impl PayloadKey<'_> {
    pub fn embedded_uri(&self, source: &Url) -> EmbeddedUri {
        EmbeddedUri::new(&self.namespace, &self.name, &self.key.value, source)
    }
}

/// Sections holding payload entries, in read precedence
pub fn payload_sections(kind: &str) -> &'static [&'static str] {
    match kind {
        CONFIG_MAP => &["data", "binaryData"],
        SECRET => &["stringData", "data"],
        _ => &[],
    }
}

impl Resolver {
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

    /// Parse `text`, logging and swallowing failures
    pub(crate) fn parse(&self, text: &str) -> Vec<YamlDocument> {
        self.parser
            .parse(text)
            .inspect_err(|e| warn!("Failed to parse document: {}", e))
            .unwrap_or_default()
    }

    /// Resource `target_kind`/`name` as seen from a usage site.
    ///
    /// A sibling `namespace` field overrides the document's namespace;
    /// `Namespace` targets are cluster scoped. Misses outside the default
    /// namespace are retried in it once.
    pub(crate) fn lookup_target(
        &self,
        target_kind: &str,
        name: &str,
        parent: Option<&YamlNode>,
        document_namespace: &str,
    ) -> Option<Arc<ResourceRecord>> {
        if target_kind == NAMESPACE_KIND {
            return self.store.get(target_kind, "", name);
        }

        let namespace = target_namespace(parent, document_namespace);
        if let Some(record) = self.store.get(target_kind, namespace, name) {
            return Some(record);
        }
        if normalize_namespace(namespace) == DEFAULT_NAMESPACE {
            return None;
        }
        debug!(
            "{} {} not found in namespace {}, retrying in default",
            target_kind, name, namespace
        );
        self.store.get(target_kind, DEFAULT_NAMESPACE, name)
    }
}

/// First sub-document whose tree contains the point
pub(crate) fn locate(documents: &[YamlDocument], line: u32, character: u32) -> Option<Cursor<'_>> {
    documents.iter().find_map(|document| {
        let root = document.root_mapping()?;
        let hit = point_query(root, line as usize, character as usize)?;
        Some(Cursor {
            document,
            root,
            hit,
        })
    })
}

/// Namespace a usage resolves in before any default fallback
pub(crate) fn target_namespace<'a>(parent: Option<&'a YamlNode>, document_namespace: &'a str) -> &'a str {
    parent
        .and_then(|parent| parent.get_scalar("namespace"))
        .map(|ns| ns.value.as_str())
        .filter(|ns| !ns.is_empty())
        .unwrap_or(document_namespace)
}

/// The cursor sits on a dotted key whose block scalar value is a file
/// embedded in a ConfigMap or Secret.
pub(crate) fn payload_key<'a>(cursor: &Cursor<'a>) -> Option<PayloadKey<'a>> {
    let kind = cursor.document.kind();
    let sections = payload_sections(kind);
    let path = &cursor.hit.path;
    if path.len() < 2 || !sections.contains(&path[path.len() - 2].as_str()) {
        return None;
    }

    let key = cursor.hit.node;
    let value = cursor.hit.key_value()?;
    if !value.style.is_block_scalar() || !key.value.contains('.') {
        return None;
    }

    let name = match cursor.document.name() {
        "" => kind.to_lowercase(),
        name => name.to_string(),
    };
    Some(PayloadKey {
        kind,
        namespace: normalize_namespace(cursor.document.namespace()).to_string(),
        name,
        key,
    })
}

/// Drop locations whose range contains the query point in the same document
pub(crate) fn filter_out_position(locations: Vec<Location>, uri: &Url, position: Position) -> Vec<Location> {
    locations
        .into_iter()
        .filter(|location| !(location.uri == *uri && contains(&location.range, position)))
        .collect()
}

/// Half-open containment on (line, character)
fn contains(range: &Range, position: Position) -> bool {
    let at_or_after_start = (position.line, position.character)
        >= (range.start.line, range.start.character);
    let before_end = (position.line, position.character) < (range.end.line, range.end.character);
    at_or_after_start && before_end
}

/// Remove repeated locations, keeping first occurrences
pub(crate) fn dedupe_locations(locations: &mut Vec<Location>) {
    let mut seen = Vec::with_capacity(locations.len());
    locations.retain(|location| {
        if seen.contains(location) {
            return false;
        }
        seen.push(location.clone());
        true
    });
}

/// Zero-width range at the start of a virtual file
pub(crate) fn virtual_range() -> Range {
    Range::default()
}
