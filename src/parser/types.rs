//! Position-tagged YAML tree shared by every layer above the parser

use tower_lsp::lsp_types::{Position, Range};

/// Structural kind of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Mapping,
    Sequence,
    Scalar,
    /// `*anchor` reference; `value` holds the anchor name
    Alias,
}

/// Presentation style of a node as written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// `|` block scalar
    Literal,
    /// `>` block scalar
    Folded,
    /// `{ }` / `[ ]` collection
    Flow,
}

impl NodeStyle {
    pub fn is_quoted(&self) -> bool {
        matches!(self, NodeStyle::SingleQuoted | NodeStyle::DoubleQuoted)
    }

    pub fn is_block_scalar(&self) -> bool {
        matches!(self, NodeStyle::Literal | NodeStyle::Folded)
    }
}

/// A node of the parsed tree.
///
/// Lines and columns are 0-based; columns count UTF-16 code units within
/// the line, as LSP positions do.
/// Mapping children alternate key, value, key, value...
#[derive(Debug, Clone, PartialEq)]
pub struct YamlNode {
    pub kind: NodeKind,
    pub style: NodeStyle,
    /// Decoded scalar text (empty for collections)
    pub value: String,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub children: Vec<YamlNode>,
}

impl YamlNode {
    /// Zero-width scalar used where the source omits a value (`key:`)
    pub fn empty_scalar(line: usize, column: usize, byte: usize) -> Self {
        Self {
            kind: NodeKind::Scalar,
            style: NodeStyle::Plain,
            value: String::new(),
            line,
            column,
            end_line: line,
            end_column: column,
            start_byte: byte,
            end_byte: byte,
            children: Vec::new(),
        }
    }

    pub fn is_mapping(&self) -> bool {
        self.kind == NodeKind::Mapping
    }

    pub fn is_sequence(&self) -> bool {
        self.kind == NodeKind::Sequence
    }

    pub fn is_scalar(&self) -> bool {
        self.kind == NodeKind::Scalar
    }

    /// Key/value pairs of a mapping; empty for other kinds
    pub fn entries(&self) -> impl Iterator<Item = (&YamlNode, &YamlNode)> {
        let pairs = if self.is_mapping() {
            self.children.as_slice()
        } else {
            &[]
        };
        pairs.chunks_exact(2).map(|pair| (&pair[0], &pair[1]))
    }

    /// Items of a sequence; empty for other kinds
    pub fn items(&self) -> &[YamlNode] {
        if self.is_sequence() {
            &self.children
        } else {
            &[]
        }
    }

    /// Value stored under `key` in a mapping
    pub fn get(&self, key: &str) -> Option<&YamlNode> {
        self.entries()
            .find(|(k, _)| k.value == key)
            .map(|(_, value)| value)
    }

    /// Key node stored under `key` in a mapping
    pub fn get_key(&self, key: &str) -> Option<&YamlNode> {
        self.entries().find(|(k, _)| k.value == key).map(|(k, _)| k)
    }

    /// Scalar value stored under `key`; `None` when absent or not a scalar
    pub fn get_scalar(&self, key: &str) -> Option<&YamlNode> {
        self.get(key).filter(|node| node.is_scalar())
    }

    /// Follows a chain of mapping keys
    pub fn get_path(&self, keys: &[&str]) -> Option<&YamlNode> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    /// The value paired with `key_node` when `self` is the mapping holding it
    pub fn value_for_key(&self, key_node: &YamlNode) -> Option<&YamlNode> {
        self.entries()
            .find(|(k, _)| std::ptr::eq(*k, key_node))
            .map(|(_, value)| value)
    }

    /// Source range of the token
    pub fn range(&self) -> Range {
        Range {
            start: Position {
                line: self.line as u32,
                character: self.column as u32,
            },
            end: Position {
                line: self.end_line as u32,
                character: self.end_column as u32,
            },
        }
    }

    /// Start position as a zero-width range
    pub fn start_range(&self) -> Range {
        let start = Position {
            line: self.line as u32,
            character: self.column as u32,
        };
        Range { start, end: start }
    }
}

/// One `---`-separated sub-document of a file
#[derive(Debug, Clone, PartialEq)]
pub struct YamlDocument {
    /// Top-level node; `None` for an empty document
    pub root: Option<YamlNode>,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl YamlDocument {
    /// Root mapping, the only shape a manifest can take
    pub fn root_mapping(&self) -> Option<&YamlNode> {
        self.root.as_ref().filter(|root| root.is_mapping())
    }

    /// `kind` field of the manifest, empty when absent
    pub fn kind(&self) -> &str {
        self.root_scalar(&["kind"])
    }

    /// `apiVersion` field of the manifest, empty when absent
    pub fn api_version(&self) -> &str {
        self.root_scalar(&["apiVersion"])
    }

    /// `metadata.name`, empty when absent
    pub fn name(&self) -> &str {
        self.root_scalar(&["metadata", "name"])
    }

    /// `metadata.namespace` as written, empty when absent
    pub fn namespace(&self) -> &str {
        self.root_scalar(&["metadata", "namespace"])
    }

    fn root_scalar(&self, keys: &[&str]) -> &str {
        self.root_mapping()
            .and_then(|root| root.get_path(keys))
            .filter(|node| node.is_scalar())
            .map(|node| node.value.as_str())
            .unwrap_or("")
    }
}
