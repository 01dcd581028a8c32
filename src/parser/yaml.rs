//! Tree-sitter backed multi-document YAML parser

use crate::parser::scalar::{decode_block, decode_double_quoted, decode_plain, decode_single_quoted};
use crate::parser::traits::{DocumentParser, ParseError};
use crate::parser::types::{NodeKind, NodeStyle, YamlDocument, YamlNode};
use tracing::{debug, warn};
use tree_sitter::{Node, Point};

/// Parser producing [`YamlDocument`]s from a `---`-separated stream
pub struct TreeSitterYamlParser;

impl TreeSitterYamlParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TreeSitterYamlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for TreeSitterYamlParser {
    fn parse(&self, content: &str) -> Result<Vec<YamlDocument>, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        let language = tree_sitter_yaml::LANGUAGE;
        parser.set_language(&language.into()).map_err(|e| {
            warn!("Failed to set YAML language for tree-sitter: {}", e);
            ParseError::TreeSitter(e.to_string())
        })?;

        let tree = parser.parse(content, None).ok_or_else(|| {
            warn!("Failed to parse YAML content");
            ParseError::ParseFailed("Failed to parse YAML".to_string())
        })?;

        let converter = Converter { source: content };
        let root = tree.root_node();
        let mut documents = Vec::new();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if child.kind() != "document" {
                debug!(
                    "Skipping {} at line {}",
                    child.kind(),
                    child.start_position().row
                );
                continue;
            }
            if child.has_error() {
                debug!(
                    "Skipping malformed document at line {}",
                    child.start_position().row
                );
                continue;
            }
            documents.push(converter.document(child));
        }

        Ok(documents)
    }
}

/// Parse with the default parser
pub fn parse_documents(content: &str) -> Result<Vec<YamlDocument>, ParseError> {
    TreeSitterYamlParser::new().parse(content)
}

/// Tree-sitter YAML tree shape:
/// ```text
/// stream
///   document
///     block_node
///       block_mapping
///         block_mapping_pair          <- key: value
///           flow_node                 <- key
///             plain_scalar
///           block_node | flow_node    <- value
///       block_sequence
///         block_sequence_item
///           block_node | flow_node
///       block_scalar                  <- | or >
///     flow_node
///       flow_mapping / flow_sequence / *_scalar / alias
/// ```
struct Converter<'a> {
    source: &'a str,
}

impl<'a> Converter<'a> {
    fn document(&self, node: Node) -> YamlDocument {
        let mut cursor = node.walk();
        let root = node
            .named_children(&mut cursor)
            .find(|child| matches!(child.kind(), "block_node" | "flow_node"))
            .and_then(|child| self.node(child));

        YamlDocument {
            root,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
        }
    }

    fn node(&self, node: Node) -> Option<YamlNode> {
        match node.kind() {
            "block_node" | "flow_node" => {
                let mut cursor = node.walk();
                let content = node
                    .named_children(&mut cursor)
                    .find(|child| !matches!(child.kind(), "anchor" | "tag" | "comment"));
                match content {
                    Some(content) => self.node(content),
                    // Only properties (`&anchor`, `!tag`): no content
                    None => Some(self.empty_at_end(node)),
                }
            }
            "block_mapping" => {
                let mut cursor = node.walk();
                let children = node
                    .named_children(&mut cursor)
                    .filter(|child| child.kind() == "block_mapping_pair")
                    .flat_map(|pair| {
                        let (key, value) = self.pair(pair);
                        [key, value]
                    })
                    .collect();
                Some(self.collection(node, NodeKind::Mapping, NodeStyle::Plain, children))
            }
            "flow_mapping" => {
                let mut cursor = node.walk();
                let children = node
                    .named_children(&mut cursor)
                    .filter_map(|child| match child.kind() {
                        "flow_pair" => Some(self.pair(child)),
                        "flow_node" => {
                            let key = self.node(child)?;
                            let value =
                                YamlNode::empty_scalar(key.end_line, key.end_column, key.end_byte);
                            Some((key, value))
                        }
                        _ => None,
                    })
                    .flat_map(|(key, value)| [key, value])
                    .collect();
                Some(self.collection(node, NodeKind::Mapping, NodeStyle::Flow, children))
            }
            "block_sequence" => {
                let mut cursor = node.walk();
                let children = node
                    .named_children(&mut cursor)
                    .filter(|child| child.kind() == "block_sequence_item")
                    .map(|item| {
                        let mut item_cursor = item.walk();
                        item.named_children(&mut item_cursor)
                            .find(|child| matches!(child.kind(), "block_node" | "flow_node"))
                            .and_then(|child| self.node(child))
                            .unwrap_or_else(|| self.empty_at_end(item))
                    })
                    .collect();
                Some(self.collection(node, NodeKind::Sequence, NodeStyle::Plain, children))
            }
            "flow_sequence" => {
                let mut cursor = node.walk();
                let children = node
                    .named_children(&mut cursor)
                    .filter_map(|child| match child.kind() {
                        "flow_node" => self.node(child),
                        "flow_pair" => {
                            let (key, value) = self.pair(child);
                            Some(self.collection(
                                child,
                                NodeKind::Mapping,
                                NodeStyle::Flow,
                                vec![key, value],
                            ))
                        }
                        _ => None,
                    })
                    .collect();
                Some(self.collection(node, NodeKind::Sequence, NodeStyle::Flow, children))
            }
            "plain_scalar" => Some(self.scalar(node, NodeStyle::Plain, decode_plain(self.text(node)))),
            "single_quote_scalar" => Some(self.scalar(
                node,
                NodeStyle::SingleQuoted,
                decode_single_quoted(self.text(node)),
            )),
            "double_quote_scalar" => Some(self.scalar(
                node,
                NodeStyle::DoubleQuoted,
                decode_double_quoted(self.text(node)),
            )),
            "block_scalar" => {
                let (value, style) = decode_block(self.text(node), self.line_indent(node));
                Some(self.scalar(node, style, value))
            }
            "alias" => {
                let mut alias = self.scalar(
                    node,
                    NodeStyle::Plain,
                    self.text(node).trim_start_matches('*').to_string(),
                );
                alias.kind = NodeKind::Alias;
                Some(alias)
            }
            _ => None,
        }
    }

    /// Key and value of a `block_mapping_pair` / `flow_pair`.
    ///
    /// Missing parts become empty scalars: a missing value sits right after
    /// the `:` so the cursor after `key: ` still lands on it.
    fn pair(&self, pair: Node) -> (YamlNode, YamlNode) {
        let key = pair
            .child_by_field_name("key")
            .and_then(|key| self.node(key))
            .unwrap_or_else(|| self.empty_at_start(pair));

        let value = pair
            .child_by_field_name("value")
            .and_then(|value| self.node(value))
            .unwrap_or_else(|| {
                let mut cursor = pair.walk();
                let colon = pair.children(&mut cursor).find(|child| child.kind() == ":");
                match colon {
                    Some(colon) => self.empty_at_end(colon),
                    None => YamlNode::empty_scalar(key.end_line, key.end_column, key.end_byte),
                }
            });

        (key, value)
    }

    fn collection(
        &self,
        node: Node,
        kind: NodeKind,
        style: NodeStyle,
        children: Vec<YamlNode>,
    ) -> YamlNode {
        let mut collection = self.scalar(node, style, String::new());
        collection.kind = kind;
        collection.children = children;
        collection
    }

    fn scalar(&self, node: Node, style: NodeStyle, value: String) -> YamlNode {
        let start = node.start_position();
        let end = node.end_position();
        YamlNode {
            kind: NodeKind::Scalar,
            style,
            value,
            line: start.row,
            column: self.column(start, node.start_byte()),
            end_line: end.row,
            end_column: self.column(end, node.end_byte()),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            children: Vec::new(),
        }
    }

    fn empty_at_start(&self, node: Node) -> YamlNode {
        let start = node.start_position();
        YamlNode::empty_scalar(start.row, self.column(start, node.start_byte()), node.start_byte())
    }

    fn empty_at_end(&self, node: Node) -> YamlNode {
        let end = node.end_position();
        YamlNode::empty_scalar(end.row, self.column(end, node.end_byte()), node.end_byte())
    }

    /// UTF-16 column of `point`, whose byte offset in the source is `byte`
    fn column(&self, point: Point, byte: usize) -> usize {
        byte.checked_sub(point.column)
            .and_then(|line_start| self.source.get(line_start..byte))
            .map_or(point.column, |prefix| prefix.encode_utf16().count())
    }

    fn text(&self, node: Node) -> &'a str {
        self.source.get(node.byte_range()).unwrap_or("")
    }

    /// Indentation of the line the node starts on
    fn line_indent(&self, node: Node) -> usize {
        let start = node.start_byte().min(self.source.len());
        let line_start = self.source[..start].rfind('\n').map_or(0, |i| i + 1);
        self.source[line_start..]
            .chars()
            .take_while(|c| *c == ' ')
            .count()
    }
}
