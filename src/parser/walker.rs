//! Point query and depth-first visitor over [`YamlNode`] trees.
//!
//! Both build the same structural path: mapping keys are appended, sequence
//! items share the path of the sequence itself.

use crate::parser::types::YamlNode;

/// Result of [`point_query`]
#[derive(Debug, Clone, PartialEq)]
pub struct PointHit<'a> {
    /// Most specific node under the point
    pub node: &'a YamlNode,
    /// Mapping holding `node` as key or value; `None` for sequence items
    pub parent: Option<&'a YamlNode>,
    pub path: Vec<String>,
}

impl<'a> PointHit<'a> {
    /// True when the point landed on a mapping key
    pub fn is_key(&self) -> bool {
        self.parent
            .is_some_and(|parent| parent.value_for_key(self.node).is_some())
    }

    /// The value paired with the hit key, when the hit is a key
    pub fn key_value(&self) -> Option<&'a YamlNode> {
        self.parent.and_then(|parent| parent.value_for_key(self.node))
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }
}

/// Find the node containing the 0-based `line`/`column` (UTF-16 column).
pub fn point_query(root: &YamlNode, line: usize, column: usize) -> Option<PointHit<'_>> {
    if root.is_mapping() {
        for (key, value) in root.entries() {
            if key_matches(key, line, column) {
                return Some(hit(key, Some(root), &key.value, Vec::new()));
            }

            if value_matches(value, line, column) {
                if !value.is_mapping() && !value.is_sequence() {
                    return Some(hit(value, Some(root), &key.value, Vec::new()));
                }
                if let Some(inner) = point_query(value, line, column) {
                    return Some(hit(inner.node, inner.parent, &key.value, inner.path));
                }
            } else if key.line == line
                && value.is_scalar()
                && value.line == line
                && value.value.is_empty()
                && column > key.end_column
            {
                // `key: |` with the value not written yet
                return Some(hit(value, Some(root), &key.value, Vec::new()));
            }
        }
        return None;
    }

    if root.is_sequence() {
        return root
            .items()
            .iter()
            .filter(|item| value_matches(item, line, column))
            .find_map(|item| point_query(item, line, column));
    }

    value_matches(root, line, column).then(|| PointHit {
        node: root,
        parent: None,
        path: Vec::new(),
    })
}

fn hit<'a>(
    node: &'a YamlNode,
    parent: Option<&'a YamlNode>,
    key: &str,
    rest: Vec<String>,
) -> PointHit<'a> {
    let mut path = Vec::with_capacity(rest.len() + 1);
    path.push(key.to_string());
    path.extend(rest);
    PointHit { node, parent, path }
}

/// Keys match only on their own line, end column inclusive
fn key_matches(key: &YamlNode, line: usize, column: usize) -> bool {
    key.line == line && column >= key.column && column <= key.end_column
}

/// Scalars match within their token (end inclusive); collections match
/// anything from their start onwards.
fn value_matches(node: &YamlNode, line: usize, column: usize) -> bool {
    if node.is_mapping() || node.is_sequence() {
        return line > node.line || (line == node.line && column >= node.column);
    }

    let after_start = line > node.line || (line == node.line && column >= node.column);
    let before_end = line < node.end_line || (line == node.end_line && column <= node.end_column);
    after_start && before_end
}

/// Visit `root` and every value below it depth-first.
///
/// The callback receives the node, the mapping holding it (if any) and the
/// structural path. Mapping keys themselves are not visited.
pub fn visit<'a, F>(root: &'a YamlNode, visitor: &mut F)
where
    F: FnMut(&'a YamlNode, Option<&'a YamlNode>, &[String]),
{
    let mut path = Vec::new();
    walk(root, None, &mut path, visitor);
}

fn walk<'a, F>(
    node: &'a YamlNode,
    parent: Option<&'a YamlNode>,
    path: &mut Vec<String>,
    visitor: &mut F,
) where
    F: FnMut(&'a YamlNode, Option<&'a YamlNode>, &[String]),
{
    visitor(node, parent, path);

    if node.is_mapping() {
        for (key, value) in node.entries() {
            path.push(key.value.clone());
            walk(value, Some(node), path, visitor);
            path.pop();
        }
    } else if node.is_sequence() {
        for item in node.items() {
            walk(item, None, path, visitor);
        }
    }
}
