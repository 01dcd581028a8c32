//! Read and rewrite of payload entries (`ConfigMap.data`, `Secret.stringData`, ...).
//!
//! Writes splice the new value into the original text so that every other
//! sub-document, comment and formatting choice survives.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::debug;

use crate::index::payload::{CONFIG_MAP, SECRET};
use crate::parser::{NodeStyle, ParseError, YamlNode};
use crate::resolver::{Resolver, payload_sections};

#[derive(Debug, Error)]
pub enum EmbeddedError {
    #[error("Key {0} not found")]
    KeyNotFound(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// How a section stores its values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Text,
    Base64,
}

fn encoding(kind: &str, section: &str) -> Encoding {
    match (kind, section) {
        (CONFIG_MAP, "binaryData") | (SECRET, "data") => Encoding::Base64,
        _ => Encoding::Text,
    }
}

/// Line endings to LF, trailing blanks stripped per line, one trailing
/// newline dropped.
pub fn normalize_content(content: &str) -> String {
    let unix = content.replace("\r\n", "\n");
    let trimmed: Vec<&str> = unix
        .split('\n')
        .map(|line| line.trim_end_matches([' ', '\t']))
        .collect();
    let joined = trimmed.join("\n");
    match joined.strip_suffix('\n') {
        Some(stripped) => stripped.to_string(),
        None => joined,
    }
}

/// A payload entry located in the parsed text
struct Entry<'a> {
    section_key: &'a YamlNode,
    section: &'a YamlNode,
    key: &'a YamlNode,
    value: &'a YamlNode,
    encoding: Encoding,
}

impl Resolver {
    /// Value of payload entry `key`, base64-decoded when stored encoded
    pub fn resolve_embedded_content(&self, text: &str, key: &str) -> Result<String, EmbeddedError> {
        let documents = self.parser.parse(text)?;
        for document in &documents {
            let Some(root) = document.root_mapping() else {
                continue;
            };
            let Some(entry) = find_entry(root, document.kind(), key) else {
                continue;
            };
            return match entry.encoding {
                Encoding::Text => Ok(entry.value.value.clone()),
                Encoding::Base64 => {
                    let bytes = STANDARD.decode(entry.value.value.trim())?;
                    Ok(String::from_utf8_lossy(&bytes).into_owned())
                }
            };
        }
        Err(EmbeddedError::KeyNotFound(key.to_string()))
    }

    /// Full text of the file after replacing payload entry `key` with
    /// `content`
    pub fn update_embedded_content(
        &self,
        text: &str,
        key: &str,
        content: &str,
    ) -> Result<String, EmbeddedError> {
        let documents = self.parser.parse(text)?;
        let entry = documents
            .iter()
            .filter_map(|document| {
                let root = document.root_mapping()?;
                find_entry(root, document.kind(), key)
            })
            .next()
            .ok_or_else(|| EmbeddedError::KeyNotFound(key.to_string()))?;

        if !entry.value.is_scalar() {
            return Err(EmbeddedError::InvalidDocument(format!(
                "value of {} is not a scalar",
                key
            )));
        }

        let content = normalize_content(content);
        let line_break = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let writer = Writer { text, line_break };

        let (start, end, replacement) = if entry.section.style == NodeStyle::Flow {
            writer.flow_section(&entry, &content)
        } else {
            writer.block_value(&entry, &content)
        };
        debug!(
            "Rewriting {} bytes of payload entry {} ({:?})",
            end - start,
            key,
            entry.encoding
        );

        let mut updated = String::with_capacity(text.len() + replacement.len());
        updated.push_str(&text[..start]);
        updated.push_str(&replacement);
        updated.push_str(&text[end..]);
        Ok(updated)
    }
}

/// First section of `kind` holding `key`, in read precedence
fn find_entry<'a>(root: &'a YamlNode, kind: &str, key: &str) -> Option<Entry<'a>> {
    payload_sections(kind).iter().find_map(|section_name| {
        let (section_key, section) = root.entries().find(|(k, _)| k.value == *section_name)?;
        let (key, value) = section.entries().find(|(k, _)| k.value == key)?;
        Some(Entry {
            section_key,
            section,
            key,
            value,
            encoding: encoding(kind, section_name),
        })
    })
}

struct Writer<'a> {
    text: &'a str,
    line_break: &'a str,
}

impl Writer<'_> {
    fn token(&self, node: &YamlNode) -> &str {
        &self.text[node.start_byte..node.end_byte]
    }

    /// Value as written after `key:` at `indent` columns of key indentation.
    ///
    /// The chomping indicator follows the trailing newlines of `content`:
    /// `-` for none, clip for one, `+` for more.
    fn render(&self, content: &str, encoding: Encoding, key_indent: usize) -> String {
        if encoding == Encoding::Base64 && !content.is_empty() {
            return STANDARD.encode(content);
        }
        let body = content.trim_end_matches('\n');
        if body.is_empty() {
            return format!("{:?}", content);
        }

        let trailing_breaks = content.len() - body.len();
        let starts_with_space = body
            .split('\n')
            .find(|line| !line.is_empty())
            .is_some_and(|line| line.starts_with(' '));
        let mut rendered = String::from("|");
        if starts_with_space {
            rendered.push('2');
        }
        match trailing_breaks {
            0 => rendered.push('-'),
            1 => {}
            _ => rendered.push('+'),
        }

        let indent = " ".repeat(key_indent + 2);
        for line in body.split('\n') {
            rendered.push_str(self.line_break);
            if !line.is_empty() {
                rendered.push_str(&indent);
                rendered.push_str(line);
            }
        }
        for _ in 1..trailing_breaks {
            rendered.push_str(self.line_break);
        }
        rendered
    }

    /// Replace only the value token of a block-style entry
    fn block_value(&self, entry: &Entry, content: &str) -> (usize, usize, String) {
        let value = entry.value;
        let mut replacement = String::new();
        if value.start_byte == value.end_byte {
            replacement.push(' ');
        }
        replacement.push_str(&self.render(content, entry.encoding, entry.key.column));

        let original = self.token(value);
        if original.ends_with('\n') {
            replacement.push_str(self.line_break);
        }
        (value.start_byte, value.end_byte, replacement)
    }

    /// Re-emit a `{ ... }` section as a block mapping
    fn flow_section(&self, entry: &Entry, content: &str) -> (usize, usize, String) {
        let indent = entry.section_key.column + 2;
        let prefix = " ".repeat(indent);
        let mut replacement = String::from(":");

        for (key, value) in entry.section.entries() {
            replacement.push_str(self.line_break);
            replacement.push_str(&prefix);
            replacement.push_str(self.token(key));
            replacement.push(':');

            if std::ptr::eq(key, entry.key) {
                replacement.push(' ');
                replacement.push_str(&self.render(content, entry.encoding, indent));
            } else if value.start_byte != value.end_byte {
                replacement.push(' ');
                replacement.push_str(self.token(value));
            }
        }
        (
            entry.section_key.end_byte,
            entry.section.end_byte,
            replacement,
        )
    }
}
