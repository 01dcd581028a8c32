//! `workspace/executeCommand` payloads for the embedded-file bridge

use std::borrow::Cow;
use std::collections::HashMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower_lsp::jsonrpc::{Error, ErrorCode};
use tower_lsp::lsp_types::{Position, Range, TextEdit, Url, WorkspaceEdit};

use crate::resolver::EmbeddedError;

pub const EMBEDDED_CONTENT_COMMAND: &str = "k8s.embeddedContent";
pub const SAVE_EMBEDDED_CONTENT_COMMAND: &str = "k8s.saveEmbeddedContent";

/// Server error code for a virtual file whose key or source is gone
pub const NOT_FOUND_CODE: i64 = -32004;

#[derive(Debug, Deserialize)]
pub struct EmbeddedContentParams {
    pub uri: Url,
}

#[derive(Debug, Deserialize)]
pub struct SaveEmbeddedContentParams {
    pub uri: Url,
    pub content: String,
}

/// Decode the first command argument
pub fn parse_arguments<T: DeserializeOwned>(arguments: Vec<Value>) -> Result<T, Error> {
    let argument = arguments
        .into_iter()
        .next()
        .ok_or_else(|| Error::invalid_params("missing command argument"))?;
    serde_json::from_value(argument).map_err(|e| Error::invalid_params(e.to_string()))
}

pub fn not_found(message: String, data: Value) -> Error {
    Error {
        code: ErrorCode::ServerError(NOT_FOUND_CODE),
        message: Cow::Owned(message),
        data: Some(data),
    }
}

pub fn document_not_found(uri: &Url) -> Error {
    not_found(
        format!("Document not found: {}", uri),
        json!({ "uri": uri.as_str() }),
    )
}

impl From<EmbeddedError> for Error {
    fn from(e: EmbeddedError) -> Self {
        match e {
            EmbeddedError::KeyNotFound(key) => {
                not_found(format!("Key not found: {}", key), json!({ "key": key }))
            }
            other => Error {
                code: ErrorCode::InternalError,
                message: Cow::Owned(other.to_string()),
                data: None,
            },
        }
    }
}

/// Range covering all of `text`
pub fn full_range(text: &str) -> Range {
    let last = text.rsplit('\n').next().unwrap_or_default();
    Range {
        start: Position::new(0, 0),
        end: Position::new(
            text.matches('\n').count() as u32,
            last.encode_utf16().count() as u32,
        ),
    }
}

/// Edit replacing the whole of `source`
pub fn replace_document(source: Url, old_text: &str, new_text: String) -> WorkspaceEdit {
    let edit = TextEdit {
        range: full_range(old_text),
        new_text,
    };
    WorkspaceEdit {
        changes: Some(HashMap::from([(source, vec![edit])])),
        ..Default::default()
    }
}
