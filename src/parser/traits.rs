//! Parser trait definition

#[cfg(test)]
use mockall::automock;

use crate::parser::types::YamlDocument;

/// Trait for turning manifest text into position-tagged trees
#[cfg_attr(test, automock)]
pub trait DocumentParser: Send + Sync {
    /// Parse the content into its independent sub-documents.
    ///
    /// Malformed sub-documents are dropped; the rest of the stream is kept.
    fn parse(&self, content: &str) -> Result<Vec<YamlDocument>, ParseError>;
}

/// Error type for parsing operations
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to parse the file structure
    #[error("Failed to parse file: {0}")]
    ParseFailed(String),

    /// Tree-sitter related error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),
}
