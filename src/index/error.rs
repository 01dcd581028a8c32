use std::path::PathBuf;

use thiserror::Error;

use crate::parser::ParseError;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse { path: PathBuf, source: ParseError },

    #[error("Path {0:?} cannot be expressed as a file URI")]
    InvalidPath(PathBuf),
}
