use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrdError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid CRD URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("CRD URL must be https:// (got {0})")]
    Insecure(String),

    #[error("Failed to download CRD {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("CRD {url} is larger than {max_bytes} bytes")]
    TooLarge { url: String, max_bytes: u64 },

    #[error("Downloaded CRD {0} is empty")]
    Empty(String),

    #[error("CRD {0} returned 304 but the cache file is missing")]
    CacheMissing(String),

    #[error("Cache I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
