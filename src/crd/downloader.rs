//! Cached HTTP download of CustomResourceDefinition manifests

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use reqwest::header::{ETAG, HeaderMap, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::crd::error::CrdError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
const USER_AGENT: &str = concat!("k8s-lsp/", env!("CARGO_PKG_VERSION"), " (crd-downloader)");

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub timeout: Duration,
    pub max_bytes: u64,
    pub cache_dir: PathBuf,
    /// Permit `http://` sources
    pub allow_insecure: bool,
}

impl DownloadOptions {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_bytes: DEFAULT_MAX_BYTES,
            cache_dir,
            allow_insecure: false,
        }
    }
}

/// Sidecar `<sha256>.json` next to each cached `<sha256>.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedMeta {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Source of CRD manifests on the local filesystem
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait CrdFetcher: Send + Sync {
    /// Fetches `url` and returns the path of the local copy
    async fn fetch(&self, url: &str) -> Result<PathBuf, CrdError>;
}

pub struct CrdDownloader {
    client: reqwest::Client,
    options: DownloadOptions,
}

impl CrdDownloader {
    pub fn new(options: DownloadOptions) -> Result<Self, CrdError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()?;
        Ok(Self { client, options })
    }

    fn cache_paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let base = hex::encode(Sha256::digest(url.as_bytes()));
        (
            self.options.cache_dir.join(format!("{}.yaml", base)),
            self.options.cache_dir.join(format!("{}.json", base)),
        )
    }

    fn check_scheme(&self, url: &str) -> Result<(), CrdError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| CrdError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        match parsed.scheme() {
            "https" => Ok(()),
            "http" if self.options.allow_insecure => Ok(()),
            _ => Err(CrdError::Insecure(url.to_string())),
        }
    }

    async fn read_body(&self, url: &str, mut response: reqwest::Response) -> Result<Vec<u8>, CrdError> {
        let max_bytes = self.options.max_bytes;
        let too_large = || CrdError::TooLarge {
            url: url.to_string(),
            max_bytes,
        };
        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > max_bytes {
                return Err(too_large());
            }
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl CrdFetcher for CrdDownloader {
    async fn fetch(&self, url: &str) -> Result<PathBuf, CrdError> {
        self.check_scheme(url)?;
        ensure_dir(&self.options.cache_dir)?;
        let (yaml_path, meta_path) = self.cache_paths(url);
        let meta = read_meta(&meta_path);

        let mut request = self.client.get(url);
        if let Some(etag) = meta.etag.as_deref().filter(|v| !v.trim().is_empty()) {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(modified) = meta.last_modified.as_deref().filter(|v| !v.trim().is_empty()) {
            request = request.header(IF_MODIFIED_SINCE, modified);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            debug!("CRD {} not modified, using {:?}", url, yaml_path);
            return if yaml_path.is_file() {
                Ok(yaml_path)
            } else {
                Err(CrdError::CacheMissing(url.to_string()))
            };
        }
        if status != StatusCode::OK {
            return Err(CrdError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let etag = header_value(response.headers(), ETAG);
        let last_modified = header_value(response.headers(), LAST_MODIFIED);

        let body = self.read_body(url, response).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(CrdError::Empty(url.to_string()));
        }
        write_atomic(&yaml_path, &body)?;

        let meta = CachedMeta {
            url: url.to_string(),
            etag,
            last_modified,
            fetched_at: Some(Utc::now()),
        };
        match serde_json::to_vec_pretty(&meta) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&meta_path, bytes) {
                    warn!("Failed to write CRD cache metadata {:?}: {}", meta_path, e);
                }
            }
            Err(e) => warn!("Failed to encode CRD cache metadata: {}", e),
        }

        info!("Downloaded CRD {} ({} bytes)", url, body.len());
        Ok(yaml_path)
    }
}

/// Fetch every non-blank source concurrently; failures are returned next to
/// the successes.
pub async fn fetch_all(fetcher: &dyn CrdFetcher, sources: &[String]) -> (Vec<PathBuf>, Vec<CrdError>) {
    let futures = sources
        .iter()
        .map(|source| source.trim())
        .filter(|source| !source.is_empty())
        .map(|source| fetcher.fetch(source));

    let mut paths = Vec::new();
    let mut errors = Vec::new();
    for result in futures::future::join_all(futures).await {
        match result {
            Ok(path) => paths.push(path),
            Err(e) => errors.push(e),
        }
    }
    (paths, errors)
}

fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn ensure_dir(dir: &Path) -> Result<(), CrdError> {
    std::fs::create_dir_all(dir).map_err(|source| CrdError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn read_meta(path: &Path) -> CachedMeta {
    std::fs::read(path)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

/// Write through a sibling temp file and rename over `path`
fn write_atomic(path: &Path, content: &[u8]) -> Result<(), CrdError> {
    let tmp = path.with_extension("yaml.tmp");
    let io_error = |source: std::io::Error| CrdError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(&tmp, content).map_err(io_error)?;
    std::fs::rename(&tmp, path).map_err(|source| {
        let _ = std::fs::remove_file(&tmp);
        io_error(source)
    })
}
