//! Remote CustomResourceDefinition preloading
//! - downloader.rs: HTTP fetch with a sha256-keyed conditional cache
//! - preload.rs: Download then index before the workspace scan
//! - error.rs: CrdError

pub mod downloader;
pub mod error;
pub mod preload;

pub use downloader::{
    CachedMeta, CrdDownloader, CrdFetcher, DEFAULT_MAX_BYTES, DEFAULT_TIMEOUT, DownloadOptions,
    fetch_all,
};
pub use error::CrdError;
pub use preload::preload_crds;
