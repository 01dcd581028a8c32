use tracing::{debug, info, warn};

use crate::crd::downloader::{CrdFetcher, fetch_all};
use crate::index::Indexer;

/// Download configured CRDs and index them so their kinds register before
/// the workspace scan. Returns the number of files indexed.
pub async fn preload_crds(fetcher: &dyn CrdFetcher, indexer: &Indexer, sources: &[String]) -> usize {
    if sources.is_empty() {
        return 0;
    }

    let (paths, errors) = fetch_all(fetcher, sources).await;
    for e in &errors {
        warn!("CRD download failed: {}", e);
    }

    let mut indexed = 0;
    for path in &paths {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read cached CRD {:?}: {}", path, e);
                continue;
            }
        };
        if indexer.index_content(path, &content) {
            info!("Indexed CRD {:?}", path);
            indexed += 1;
        } else {
            debug!("CRD file {:?} produced no indexed resources", path);
        }
    }

    info!(
        "CRD preload complete: {} of {} source(s) indexed",
        indexed,
        sources.len()
    );
    indexed
}
