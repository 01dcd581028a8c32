//! Cross-document resource index
//! - types.rs: ResourceRecord, Reference, ResourceKey
//! - store.rs: Lock-guarded Store with label / reference scans
//! - indexer.rs: Workspace and document indexing
//! - pod_spec.rs: Kind → pod spec lookup table
//! - payload.rs: ConfigMap / Secret usage extraction
//! - error.rs: IndexError

pub mod error;
pub mod indexer;
pub mod payload;
pub mod pod_spec;
pub mod store;
pub mod types;

pub use error::IndexError;
pub use indexer::{CRD_KIND, Indexer};
pub use store::Store;
pub use types::{
    DEFAULT_NAMESPACE, Reference, ResourceKey, ResourceRecord, normalize_namespace, path_to_uri,
};
