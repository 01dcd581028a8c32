//! Validation of open documents against the Store
//! - types.rs: `validation.yaml` schema
//! - engine.rs: DiagnosticsEngine

pub mod engine;
pub mod types;

pub use engine::{DIAGNOSTIC_SOURCE, DiagnosticsEngine, find_nodes, load_validation_file};
pub use types::{Check, CheckType, ValidationConfig, ValidationRule};
