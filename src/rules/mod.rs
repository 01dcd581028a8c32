//! Rule layer
//! - types.rs: Symbol/reference rule schema and matching
//! - shared.rs: Lock-guarded rule set with runtime kind registration
//! - loader.rs: Rules directory loading

pub mod loader;
pub mod shared;
pub mod types;

pub use loader::{RulesError, VALIDATION_FILE, is_yaml_file, load_rules_dir};
pub use shared::Rules;
pub use types::{
    ReferenceMatch, ReferenceRule, RuleSet, SymbolClass, SymbolDefinition, SymbolRule,
    matches_kind,
};
