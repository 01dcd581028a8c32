//! Loading rule sets from a rules directory

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::rules::types::RuleSet;

/// File in the rules directory holding diagnostics checks rather than rules
pub const VALIDATION_FILE: &str = "validation.yaml";

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Whether `path` names a YAML file
pub fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Decode one rules file
pub fn load_rules_file(path: &Path) -> Result<RuleSet, RulesError> {
    let content = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(RuleSet::default());
    }
    serde_yaml::from_str(&content).map_err(|source| RulesError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Concatenate every rules file below `dir`.
///
/// A missing directory yields an empty set. Files that fail to decode are
/// logged and skipped.
pub fn load_rules_dir(dir: &Path) -> RuleSet {
    let mut rules = RuleSet::default();
    if !dir.is_dir() {
        info!("Rules directory {:?} not found, using empty rule set", dir);
        return rules;
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_yaml_file(path))
        .filter(|path| path.file_name().and_then(|name| name.to_str()) != Some(VALIDATION_FILE))
        .collect();
    files.sort();

    for path in files {
        match load_rules_file(&path) {
            Ok(file_rules) => {
                debug!(
                    "Loaded {} symbols and {} references from {:?}",
                    file_rules.symbols.len(),
                    file_rules.references.len(),
                    path
                );
                rules.extend(file_rules);
            }
            Err(e) => warn!("Skipping rules file: {}", e),
        }
    }

    info!(
        "Loaded {} symbol rules and {} reference rules from {:?}",
        rules.symbols.len(),
        rules.references.len(),
        dir
    );
    rules
}
