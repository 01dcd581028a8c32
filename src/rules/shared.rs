//! Lock-guarded rule set shared by the indexer, resolver and completion

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use crate::rules::types::RuleSet;

/// Rule set readable concurrently and extended only via [`Rules::register_kind`]
#[derive(Debug, Default)]
pub struct Rules {
    inner: RwLock<RuleSet>,
}

impl Rules {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            inner: RwLock::new(rules),
        }
    }

    /// Shared access for matching
    pub fn read(&self) -> RwLockReadGuard<'_, RuleSet> {
        // A panicking reader cannot leave the set half-written.
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RuleSet> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a kind discovered at runtime as a resource-name definition.
    ///
    /// Returns `true` when the set changed.
    pub fn register_kind(&self, kind: &str) -> bool {
        let registered = self.write().register_kind(kind);
        if registered {
            info!("Registered dynamic kind {}", kind);
        }
        registered
    }

    /// Swap in a freshly loaded rule set
    pub fn replace(&self, rules: RuleSet) {
        *self.write() = rules;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::{SymbolClass, SymbolDefinition, SymbolRule};
    use std::sync::Arc;

    fn rules() -> Rules {
        Rules::new(RuleSet {
            version: 1,
            symbols: vec![SymbolRule {
                name: SymbolClass::ResourceName,
                description: String::new(),
                key_template: String::new(),
                definitions: vec![SymbolDefinition {
                    kinds: vec!["Service".to_string()],
                    path: "metadata.name".into(),
                }],
            }],
            references: Vec::new(),
        })
    }

    #[test]
    fn register_kind_is_visible_to_readers() {
        let rules = rules();

        assert!(rules.register_kind("Widget"));

        let path = vec!["metadata".to_string(), "name".to_string()];
        assert_eq!(
            rules.read().matching_symbols("Widget", &path, false),
            vec![&SymbolClass::ResourceName]
        );
    }

    #[test]
    fn replace_swaps_the_whole_set() {
        let rules = rules();

        rules.replace(RuleSet::default());

        assert!(rules.read().symbols.is_empty());
    }

    #[test]
    fn concurrent_registration_never_duplicates_kinds() {
        let rules = Arc::new(rules());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let rules = Arc::clone(&rules);
                std::thread::spawn(move || {
                    rules.register_kind(&format!("Kind{}", i % 4));
                    rules.read().symbols[0].definitions[0].kinds.len()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let kinds = rules.read().symbols[0].definitions[0].kinds.clone();
        assert_eq!(kinds.len(), 5);
    }
}
