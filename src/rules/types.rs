//! Rule schema for definition and reference sites

use std::fmt;

use serde::Deserialize;

use crate::parser::PathPattern;

pub const RESOURCE_NAME_SYMBOL: &str = "k8s.resource.name";
pub const LABEL_SYMBOL: &str = "k8s.label";

/// Category of a definable / referenceable entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum SymbolClass {
    /// `k8s.resource.name`: a resource addressed by kind, namespace and name
    ResourceName,
    /// `k8s.label`: a label key/value pair
    Label,
    Other(String),
}

impl SymbolClass {
    pub fn as_str(&self) -> &str {
        match self {
            SymbolClass::ResourceName => RESOURCE_NAME_SYMBOL,
            SymbolClass::Label => LABEL_SYMBOL,
            SymbolClass::Other(name) => name,
        }
    }

    pub fn is_label(&self) -> bool {
        *self == SymbolClass::Label
    }
}

impl From<String> for SymbolClass {
    fn from(name: String) -> Self {
        match name.as_str() {
            RESOURCE_NAME_SYMBOL => SymbolClass::ResourceName,
            LABEL_SYMBOL => SymbolClass::Label,
            _ => SymbolClass::Other(name),
        }
    }
}

impl From<&str> for SymbolClass {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl fmt::Display for SymbolClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of one rules file; files are concatenated into one set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub version: u32,
    pub symbols: Vec<SymbolRule>,
    pub references: Vec<ReferenceRule>,
}

/// How a definition site is recognized
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRule {
    pub name: SymbolClass,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub key_template: String,
    #[serde(default)]
    pub definitions: Vec<SymbolDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolDefinition {
    #[serde(default)]
    pub kinds: Vec<String>,
    pub path: PathPattern,
}

/// How a usage site is recognized
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRule {
    #[serde(default)]
    pub name: String,
    pub symbol: SymbolClass,
    #[serde(default)]
    pub target_kind: String,
    #[serde(rename = "match")]
    pub matcher: ReferenceMatch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceMatch {
    #[serde(default)]
    pub kinds: Vec<String>,
    pub path: PathPattern,
}

/// `kinds` applies to `kind`, literally or through `*`
pub fn matches_kind(kinds: &[String], kind: &str) -> bool {
    kinds.iter().any(|k| k == "*" || k == kind)
}

impl RuleSet {
    pub fn extend(&mut self, other: RuleSet) {
        self.version = self.version.max(other.version);
        self.symbols.extend(other.symbols);
        self.references.extend(other.references);
    }

    /// Symbol classes whose definitions match `path` exactly for `kind`.
    ///
    /// With `label_prefix`, label-class definitions also match any path below
    /// their own (the cursor sits on one label inside the set).
    pub fn matching_symbols(
        &self,
        kind: &str,
        path: &[String],
        label_prefix: bool,
    ) -> Vec<&SymbolClass> {
        self.symbols
            .iter()
            .filter(|symbol| {
                symbol.definitions.iter().any(|definition| {
                    matches_kind(&definition.kinds, kind)
                        && (definition.path.exact_match(path)
                            || (label_prefix
                                && symbol.name.is_label()
                                && definition.path.prefix_match(path)))
                })
            })
            .map(|symbol| &symbol.name)
            .collect()
    }

    /// Reference rules matching `path` for `kind`, in declaration order.
    ///
    /// With `label_prefix`, label-class rules match by prefix.
    pub fn matching_references(
        &self,
        kind: &str,
        path: &[String],
        label_prefix: bool,
    ) -> Vec<&ReferenceRule> {
        self.references
            .iter()
            .filter(|rule| {
                matches_kind(&rule.matcher.kinds, kind)
                    && (rule.matcher.path.exact_match(path)
                        || (label_prefix
                            && rule.symbol.is_label()
                            && rule.matcher.path.prefix_match(path)))
            })
            .collect()
    }

    /// Adds `kind` to the resource-name symbol.
    ///
    /// Appends to the first `metadata.name` definition, or creates one. No-op
    /// (returns `false`) when the kind is already declared or no resource-name
    /// symbol exists.
    pub fn register_kind(&mut self, kind: &str) -> bool {
        let Some(symbol) = self
            .symbols
            .iter_mut()
            .find(|symbol| symbol.name == SymbolClass::ResourceName)
        else {
            return false;
        };

        if symbol
            .definitions
            .iter()
            .any(|definition| definition.kinds.iter().any(|k| k == kind))
        {
            return false;
        }

        let metadata_name = PathPattern::from("metadata.name");
        match symbol
            .definitions
            .iter_mut()
            .find(|definition| definition.path == metadata_name)
        {
            Some(definition) => definition.kinds.push(kind.to_string()),
            None => symbol.definitions.push(SymbolDefinition {
                kinds: vec![kind.to_string()],
                path: metadata_name,
            }),
        }
        true
    }
}
