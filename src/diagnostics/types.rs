//! Validation schema (`validation.yaml`)

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub rules: Vec<ValidationRule>,
}

/// Checks applied to every document of `kind`
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationRule {
    pub kind: String,
    #[serde(default)]
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    /// The value must name a stored resource, or the selector must match one
    Reference,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    #[serde(rename = "type")]
    pub check_type: CheckType,
    /// Dotted path; sequences along the way are searched element-wise
    pub path: String,
    pub target_kind: String,
    #[serde(default)]
    pub message: String,
}
