//! Dotted path patterns used by rules (`spec.template.spec.containers[].name`)

use serde::Deserialize;
use std::fmt;

/// A structural path pattern.
///
/// The `[]` list annotation on a segment is accepted and dropped: sequence
/// traversal never adds a segment, so it has no effect on matching.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub struct PathPattern {
    segments: Vec<String>,
}

impl PathPattern {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Same number of segments, all equal
    pub fn exact_match(&self, path: &[String]) -> bool {
        path.len() == self.segments.len()
            && path.iter().zip(&self.segments).all(|(a, b)| a == b)
    }

    /// `path` starts with every segment of the pattern
    pub fn prefix_match(&self, path: &[String]) -> bool {
        path.len() >= self.segments.len()
            && path.iter().zip(&self.segments).all(|(a, b)| a == b)
    }
}

impl From<&str> for PathPattern {
    fn from(pattern: &str) -> Self {
        let segments = pattern
            .split('.')
            .map(|segment| segment.trim().trim_end_matches("[]"))
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Self { segments }
    }
}

impl From<String> for PathPattern {
    fn from(pattern: String) -> Self {
        Self::from(pattern.as_str())
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case("metadata.name", &["metadata", "name"], true)]
    #[case("metadata.name", &["metadata"], false)]
    #[case("metadata.name", &["metadata", "name", "x"], false)]
    #[case("spec.containers[].name", &["spec", "containers", "name"], true)]
    #[case("spec.volumes.name", &["spec", "volumes", "other"], false)]
    fn exact_match_returns_expected(
        #[case] pattern: &str,
        #[case] segments: &[&str],
        #[case] expected: bool,
    ) {
        assert_eq!(PathPattern::from(pattern).exact_match(&path(segments)), expected);
    }

    #[rstest]
    #[case("spec.selector", &["spec", "selector", "app"], true)]
    #[case("spec.selector", &["spec", "selector"], true)]
    #[case("spec.selector", &["spec"], false)]
    #[case("spec.selector", &["metadata", "selector", "app"], false)]
    fn prefix_match_returns_expected(
        #[case] pattern: &str,
        #[case] segments: &[&str],
        #[case] expected: bool,
    ) {
        assert_eq!(PathPattern::from(pattern).prefix_match(&path(segments)), expected);
    }

    #[test]
    fn deserialize_strips_list_annotation() {
        let pattern: PathPattern = serde_yaml::from_str("spec.containers[].env[].name").unwrap();

        assert_eq!(pattern.to_string(), "spec.containers.env.name");
    }
}
