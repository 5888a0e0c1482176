//! Manifest and path-mapping documents read by the warehouse.

use crate::{Result, error::RedloadError};
use serde::{Deserialize, Serialize};

/// One object listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Object URI
    pub url: String,
    /// When false, a missing object is skipped instead of failing the load
    pub mandatory: bool,
}

/// An explicit list of source objects.
///
/// ```rust
/// use redload_core::load::Manifest;
///
/// let manifest = Manifest::new()
///     .with_entry("s3://bucket/part-0.csv", true)
///     .with_entry("s3://bucket/missing.csv", false);
/// let json = manifest.to_json().unwrap();
/// assert!(json.contains(r#""mandatory":false"#));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Listed objects, possibly empty
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method adding an entry.
    pub fn with_entry(mut self, url: impl Into<String>, mandatory: bool) -> Self {
        self.entries.push(ManifestEntry {
            url: url.into(),
            mandatory,
        });
        self
    }

    /// Serializes to the document format.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RedloadError::serialization("failed to serialize manifest", e))
    }

    /// Parses a manifest document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RedloadError::serialization("failed to parse manifest", e))
    }
}

/// Ordered field-extraction expressions, applied positionally to the
/// destination columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonPaths {
    /// Expressions such as `$['id']` or `$.name`
    pub jsonpaths: Vec<String>,
}

impl JsonPaths {
    /// Creates a path file from expressions.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            jsonpaths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Serializes to the document format.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RedloadError::serialization("failed to serialize jsonpaths", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_document_format() {
        let manifest = Manifest::new().with_entry("s3://b/a.csv", true);
        assert_eq!(
            manifest.to_json().unwrap(),
            r#"{"entries":[{"url":"s3://b/a.csv","mandatory":true}]}"#
        );
        assert_eq!(Manifest::new().to_json().unwrap(), r#"{"entries":[]}"#);
    }

    #[test]
    fn test_manifest_parse() {
        let manifest = Manifest::from_json(
            r#"{"entries":[{"url":"s3://b/a","mandatory":false},{"url":"s3://b/c","mandatory":true}]}"#,
        )
        .unwrap();
        assert_eq!(manifest.entries.len(), 2);
        assert!(!manifest.entries[0].mandatory);
        assert!(Manifest::from_json("{").is_err());
    }

    #[test]
    fn test_jsonpaths_document_format() {
        let paths = JsonPaths::new(["$['id']", "$['name']"]);
        assert_eq!(
            paths.to_json().unwrap(),
            r#"{"jsonpaths":["$['id']","$['name']"]}"#
        );
    }
}
