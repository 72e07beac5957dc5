//! Manifest dependency extraction.
//!
//! Extraction is line-based: a line that contains the
//! declaration marker is treated as one dependency declaration, and the
//! URL and version are cut out of it by substring search. Declarations
//! spanning several lines are not recognized, and malformed declarations
//! produce records with empty or partial fields instead of errors.
//!
//! # Default markers (Swift Package Manager)
//!
//! | Field | Marker | Ends at |
//! |-------|--------|---------|
//! | declaration | `.package(` | |
//! | URL | `url:` | `,` |
//! | version | `from:` | `)` |
//!
//! ```rust
//! use depcrawl_core::extract::{ManifestExtractor, MarkerExtractor};
//! use depcrawl_core::models::RepositoryRef;
//!
//! let line = r#".package(url: "https://github.com/x/y", from: "1.2.0"),"#;
//! let deps = MarkerExtractor::default().extract(line, &RepositoryRef::new("me", "app"));
//! assert_eq!(deps.len(), 1);
//! assert_eq!(deps[0].package_location, "https://github.com/x/y");
//! assert_eq!(deps[0].version_constraint, "1.2.0");
//! ```

use serde::Deserialize;

use crate::models::{DependencyRecord, RepositoryRef};

/// Turns manifest text into the flat list of dependencies it declares.
///
/// Returned records have depth 0 and no sub-dependencies; the resolver
/// fills in the tree.
pub trait ManifestExtractor: Send + Sync {
    fn extract(&self, manifest: &str, declaring_repo: &RepositoryRef) -> Vec<DependencyRecord>;
}

/// Marker strings driving [`MarkerExtractor`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtractorMarkers {
    pub declaration_marker: String,
    pub url_marker: String,
    pub url_delimiter: String,
    pub version_marker: String,
    pub version_delimiter: String,
}

impl Default for ExtractorMarkers {
    fn default() -> Self {
        Self {
            declaration_marker: ".package(".to_string(),
            url_marker: "url:".to_string(),
            url_delimiter: ",".to_string(),
            version_marker: "from:".to_string(),
            version_delimiter: ")".to_string(),
        }
    }
}

/// Best-effort, single-line, marker-based extractor.
#[derive(Debug, Clone, Default)]
pub struct MarkerExtractor {
    markers: ExtractorMarkers,
}

impl MarkerExtractor {
    pub fn new(markers: ExtractorMarkers) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &ExtractorMarkers {
        &self.markers
    }
}

impl ManifestExtractor for MarkerExtractor {
    fn extract(&self, manifest: &str, declaring_repo: &RepositoryRef) -> Vec<DependencyRecord> {
        manifest
            .lines()
            .filter(|line| line.contains(self.markers.declaration_marker.as_str()))
            .map(|line| {
                let url = field_value(line, &self.markers.url_marker, &self.markers.url_delimiter);
                let version = field_value(
                    line,
                    &self.markers.version_marker,
                    &self.markers.version_delimiter,
                );
                DependencyRecord::new(url, version, declaring_repo.clone(), 0)
            })
            .collect()
    }
}

/// Text between `marker` and the next `delimiter`, quotes removed and trimmed.
///
/// Missing marker: empty string. Missing delimiter: rest of the line.
fn field_value(line: &str, marker: &str, delimiter: &str) -> String {
    let Some(pos) = line.find(marker) else {
        return String::new();
    };
    let rest = &line[pos + marker.len()..];
    let raw = match rest.find(delimiter) {
        Some(end) => &rest[..end],
        None => rest,
    };
    raw.replace('"', "").trim().to_string()
}
