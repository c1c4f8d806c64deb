use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised by the permit pipeline.
///
/// Everything else travels as `anyhow::Error` with context attached; these
/// variants exist so callers (and tests) can tell the fatal cases apart with
/// `downcast_ref`.
#[derive(Debug, Error)]
pub enum PermitError {
    #[error("CSV file not found or unreadable: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected CSV header: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("failed to parse CSV file {}", path.display())]
    CsvRead {
        path: PathBuf,
        #[source]
        source: polars::error::PolarsError,
    },

    #[error("unknown spatial reference: {0}")]
    UnknownSpatialReference(u32),

    #[error("feature class not found: {0}")]
    MissingFeatureClass(String),

    #[error("feature class {class} stores {expected} geometries, got {found}")]
    GeometryMismatch {
        class: String,
        expected: String,
        found: String,
    },
}
