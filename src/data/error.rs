//! Error types for the collision data pipeline.
//!
//! Loading and querying fail in different ways and are reported to the
//! dashboard separately, so each gets its own enum.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Failure to turn a source into a [`Table`](super::Table).
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source uses a scheme other than `file`, `http` or `https`.
    #[error("unsupported source '{0}': expected a local path, file:// URI or http(s) URL")]
    UnsupportedSource(String),

    /// A remote source could not be fetched (transport failure or non-2xx status).
    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// The file extension does not map to a known format.
    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A column the collision schema cannot do without is absent.
    #[error("required column '{0}' not found in source")]
    MissingColumn(&'static str),

    /// The container itself is malformed (not a per-row problem).
    #[error("malformed source: {0}")]
    Malformed(String),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A filter that cannot be applied to any table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidCriteriaError {
    #[error("date range start {start} is after end {end}")]
    InvertedDateRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("unknown borough '{0}'")]
    UnknownBorough(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoadError::MissingColumn("crash_date");
        assert_eq!(
            err.to_string(),
            "required column 'crash_date' not found in source"
        );

        let err = InvalidCriteriaError::UnknownBorough("Hoboken".into());
        assert_eq!(err.to_string(), "unknown borough 'Hoboken'");

        let err = LoadError::UnsupportedSource("s3://bucket/rows.csv".into());
        assert!(err.to_string().contains("s3://bucket/rows.csv"));
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = LoadError::io(
            "/nope.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().starts_with("failed to read /nope.csv"));
    }
}
