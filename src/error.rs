// src/error.rs

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures of a single ingestion, aggregation or prediction call.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("aggregation failed: {0}")]
    Computation(String),
}

impl IngestError {
    /// Map an `open`/`read` failure onto the right kind for `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            IngestError::FileNotFound(path)
        } else {
            IngestError::Io { path, source }
        }
    }
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Per-row problems that are recovered from and never abort a load.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestWarning {
    MalformedRow {
        row: u64,
        expected: usize,
        found: usize,
    },
    StructuredValue {
        column: String,
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_io_maps_to_file_not_found() {
        let err = IngestError::from_io(
            "missing.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, IngestError::FileNotFound(p) if p == PathBuf::from("missing.csv")));

        let err = IngestError::from_io(
            "locked.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
