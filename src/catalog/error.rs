//! Error types for the annotation catalog.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while writing or reading a catalog. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Filesystem failure on the catalog or one of its entries.
    #[error("catalog I/O error at {}: {source}", path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding or decoding failure.
    #[error("catalog CSV error in {}: {source}", path.display())]
    Csv {
        /// Catalog path.
        path: PathBuf,
        /// Underlying csv error.
        #[source]
        source: csv::Error,
    },

    /// Structurally invalid catalog content.
    #[error("malformed catalog {} at line {line}: {reason}", path.display())]
    Parse {
        /// Catalog path.
        path: PathBuf,
        /// 1-based line number.
        line: u64,
        /// What was wrong.
        reason: String,
    },

    /// An entry refused at append time.
    #[error("invalid catalog entry for {}: {reason}", path.display())]
    InvalidEntry {
        /// Asset path of the refused entry.
        path: PathBuf,
        /// Why it was refused.
        reason: String,
    },
}

impl CatalogError {
    /// Creates an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a CSV error for `path`.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error at `line` of `path`.
    pub fn parse(path: impl Into<PathBuf>, line: u64, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Creates an invalid-entry error for the asset at `path`.
    pub fn invalid_entry(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_names_line() {
        let error = CatalogError::parse("/data/catalog.csv", 1, "missing column 'title'");
        assert_eq!(
            error.to_string(),
            "malformed catalog /data/catalog.csv at line 1: missing column 'title'"
        );
    }

    #[test]
    fn test_invalid_entry_display() {
        let error = CatalogError::invalid_entry("/data/0001_a.mp3", "file is empty");
        assert!(error.to_string().contains("0001_a.mp3"));
        assert!(error.to_string().contains("file is empty"));
    }
}
