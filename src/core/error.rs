use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReferenceDataError {
    #[error("failed to read {table} table from {}: {source}", .path.display())]
    Io {
        table: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {table} table: {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{table} brackets for '{key}' are not contiguous at index {index}")]
    NonContiguousBrackets {
        table: &'static str,
        key: String,
        index: usize,
    },

    #[error("{table} brackets for '{key}' have an unbounded bracket before the last entry")]
    UnboundedInnerBracket { table: &'static str, key: String },
}
