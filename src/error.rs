//! Error types for the repository.

use thiserror::Error;

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

/// Errors that can occur while loading, filtering, exporting or submitting records
#[derive(Debug, Error)]
pub enum RepoError {
    /// Backing store unreachable, missing or unreadable
    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    /// Requested table (category) does not exist in the store
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Row cannot be mapped onto the table header
    #[error("Malformed row {row} in table '{table}': {reason}")]
    MalformedRow {
        table: String,
        row: usize,
        reason: String,
    },

    /// Submission is missing required fields
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Concurrent modification detected on the backing store.
    ///
    /// Never raised today: writers inside one process are serialized, writers
    /// in other processes are not detected.
    #[error("Write conflict on table '{0}'")]
    WriteConflict(String),

    /// Export serialization failed
    #[error("Export failed: {0}")]
    Export(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RepoError {
    /// Whether a second attempt at the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RepoError::SourceUnavailable(_))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(err: std::io::Error) -> Self {
        RepoError::SourceUnavailable(err.to_string())
    }
}

impl From<calamine::XlsxError> for RepoError {
    fn from(err: calamine::XlsxError) -> Self {
        RepoError::SourceUnavailable(err.to_string())
    }
}

impl From<csv::Error> for RepoError {
    fn from(err: csv::Error) -> Self {
        RepoError::SourceUnavailable(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for RepoError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        RepoError::SourceUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(err: reqwest::Error) -> Self {
        RepoError::SourceUnavailable(err.to_string())
    }
}
