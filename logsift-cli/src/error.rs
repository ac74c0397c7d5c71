//! CLI-specific error types and exit code mapping

use logsift_core::error::SiftError;
use logsift_indexer::IndexerError;
use logsift_query::QueryError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Input rejected before any backend call (bad window, malformed locator, ...).
    #[error("invalid input: {0}")]
    Input(String),

    /// The search backend failed or could not be reached.
    #[error("backend error: {0}")]
    Backend(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                              |
    /// |------|--------------------------------------|
    /// | 0    | Success                              |
    /// | 1    | General / command error              |
    /// | 2    | Configuration error                  |
    /// | 3    | Invalid input                        |
    /// | 4    | Backend failure                      |
    /// | 10   | IO error                             |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Input(_) => 3,
            Self::Backend(_) => 4,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<SiftError> for CliError {
    fn from(e: SiftError) -> Self {
        match e {
            SiftError::Config(e) => Self::Config(e.to_string()),
            SiftError::Validation(e) => Self::Input(e.to_string()),
            SiftError::Backend(e) => Self::Backend(e.to_string()),
            SiftError::Io(e) => Self::Io(e),
        }
    }
}

impl From<IndexerError> for CliError {
    fn from(e: IndexerError) -> Self {
        SiftError::from(e).into()
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        SiftError::from(e).into()
    }
}
