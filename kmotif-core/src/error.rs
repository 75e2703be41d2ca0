//! Error type for the motif discovery core

use thiserror::Error;

/// Errors that can occur during motif discovery
#[derive(Debug, Error)]
pub enum MotifError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid sequence: {0}")]
    InvalidSequence(String),

    /// An input line does not match the length established by the first line
    #[error("Line \"{line}\" was of uneven length ({found}, expected {expected})")]
    Parse {
        line: String,
        expected: usize,
        found: usize,
    },

    /// The k-mer engine was queried before any k-mers were loaded
    #[error("K-mer engine is not initialized")]
    EngineNotReady,

    #[error("Sequence provider error: {0}")]
    Provider(String),

    /// A threshold worker left a dispatched slot empty
    #[error("Significance worker failed to fill slot {index} of {total}")]
    WorkerFailure { index: usize, total: usize },
}

impl MotifError {
    pub fn invalid_params<S: Into<String>>(message: S) -> Self {
        Self::InvalidParams(message.into())
    }

    pub fn invalid_sequence<S: Into<String>>(message: S) -> Self {
        Self::InvalidSequence(message.into())
    }

    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider(message.into())
    }
}

/// Result type for motif discovery operations
pub type MotifResult<T> = Result<T, MotifError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message_names_line() {
        let err = MotifError::Parse {
            line: "ACG".to_string(),
            expected: 4,
            found: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("\"ACG\""));
        assert!(msg.contains("expected 4"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MotifError = io_err.into();
        assert!(matches!(err, MotifError::Io(_)));
    }
}
