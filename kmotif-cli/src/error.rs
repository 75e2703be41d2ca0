//! Error handling for the kmotif CLI

use kmotif_core::MotifError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for kmotif CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Parsing error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Empty input: {path} contains no sequences")]
    EmptyInput { path: PathBuf },

    #[error("Motif discovery error: {0}")]
    Discovery(#[from] MotifError),
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn parse<F: Into<String>, M: Into<String>>(file: F, message: M) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn empty_input(path: PathBuf) -> Self {
        Self::EmptyInput { path }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(format!("TOML serialization error: {}", err))
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file",
                path.display()
            ));
        }

        CliError::Parse { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Sequence files hold one sequence per line, or FASTA/FASTQ records\n\
                 • Events are written as 'chrom:position', regions as 'chrom:start-end'",
            );
        }

        CliError::EmptyInput { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Blank lines and lines starting with '#' are skipped\n\
                 • Both foreground and background need at least one sequence",
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your kmotif.toml configuration file\n\
                 • Use 'kmotif config --example' to generate a sample configuration\n\
                 • Verify that all configuration values are valid",
            );
        }

        CliError::Discovery(MotifError::InvalidParams(_)) => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • k must lie between 1 and 32\n\
                 • max_clusters and max_rounds must be at least 1",
            );
        }

        _ => {}
    }

    message
}
