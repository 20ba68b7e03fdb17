//! Error handling for the biomatrix CLI

use biomatrix_core::MatrixError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for biomatrix CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Parsing error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Matrix error: {0}")]
    Matrix(MatrixError),
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn invalid_format<S: Into<String>>(message: S) -> Self {
        Self::InvalidFormat { message: message.into() }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }
}

impl From<MatrixError> for CliError {
    fn from(err: MatrixError) -> Self {
        match err {
            MatrixError::Format { message } => Self::InvalidFormat { message },
            MatrixError::Parse { file, first_line, log } => Self::Parse {
                file,
                message: format!("no parser accepted the file (first line: {:?})\n{}", first_line, log),
            },
            other => Self::Matrix(other),
        }
    }
}

impl From<regex::Error> for CliError {
    fn from(err: regex::Error) -> Self {
        Self::config(format!("Invalid shard pattern: {}", err))
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    // Add helpful suggestions based on error type
    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file",
                path.display()
            ));
        }

        CliError::InvalidFormat { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check that --codec matches the cell encoding of the file\n\
                 • Packed rows must hold exactly one fixed-width cell per header column\n\
                 • Ensure the file is not corrupted or truncated"
            );
        }

        CliError::Parse { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Every matrix file starts with a header line beginning with 'var'\n\
                 • Run with -v to see why each format was rejected"
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your biomatrix.toml configuration file\n\
                 • Remap entries are written FROM:TO with single-byte symbols"
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}
