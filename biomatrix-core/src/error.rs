//! Error types shared by every matrix, view, codec and file format

use thiserror::Error;

/// Errors raised by matrix operations
#[derive(Debug, Error)]
pub enum MatrixError {
    /// Malformed input: bad header, wrong line length, unsorted pair, wrong sentinel
    #[error("Format error: {message}")]
    Format { message: String },

    /// Unknown key, or a non-try accessor used on an absent value
    #[error("Lookup error: {message}")]
    Lookup { message: String },

    /// API misuse: writing a read-only view, assigning the sentinel, use after release
    #[error("Usage error: {message}")]
    Usage { message: String },

    /// Inputs that cannot be combined: disagreeing duplicates, incompatible keys or sentinels
    #[error("Consistency error: {message}")]
    Consistency { message: String },

    /// Every candidate parser rejected the file
    #[error("Could not parse {file} (first line: {first_line:?})\n{log}")]
    Parse {
        file: String,
        first_line: String,
        log: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MatrixError {
    pub fn format<S: Into<String>>(message: S) -> Self {
        Self::Format { message: message.into() }
    }

    pub fn lookup<S: Into<String>>(message: S) -> Self {
        Self::Lookup { message: message.into() }
    }

    pub fn usage<S: Into<String>>(message: S) -> Self {
        Self::Usage { message: message.into() }
    }

    pub fn consistency<S: Into<String>>(message: S) -> Self {
        Self::Consistency { message: message.into() }
    }

    /// Format error carrying the 1-based line number it was found on
    pub fn format_at<S: AsRef<str>>(line: usize, message: S) -> Self {
        Self::Format {
            message: format!("line {}: {}", line, message.as_ref()),
        }
    }

    /// Prefix a format error with the line it came from; other errors pass through
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Self::Format { message } => Self::format_at(line, message),
            other => other,
        }
    }

    pub fn unknown_row(key: &str) -> Self {
        Self::lookup(format!("row key '{}' is not in the matrix", key))
    }

    pub fn unknown_col(key: &str) -> Self {
        Self::lookup(format!("column key '{}' is not in the matrix", key))
    }

    pub fn read_only(kind: &str) -> Self {
        Self::usage(format!("{} view is read-only", kind))
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup { .. })
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. })
    }

    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency { .. })
    }
}

/// Result type for matrix operations
pub type MatrixResult<T> = Result<T, MatrixError>;
