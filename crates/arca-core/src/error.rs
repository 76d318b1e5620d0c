//! Error types shared by the arca crates.

use std::fmt;
use std::path::{Path, PathBuf};

/// A single entry of the `Errors` list returned by WSFEv1.
///
/// The code and message are kept exactly as the service sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// Numeric error code (`Err/Code`).
    pub code: i64,
    /// Human-readable message (`Err/Msg`).
    pub message: String,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Errors that can occur while configuring, authenticating, invoicing or printing.
///
/// The enum is `#[non_exhaustive]` to allow adding new failure modes
/// without breaking changes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// File system error tied to a path.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// Input validation error
    #[error("Validation error: {message}")]
    Validation {
        /// Field or aspect that failed validation
        field: Option<String>,
        /// What went wrong
        message: String,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed XML in a request or response
    #[error("XML error: {message}")]
    Xml {
        /// Parser message
        message: String,
    },

    /// SOAP Fault returned by a web service
    #[error("SOAP fault {code}: {message}")]
    Soap {
        /// `faultcode`, or the HTTP status when no fault was present
        code: String,
        /// `faultstring`
        message: String,
    },

    /// The remote service answered with its own error list
    #[error("AFIP rejected the request: {}", join_service_errors(.errors))]
    Service {
        /// Entries of the `Errors` element, verbatim
        errors: Vec<ServiceError>,
    },

    /// The CMS signing step failed
    #[error("Signing error: {message}{}", render_stderr(.stderr))]
    Signing {
        /// What failed
        message: String,
        /// Standard error captured from the signing tool
        stderr: String,
    },

    /// A required element was absent from a response
    #[error("Missing field in response: {field}")]
    MissingField {
        /// Element name
        field: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience `Result` type alias for arca operations.
pub type Result<T> = std::result::Result<T, Error>;

fn join_service_errors(errors: &[ServiceError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn render_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" (stderr: {trimmed})")
    }
}

impl Error {
    /// Returns whether this error is worth retrying.
    ///
    /// Only transport failures qualify; the library itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Io { .. } => true,
            Error::Config { .. }
            | Error::Validation { .. }
            | Error::Xml { .. }
            | Error::Soap { .. }
            | Error::Service { .. }
            | Error::Signing { .. }
            | Error::MissingField { .. }
            | Error::Serialization(_) => false,
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a new validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a new validation error with a field name.
    pub fn validation_field<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Wraps an I/O error with the path it happened on.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a new XML error.
    pub fn xml<S: Into<String>>(message: S) -> Self {
        Error::Xml {
            message: message.into(),
        }
    }

    /// Creates a missing-field error.
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Error::MissingField {
            field: field.into(),
        }
    }

    /// Creates a signing error carrying the tool's stderr.
    pub fn signing<M, E>(message: M, stderr: E) -> Self
    where
        M: Into<String>,
        E: Into<String>,
    {
        Error::Signing {
            message: message.into(),
            stderr: stderr.into(),
        }
    }
}
