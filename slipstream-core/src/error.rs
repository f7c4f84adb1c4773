//! Error types for the SlipStream client

use thiserror::Error;

/// Core error type for SlipStream operations
#[derive(Error, Debug)]
pub enum SlipStreamError {
    /// The server answered with a non-success status code
    #[error("HTTP {status} error at {endpoint}: {body}")]
    Http {
        status: u16,
        endpoint: String,
        body: String,
    },

    /// The request never produced a response (connection, TLS, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response document could not be mapped into records
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required attribute is absent from a response element
    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute { element: String, attribute: String },

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested profile section does not exist
    #[error("Profile '{0}' does not exist.")]
    ProfileNotFound(String),

    /// Command-line usage errors (unknown command, alias loop, bad option)
    #[error("{0}")]
    Usage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SlipStreamError {
    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SlipStreamError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error is a usage error rather than a command failure.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            SlipStreamError::Usage(_)
                | SlipStreamError::ProfileNotFound(_)
                | SlipStreamError::Config(_)
        )
    }
}

/// Result type alias for SlipStream operations
pub type Result<T> = std::result::Result<T, SlipStreamError>;

impl From<roxmltree::Error> for SlipStreamError {
    fn from(err: roxmltree::Error) -> Self {
        SlipStreamError::Parse(format!("invalid XML document: {}", err))
    }
}
