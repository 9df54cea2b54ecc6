//! Common error types for tnsbot

use thiserror::Error;

/// Common result type for tnsbot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the survey client, registry client and engine
#[derive(Error, Debug)]
pub enum Error {
    /// Missing credential, conflicting flags or unusable settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-success HTTP response from a remote service
    #[error("{service} request failed with status {status}: {message}")]
    Remote {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// Transport failure before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Filter band with no registry filter code
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Photometry that cannot be interpreted
    #[error("Malformed photometry: {0}")]
    MalformedPhotometry(String),

    /// Ledger or run-log table could not be read or written
    #[error("Table error: {0}")]
    Table(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that must abort the whole run rather than skip one item
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Table(_) | Error::Io(_))
    }

    /// Errors caused by the data of a single source
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFilter(_) | Error::MalformedPhotometry(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
