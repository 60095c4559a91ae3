//! Error types for ipgate.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for ipgate operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure while fetching a remote list
    #[error("fetching {location}: {source}")]
    Fetch {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    /// Remote list answered with a non-success status
    #[error("fetching {location}: HTTP status {status}")]
    HttpStatus { location: String, status: u16 },

    /// Local list could not be read
    #[error("reading {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Provider answered but reported failure
    #[error("fetch ip list from {provider}: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// Provider payload could not be decoded
    #[error("decoding {provider} response: {source}")]
    ProviderPayload {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Derived client address is not an IP
    #[error("invalid client address: {0:?}")]
    InvalidClientAddress(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Refresh was cancelled by shutdown
    #[error("refresh cancelled")]
    Cancelled,

    /// Refresh ran past its deadline
    #[error("refresh timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network or file I/O failure while resolving a source
    SourceFetch,
    /// Well-known provider reported failure or sent a malformed payload
    ProviderResponse,
    /// Request's client address is not a valid IP
    InvalidClientAddress,
    /// Rejected before provisioning
    Configuration,
    /// Shutdown interrupted the work
    Cancelled,
}

impl Error {
    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Fetch { .. }
            | Error::HttpStatus { .. }
            | Error::ReadFile { .. }
            | Error::Io(_)
            | Error::Timeout(_) => ErrorKind::SourceFetch,
            Error::Provider { .. } | Error::ProviderPayload { .. } => ErrorKind::ProviderResponse,
            Error::InvalidClientAddress(_) => ErrorKind::InvalidClientAddress,
            Error::Config(_) | Error::Yaml(_) => ErrorKind::Configuration,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Result type alias for ipgate operations.
pub type Result<T> = std::result::Result<T, Error>;
