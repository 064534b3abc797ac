//! Error types for the gateway.

pub mod unified;

pub use unified::ErrorKind;

use std::path::PathBuf;

use thiserror::Error;

/// Startup-time configuration failures. Any of these aborts the process before
/// a single mount is served.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unsupported backend type: {0}")]
    UnsupportedBackendType(String),

    #[error("Bot '{bot}': history_length must be at least 1, got {value}")]
    InvalidHistoryLength { bot: String, value: i64 },

    #[error("Bot '{bot}': missing credential `{field}`")]
    MissingCredential { bot: String, field: String },

    #[error("Bot '{bot}': invalid `{field}`: {message}")]
    InvalidValue {
        bot: String,
        field: String,
        message: String,
    },

    #[error("Mount path {0} is used by more than one bot")]
    DuplicateMount(String),

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config file {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

/// Per-request backend failures. These end one response stream and never the
/// process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl BackendError {
    /// Classify this error for logs and error events.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::BackendUnavailable,
            Self::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::StreamInterrupted(_) => ErrorKind::StreamInterrupted,
        }
    }

    /// Whether the client may reasonably retry the same query.
    pub fn allows_retry(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::StreamInterrupted(_))
    }

    /// Re-label a failure that happened after fragments were already sent.
    pub fn into_interruption(self) -> Self {
        match self {
            Self::StreamInterrupted(_) => self,
            other => Self::StreamInterrupted(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            BackendError::InvalidRequest(err.to_string())
        } else if err.is_body() || err.is_decode() {
            BackendError::StreamInterrupted(err.to_string())
        } else {
            BackendError::Unavailable(err.to_string())
        }
    }
}

/// Primary error type for the gateway binary and library entry points.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl GatewayError {
    /// Classify this error into a kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Backend(e) => e.kind(),
            Self::Io(_) | Self::Logging(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GatewayError>;
