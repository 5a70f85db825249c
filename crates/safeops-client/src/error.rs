use thiserror::Error;

/// Why a single endpoint produced no data. Callers treat every variant the
/// same way for display purposes; the distinction exists for logging and for
/// the manager's fallback reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("request cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("status {0}")]
    Status(u16),

    #[error("malformed body: {0}")]
    Decode(String),
}

/// Failure of a user-initiated action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{action} failed: {source}")]
    Request {
        action: &'static str,
        #[source]
        source: FetchError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
