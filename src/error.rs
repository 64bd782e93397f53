//! Error types for the disaster-recovery daemon

use thiserror::Error;

/// Main error type for daemon operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    KubeError(#[from] kube::Error),

    /// Watch stream failure
    #[error("Watch error: {0}")]
    WatchError(#[from] kube::runtime::watcher::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP client error (external health endpoint)
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing or malformed startup configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Rejected request (e.g. a mode outside the allowed list)
    #[error("{0}")]
    ValidationError(String),

    /// A switchover is already RUNNING
    #[error("switchover process is already in progress")]
    SwitchoverInProgress,

    /// The tracked document does not exist
    #[error("document {0} not found")]
    NotFound(String),

    /// Field-path type mismatch or otherwise malformed document payload
    #[error("Malformed document: {0}")]
    DocumentError(String),

    /// Failure reported by the embedder-supplied DR action, text kept verbatim
    #[error("{0}")]
    ActionError(String),

    #[error("Health check error: {0}")]
    HealthCheckError(String),

    #[error("TLS error: {0}")]
    TlsError(String),
}

impl Error {
    /// Whether the failure is transient and may succeed on a later attempt
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::KubeError(_) | Error::WatchError(_) | Error::HttpError(_) | Error::IoError(_)
        )
    }

    /// Short, stable label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "kube",
            Error::WatchError(_) => "watch",
            Error::SerializationError(_) => "serialization",
            Error::HttpError(_) => "http",
            Error::IoError(_) => "io",
            Error::ConfigError(_) => "config",
            Error::ValidationError(_) => "validation",
            Error::SwitchoverInProgress => "in_progress",
            Error::NotFound(_) => "not_found",
            Error::DocumentError(_) => "document",
            Error::ActionError(_) => "action",
            Error::HealthCheckError(_) => "health",
            Error::TlsError(_) => "tls",
        }
    }
}

/// Result type alias for daemon operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
