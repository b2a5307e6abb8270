use thiserror::Error;

/// Errors raised while assembling the process (configuration, startup).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors a [`Transport`](crate::transport::Transport) implementation reports
/// back to the display layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The target message no longer exists (deleted by a user or an admin).
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// The platform refused the request (bad request, missing rights, …).
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The platform asked us to slow down.
    #[error("Rate limited, retry after {secs}s")]
    RateLimited { secs: u64 },

    /// The call did not complete within its time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Network or protocol failure below the platform API.
    #[error("Network error: {0}")]
    Network(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
