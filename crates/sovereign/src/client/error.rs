//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the assistant backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (connection refused, reset, TLS, ...).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status other than 401.
    #[error("api error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Server health check failed.
    #[error("server unhealthy (status {status})")]
    ServerUnhealthy { status: u16 },

    /// No chunk of the response body arrived within the allowed time.
    #[error("no data received for {seconds}s")]
    Timeout { seconds: u64 },
}
