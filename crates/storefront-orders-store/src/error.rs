//! Error types for spreadsheet access.

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur when talking to the spreadsheet.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network or transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The spreadsheet API returned an error.
    #[error("spreadsheet API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Credentials were missing, expired or refused.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The API quota was exhausted.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A row or sheet did not have the expected shape.
    #[error("malformed sheet data: {0}")]
    Malformed(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Auth(_) | Self::Malformed(_) | Self::Configuration(_) => false,
        }
    }
}
