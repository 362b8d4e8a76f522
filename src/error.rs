//! Error types for Warden.

use thiserror::Error;

/// Common error type for Warden.
#[derive(Error, Debug)]
pub enum WardenError {
    /// A physical request to the upstream API timed out.
    #[error("upstream request timed out after {0} seconds")]
    Timeout(u64),

    /// The upstream API kept rate limiting us after exhausting the retry budget.
    #[error("rate limited by upstream after {0} attempts")]
    RateLimited(u32),

    /// The server key was rejected by the upstream API (HTTP 403).
    ///
    /// This is never retried; the credential itself is wrong or revoked.
    #[error("server key rejected by upstream")]
    InvalidCredential,

    /// The upstream API returned an unexpected non-2xx status.
    #[error("upstream error: status {0}")]
    Upstream(u16),

    /// Network-level failure talking to the upstream API, or an unparseable
    /// response body.
    #[error("transport error: {0}")]
    Transport(String),

    /// Database error.
    ///
    /// This is a generic database error that wraps errors from any store
    /// backend. Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// Validation error for configuration or input.
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WardenError {
    /// Whether the error is a transient upstream condition.
    ///
    /// Transient errors mean "no data this cycle" to the ingestion pipeline;
    /// the next poll may well succeed without any intervention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WardenError::Timeout(_)
                | WardenError::RateLimited(_)
                | WardenError::Upstream(_)
                | WardenError::Transport(_)
        )
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for WardenError {
    fn from(e: sqlx::Error) -> Self {
        WardenError::Database(e.to_string())
    }
}

/// Result type alias for Warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
