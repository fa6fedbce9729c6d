//! Error types for the redtalon domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all redtalon operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller mistakes ---
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    // --- Upstream service errors (embedding / completion) ---
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    // --- Datastore errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a missing resource.
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from the embedding or model-completion services.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Authentication and configuration failures are permanent; everything
    /// else is worth another attempt within the deadline.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            UpstreamError::AuthenticationFailed(_) | UpstreamError::NotConfigured(_)
        )
    }
}

/// Failures from the datastore.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_displays_correctly() {
        let err = Error::Upstream(UpstreamError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn not_found_displays_resource_and_id() {
        let err = Error::not_found("project", "proj_42");
        assert!(err.to_string().contains("project"));
        assert!(err.to_string().contains("proj_42"));
    }

    #[test]
    fn auth_failures_are_not_retryable() {
        assert!(!UpstreamError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!UpstreamError::NotConfigured("no key".into()).is_retryable());
        assert!(UpstreamError::Timeout("embed".into()).is_retryable());
        assert!(
            UpstreamError::RateLimited {
                retry_after_secs: 5
            }
            .is_retryable()
        );
    }

    #[test]
    fn store_error_wraps_into_top_level() {
        let err: Error = StoreError::QueryFailed("no such table".into()).into();
        assert!(err.to_string().contains("no such table"));
    }
}
