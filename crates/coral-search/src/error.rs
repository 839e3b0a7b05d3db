//! Error types for data-plane operations.

use thiserror::Error;

/// Result type alias for data-plane operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors from the search engine client.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The engine answered with a non-2xx status.
    #[error("engine returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body could not be decoded into the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}
