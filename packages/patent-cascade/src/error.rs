//! Typed errors for the fetch engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Transient network failures
//! never escape the retry layer; only misuse and caller deadlines surface.

use thiserror::Error;

/// Errors that can occur while performing a single network attempt.
///
/// These are always absorbed by the retry executor and classified for
/// observability; they are never returned from the top-level search API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The per-attempt timeout elapsed before a response arrived
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Connection-level failure (refused, reset, proxy dead)
    #[error("connection error: {0}")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Transport failure after the connection was established
    #[error("HTTP transport error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The proxy endpoint could not be used to build a client
    #[error("unusable proxy endpoint: {url}")]
    Proxy { url: String },
}

/// Errors surfaced by the top-level search API.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The query was empty or otherwise malformed
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// The caller-imposed deadline expired before the cascade finished.
    ///
    /// Reported distinctly from "no results found" — an exhausted cascade
    /// is a valid empty outcome, not an error.
    #[error("query deadline exceeded")]
    DeadlineExceeded,
}

/// Result type alias for single-attempt fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for top-level search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;
