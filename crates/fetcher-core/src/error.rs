//! Error types for fetch operations.
//!
//! Two layers are defined here:
//!
//! - [`SourceError`] - what an upstream provider call can fail with. Only
//!   [`SourceError::Connection`] and [`SourceError::Timeout`] are transient.
//! - [`DataFetchError`] - what a fetcher surfaces to its caller. Provider
//!   errors are wrapped into [`DataFetchError::Provider`].

use std::time::Duration;

use thiserror::Error;

/// Errors raised by an upstream market data source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The connection to the provider could not be established or was reset.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Rate limit exceeded by the provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// The requested symbol was not found.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response context.
        message: String,
    },

    /// Error parsing the provider payload.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Any other provider error.
    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Returns true for transport failures worth retrying (connection and timeout).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Errors surfaced by a fetcher.
#[derive(Error, Debug)]
pub enum DataFetchError {
    /// The provider succeeded but returned no rows.
    #[error("No data returned for {symbol} in range {start} to {end}")]
    Empty {
        /// The symbol that was requested.
        symbol: String,
        /// Start of the requested date range.
        start: String,
        /// End of the requested date range.
        end: String,
    },

    /// The provider call failed.
    #[error("{provider} fetch failed: {source}")]
    Provider {
        /// Name of the upstream provider.
        provider: String,
        /// Underlying provider error.
        #[source]
        source: SourceError,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Reshaping the provider frame into the standard schema failed.
    #[error("Frame error: {0}")]
    Frame(String),
}

impl DataFetchError {
    /// Wraps a provider error.
    #[must_use]
    pub fn provider(provider: impl Into<String>, source: SourceError) -> Self {
        Self::Provider {
            provider: provider.into(),
            source,
        }
    }
}

impl From<polars::prelude::PolarsError> for DataFetchError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        Self::Frame(e.to_string())
    }
}

/// Result type alias using [`DataFetchError`].
pub type Result<T> = std::result::Result<T, DataFetchError>;
