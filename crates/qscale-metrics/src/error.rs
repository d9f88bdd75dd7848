//! Error types for metrics queries.

use thiserror::Error;

/// Errors raised while querying the metrics source.
///
/// None of these are fatal: the caller retries with backoff and never
/// proceeds to reward computation without an observation.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The query could not be executed (connection refused, timeout,
    /// non-2xx response).
    #[error("metrics source unavailable: {reason}")]
    Unavailable { reason: String },

    /// The response arrived but did not carry the expected value.
    #[error("malformed metrics response: {reason}")]
    Malformed { reason: String },

    /// The query matched no series.
    #[error("query returned no samples: {query}")]
    EmptyResult { query: String },
}
