//! Error types for trace-search
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

use crate::value::Value;

/// Error type for trace construction
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TraceError {
    /// A site name was appended twice within one trace
    #[error("Duplicate site in trace: {0}")]
    DuplicateSite(String),
}

/// Error type for search failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    /// The exhaustive search spent its whole try budget without draining the
    /// frontier
    #[error("Max tries ({0}) exceeded")]
    MaxTriesExceeded(usize),

    /// The best-first frontier drained before a single execution completed
    #[error("Frontier underflow: the program has no completed executions")]
    FrontierUnderflow,

    /// A reached site has no finite enumerable support
    #[error("Site {0} has no enumerable support")]
    NotEnumerable(String),

    /// Trace bookkeeping failed mid-search
    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// Error type for marginal queries
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarginalError {
    /// A `log_prob` query for a value outside the observed support
    #[error("Value {value:?} not in support of distribution ({support:?})")]
    ValueOutOfSupport { value: Value, support: Vec<Value> },

    /// A named site was requested but absent from a completed trace
    #[error("Missing site in trace: {0}")]
    MissingSite(String),

    /// Moment queries are defined for numeric-vector-like values only
    #[error("Value {0:?} is not numeric-vector-like")]
    NotNumeric(Value),

    /// Support values disagree on numeric dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The marginal was built from zero completed traces
    #[error("Empty support")]
    EmptySupport,

    /// Coordinate projection was requested on an unsupported shape
    #[error("Invalid projection: {0}")]
    InvalidProjection(String),
}

/// Top-level error type for inference operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    /// Trace error
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    /// Search error
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Marginal error
    #[error("Marginal error: {0}")]
    Marginal(#[from] MarginalError),
}

/// Result type alias for inference operations
pub type InferenceResult<T> = Result<T, InferenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_error_display() {
        let err = TraceError::DuplicateSite("coin".to_string());
        assert_eq!(err.to_string(), "Duplicate site in trace: coin");
    }

    #[test]
    fn test_search_error_display() {
        let err = SearchError::MaxTriesExceeded(1_000_000);
        assert_eq!(err.to_string(), "Max tries (1000000) exceeded");

        let err = SearchError::NotEnumerable("noise".to_string());
        assert_eq!(err.to_string(), "Site noise has no enumerable support");

        let err = SearchError::FrontierUnderflow;
        assert_eq!(
            err.to_string(),
            "Frontier underflow: the program has no completed executions"
        );
    }

    #[test]
    fn test_marginal_error_display() {
        let err = MarginalError::MissingSite("speaker".to_string());
        assert_eq!(err.to_string(), "Missing site in trace: speaker");

        let err = MarginalError::DimensionMismatch {
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 2, got 3");
    }

    #[test]
    fn test_inference_error_from_search_error() {
        let search_err = SearchError::FrontierUnderflow;
        let err: InferenceError = search_err.into();
        assert!(matches!(err, InferenceError::Search(_)));
    }

    #[test]
    fn test_inference_error_from_trace_error() {
        let trace_err = TraceError::DuplicateSite("coin".to_string());
        let err: InferenceError = trace_err.into();
        assert!(matches!(err, InferenceError::Trace(_)));
    }
}
