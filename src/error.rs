//! Error types for the argkmin kernel.

use thiserror::Error;

/// Errors that can occur while validating an argkmin call.
///
/// Validation happens once at the entry point; past that the computation
/// is infallible.
#[derive(Debug, Error)]
pub enum ArgKminError {
    /// The k parameter is zero, which is invalid for a k-NN search.
    #[error("k must be >= 1, got {0}")]
    InvalidK(usize),

    /// More neighbors requested than reference rows exist.
    #[error("k ({k}) exceeds the number of reference rows ({m})")]
    KExceedsRows { k: usize, m: usize },

    /// The query or reference matrix has no rows or no columns.
    #[error("empty input: {0} matrix has no data")]
    EmptyInput(&'static str),

    /// The query and reference matrices disagree on dimensionality.
    #[error("dimension mismatch: queries have {query} columns, references have {reference}")]
    DimensionMismatch { query: usize, reference: usize },

    /// A strategy string other than "auto", "chunk_on_X" or "chunk_on_Y".
    #[error("unknown strategy: {0:?}")]
    UnknownStrategy(String),
}
