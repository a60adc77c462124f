//! Blocked, parallel, GEMM-accelerated brute-force k-nearest-neighbors
//! backend.
//!
//! Given a query matrix and a reference matrix, [`argkmin`] returns for
//! every query row the indices (and optionally the Euclidean distances) of
//! its k nearest reference rows. Cross terms are computed tile by tile
//! with a matrix-matrix multiply, candidates are folded into bounded
//! per-row heaps, and the parallel axis is chosen per call from the input
//! shape and the available worker count.

pub mod algo;
pub mod error;
pub mod gemm;
pub mod heap;
pub mod metric;
pub mod telemetry;

#[cfg(feature = "python")]
mod python;

pub use algo::{
    argkmin, argkmin_with_distance, ArgKmin, ArgKminOutput, Strategy, DEFAULT_CHUNK_SIZE,
    MIN_CHUNK_SIZE,
};
pub use error::ArgKminError;
pub use telemetry::ArgKminTelemetry;
