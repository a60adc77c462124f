use crate::error::ArgKminError;
use crate::heap;
use crate::metric;
use crate::telemetry::ArgKminTelemetry;
use ndarray::{Array2, ArrayView2, Zip};
use num_traits::Float;
use std::fmt::Debug;
use std::str::FromStr;

pub mod chunk;

/// Default number of rows per tile on both axes.
pub const DEFAULT_CHUNK_SIZE: usize = 256;
/// Tiles below this row count lose more to loop overhead than they gain in
/// cache residency, so requested chunk sizes are clamped up to it.
pub const MIN_CHUNK_SIZE: usize = 20;

/// Which axis carries the parallel loop.
///
/// `Auto` decides per call: when every worker can be handed several query
/// tiles the reduction-free query-axis driver wins, otherwise the
/// reference axis is parallelized to keep workers busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Auto,
    ChunkOnX,
    ChunkOnY,
}

impl Strategy {
    /// Resolve to the axis actually dispatched: true for the query axis.
    pub fn parallel_on_queries(self, n_queries: usize, chunk_size: usize, threads: usize) -> bool {
        match self {
            Strategy::Auto => 4 * chunk_size * threads < n_queries,
            Strategy::ChunkOnX => true,
            Strategy::ChunkOnY => false,
        }
    }
}

impl FromStr for Strategy {
    type Err = ArgKminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Strategy::Auto),
            "chunk_on_X" => Ok(Strategy::ChunkOnX),
            "chunk_on_Y" => Ok(Strategy::ChunkOnY),
            other => Err(ArgKminError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Result of an argkmin computation.
///
/// Row i of `indices` holds the k reference rows nearest to query row i,
/// ascending by distance, ties broken toward the smaller index.
/// `distances` is present when the call asked for it and holds the exact
/// Euclidean distances in the same order.
pub struct ArgKminOutput<T> {
    pub indices: Array2<i64>,
    pub distances: Option<Array2<T>>,
    pub telemetry: ArgKminTelemetry,
}

/// Configurable argkmin entry point.
#[derive(Debug, Clone)]
pub struct ArgKmin {
    chunk_size: usize,
    strategy: Strategy,
    return_distance: bool,
}

impl Default for ArgKmin {
    fn default() -> Self {
        Self::new()
    }
}

impl ArgKmin {
    pub fn new() -> Self {
        ArgKmin {
            chunk_size: DEFAULT_CHUNK_SIZE,
            strategy: Strategy::Auto,
            return_distance: false,
        }
    }

    /// Rows per tile on both axes (clamped to [`MIN_CHUNK_SIZE`]).
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Also return exact Euclidean distances alongside the indices.
    pub fn return_distance(mut self, return_distance: bool) -> Self {
        self.return_distance = return_distance;
        self
    }

    /// For every row of `x`, find the k rows of `y` nearest under the
    /// Euclidean distance.
    pub fn compute<T>(
        &self,
        x: ArrayView2<T>,
        y: ArrayView2<T>,
        k: usize,
    ) -> Result<ArgKminOutput<T>, ArgKminError>
    where
        T: Float + Debug + Send + Sync + std::iter::Sum,
    {
        let (n, d) = x.dim();
        let (m, y_d) = y.dim();
        if d != y_d {
            return Err(ArgKminError::DimensionMismatch {
                query: d,
                reference: y_d,
            });
        }
        if n == 0 || d == 0 {
            return Err(ArgKminError::EmptyInput("query"));
        }
        if m == 0 {
            return Err(ArgKminError::EmptyInput("reference"));
        }
        if k < 1 {
            return Err(ArgKminError::InvalidK(k));
        }
        if k > m {
            return Err(ArgKminError::KExceedsRows { k, m });
        }

        let x_std = x.as_standard_layout();
        let y_std = y.as_standard_layout();
        let xs = x_std.as_slice().unwrap();
        let ys = y_std.as_slice().unwrap();

        let y_sq_norms = metric::row_squared_norms(ys, d);

        let threads = rayon::current_num_threads();
        let chunk = self.chunk_size.max(MIN_CHUNK_SIZE);
        let on_queries = self.strategy.parallel_on_queries(n, chunk, threads);

        let mut distances = Array2::<T>::from_elem((n, k), T::infinity());
        let mut indices = Array2::<i64>::from_elem((n, k), heap::EMPTY_SLOT);

        let x_tiles = (n + chunk - 1) / chunk;
        let q_max = chunk.min(m);
        let y_tiles = (m + q_max - 1) / q_max;

        let mut telemetry = ArgKminTelemetry::default();
        if on_queries {
            telemetry.record_dispatch(true, x_tiles, y_tiles, threads.min(x_tiles), chunk);
            chunk::chunk_on_x(xs, ys, d, k, chunk, &y_sq_norms, &mut distances, &mut indices);
        } else {
            telemetry.record_dispatch(false, x_tiles, y_tiles, threads.min(y_tiles), chunk);
            chunk::chunk_on_y(
                xs,
                ys,
                d,
                k,
                chunk,
                threads,
                &y_sq_norms,
                &mut distances,
                &mut indices,
            );
        }

        if self.return_distance {
            exact_distances(xs, ys, d, &indices, &mut distances);
            telemetry.record_exact_pass();
            Ok(ArgKminOutput {
                indices,
                distances: Some(distances),
                telemetry,
            })
        } else {
            Ok(ArgKminOutput {
                indices,
                distances: None,
                telemetry,
            })
        }
    }
}

/// Replace the reduced distances with exact Euclidean distances.
///
/// The reduced distance drops the query norm and is computed through a
/// GEMM, which cancels badly for near-identical rows; this pass recomputes
/// every kept pair with the fused stable loop.
fn exact_distances<T>(x: &[T], y: &[T], d: usize, indices: &Array2<i64>, distances: &mut Array2<T>)
where
    T: Float + Debug + Send + Sync + std::iter::Sum,
{
    Zip::indexed(distances.rows_mut())
        .and(indices.rows())
        .par_for_each(|i, mut dist_row, idx_row| {
            let x_row = &x[i * d..(i + 1) * d];
            for (slot, &j) in idx_row.iter().enumerate() {
                debug_assert!(j >= 0);
                let y_row = &y[(j as usize) * d..(j as usize + 1) * d];
                dist_row[slot] = metric::euclidean_distance(x_row, y_row);
            }
        });
}

/// For every row of `x`, the indices of its k nearest rows in `y`.
pub fn argkmin<T>(x: ArrayView2<T>, y: ArrayView2<T>, k: usize) -> Result<Array2<i64>, ArgKminError>
where
    T: Float + Debug + Send + Sync + std::iter::Sum,
{
    ArgKmin::new().compute(x, y, k).map(|out| out.indices)
}

/// Like [`argkmin`], additionally returning the exact Euclidean distances.
pub fn argkmin_with_distance<T>(
    x: ArrayView2<T>,
    y: ArrayView2<T>,
    k: usize,
) -> Result<(Array2<T>, Array2<i64>), ArgKminError>
where
    T: Float + Debug + Send + Sync + std::iter::Sum,
{
    let out = ArgKmin::new()
        .return_distance(true)
        .compute(x, y, k)?;
    Ok((out.distances.unwrap(), out.indices))
}
