//! Tile drivers for the blocked argkmin search.
//!
//! Both drivers cut the query and reference matrices into contiguous row
//! tiles, compute the cross terms of one (query tile, reference tile) pair
//! with a single GEMM, and fold the candidates into per-row bounded heaps.
//! They differ in which axis carries the parallel loop: `chunk_on_x` hands
//! every worker a disjoint range of output rows and needs no reduction,
//! `chunk_on_y` lets workers race over reference tiles for the same query
//! rows and merges their private heaps afterwards.

use crate::gemm;
use crate::heap;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use num_traits::Float;
use rayon::prelude::*;

/// Fold one (query tile, reference tile) pair into the row heaps.
///
/// `middle` receives `-2 * X_tile * Y_tile^T`; the candidate offered for
/// reference row `y_offset + j` is `middle[i, j] + ||Y_j||^2`, the reduced
/// distance whose ordering matches the squared Euclidean distance for a
/// fixed query row.
pub(crate) fn process_tile<T: Float>(
    x_tile: &[T],
    p: usize,
    d: usize,
    y_tile: &[T],
    q: usize,
    y_offset: usize,
    y_sq_norms: &[T],
    middle: &mut [T],
    heap_dists: &mut [T],
    heap_idxs: &mut [i64],
    k: usize,
) {
    debug_assert_eq!(middle.len(), p * q);
    debug_assert_eq!(y_sq_norms.len(), q);

    let neg_two = T::from(-2.0).unwrap();
    gemm::gemm_nt(p, q, d, neg_two, x_tile, y_tile, T::zero(), middle);

    for ((row, hd), hi) in middle
        .chunks_exact(q)
        .zip(heap_dists.chunks_exact_mut(k))
        .zip(heap_idxs.chunks_exact_mut(k))
    {
        for (j, &cross) in row.iter().enumerate() {
            heap::push(hd, hi, cross + y_sq_norms[j], (y_offset + j) as i64);
        }
    }
}

/// Parallel loop over query tiles; reference tiles are folded serially.
///
/// Each worker owns a disjoint mutable row range of both output tables, so
/// the heaps live directly in the output rows and no synchronization or
/// reduction is needed. The only worker-local scratch is the GEMM buffer.
pub(crate) fn chunk_on_x<T>(
    x: &[T],
    y: &[T],
    d: usize,
    k: usize,
    chunk: usize,
    y_sq_norms: &[T],
    dist_out: &mut Array2<T>,
    idx_out: &mut Array2<i64>,
) where
    T: Float + Send + Sync,
{
    let m = y_sq_norms.len();
    let q_max = chunk.min(m);

    dist_out
        .axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .zip(idx_out.axis_chunks_iter_mut(Axis(0), chunk).into_par_iter())
        .enumerate()
        .for_each(|(tile, (mut dists, mut idxs))| {
            let p = dists.nrows();
            let x0 = tile * chunk;
            let x_tile = &x[x0 * d..(x0 + p) * d];

            let heap_dists = dists.as_slice_mut().unwrap();
            let heap_idxs = idxs.as_slice_mut().unwrap();

            let mut middle = vec![T::zero(); p * q_max];
            let mut y0 = 0;
            while y0 < m {
                let q = q_max.min(m - y0);
                process_tile(
                    x_tile,
                    p,
                    d,
                    &y[y0 * d..(y0 + q) * d],
                    q,
                    y0,
                    &y_sq_norms[y0..y0 + q],
                    &mut middle[..p * q],
                    heap_dists,
                    heap_idxs,
                    k,
                );
                y0 += q;
            }

            for (hd, hi) in heap_dists
                .chunks_exact_mut(k)
                .zip(heap_idxs.chunks_exact_mut(k))
            {
                heap::simultaneous_sort(hd, hi);
            }
        });
}

/// Serial loop over query tiles; the reference axis is split into
/// contiguous tile ranges processed in parallel.
///
/// Workers contribute candidates for the same query rows, so each owns a
/// private heap pair and the shared output heaps are only touched by the
/// serialized merge below. Private heaps are sorted before the merge, which
/// makes the merged result identical to a serial ascending-index fold for
/// any worker count.
pub(crate) fn chunk_on_y<T>(
    x: &[T],
    y: &[T],
    d: usize,
    k: usize,
    chunk: usize,
    workers: usize,
    y_sq_norms: &[T],
    dist_out: &mut Array2<T>,
    idx_out: &mut Array2<i64>,
) where
    T: Float + Send + Sync,
{
    let n = dist_out.nrows();
    let m = y_sq_norms.len();
    let q_max = chunk.min(m);
    let n_y_tiles = (m + q_max - 1) / q_max;
    let spans = split_even(n_y_tiles, workers.min(n_y_tiles).max(1));

    let dist_flat = dist_out.as_slice_mut().unwrap();
    let idx_flat = idx_out.as_slice_mut().unwrap();

    let mut x0 = 0;
    while x0 < n {
        let p = chunk.min(n - x0);
        let x_tile = &x[x0 * d..(x0 + p) * d];

        let locals: Vec<(Vec<T>, Vec<i64>)> = spans
            .par_iter()
            .map(|&(t0, t1)| {
                let mut hd = vec![T::infinity(); p * k];
                let mut hi = vec![heap::EMPTY_SLOT; p * k];
                let mut middle = vec![T::zero(); p * q_max];
                for t in t0..t1 {
                    let y0 = t * q_max;
                    let q = q_max.min(m - y0);
                    process_tile(
                        x_tile,
                        p,
                        d,
                        &y[y0 * d..(y0 + q) * d],
                        q,
                        y0,
                        &y_sq_norms[y0..y0 + q],
                        &mut middle[..p * q],
                        &mut hd,
                        &mut hi,
                        k,
                    );
                }
                // Candidates must reach the shared heaps in ascending
                // (distance, index) order for the merge to be worker-count
                // independent.
                for (hd_row, hi_row) in hd.chunks_exact_mut(k).zip(hi.chunks_exact_mut(k)) {
                    heap::simultaneous_sort(hd_row, hi_row);
                }
                (hd, hi)
            })
            .collect();

        let out_d = &mut dist_flat[x0 * k..(x0 + p) * k];
        let out_i = &mut idx_flat[x0 * k..(x0 + p) * k];

        // Serialized reduction, ascending range order.
        for (hd, hi) in &locals {
            for ((od, oi), (hd_row, hi_row)) in out_d
                .chunks_exact_mut(k)
                .zip(out_i.chunks_exact_mut(k))
                .zip(hd.chunks_exact(k).zip(hi.chunks_exact(k)))
            {
                for (&val, &idx) in hd_row.iter().zip(hi_row.iter()) {
                    if idx != heap::EMPTY_SLOT {
                        heap::push(od, oi, val, idx);
                    }
                }
            }
        }

        out_d
            .par_chunks_exact_mut(k)
            .zip(out_i.par_chunks_exact_mut(k))
            .for_each(|(hd, hi)| heap::simultaneous_sort(hd, hi));

        x0 += p;
    }
}

/// Contiguous, balanced partition of `0..items` into `parts` spans.
fn split_even(items: usize, parts: usize) -> Vec<(usize, usize)> {
    let base = items / parts;
    let extra = items % parts;
    let mut spans = Vec::with_capacity(parts);
    let mut start = 0;
    for r in 0..parts {
        let len = base + usize::from(r < extra);
        spans.push((start, start + len));
        start += len;
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn reference_heaps(x: &[f64], y: &[f64], d: usize, k: usize) -> (Vec<f64>, Vec<i64>) {
        let n = x.len() / d;
        let m = y.len() / d;
        let mut dists = vec![f64::INFINITY; n * k];
        let mut idxs = vec![heap::EMPTY_SLOT; n * k];
        for i in 0..n {
            let hd = &mut dists[i * k..(i + 1) * k];
            let hi = &mut idxs[i * k..(i + 1) * k];
            for j in 0..m {
                let dot: f64 = (0..d).map(|l| x[i * d + l] * y[j * d + l]).sum();
                let y_sq: f64 = (0..d).map(|l| y[j * d + l] * y[j * d + l]).sum();
                heap::push(hd, hi, y_sq - 2.0 * dot, j as i64);
            }
            heap::simultaneous_sort(hd, hi);
        }
        (dists, idxs)
    }

    #[test]
    fn tile_fold_matches_unblocked_fold() {
        let d = 3;
        let k = 2;
        let x: Vec<f64> = (0..4 * d).map(|v| (v as f64) * 0.25 - 1.0).collect();
        let y: Vec<f64> = (0..5 * d).map(|v| (v as f64) * -0.4 + 2.0).collect();
        let y_sq: Vec<f64> = y
            .chunks_exact(d)
            .map(|row| row.iter().map(|v| v * v).sum())
            .collect();

        let mut hd = vec![f64::INFINITY; 4 * k];
        let mut hi = vec![heap::EMPTY_SLOT; 4 * k];
        let mut middle = vec![0.0; 4 * 2];
        // Reference tiles of 2, 2 and 1 rows.
        for (y0, q) in [(0usize, 2usize), (2, 2), (4, 1)] {
            process_tile(
                &x,
                4,
                d,
                &y[y0 * d..(y0 + q) * d],
                q,
                y0,
                &y_sq[y0..y0 + q],
                &mut middle[..4 * q],
                &mut hd,
                &mut hi,
                k,
            );
        }
        for (hd_row, hi_row) in hd.chunks_exact_mut(k).zip(hi.chunks_exact_mut(k)) {
            heap::simultaneous_sort(hd_row, hi_row);
        }

        let (want_d, want_i) = reference_heaps(&x, &y, d, k);
        assert_eq!(hi, want_i);
        for (got, want) in hd.iter().zip(want_d.iter()) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn y_driver_is_worker_count_independent() {
        let d = 2;
        let k = 3;
        let n = 7;
        let m = 113;
        let x: Vec<f64> = (0..n * d).map(|v| ((v * 37) % 19) as f64 * 0.1).collect();
        // Duplicated rows create distance ties across tile boundaries.
        let y: Vec<f64> = (0..m * d).map(|v| ((v * 13) % 7) as f64 * 0.5).collect();
        let y_sq: Vec<f64> = y
            .chunks_exact(d)
            .map(|row| row.iter().map(|v| v * v).sum())
            .collect();

        let mut reference: Option<(Array2<f64>, Array2<i64>)> = None;
        for workers in [1, 2, 3, 8, 64] {
            let mut dists = Array2::from_elem((n, k), f64::INFINITY);
            let mut idxs = Array2::from_elem((n, k), heap::EMPTY_SLOT);
            chunk_on_y(&x, &y, d, k, 20, workers, &y_sq, &mut dists, &mut idxs);
            match &reference {
                None => reference = Some((dists, idxs)),
                Some((rd, ri)) => {
                    assert_eq!(&idxs, ri, "workers={workers}");
                    assert_eq!(&dists, rd, "workers={workers}");
                }
            }
        }
    }

    #[test]
    fn drivers_agree_on_remainder_tiles() {
        let d = 5;
        let k = 4;
        let n = 41; // two full 20-row tiles plus a remainder
        let m = 53;
        let x: Vec<f64> = (0..n * d).map(|v| ((v * 31) % 23) as f64 * 0.2 - 2.0).collect();
        let y: Vec<f64> = (0..m * d).map(|v| ((v * 17) % 29) as f64 * 0.3 - 4.0).collect();
        let y_sq: Vec<f64> = y
            .chunks_exact(d)
            .map(|row| row.iter().map(|v| v * v).sum())
            .collect();

        let mut dx = Array2::from_elem((n, k), f64::INFINITY);
        let mut ix = Array2::from_elem((n, k), heap::EMPTY_SLOT);
        chunk_on_x(&x, &y, d, k, 20, &y_sq, &mut dx, &mut ix);

        let mut dy = Array2::from_elem((n, k), f64::INFINITY);
        let mut iy = Array2::from_elem((n, k), heap::EMPTY_SLOT);
        chunk_on_y(&x, &y, d, k, 20, 4, &y_sq, &mut dy, &mut iy);

        assert_eq!(ix, iy);
        assert_eq!(dx, dy);
    }

    #[test]
    fn split_even_covers_everything() {
        assert_eq!(split_even(10, 3), vec![(0, 4), (4, 7), (7, 10)]);
        assert_eq!(split_even(2, 2), vec![(0, 1), (1, 2)]);
        assert_eq!(split_even(5, 1), vec![(0, 5)]);
    }
}
