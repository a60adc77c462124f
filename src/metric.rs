//! Distance primitives: row squared norms and the numerically stable
//! Euclidean distance used by the exact repair pass.

use num_traits::{Float, NumCast};
use rayon::prelude::*;
use std::fmt::Debug;
use wide::{f32x8, f64x4};

/// Squared L2 norm of every row of a flattened row-major matrix.
pub fn row_squared_norms<T>(data: &[T], d: usize) -> Vec<T>
where
    T: Float + Debug + Send + Sync + std::iter::Sum,
{
    debug_assert!(d > 0);
    debug_assert_eq!(data.len() % d, 0);
    data.par_chunks_exact(d).map(squared_norm).collect()
}

/// Sum of squares of one row, accumulated across SIMD lanes with a single
/// horizontal reduction at the end.
#[inline(always)]
fn squared_norm<T>(row: &[T]) -> T
where
    T: Float + Debug + Send + Sync + std::iter::Sum,
{
    if std::mem::size_of::<T>() == 4 {
        let rf: &[f32] =
            unsafe { std::slice::from_raw_parts(row.as_ptr() as *const f32, row.len()) };
        let mut lanes = rf.chunks_exact(8);
        let mut acc = f32x8::splat(0.0);
        for lane in lanes.by_ref() {
            let v = f32x8::from(<[f32; 8]>::try_from(lane).unwrap());
            acc += v * v;
        }
        let mut total = acc.reduce_add();
        for &v in lanes.remainder() {
            total += v * v;
        }
        return NumCast::from(total).unwrap();
    }
    if std::mem::size_of::<T>() == 8 {
        let rf: &[f64] =
            unsafe { std::slice::from_raw_parts(row.as_ptr() as *const f64, row.len()) };
        let mut lanes = rf.chunks_exact(4);
        let mut acc = f64x4::splat(0.0);
        for lane in lanes.by_ref() {
            let v = f64x4::from(<[f64; 4]>::try_from(lane).unwrap());
            acc += v * v;
        }
        let mut total = acc.reduce_add();
        for &v in lanes.remainder() {
            total += v * v;
        }
        return NumCast::from(total).unwrap();
    }

    // Fallback scalar
    row.iter().fold(T::zero(), |acc, &v| acc + v * v)
}

/// Euclidean distance computed as a fused subtract-square-accumulate.
///
/// The reduced distance used during the search subtracts two large dot
/// products and cancels catastrophically for near-identical vectors; this
/// direct form does not, so the final pass recomputes with it.
#[inline(always)]
pub fn euclidean_distance<T>(a: &[T], b: &[T]) -> T
where
    T: Float + Debug + Send + Sync + std::iter::Sum,
{
    debug_assert_eq!(a.len(), b.len());
    if std::mem::size_of::<T>() == 4 {
        let avf: &[f32] = unsafe { std::slice::from_raw_parts(a.as_ptr() as *const f32, a.len()) };
        let bvf: &[f32] = unsafe { std::slice::from_raw_parts(b.as_ptr() as *const f32, b.len()) };
        let mut acc = 0.0f32;
        let chunks = avf.len() / 8;
        let tail_start = chunks * 8;
        let mut i = 0;
        while i < tail_start {
            let va = f32x8::from([
                avf[i],
                avf[i + 1],
                avf[i + 2],
                avf[i + 3],
                avf[i + 4],
                avf[i + 5],
                avf[i + 6],
                avf[i + 7],
            ]);
            let vb = f32x8::from([
                bvf[i],
                bvf[i + 1],
                bvf[i + 2],
                bvf[i + 3],
                bvf[i + 4],
                bvf[i + 5],
                bvf[i + 6],
                bvf[i + 7],
            ]);
            let diff = va - vb;
            acc += (diff * diff).reduce_add();
            i += 8;
        }
        for j in tail_start..avf.len() {
            let diff = avf[j] - bvf[j];
            acc += diff * diff;
        }
        return NumCast::from(acc.sqrt()).unwrap();
    }
    if std::mem::size_of::<T>() == 8 {
        let avf: &[f64] = unsafe { std::slice::from_raw_parts(a.as_ptr() as *const f64, a.len()) };
        let bvf: &[f64] = unsafe { std::slice::from_raw_parts(b.as_ptr() as *const f64, b.len()) };
        let mut acc = 0.0f64;
        let chunks = avf.len() / 4;
        let tail_start = chunks * 4;
        let mut i = 0;
        while i < tail_start {
            let va = f64x4::from([avf[i], avf[i + 1], avf[i + 2], avf[i + 3]]);
            let vb = f64x4::from([bvf[i], bvf[i + 1], bvf[i + 2], bvf[i + 3]]);
            let diff = va - vb;
            acc += (diff * diff).reduce_add();
            i += 4;
        }
        for j in tail_start..avf.len() {
            let diff = avf[j] - bvf[j];
            acc += diff * diff;
        }
        return NumCast::from(acc.sqrt()).unwrap();
    }

    // Fallback scalar
    let mut acc = T::zero();
    for i in 0..a.len() {
        let diff = a[i] - b[i];
        acc = acc + diff * diff;
    }
    acc.sqrt()
}
