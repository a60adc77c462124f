//! Row-major GEMM adapter over faer's matmul.
//!
//! The kernel only ever needs `C <- alpha * A * B^T + beta * C` with both
//! operands row-major, which maps onto faer as a no-trans x trans product.
//! Parallelism is left to the caller: the tile drivers already own the
//! thread pool, so faer runs single-threaded here.

use faer::Parallelism;
use num_traits::Float;

pub fn gemm_nt_f32(m: usize, n: usize, k: usize, alpha: f32, a: &[f32], b: &[f32], beta: f32, c: &mut [f32]) {
    let lhs = faer::mat::from_row_major_slice(a, m, k);
    let rhs = faer::mat::from_row_major_slice(b, n, k);
    let acc = faer::mat::from_row_major_slice_mut(c, m, n);
    faer::linalg::matmul::matmul(
        acc,
        lhs,
        rhs.transpose(),
        if beta == 0.0 { None } else { Some(beta) },
        alpha,
        Parallelism::None,
    );
}

pub fn gemm_nt_f64(m: usize, n: usize, k: usize, alpha: f64, a: &[f64], b: &[f64], beta: f64, c: &mut [f64]) {
    let lhs = faer::mat::from_row_major_slice(a, m, k);
    let rhs = faer::mat::from_row_major_slice(b, n, k);
    let acc = faer::mat::from_row_major_slice_mut(c, m, n);
    faer::linalg::matmul::matmul(
        acc,
        lhs,
        rhs.transpose(),
        if beta == 0.0 { None } else { Some(beta) },
        alpha,
        Parallelism::None,
    );
}

/// `C <- alpha * A * B^T + beta * C` for row-major A (m x k), B (n x k),
/// C (m x n).
///
/// f32 and f64 are routed to the faer kernels; any other float width falls
/// back to a scalar triple loop.
pub fn gemm_nt<T: Float>(m: usize, n: usize, k: usize, alpha: T, a: &[T], b: &[T], beta: T, c: &mut [T]) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), n * k);
    debug_assert_eq!(c.len(), m * n);

    if std::mem::size_of::<T>() == 4 {
        let af = unsafe { std::slice::from_raw_parts(a.as_ptr() as *const f32, a.len()) };
        let bf = unsafe { std::slice::from_raw_parts(b.as_ptr() as *const f32, b.len()) };
        let cf = unsafe { std::slice::from_raw_parts_mut(c.as_mut_ptr() as *mut f32, c.len()) };
        gemm_nt_f32(m, n, k, alpha.to_f32().unwrap(), af, bf, beta.to_f32().unwrap(), cf);
        return;
    }
    if std::mem::size_of::<T>() == 8 {
        let af = unsafe { std::slice::from_raw_parts(a.as_ptr() as *const f64, a.len()) };
        let bf = unsafe { std::slice::from_raw_parts(b.as_ptr() as *const f64, b.len()) };
        let cf = unsafe { std::slice::from_raw_parts_mut(c.as_mut_ptr() as *mut f64, c.len()) };
        gemm_nt_f64(m, n, k, alpha.to_f64().unwrap(), af, bf, beta.to_f64().unwrap(), cf);
        return;
    }

    // Fallback scalar
    for i in 0..m {
        for j in 0..n {
            let mut acc = T::zero();
            for l in 0..k {
                acc = acc + a[i * k + l] * b[j * k + l];
            }
            let idx = i * n + j;
            c[idx] = if beta.is_zero() {
                alpha * acc
            } else {
                alpha * acc + beta * c[idx]
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn naive_nt(m: usize, n: usize, k: usize, alpha: f64, a: &[f64], b: &[f64], beta: f64, c: &mut [f64]) {
        for i in 0..m {
            for j in 0..n {
                let dot: f64 = (0..k).map(|l| a[i * k + l] * b[j * k + l]).sum();
                c[i * n + j] = alpha * dot + beta * c[i * n + j];
            }
        }
    }

    #[test]
    fn matches_naive_f64() {
        let (m, n, k) = (3, 5, 7);
        let a: Vec<f64> = (0..m * k).map(|v| (v as f64) * 0.37 - 4.0).collect();
        let b: Vec<f64> = (0..n * k).map(|v| (v as f64) * -0.11 + 2.0).collect();

        let mut c = vec![0.0; m * n];
        gemm_nt(m, n, k, -2.0, &a, &b, 0.0, &mut c);

        let mut expected = vec![0.0; m * n];
        naive_nt(m, n, k, -2.0, &a, &b, 0.0, &mut expected);

        for (got, want) in c.iter().zip(expected.iter()) {
            assert_relative_eq!(got, want, epsilon = 1e-9, max_relative = 1e-12);
        }
    }

    #[test]
    fn matches_naive_f32() {
        let (m, n, k) = (4, 2, 9);
        let a: Vec<f32> = (0..m * k).map(|v| (v as f32).sin()).collect();
        let b: Vec<f32> = (0..n * k).map(|v| (v as f32).cos()).collect();

        let mut c = vec![0.0f32; m * n];
        gemm_nt(m, n, k, -2.0, &a, &b, 0.0, &mut c);

        for i in 0..m {
            for j in 0..n {
                let dot: f32 = (0..k).map(|l| a[i * k + l] * b[j * k + l]).sum();
                assert_relative_eq!(c[i * n + j], -2.0 * dot, epsilon = 1e-4, max_relative = 1e-4);
            }
        }
    }

    #[test]
    fn beta_accumulates_into_c() {
        let (m, n, k) = (2, 2, 3);
        let a = vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = vec![1.0f64, 0.0, 0.0, 0.0, 1.0, 0.0];

        let mut c = vec![10.0f64; m * n];
        gemm_nt(m, n, k, 1.0, &a, &b, 0.5, &mut c);

        // C[0,0] = 1*<a0,b0> + 0.5*10 = 1 + 5
        assert_relative_eq!(c[0], 6.0);
        // C[0,1] = <a0,b1> + 5 = 2 + 5
        assert_relative_eq!(c[1], 7.0);
        assert_relative_eq!(c[2], 9.0);
        assert_relative_eq!(c[3], 10.0);
    }

    #[test]
    fn single_column_operands() {
        let a = vec![2.0f64, -1.0];
        let b = vec![3.0f64];
        let mut c = vec![0.0f64; 2];
        gemm_nt(2, 1, 1, -2.0, &a, &b, 0.0, &mut c);
        assert_relative_eq!(c[0], -12.0);
        assert_relative_eq!(c[1], 6.0);
    }
}
