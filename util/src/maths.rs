//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{storage::RawStorage, DMatrix, DVector, Dim, Matrix, Matrix3};
use num_traits::Float;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of iterations the SVD may take before giving up.
///
/// The matrices passed through here are at most 6x6 so convergence takes a
/// handful of sweeps, this bound only guards against non-finite inputs.
const MAX_SVD_ITERATIONS: usize = 1000;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Square a number
pub fn square<T>(value: T) -> T
where
    T: Float,
{
    value * value
}

pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float,
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Are two numbers almost equal?
///
/// Returns `true` if the absolute difference is strictly less than `tol`.
pub fn almost_equal<T>(a: T, b: T, tol: T) -> bool
where
    T: Float,
{
    (a - b).abs() < tol
}

/// Are two matrices almost equal?
///
/// Matrices of different shapes are never equal. Otherwise every element
/// pair is compared with [`almost_equal`].
pub fn almost_equal_mat<R1, C1, S1, R2, C2, S2>(
    a: &Matrix<f64, R1, C1, S1>,
    b: &Matrix<f64, R2, C2, S2>,
    tol: f64,
) -> bool
where
    R1: Dim,
    C1: Dim,
    S1: RawStorage<f64, R1, C1>,
    R2: Dim,
    C2: Dim,
    S2: RawStorage<f64, R2, C2>,
{
    a.shape() == b.shape()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| almost_equal(*x, *y, tol))
}

/// Compute the pseudo inverse of a matrix.
///
/// Singular values greater than `sigma_threshold` are reciprocated, all
/// others are set to zero, so directions close to the null space of `matrix`
/// are dropped instead of amplified. This never fails: if the decomposition
/// cannot be computed (non-finite input) a zero matrix is returned.
///
/// A 1x1 matrix is inverted directly.
pub fn pseudo_inverse(matrix: &DMatrix<f64>, sigma_threshold: f64) -> DMatrix<f64> {
    let (nrows, ncols) = matrix.shape();

    if nrows == 0 || ncols == 0 {
        return DMatrix::zeros(ncols, nrows);
    }

    if nrows == 1 && ncols == 1 {
        return DMatrix::from_element(
            1,
            1,
            invert_singular_value(matrix[(0, 0)], sigma_threshold),
        );
    }

    let svd = match matrix
        .clone()
        .try_svd(true, true, f64::EPSILON, MAX_SVD_ITERATIONS)
    {
        Some(s) => s,
        None => return DMatrix::zeros(ncols, nrows),
    };

    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return DMatrix::zeros(ncols, nrows),
    };

    let inv_s = DVector::from_iterator(
        svd.singular_values.len(),
        svd.singular_values
            .iter()
            .map(|s| invert_singular_value(*s, sigma_threshold)),
    );

    v_t.transpose() * DMatrix::from_diagonal(&inv_s) * u.transpose()
}

/// Compute the pseudo inverse of a 3x3 matrix.
///
/// Same semantics as [`pseudo_inverse`] but works on the stack, for use in
/// the per-leg control path.
pub fn pseudo_inverse3(matrix: &Matrix3<f64>, sigma_threshold: f64) -> Matrix3<f64> {
    let svd = match (*matrix).try_svd(true, true, f64::EPSILON, MAX_SVD_ITERATIONS) {
        Some(s) => s,
        None => return Matrix3::zeros(),
    };

    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Matrix3::zeros(),
    };

    let inv_s = svd
        .singular_values
        .map(|s| invert_singular_value(s, sigma_threshold));

    v_t.transpose() * Matrix3::from_diagonal(&inv_s) * u.transpose()
}

/// Ratio of the smallest to the largest singular value of a 3x3 matrix.
///
/// This is the reciprocal of the condition number, in `[0, 1]`. A zero
/// matrix or one whose decomposition fails gives `0`.
pub fn inverse_condition3(matrix: &Matrix3<f64>) -> f64 {
    let sv = match (*matrix).try_svd(false, false, f64::EPSILON, MAX_SVD_ITERATIONS) {
        Some(s) => s.singular_values,
        None => return 0.0,
    };

    let max = sv.max();
    if !(max > 0.0) {
        return 0.0;
    }

    sv.min() / max
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Reciprocal of a singular value, or exactly zero if it is not above the
/// threshold.
fn invert_singular_value(sigma: f64, sigma_threshold: f64) -> f64 {
    if sigma.abs() > sigma_threshold {
        1.0 / sigma
    }
    else {
        0.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_almost_equal() {
        assert!(almost_equal(1.0, 1.0 + 1e-7, 1e-6));
        assert!(!almost_equal(1.0, 1.1, 1e-6));
        // Strict comparison
        assert!(!almost_equal(1.0f64, 1.5, 0.5));

        let a = Matrix3::<f64>::identity();
        let b = Matrix3::<f64>::identity() * (1.0 + 1e-9);
        assert!(almost_equal_mat(&a, &b, 1e-6));
        assert!(!almost_equal_mat(&a, &(a * 2.0), 1e-6));

        // Shapes must match
        let d = DMatrix::<f64>::identity(2, 2);
        assert!(!almost_equal_mat(&a, &d, 1e-6));
        assert!(almost_equal_mat(&a, &DMatrix::<f64>::identity(3, 3), 1e-6));
    }

    #[test]
    fn test_pseudo_inverse_full_rank() {
        let m = DMatrix::from_row_slice(3, 3, &[
            2.0, -1.0, 0.0,
            -1.0, 2.0, -1.0,
            0.0, -1.0, 2.0,
        ]);

        let inv = m.clone().try_inverse().unwrap();
        let pinv = pseudo_inverse(&m, 1e-6);

        assert!(almost_equal_mat(&pinv, &inv, 1e-9));
    }

    #[test]
    fn test_pseudo_inverse_rectangular() {
        // Full row rank, the pseudo inverse is a right inverse
        let m = DMatrix::from_row_slice(2, 3, &[
            1.0, 0.0, 2.0,
            0.0, 1.0, 1.0,
        ]);

        let pinv = pseudo_inverse(&m, 1e-6);

        assert_eq!(pinv.shape(), (3, 2));
        assert!(almost_equal_mat(&(&m * &pinv), &DMatrix::identity(2, 2), 1e-9));
    }

    #[test]
    fn test_pseudo_inverse_drops_small_singular_values() {
        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 1e-9, 4.0]));

        let pinv = pseudo_inverse(&m, 1e-6);

        // Near-null direction is dropped rather than blown up to 1e9
        let e1 = DVector::from_vec(vec![0.0, 1.0, 0.0]);
        assert!((&pinv * &e1).norm() < 1e-12);

        // The other directions are still inverted
        assert!(almost_equal(pinv[(0, 0)], 0.5, 1e-12));
        assert!(almost_equal(pinv[(2, 2)], 0.25, 1e-12));

        assert_eq!(invert_singular_value(1e-9, 1e-6), 0.0);
    }

    #[test]
    fn test_pseudo_inverse_scalar() {
        let m = DMatrix::from_element(1, 1, 4.0);
        assert_eq!(pseudo_inverse(&m, 1e-4)[(0, 0)], 0.25);

        let m = DMatrix::from_element(1, 1, 1e-6);
        assert_eq!(pseudo_inverse(&m, 1e-4)[(0, 0)], 0.0);

        let m = DMatrix::from_element(1, 1, -4.0);
        assert_eq!(pseudo_inverse(&m, 1e-4)[(0, 0)], -0.25);
    }

    #[test]
    fn test_pseudo_inverse_degenerate_inputs() {
        let empty = DMatrix::<f64>::zeros(0, 3);
        assert_eq!(pseudo_inverse(&empty, 1e-4).shape(), (3, 0));

        let zero = DMatrix::<f64>::zeros(3, 2);
        let pinv = pseudo_inverse(&zero, 1e-4);
        assert_eq!(pinv.shape(), (2, 3));
        assert!(pinv.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_pseudo_inverse3() {
        let m = Matrix3::new(
            0.0, -0.3, 0.1,
            0.3, 0.0, 0.05,
            0.08, 0.0, 0.2,
        );
        let inv = m.try_inverse().unwrap();
        assert!(almost_equal_mat(&pseudo_inverse3(&m, 1e-6), &inv, 1e-9));

        // Rank deficient: third column is a copy of the first
        let m = Matrix3::new(
            1.0, 0.0, 1.0,
            0.0, 1.0, 0.0,
            2.0, 0.0, 2.0,
        );
        let pinv = pseudo_inverse3(&m, 1e-6);
        // Moore-Penrose identity M M+ M = M
        assert!(almost_equal_mat(&(m * pinv * m), &m, 1e-9));
        // Null space direction of M^T maps to zero
        let n = Vector3::new(2.0, 0.0, -1.0).normalize();
        assert!((pinv * n).norm() < 1e-9);
    }

    #[test]
    fn test_inverse_condition3() {
        assert!(almost_equal(inverse_condition3(&Matrix3::identity()), 1.0, 1e-12));
        assert!(almost_equal(
            inverse_condition3(&Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 4.0))),
            0.25,
            1e-12
        ));
        assert_eq!(inverse_condition3(&Matrix3::zeros()), 0.0);
    }

    #[test]
    fn test_clamp_and_square() {
        assert_eq!(clamp(&1.5, &0.0, &1.0), 1.0);
        assert_eq!(clamp(&-1.5, &0.0, &1.0), 0.0);
        assert_eq!(clamp(&0.5, &0.0, &1.0), 0.5);
        assert_eq!(square(3.0), 9.0);
    }
}
