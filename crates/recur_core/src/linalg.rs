//! Small dense linear solves for trial coefficients and free constants.

use nalgebra::{ComplexField, DMatrix, DVector};
use std::fmt;

/// A system whose reciprocal condition number fell below the tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SingularSystem {
    pub rcond: f64,
}

impl fmt::Display for SingularSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system is singular (reciprocal condition {:.3e})", self.rcond)
    }
}

/// Solves the square system `matrix * x = rhs`.
///
/// Columns are equilibrated by their largest entry before the condition
/// check so that basis functions of very different magnitude (e.g. `10^n`
/// next to `0.1^n`) are not mistaken for a degenerate system.
pub(crate) fn solve_dense<T>(
    matrix: DMatrix<T>,
    rhs: DVector<T>,
    singular_tolerance: f64,
) -> Result<DVector<T>, SingularSystem>
where
    T: ComplexField<RealField = f64>,
{
    let scales: Vec<f64> = (0..matrix.ncols())
        .map(|j| {
            matrix
                .column(j)
                .iter()
                .map(|v| v.clone().modulus())
                .fold(0.0_f64, f64::max)
        })
        .collect();
    solve_scaled(matrix, rhs, &scales, singular_tolerance)
}

/// Solves `matrix * x = rhs` after dividing column `j` by `scales[j]`.
///
/// `scales` should be the magnitude each column would have without
/// cancellation. A column that cancels down to rounding noise relative to
/// its scale then shows up as a tiny singular value even for a 1x1 system.
pub(crate) fn solve_scaled<T>(
    mut matrix: DMatrix<T>,
    rhs: DVector<T>,
    scales: &[f64],
    singular_tolerance: f64,
) -> Result<DVector<T>, SingularSystem>
where
    T: ComplexField<RealField = f64>,
{
    let dim = matrix.nrows();
    debug_assert_eq!(dim, matrix.ncols());
    debug_assert_eq!(dim, rhs.len());
    debug_assert_eq!(dim, scales.len());
    if dim == 0 {
        return Ok(DVector::zeros(0));
    }

    for (j, &scale) in scales.iter().enumerate() {
        if scale == 0.0 || !scale.is_finite() {
            return Err(SingularSystem { rcond: 0.0 });
        }
        let inv = T::from_real(1.0 / scale);
        for v in matrix.column_mut(j).iter_mut() {
            *v = v.clone() * inv.clone();
        }
    }

    let rcond = reciprocal_condition(&matrix);
    if !(rcond >= singular_tolerance) {
        return Err(SingularSystem { rcond });
    }

    let mut solution = matrix.lu().solve(&rhs).ok_or(SingularSystem { rcond })?;
    for (j, &scale) in scales.iter().enumerate() {
        solution[j] = solution[j].clone() * T::from_real(1.0 / scale);
    }
    Ok(solution)
}

/// `sigma_min / max(sigma_max, 1)`: the usual reciprocal condition number
/// for equilibrated matrices, and plain `sigma_min` when every column has
/// cancelled below its nominal scale.
fn reciprocal_condition<T>(matrix: &DMatrix<T>) -> f64
where
    T: ComplexField<RealField = f64>,
{
    let singular_values = matrix.clone().svd(false, false).singular_values;
    let max = singular_values.iter().cloned().fold(0.0_f64, f64::max);
    let min = singular_values.iter().cloned().fold(f64::INFINITY, f64::min);
    if !max.is_finite() {
        return 0.0;
    }
    min / max.max(1.0)
}
