//! Characteristic polynomial and its roots.
//!
//! For `a0*y[n] + a1*y[n-1] + ... + aN*y[n-N]` the characteristic polynomial
//! is `a0*r^N + a1*r^(N-1) + ... + aN`: `a0` multiplies the highest power.
//! Roots are the eigenvalues of the companion matrix; eigenvalues that
//! belong to one multiple root are grouped back together afterwards.

use crate::error::RecurrenceResult;
use crate::types::{CharacteristicRoot, CharacteristicRoots, RecurrenceSpec, SolverSettings};
use nalgebra::DMatrix;
use num_complex::Complex;
use num_traits::Zero;

/// Ratio between the observed eigenvalue scatter of a k-fold root and `eps^(1/k)`.
const SCATTER_FACTOR: f64 = 10.0;

/// Coefficients of the characteristic polynomial in descending powers of `r`.
pub fn characteristic_polynomial(coefficients: &[f64]) -> RecurrenceResult<Vec<f64>> {
    let spec = RecurrenceSpec::new(coefficients)?;
    Ok(spec.coefficients().to_vec())
}

pub fn find_roots(coefficients: &[f64]) -> RecurrenceResult<CharacteristicRoots> {
    find_roots_with(coefficients, &SolverSettings::default())
}

pub fn find_roots_with(
    coefficients: &[f64],
    settings: &SolverSettings,
) -> RecurrenceResult<CharacteristicRoots> {
    let spec = RecurrenceSpec::new(coefficients)?;
    let poly = spec.coefficients();

    // Trailing zero coefficients are exact roots at the origin.
    let zero_roots = poly.iter().rev().take_while(|a| **a == 0.0).count();
    let reduced = &poly[..poly.len() - zero_roots];

    let mut roots = Vec::new();
    if zero_roots > 0 {
        roots.push(CharacteristicRoot {
            value: Complex::zero(),
            multiplicity: zero_roots,
        });
    }
    let eigenvalues = companion_eigenvalues(reduced);
    roots.extend(group_roots(poly, eigenvalues, settings));

    roots.sort_by(|a, b| {
        a.value
            .re
            .partial_cmp(&b.value.re)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.value
                    .im
                    .partial_cmp(&b.value.im)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    Ok(CharacteristicRoots { roots })
}

/// Horner evaluation of a descending-power polynomial.
pub fn evaluate_polynomial(poly: &[f64], z: Complex<f64>) -> Complex<f64> {
    poly.iter()
        .fold(Complex::zero(), |acc, &a| acc * z + Complex::new(a, 0.0))
}

/// First `count` Taylor coefficients `p^(j)(z) / j!` by repeated synthetic division.
fn taylor_coefficients(poly: &[f64], z: Complex<f64>, count: usize) -> Vec<Complex<f64>> {
    let mut quotient: Vec<Complex<f64>> = poly.iter().map(|&a| Complex::new(a, 0.0)).collect();
    let mut coefficients = Vec::with_capacity(count);
    for _ in 0..count {
        let mut acc = Complex::zero();
        let mut next = Vec::with_capacity(quotient.len().saturating_sub(1));
        for (i, &a) in quotient.iter().enumerate() {
            acc = acc * z + a;
            if i + 1 < quotient.len() {
                next.push(acc);
            }
        }
        coefficients.push(acc);
        quotient = next;
    }
    coefficients
}

/// Magnitudes the Taylor coefficients at `z` would have absent cancellation.
fn taylor_scales(poly: &[f64], z: Complex<f64>, count: usize) -> Vec<f64> {
    let magnitudes: Vec<f64> = poly.iter().map(|a| a.abs()).collect();
    taylor_coefficients(&magnitudes, Complex::new(z.norm(), 0.0), count)
        .into_iter()
        .map(|t| t.re)
        .collect()
}

fn companion_eigenvalues(poly: &[f64]) -> Vec<Complex<f64>> {
    let degree = poly.len().saturating_sub(1);
    if degree == 0 {
        return Vec::new();
    }
    let leading = poly[0];
    let mut companion = DMatrix::<f64>::zeros(degree, degree);
    for j in 0..degree {
        companion[(0, j)] = -poly[j + 1] / leading;
    }
    for i in 1..degree {
        companion[(i, i - 1)] = 1.0;
    }
    companion.complex_eigenvalues().iter().cloned().collect()
}

/// Groups eigenvalues that belong to one multiple root.
///
/// Starting from each ungrouped eigenvalue, its k nearest neighbours are
/// tried as a k-fold root for k from the largest candidate down to 2. The
/// first candidate that passes [`is_multiple_root`] is taken; otherwise the
/// eigenvalue stays a simple root.
fn group_roots(
    poly: &[f64],
    eigenvalues: Vec<Complex<f64>>,
    settings: &SolverSettings,
) -> Vec<CharacteristicRoot> {
    let mut remaining = eigenvalues;
    let mut grouped = Vec::new();

    while let Some(&seed) = remaining.first() {
        let mut nearest: Vec<usize> = (0..remaining.len()).collect();
        nearest.sort_by(|&a, &b| {
            (remaining[a] - seed)
                .norm()
                .partial_cmp(&(remaining[b] - seed).norm())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut multiplicity = 1;
        let mut value = seed;
        for k in (2..=remaining.len()).rev() {
            let members: Vec<Complex<f64>> = nearest[..k].iter().map(|&i| remaining[i]).collect();
            let centroid = members.iter().sum::<Complex<f64>>() / k as f64;
            if is_multiple_root(poly, &members, centroid, settings) {
                multiplicity = k;
                value = centroid;
                break;
            }
        }

        let mut taken = nearest[..multiplicity].to_vec();
        taken.sort_unstable_by(|a, b| b.cmp(a));
        for i in taken {
            remaining.remove(i);
        }
        grouped.push(CharacteristicRoot {
            value: snap_real(value, settings),
            multiplicity,
        });
    }
    grouped
}

/// A k-fold root perturbed by rounding scatters its eigenvalues by about
/// `eps^(1/k)` around a centroid that stays accurate to about `eps`. So the
/// members must lie within that scatter, and `p, p', ..., p^(k-1)` must all
/// vanish at the centroid relative to their uncancelled magnitude.
fn is_multiple_root(
    poly: &[f64],
    members: &[Complex<f64>],
    centroid: Complex<f64>,
    settings: &SolverSettings,
) -> bool {
    let k = members.len();
    let scatter = SCATTER_FACTOR * f64::EPSILON.powf(1.0 / k as f64);
    let radius = settings.root_tolerance.max(scatter) * centroid.norm().max(1.0);
    if members.iter().any(|m| (m - centroid).norm() > radius) {
        return false;
    }
    taylor_coefficients(poly, centroid, k)
        .iter()
        .zip(taylor_scales(poly, centroid, k))
        .all(|(t, scale)| t.norm() <= settings.root_residual_tolerance * scale)
}

/// Drops an imaginary part that is noise left over from a real multiple root.
fn snap_real(value: Complex<f64>, settings: &SolverSettings) -> Complex<f64> {
    if value.im.abs() <= settings.root_tolerance * value.norm().max(1.0) {
        Complex::new(value.re, 0.0)
    } else {
        value
    }
}
