//! Recurrence engine: symbolic general solution, constant resolution and
//! numeric forward recursion.
//!
//! Every function here is a pure function of its arguments. Nothing is
//! cached between calls, so independent recurrences can be solved on as
//! many threads as the caller likes.

use crate::characteristic::find_roots_with;
use crate::error::{RecurrenceError, RecurrenceResult};
use crate::linalg::solve_dense;
use crate::particular::{build_particular_term_with, ParticularTerm};
use crate::signal::{evaluate_signal, ForcingDescriptor};
use crate::types::{CharacteristicRoots, NumericSequence, RecurrenceSpec, SolverSettings};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

/// Basis function multiplying one free constant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum HomogeneousBasis {
    /// `n^degree * root^n`
    Power { root: Complex<f64>, degree: usize },
    /// `delta[n - lag]`, the basis contributed by a root at the origin.
    Impulse { lag: usize },
}

impl HomogeneousBasis {
    pub fn evaluate(&self, n: i64) -> Complex<f64> {
        match *self {
            HomogeneousBasis::Power { root, degree } => {
                let monomial = (n as f64).powi(degree as i32);
                complex_power(root, n) * monomial
            }
            HomogeneousBasis::Impulse { lag } => {
                if n == lag as i64 {
                    Complex::one()
                } else {
                    Complex::zero()
                }
            }
        }
    }
}

/// `C_k * basis(n)` with `C_k` still unbound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HomogeneousTerm {
    pub constant: String,
    pub basis: HomogeneousBasis,
}

/// Homogeneous part with free constants plus the resolved particular part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralSolution {
    pub coefficients: Vec<f64>,
    pub roots: CharacteristicRoots,
    pub homogeneous: Vec<HomogeneousTerm>,
    pub particular: Option<ParticularTerm>,
}

impl GeneralSolution {
    pub fn order(&self) -> usize {
        self.homogeneous.len()
    }

    pub fn constant_names(&self) -> Vec<&str> {
        self.homogeneous.iter().map(|t| t.constant.as_str()).collect()
    }

    /// Value at `n` for a given assignment of the free constants.
    pub fn evaluate_with(&self, constants: &[Complex<f64>], n: i64) -> Complex<f64> {
        let homogeneous: Complex<f64> = self
            .homogeneous
            .iter()
            .zip(constants)
            .map(|(term, c)| c * term.basis.evaluate(n))
            .sum();
        let particular = self.particular.as_ref().map_or(0.0, |p| p.evaluate(n));
        homogeneous + particular
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedConstant {
    pub name: String,
    pub value: Complex<f64>,
}

/// A general solution with every free constant bound by initial conditions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundSolution {
    pub solution: GeneralSolution,
    pub constants: Vec<ResolvedConstant>,
}

impl BoundSolution {
    pub fn constant(&self, name: &str) -> Option<Complex<f64>> {
        self.constants
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value)
    }

    pub fn evaluate(&self, n: i64) -> Complex<f64> {
        let values: Vec<Complex<f64>> = self.constants.iter().map(|c| c.value).collect();
        self.solution.evaluate_with(&values, n)
    }

    /// Real parts of `y[0..length]`; for real data the imaginary parts are
    /// rounding noise from conjugate root pairs.
    pub fn sequence(&self, length: usize) -> Vec<f64> {
        (0..length).map(|n| self.evaluate(n as i64).re).collect()
    }
}

pub fn general_solution(
    coefficients: &[f64],
    descriptor: &ForcingDescriptor,
) -> RecurrenceResult<GeneralSolution> {
    general_solution_with(coefficients, descriptor, &SolverSettings::default())
}

pub fn general_solution_with(
    coefficients: &[f64],
    descriptor: &ForcingDescriptor,
    settings: &SolverSettings,
) -> RecurrenceResult<GeneralSolution> {
    let roots = find_roots_with(coefficients, settings)?;
    let particular = build_particular_term_with(coefficients, descriptor, settings)?;

    let mut homogeneous = Vec::with_capacity(roots.total_multiplicity());
    for root in &roots.roots {
        for k in 0..root.multiplicity {
            let basis = if root.value.is_zero() {
                HomogeneousBasis::Impulse { lag: k }
            } else {
                HomogeneousBasis::Power {
                    root: root.value,
                    degree: k,
                }
            };
            homogeneous.push(HomogeneousTerm {
                constant: format!("C{}", homogeneous.len() + 1),
                basis,
            });
        }
    }

    Ok(GeneralSolution {
        coefficients: coefficients.to_vec(),
        roots,
        homogeneous,
        particular,
    })
}

pub fn resolve_constants<V>(
    solution: &GeneralSolution,
    initial_conditions: &[V],
) -> RecurrenceResult<BoundSolution>
where
    V: Into<Complex<f64>> + Copy,
{
    resolve_constants_with(solution, initial_conditions, &SolverSettings::default())
}

/// Binds `C1..CN` so that the solution matches `initial_conditions[n]` at
/// `n = 0..N-1`.
pub fn resolve_constants_with<V>(
    solution: &GeneralSolution,
    initial_conditions: &[V],
    settings: &SolverSettings,
) -> RecurrenceResult<BoundSolution>
where
    V: Into<Complex<f64>> + Copy,
{
    let order = solution.order();
    if initial_conditions.len() != order {
        return Err(RecurrenceError::UnresolvableConstants {
            roots: solution.roots.values(),
            reason: format!(
                "expected {order} initial conditions, got {}",
                initial_conditions.len()
            ),
        });
    }

    let mut matrix = DMatrix::<Complex<f64>>::zeros(order, order);
    let mut rhs = DVector::<Complex<f64>>::zeros(order);
    for (row, value) in initial_conditions.iter().enumerate() {
        let n = row as i64;
        for (col, term) in solution.homogeneous.iter().enumerate() {
            matrix[(row, col)] = term.basis.evaluate(n);
        }
        let particular = solution.particular.as_ref().map_or(0.0, |p| p.evaluate(n));
        let value: Complex<f64> = (*value).into();
        rhs[row] = value - particular;
    }

    let values = solve_dense(matrix, rhs, settings.singular_tolerance).map_err(|singular| {
        RecurrenceError::UnresolvableConstants {
            roots: solution.roots.values(),
            reason: singular.to_string(),
        }
    })?;

    let constants = solution
        .homogeneous
        .iter()
        .zip(values.iter())
        .map(|(term, value)| ResolvedConstant {
            name: term.constant.clone(),
            value: *value,
        })
        .collect();

    Ok(BoundSolution {
        solution: solution.clone(),
        constants,
    })
}

/// Convenience: general solution bound to `initial_conditions` in one call.
pub fn solve(
    coefficients: &[f64],
    initial_conditions: &[f64],
    descriptor: &ForcingDescriptor,
) -> RecurrenceResult<BoundSolution> {
    let settings = SolverSettings::default();
    let solution = general_solution_with(coefficients, descriptor, &settings)?;
    resolve_constants_with(&solution, initial_conditions, &settings)
}

/// Seeds with `initial_conditions` and extends to `length` values via
/// `y[i] = (x[i] - sum_{j=1..N} a_j * y[i-j]) / a0`.
pub fn forward_recurse(
    coefficients: &[f64],
    initial_conditions: &[f64],
    descriptor: &ForcingDescriptor,
    length: usize,
) -> RecurrenceResult<NumericSequence> {
    let spec = RecurrenceSpec::new(coefficients)?;
    spec.check_initial_conditions(initial_conditions.len())?;
    let order = spec.order();
    if length < order {
        return Err(RecurrenceError::InvalidLength { length, order });
    }
    descriptor.validate()?;

    let a0 = spec.leading();
    let lags = &spec.coefficients()[1..];
    let mut sequence = NumericSequence::with_capacity(length);
    for &value in initial_conditions {
        sequence.push(value);
    }
    for i in order..length {
        let forcing = evaluate_signal(descriptor, i as i64)?;
        let history: f64 = {
            let values = sequence.values();
            lags.iter()
                .enumerate()
                .map(|(j, a)| a * values[i - 1 - j])
                .sum()
        };
        sequence.push((forcing - history) / a0);
    }
    Ok(sequence)
}

/// Forward recursion from rest: `y[n] = 0` for every `n < 0`.
pub fn zero_state_response(
    coefficients: &[f64],
    descriptor: &ForcingDescriptor,
    length: usize,
) -> RecurrenceResult<NumericSequence> {
    let spec = RecurrenceSpec::new(coefficients)?;
    descriptor.validate()?;

    let a0 = spec.leading();
    let lags = &spec.coefficients()[1..];
    let mut sequence = NumericSequence::with_capacity(length);
    for i in 0..length {
        let forcing = evaluate_signal(descriptor, i as i64)?;
        let history: f64 = {
            let values = sequence.values();
            lags.iter()
                .enumerate()
                .take(i)
                .map(|(j, a)| a * values[i - 1 - j])
                .sum()
        };
        sequence.push((forcing - history) / a0);
    }
    Ok(sequence)
}

/// Response to a unit impulse at `n = 0` from rest.
pub fn impulse_response(coefficients: &[f64], length: usize) -> RecurrenceResult<NumericSequence> {
    zero_state_response(coefficients, &ForcingDescriptor::Impulse { shift: 0 }, length)
}

/// `a0*y[n] + ... + aN*y[n-N] - x[n]` for every `n` in `N..values.len()`.
pub fn recurrence_residuals(
    coefficients: &[f64],
    values: &[f64],
    descriptor: &ForcingDescriptor,
) -> RecurrenceResult<Vec<f64>> {
    let spec = RecurrenceSpec::new(coefficients)?;
    let order = spec.order();
    if values.len() < order {
        return Err(RecurrenceError::InvalidLength {
            length: values.len(),
            order,
        });
    }
    (order..values.len())
        .map(|n| Ok(spec.apply(values, n) - evaluate_signal(descriptor, n as i64)?))
        .collect()
}

fn complex_power(root: Complex<f64>, n: i64) -> Complex<f64> {
    match i32::try_from(n) {
        Ok(exp) => root.powi(exp),
        Err(_) => root.powf(n as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn assert_err_contains<T: std::fmt::Debug>(result: RecurrenceResult<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn max_abs(values: &[f64]) -> f64 {
        values.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    #[test]
    fn forward_recurse_with_length_n_returns_initial_conditions() {
        let ic = [0.1, -0.7, 3.25];
        let sequence =
            forward_recurse(&[2.0, 0.3, -1.0, 0.5], &ic, &ForcingDescriptor::None, 3).unwrap();
        assert_eq!(sequence.values(), &ic);
    }

    #[test]
    fn homogeneous_example_matches_direct_recurrence() {
        // y[n] - 5y[n-1] + 6y[n-2] = 0
        let coefficients = [1.0, -5.0, 6.0];
        let roots = crate::characteristic::find_roots(&coefficients).unwrap();
        assert_eq!(roots.multiplicity_of(Complex::new(2.0, 0.0), 1e-9), 1);
        assert_eq!(roots.multiplicity_of(Complex::new(3.0, 0.0), 1e-9), 1);

        let sequence =
            forward_recurse(&coefficients, &[1.0, 2.0], &ForcingDescriptor::None, 6).unwrap();
        assert_eq!(sequence.len(), 6);
        assert_eq!(sequence[0], 1.0);
        assert_eq!(sequence[1], 2.0);
        assert_eq!(sequence[2], 5.0 * 2.0 - 6.0 * 1.0);

        let residuals =
            recurrence_residuals(&coefficients, sequence.values(), &ForcingDescriptor::None)
                .unwrap();
        assert_eq!(residuals.len(), 4);
        assert!(max_abs(&residuals) < 1e-9);
    }

    #[test]
    fn exponential_forcing_satisfies_driven_recurrence() {
        let coefficients = [1.0, -3.0, 2.0];
        let forcing = ForcingDescriptor::Exponential { base: 3.0, shift: 2 };
        let sequence =
            forward_recurse(&coefficients, &[-4.0 / 9.0, -1.0 / 3.0], &forcing, 5).unwrap();
        assert_eq!(sequence.len(), 5);
        // y[2] = 3^0 + 3*(-1/3) - 2*(-4/9)
        assert!((sequence[2] - 8.0 / 9.0).abs() < 1e-12);

        let residuals = recurrence_residuals(&coefficients, sequence.values(), &forcing).unwrap();
        assert!(max_abs(&residuals) < 1e-9);
    }

    #[test]
    fn closed_form_matches_forward_recursion_for_exponential_forcing() {
        let coefficients = [1.0, -3.0, 2.0];
        let ic = [-4.0 / 9.0, -1.0 / 3.0];
        for base in [3.0, 2.0] {
            let forcing = ForcingDescriptor::Exponential { base, shift: 2 };
            let bound = solve(&coefficients, &ic, &forcing).unwrap();
            let expected_degree = if base == 2.0 { 1 } else { 0 };
            assert_eq!(
                bound.solution.particular.as_ref().unwrap().max_degree(),
                expected_degree
            );

            let numeric = forward_recurse(&coefficients, &ic, &forcing, 10).unwrap();
            let closed = bound.sequence(10);
            for (n, (a, b)) in numeric.values().iter().zip(&closed).enumerate() {
                assert!(
                    (a - b).abs() < 1e-8 * a.abs().max(1.0),
                    "base {base}, n = {n}: recursion {a} vs closed form {b}"
                );
            }
        }
    }

    #[test]
    fn repeated_root_general_solution_uses_n_times_root_power() {
        let coefficients = [1.0, -2.0, 1.0];
        let forcing = ForcingDescriptor::Sine {
            omega: 1.0,
            phase: 0.0,
            shift: 0,
        };
        let solution = general_solution(&coefficients, &forcing).unwrap();
        assert_eq!(solution.constant_names(), vec!["C1", "C2"]);
        let degrees: Vec<usize> = solution
            .homogeneous
            .iter()
            .map(|t| match t.basis {
                HomogeneousBasis::Power { root, degree } => {
                    assert!((root - Complex::new(1.0, 0.0)).norm() < 1e-12);
                    degree
                }
                other => panic!("unexpected basis {other:?}"),
            })
            .collect();
        assert_eq!(degrees, vec![0, 1]);

        let bound = resolve_constants(&solution, &[0.0, 0.0]).unwrap();
        let numeric = forward_recurse(&coefficients, &[0.0, 0.0], &forcing, 12).unwrap();
        let closed = bound.sequence(12);
        for (a, b) in numeric.values().iter().zip(&closed) {
            assert!((a - b).abs() < 1e-8);
        }
        let residuals = recurrence_residuals(&coefficients, numeric.values(), &forcing).unwrap();
        assert!(max_abs(&residuals) < 1e-9);
    }

    #[test]
    fn quadruple_root_closed_form_matches_forward_recursion() {
        // (r - 1)^4
        let coefficients = [1.0, -4.0, 6.0, -4.0, 1.0];
        let ic = [1.0, 2.0, 4.0, 7.0];
        let bound = solve(&coefficients, &ic, &ForcingDescriptor::None).unwrap();
        let degrees: Vec<usize> = bound
            .solution
            .homogeneous
            .iter()
            .map(|t| match t.basis {
                HomogeneousBasis::Power { degree, .. } => degree,
                other => panic!("unexpected basis {other:?}"),
            })
            .collect();
        assert_eq!(degrees, vec![0, 1, 2, 3]);

        let numeric = forward_recurse(&coefficients, &ic, &ForcingDescriptor::None, 12).unwrap();
        let closed = bound.sequence(12);
        for (n, (a, b)) in numeric.values().iter().zip(&closed).enumerate() {
            assert!(
                (a - b).abs() < 1e-8 * a.abs().max(1.0),
                "n = {n}: recursion {a} vs closed form {b}"
            );
        }
    }

    #[test]
    fn complex_roots_resolve_to_real_sequence() {
        // y[n] = y[n-1] - y[n-2]: roots e^{+-i pi/3}.
        let coefficients = [1.0, -1.0, 1.0];
        let forcing = ForcingDescriptor::Cosine {
            omega: PI / 3.0,
            phase: 0.0,
            shift: 0,
        };
        let bound = solve(&coefficients, &[1.0, 0.5], &forcing).unwrap();
        assert_eq!(bound.constants.len(), 2);
        assert!(bound.constant("C1").is_some());
        assert!(bound.constant("C3").is_none());

        let numeric = forward_recurse(&coefficients, &[1.0, 0.5], &forcing, 15).unwrap();
        for n in 0..15 {
            let value = bound.evaluate(n as i64);
            assert!(value.im.abs() < 1e-8, "imaginary drift at n = {n}: {value}");
            assert!((value.re - numeric[n]).abs() < 1e-8);
        }
    }

    #[test]
    fn zero_root_uses_impulse_basis() {
        // y[n] - 0.5y[n-1] = 0 written with a trailing zero lag.
        let coefficients = [1.0, -0.5, 0.0];
        let solution = general_solution(&coefficients, &ForcingDescriptor::None).unwrap();
        assert!(solution
            .homogeneous
            .iter()
            .any(|t| t.basis == HomogeneousBasis::Impulse { lag: 0 }));

        let bound = resolve_constants(&solution, &[4.0, 1.0]).unwrap();
        let numeric =
            forward_recurse(&coefficients, &[4.0, 1.0], &ForcingDescriptor::None, 6).unwrap();
        for (a, b) in numeric.values().iter().zip(&bound.sequence(6)) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn resolve_constants_rejects_wrong_initial_condition_count() {
        let solution = general_solution(&[1.0, -5.0, 6.0], &ForcingDescriptor::None).unwrap();
        let err = resolve_constants(&solution, &[1.0]).expect_err("count mismatch");
        assert!(matches!(err, RecurrenceError::UnresolvableConstants { .. }));
        assert!(err.to_string().contains("expected 2 initial conditions, got 1"));
    }

    #[test]
    fn resolve_constants_rejects_singular_basis() {
        // Two copies of the same mode cannot be separated by initial conditions.
        let mut solution = general_solution(&[1.0, -5.0, 6.0], &ForcingDescriptor::None).unwrap();
        let first = solution.homogeneous[0].basis;
        solution.homogeneous[1].basis = first;
        assert_err_contains(resolve_constants(&solution, &[1.0, 2.0]), "singular");
    }

    #[test]
    fn resolve_constants_accepts_complex_initial_conditions() {
        let solution = general_solution(&[1.0, -0.5], &ForcingDescriptor::None).unwrap();
        let bound = resolve_constants(&solution, &[Complex::new(2.0, 1.0)]).unwrap();
        let c1 = bound.constant("C1").unwrap();
        assert!((c1 - Complex::new(2.0, 1.0)).norm() < 1e-12);
        assert!((bound.evaluate(2) - Complex::new(0.5, 0.25)).norm() < 1e-12);
    }

    #[test]
    fn forward_recurse_validates_inputs_without_partial_output() {
        let none = ForcingDescriptor::None;
        let err = forward_recurse(&[1.0, -5.0, 6.0], &[1.0, 2.0], &none, 1).expect_err("short");
        assert_eq!(err, RecurrenceError::InvalidLength { length: 1, order: 2 });

        let err = forward_recurse(&[1.0, -5.0, 6.0], &[1.0], &none, 5).expect_err("mismatch");
        assert!(matches!(err, RecurrenceError::SpecMismatch { .. }));

        let err = forward_recurse(&[0.0, 1.0], &[1.0], &none, 5).expect_err("degenerate");
        assert!(matches!(err, RecurrenceError::DegenerateEquation { .. }));

        let bad = ForcingDescriptor::Combination { members: vec![] };
        assert_err_contains(forward_recurse(&[1.0, -0.5], &[1.0], &bad, 4), "no members");
    }

    #[test]
    fn forward_recurse_accepts_impulse_forcing() {
        let forcing = ForcingDescriptor::Impulse { shift: 2 };
        let sequence = forward_recurse(&[1.0, -0.5], &[0.0], &forcing, 5).unwrap();
        assert_eq!(sequence.values(), &[0.0, 0.0, 1.0, 0.5, 0.25]);
    }

    #[test]
    fn impulse_response_matches_geometric_decay() {
        let response = impulse_response(&[1.0, -0.5], 5).unwrap();
        assert_eq!(response.values(), &[1.0, 0.5, 0.25, 0.125, 0.0625]);
    }

    #[test]
    fn zero_state_step_response_converges_to_dc_gain() {
        // y[n] - 0.5y[n-1] = 1 settles at 1 / (1 - 0.5).
        let response =
            zero_state_response(&[1.0, -0.5], &ForcingDescriptor::Step { shift: 0 }, 60).unwrap();
        assert_eq!(response[0], 1.0);
        assert!((response[59] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn order_zero_recurrence_is_pointwise_division() {
        let forcing = ForcingDescriptor::Step { shift: 1 };
        let sequence = forward_recurse(&[4.0], &[], &forcing, 3).unwrap();
        assert_eq!(sequence.values(), &[0.0, 0.25, 0.25]);

        let bound = solve(&[4.0], &[], &forcing).unwrap();
        assert!(bound.constants.is_empty());
        assert!((bound.evaluate(5).re - 0.25).abs() < 1e-12);
    }

    #[test]
    fn recurrence_residuals_rejects_short_sequences() {
        let err = recurrence_residuals(&[1.0, -5.0, 6.0], &[1.0], &ForcingDescriptor::None)
            .expect_err("short");
        assert!(matches!(err, RecurrenceError::InvalidLength { .. }));
    }
}
