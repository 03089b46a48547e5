//! Core types shared by the solver components.

use crate::error::{RecurrenceError, RecurrenceResult};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Numeric tolerances used by root grouping and the small linear solves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SolverSettings {
    /// Smallest relative radius of a candidate multiple root. A k-fold
    /// candidate may spread up to `10 * eps^(1/k)` when that is larger.
    pub root_tolerance: f64,
    /// Relative size below which `p, p', ..., p^(k-1)` count as vanishing at
    /// the centroid of a k-fold candidate.
    pub root_residual_tolerance: f64,
    /// Reciprocal condition number below which a linear system is singular.
    pub singular_tolerance: f64,
    /// Relative residual allowed when verifying a particular term.
    pub residual_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            root_tolerance: 1e-4,
            root_residual_tolerance: 1e-12,
            singular_tolerance: 1e-10,
            residual_tolerance: 1e-8,
        }
    }
}

/// Coefficients `[a0, a1, ..., aN]` of
/// `a0*y[n] + a1*y[n-1] + ... + aN*y[n-N] = x[n]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurrenceSpec {
    coefficients: Vec<f64>,
}

impl RecurrenceSpec {
    pub fn new(coefficients: &[f64]) -> RecurrenceResult<Self> {
        let leading_ok = matches!(coefficients.first(), Some(&a0) if a0 != 0.0);
        if !leading_ok || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(RecurrenceError::DegenerateEquation {
                coefficients: coefficients.to_vec(),
            });
        }
        Ok(Self {
            coefficients: coefficients.to_vec(),
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn leading(&self) -> f64 {
        self.coefficients[0]
    }

    /// Order N of the recurrence (number of lags).
    pub fn order(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Fails with `SpecMismatch` unless exactly N initial conditions are given.
    pub fn check_initial_conditions(&self, count: usize) -> RecurrenceResult<()> {
        if count != self.order() {
            return Err(RecurrenceError::SpecMismatch {
                coefficients: self.coefficients.len(),
                initial_conditions: count,
            });
        }
        Ok(())
    }

    /// Left-hand side `sum_j a_j * y[n-j]` for `n >= N`.
    pub(crate) fn apply(&self, values: &[f64], n: usize) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .map(|(j, a)| a * values[n - j])
            .sum()
    }
}

/// A characteristic root together with its multiplicity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CharacteristicRoot {
    pub value: Complex<f64>,
    pub multiplicity: usize,
}

impl CharacteristicRoot {
    pub fn is_real(&self) -> bool {
        self.value.im == 0.0
    }
}

/// Distinct roots of the characteristic polynomial; multiplicities sum to N.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacteristicRoots {
    pub roots: Vec<CharacteristicRoot>,
}

impl CharacteristicRoots {
    pub fn total_multiplicity(&self) -> usize {
        self.roots.iter().map(|r| r.multiplicity).sum()
    }

    pub fn values(&self) -> Vec<Complex<f64>> {
        self.roots.iter().map(|r| r.value).collect()
    }

    /// Multiplicity of the root matching `value`, or 0 when none does.
    pub fn multiplicity_of(&self, value: Complex<f64>, tolerance: f64) -> usize {
        self.roots
            .iter()
            .find(|r| (r.value - value).norm() <= tolerance * r.value.norm().max(1.0))
            .map(|r| r.multiplicity)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Values produced by forward recursion, indexed by step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NumericSequence {
    values: Vec<f64>,
}

impl NumericSequence {
    pub(crate) fn with_capacity(length: usize) -> Self {
        Self {
            values: Vec::with_capacity(length),
        }
    }

    pub(crate) fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }
}

impl Index<usize> for NumericSequence {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}
