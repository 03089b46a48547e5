//! Error taxonomy for the recurrence solver.
//!
//! Every failure is an input-validation or mathematical-infeasibility
//! condition; none of them are transient, so nothing here is retried.

use num_complex::Complex;
use thiserror::Error;

/// Crate-wide result alias.
pub type RecurrenceResult<T> = Result<T, RecurrenceError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecurrenceError {
    /// Leading coefficient is zero (or missing), so the order is undefined.
    #[error("degenerate equation: coefficients must be finite with a non-zero a0, got {coefficients:?}")]
    DegenerateEquation { coefficients: Vec<f64> },

    #[error(
        "spec mismatch: {coefficients} coefficients require {} initial conditions, got {initial_conditions}",
        .coefficients.saturating_sub(1)
    )]
    SpecMismatch {
        coefficients: usize,
        initial_conditions: usize,
    },

    #[error("invalid length: requested {length} values but the recurrence has order {order}")]
    InvalidLength { length: usize, order: usize },

    #[error("invalid signal: {reason}")]
    InvalidSignal { reason: String },

    #[error("unsupported forcing '{shape}': {reason}")]
    UnsupportedForcing { shape: &'static str, reason: String },

    /// Singular or ill-posed system for the homogeneous constants.
    #[error("unresolvable constants for roots {roots:?}: {reason}")]
    UnresolvableConstants {
        roots: Vec<Complex<f64>>,
        reason: String,
    },

    #[error("unsolvable particular form for '{shape}' at trial degree {degree}: {reason}")]
    UnsolvableParticularForm {
        shape: &'static str,
        degree: usize,
        reason: String,
    },
}
