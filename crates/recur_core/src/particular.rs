//! Particular solutions by the method of undetermined coefficients.
//!
//! Each forcing member gets a trial form (`A*b^n` for geometric forcing,
//! `A*sin(wn+p) + B*cos(wn+p)` for harmonics). The trial is substituted into
//! `sum_j a_j * y[n-j]`, equated to `x[n]`, and the resulting square system is
//! solved for the free coefficients. When the trial mode is itself a
//! characteristic root the substituted system cancels to zero; the trial is
//! then multiplied by `n` and retried until the system becomes solvable.

use crate::error::{RecurrenceError, RecurrenceResult};
use crate::linalg::solve_scaled;
use crate::signal::{ForcingDescriptor, SignalShape};
use crate::types::{RecurrenceSpec, SolverSettings};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Below this `|sin(omega)|` a harmonic is treated as the sequence `(+-1)^n`.
const DEGENERATE_HARMONIC: f64 = 1e-9;

/// One resolved term of a particular solution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ParticularComponent {
    /// `amplitude * n^degree * base^n`
    Geometric {
        amplitude: f64,
        base: f64,
        degree: usize,
    },
    /// `n^degree * (sin_coefficient*sin(omega*n + phase) + cos_coefficient*cos(omega*n + phase))`
    Harmonic {
        sin_coefficient: f64,
        cos_coefficient: f64,
        omega: f64,
        phase: f64,
        degree: usize,
    },
}

impl ParticularComponent {
    pub fn evaluate(&self, n: i64) -> f64 {
        match *self {
            ParticularComponent::Geometric {
                amplitude,
                base,
                degree,
            } => amplitude * monomial(n, degree) * base.powf(n as f64),
            ParticularComponent::Harmonic {
                sin_coefficient,
                cos_coefficient,
                omega,
                phase,
                degree,
            } => {
                let angle = omega * n as f64 + phase;
                monomial(n, degree) * (sin_coefficient * angle.sin() + cos_coefficient * angle.cos())
            }
        }
    }

    /// Power of `n` the trial had to be raised to (0 when there was no resonance).
    pub fn degree(&self) -> usize {
        match *self {
            ParticularComponent::Geometric { degree, .. }
            | ParticularComponent::Harmonic { degree, .. } => degree,
        }
    }
}

/// Closed-form particular solution: the sum of its components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticularTerm {
    pub components: Vec<ParticularComponent>,
    /// First index at which every forcing member is active; the term
    /// satisfies the driven equation for all `n >= valid_from`.
    pub valid_from: i64,
}

impl ParticularTerm {
    pub fn evaluate(&self, n: i64) -> f64 {
        self.components.iter().map(|c| c.evaluate(n)).sum()
    }

    pub fn max_degree(&self) -> usize {
        self.components.iter().map(|c| c.degree()).max().unwrap_or(0)
    }
}

pub fn build_particular_term(
    coefficients: &[f64],
    descriptor: &ForcingDescriptor,
) -> RecurrenceResult<Option<ParticularTerm>> {
    build_particular_term_with(coefficients, descriptor, &SolverSettings::default())
}

/// Returns `None` for the homogeneous case.
pub fn build_particular_term_with(
    coefficients: &[f64],
    descriptor: &ForcingDescriptor,
    settings: &SolverSettings,
) -> RecurrenceResult<Option<ParticularTerm>> {
    let spec = RecurrenceSpec::new(coefficients)?;
    descriptor.validate()?;
    if descriptor.is_none() {
        return Ok(None);
    }

    let mut components = Vec::new();
    collect_components(&spec, descriptor, settings, &mut components)?;
    Ok(Some(ParticularTerm {
        components,
        valid_from: descriptor.max_shift(),
    }))
}

/// Superposition: every member is solved on its own and the terms are summed.
fn collect_components(
    spec: &RecurrenceSpec,
    descriptor: &ForcingDescriptor,
    settings: &SolverSettings,
    out: &mut Vec<ParticularComponent>,
) -> RecurrenceResult<()> {
    let shape = descriptor.shape();
    let trial = match *descriptor {
        ForcingDescriptor::None => return Ok(()),
        ForcingDescriptor::Combination { ref members } => {
            for member in members {
                collect_components(spec, member, settings, out)?;
            }
            return Ok(());
        }
        ForcingDescriptor::Impulse { .. } => {
            return Err(RecurrenceError::UnsupportedForcing {
                shape: shape.name(),
                reason: "an impulse has no persistent closed form; fold it into the \
                         initial conditions or use the zero-state response"
                    .to_string(),
            })
        }
        ForcingDescriptor::Exponential { base, shift } => {
            if base == 0.0 {
                return Err(RecurrenceError::UnsupportedForcing {
                    shape: shape.name(),
                    reason: "base 0 is an impulse at the shift".to_string(),
                });
            }
            // x[n] = base^(n - shift) = base^(-shift) * base^n
            let gain = shift
                .checked_neg()
                .and_then(|s| i32::try_from(s).ok())
                .map(|s| base.powi(s))
                .filter(|g| g.is_finite())
                .ok_or_else(|| RecurrenceError::InvalidSignal {
                    reason: format!("base^(-shift) overflows for base {base}, shift {shift}"),
                })?;
            Trial::Geometric { base, gain }
        }
        ForcingDescriptor::Step { .. } => Trial::Geometric {
            base: 1.0,
            gain: 1.0,
        },
        ForcingDescriptor::Sine { omega, phase, .. } => harmonic_trial(omega, phase, true),
        ForcingDescriptor::Cosine { omega, phase, .. } => harmonic_trial(omega, phase, false),
    };

    if let Trial::Geometric { gain, .. } = trial {
        if gain == 0.0 {
            // Degenerate harmonic whose samples are all zero.
            return Ok(());
        }
    }

    let (degree, solution) = solve_trial(spec, &trial, shape, settings)?;
    out.push(trial.component(degree, &solution));
    Ok(())
}

fn harmonic_trial(omega: f64, phase: f64, sine: bool) -> Trial {
    if omega.sin().abs() <= DEGENERATE_HARMONIC {
        // sin(k*pi*n + p) = (+-1)^n sin(p), and likewise for cos.
        let base = omega.cos().signum();
        let gain = if sine { phase.sin() } else { phase.cos() };
        Trial::Geometric { base, gain }
    } else {
        Trial::Harmonic { omega, phase, sine }
    }
}

/// Trial family for a single forcing member.
#[derive(Debug, Clone, Copy)]
enum Trial {
    /// Forcing `gain * base^n`; basis `n^k * base^n`.
    Geometric { base: f64, gain: f64 },
    /// Forcing `sin(omega*n + phase)` (or `cos` when `sine` is false);
    /// basis `n^k * sin(..)`, `n^k * cos(..)`.
    Harmonic { omega: f64, phase: f64, sine: bool },
}

impl Trial {
    fn unknowns(&self) -> usize {
        match self {
            Trial::Geometric { .. } => 1,
            Trial::Harmonic { .. } => 2,
        }
    }

    /// Basis function `basis` of the degree-`degree` trial at `n - lag`.
    /// Geometric values are divided by `base^n` so large `n` cannot overflow.
    fn lagged(&self, basis: usize, degree: usize, n: i64, lag: usize) -> f64 {
        let m = n - lag as i64;
        match *self {
            Trial::Geometric { base, .. } => monomial(m, degree) * base.powi(-(lag as i32)),
            Trial::Harmonic { omega, phase, .. } => {
                let angle = omega * m as f64 + phase;
                let wave = if basis == 0 { angle.sin() } else { angle.cos() };
                monomial(m, degree) * wave
            }
        }
    }

    /// Forcing value at `n`, normalised the same way as [`Trial::lagged`].
    fn forcing(&self, n: i64) -> f64 {
        match *self {
            Trial::Geometric { gain, .. } => gain,
            Trial::Harmonic { omega, phase, sine } => {
                let angle = omega * n as f64 + phase;
                if sine {
                    angle.sin()
                } else {
                    angle.cos()
                }
            }
        }
    }

    fn component(&self, degree: usize, solution: &[f64]) -> ParticularComponent {
        match *self {
            Trial::Geometric { base, .. } => ParticularComponent::Geometric {
                amplitude: solution[0],
                base,
                degree,
            },
            Trial::Harmonic { omega, phase, .. } => ParticularComponent::Harmonic {
                sin_coefficient: solution[0],
                cos_coefficient: solution[1],
                omega,
                phase,
                degree,
            },
        }
    }
}

/// `sum_j a_j * basis(n - j)` and the same sum of absolute values.
fn substitute(
    spec: &RecurrenceSpec,
    trial: &Trial,
    basis: usize,
    degree: usize,
    n: i64,
) -> (f64, f64) {
    spec.coefficients()
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(value, magnitude), (lag, a)| {
            let term = a * trial.lagged(basis, degree, n, lag);
            (value + term, magnitude + term.abs())
        })
}

/// Finds the lowest trial degree whose substituted system is non-singular.
/// A root of multiplicity m forces degree m, and m never exceeds the order.
fn solve_trial(
    spec: &RecurrenceSpec,
    trial: &Trial,
    shape: SignalShape,
    settings: &SolverSettings,
) -> RecurrenceResult<(usize, Vec<f64>)> {
    let unknowns = trial.unknowns();
    let mut last_reason = String::new();

    for degree in 0..=spec.order() {
        let mut matrix = DMatrix::<f64>::zeros(unknowns, unknowns);
        let mut scales = vec![0.0_f64; unknowns];
        let mut rhs = DVector::<f64>::zeros(unknowns);
        for row in 0..unknowns {
            let n = row as i64;
            for basis in 0..unknowns {
                let (value, magnitude) = substitute(spec, trial, basis, degree, n);
                matrix[(row, basis)] = value;
                scales[basis] = scales[basis].max(magnitude);
            }
            rhs[row] = trial.forcing(n);
        }

        match solve_scaled(matrix, rhs, &scales, settings.singular_tolerance) {
            Ok(solution) => {
                let solution: Vec<f64> = solution.iter().cloned().collect();
                verify_trial(spec, trial, degree, &solution, shape, settings)?;
                return Ok((degree, solution));
            }
            Err(singular) => {
                // Resonance: the trial mode already solves the undriven equation.
                last_reason = singular.to_string();
            }
        }
    }

    Err(RecurrenceError::UnsolvableParticularForm {
        shape: shape.name(),
        degree: spec.order(),
        reason: format!("trial stayed singular through every degree ({last_reason})"),
    })
}

/// Checks the solved trial against the driven equation beyond the rows used
/// to build the system.
fn verify_trial(
    spec: &RecurrenceSpec,
    trial: &Trial,
    degree: usize,
    solution: &[f64],
    shape: SignalShape,
    settings: &SolverSettings,
) -> RecurrenceResult<()> {
    for n in 0..=(spec.order() as i64 + 2) {
        let mut lhs = 0.0;
        let mut magnitude = 0.0;
        for (basis, coeff) in solution.iter().enumerate() {
            let (value, scale) = substitute(spec, trial, basis, degree, n);
            lhs += coeff * value;
            magnitude += (coeff * scale).abs();
        }
        let forcing = trial.forcing(n);
        let residual = (lhs - forcing).abs();
        if residual > settings.residual_tolerance * (magnitude + forcing.abs()).max(1.0) {
            return Err(RecurrenceError::UnsolvableParticularForm {
                shape: shape.name(),
                degree,
                reason: format!("substituted trial misses the forcing by {residual:.3e} at n = {n}"),
            });
        }
    }
    Ok(())
}

fn monomial(n: i64, degree: usize) -> f64 {
    (n as f64).powi(degree as i32)
}
