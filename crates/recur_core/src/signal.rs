//! Forcing signals `x[n]` that may drive a recurrence.
//!
//! The catalog is closed: every supported shape is a variant of
//! [`ForcingDescriptor`] and [`evaluate_signal`] dispatches on it. Each shape
//! is zero before its shift and follows its closed form at/after it.

use crate::error::{RecurrenceError, RecurrenceResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ForcingDescriptor {
    /// Homogeneous case, `x[n] = 0`.
    None,
    /// `base^(n - shift)`.
    Exponential {
        base: f64,
        #[serde(default)]
        shift: i64,
    },
    /// `sin(omega*n + phase)`.
    Sine {
        omega: f64,
        #[serde(default)]
        phase: f64,
        #[serde(default)]
        shift: i64,
    },
    /// `cos(omega*n + phase)`.
    Cosine {
        omega: f64,
        #[serde(default)]
        phase: f64,
        #[serde(default)]
        shift: i64,
    },
    /// Kronecker delta at `shift`.
    Impulse {
        #[serde(default)]
        shift: i64,
    },
    /// Unit step starting at `shift`.
    Step {
        #[serde(default)]
        shift: i64,
    },
    /// Sum of its members.
    Combination { members: Vec<ForcingDescriptor> },
}

impl Default for ForcingDescriptor {
    fn default() -> Self {
        ForcingDescriptor::None
    }
}

/// Shape tag of a descriptor, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalShape {
    None,
    Exponential,
    Sine,
    Cosine,
    Impulse,
    Step,
    Combination,
}

impl SignalShape {
    pub fn name(self) -> &'static str {
        match self {
            SignalShape::None => "none",
            SignalShape::Exponential => "exponential",
            SignalShape::Sine => "sine",
            SignalShape::Cosine => "cosine",
            SignalShape::Impulse => "impulse",
            SignalShape::Step => "step",
            SignalShape::Combination => "combination",
        }
    }
}

impl fmt::Display for SignalShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SignalShape {
    type Err = RecurrenceError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SignalShape::None),
            "exponential" | "exp" => Ok(SignalShape::Exponential),
            "sine" | "sin" => Ok(SignalShape::Sine),
            "cosine" | "cos" => Ok(SignalShape::Cosine),
            "impulse" | "delta" => Ok(SignalShape::Impulse),
            "step" => Ok(SignalShape::Step),
            "combination" => Ok(SignalShape::Combination),
            other => Err(RecurrenceError::InvalidSignal {
                reason: format!("unrecognized shape tag '{other}'"),
            }),
        }
    }
}

impl ForcingDescriptor {
    pub fn shape(&self) -> SignalShape {
        match self {
            ForcingDescriptor::None => SignalShape::None,
            ForcingDescriptor::Exponential { .. } => SignalShape::Exponential,
            ForcingDescriptor::Sine { .. } => SignalShape::Sine,
            ForcingDescriptor::Cosine { .. } => SignalShape::Cosine,
            ForcingDescriptor::Impulse { .. } => SignalShape::Impulse,
            ForcingDescriptor::Step { .. } => SignalShape::Step,
            ForcingDescriptor::Combination { .. } => SignalShape::Combination,
        }
    }

    /// Builds a leaf descriptor from a shape tag and positional parameters:
    /// `exponential: [base, shift]`, `sine`/`cosine: [omega, phase, shift]`,
    /// `impulse`/`step: [shift]`. Missing trailing parameters default to 0.
    pub fn from_shape(tag: &str, params: &[f64]) -> RecurrenceResult<Self> {
        let shape: SignalShape = tag.parse()?;
        let param = |idx: usize| params.get(idx).copied().unwrap_or(0.0);
        let shift_at = |idx: usize| shift_from_param(param(idx));
        let descriptor = match shape {
            SignalShape::None => ForcingDescriptor::None,
            SignalShape::Exponential => {
                let base = params.first().copied().ok_or_else(|| RecurrenceError::InvalidSignal {
                    reason: "exponential requires a base parameter".to_string(),
                })?;
                ForcingDescriptor::Exponential {
                    base,
                    shift: shift_at(1)?,
                }
            }
            SignalShape::Sine | SignalShape::Cosine => {
                let omega = params.first().copied().ok_or_else(|| RecurrenceError::InvalidSignal {
                    reason: format!("{shape} requires an omega parameter"),
                })?;
                let phase = param(1);
                let shift = shift_at(2)?;
                if shape == SignalShape::Sine {
                    ForcingDescriptor::Sine { omega, phase, shift }
                } else {
                    ForcingDescriptor::Cosine { omega, phase, shift }
                }
            }
            SignalShape::Impulse => ForcingDescriptor::Impulse { shift: shift_at(0)? },
            SignalShape::Step => ForcingDescriptor::Step { shift: shift_at(0)? },
            SignalShape::Combination => {
                return Err(RecurrenceError::InvalidSignal {
                    reason: "combination cannot be built from positional parameters".to_string(),
                })
            }
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Checks parameters recursively without evaluating the signal.
    pub fn validate(&self) -> RecurrenceResult<()> {
        match self {
            ForcingDescriptor::None
            | ForcingDescriptor::Impulse { .. }
            | ForcingDescriptor::Step { .. } => Ok(()),
            ForcingDescriptor::Exponential { base, .. } => require_finite("base", *base),
            ForcingDescriptor::Sine { omega, phase, .. }
            | ForcingDescriptor::Cosine { omega, phase, .. } => {
                require_finite("omega", *omega)?;
                require_finite("phase", *phase)
            }
            ForcingDescriptor::Combination { members } => {
                if members.is_empty() {
                    return Err(RecurrenceError::InvalidSignal {
                        reason: "combination has no members".to_string(),
                    });
                }
                members.iter().try_for_each(ForcingDescriptor::validate)
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ForcingDescriptor::None)
    }

    /// Largest shift among the descriptor's leaves (0 for `None`).
    pub fn max_shift(&self) -> i64 {
        match self {
            ForcingDescriptor::None => 0,
            ForcingDescriptor::Exponential { shift, .. }
            | ForcingDescriptor::Sine { shift, .. }
            | ForcingDescriptor::Cosine { shift, .. }
            | ForcingDescriptor::Impulse { shift }
            | ForcingDescriptor::Step { shift } => *shift,
            ForcingDescriptor::Combination { members } => {
                members.iter().map(|m| m.max_shift()).max().unwrap_or(0)
            }
        }
    }
}

/// Value of the forcing signal at index `n`.
pub fn evaluate_signal(descriptor: &ForcingDescriptor, n: i64) -> RecurrenceResult<f64> {
    match descriptor {
        ForcingDescriptor::None => Ok(0.0),
        ForcingDescriptor::Exponential { base, shift } => {
            require_finite("base", *base)?;
            if n < *shift {
                return Ok(0.0);
            }
            let exponent = i32::try_from(n - shift).map_err(|_| RecurrenceError::InvalidSignal {
                reason: format!("exponent n - shift = {} overflows", n - shift),
            })?;
            Ok(base.powi(exponent))
        }
        ForcingDescriptor::Sine {
            omega,
            phase,
            shift,
        } => {
            require_finite("omega", *omega)?;
            require_finite("phase", *phase)?;
            if n < *shift {
                return Ok(0.0);
            }
            Ok((omega * n as f64 + phase).sin())
        }
        ForcingDescriptor::Cosine {
            omega,
            phase,
            shift,
        } => {
            require_finite("omega", *omega)?;
            require_finite("phase", *phase)?;
            if n < *shift {
                return Ok(0.0);
            }
            Ok((omega * n as f64 + phase).cos())
        }
        ForcingDescriptor::Impulse { shift } => Ok(if n == *shift { 1.0 } else { 0.0 }),
        ForcingDescriptor::Step { shift } => Ok(if n >= *shift { 1.0 } else { 0.0 }),
        ForcingDescriptor::Combination { members } => {
            if members.is_empty() {
                return Err(RecurrenceError::InvalidSignal {
                    reason: "combination has no members".to_string(),
                });
            }
            members
                .iter()
                .try_fold(0.0, |acc, member| Ok(acc + evaluate_signal(member, n)?))
        }
    }
}

/// Samples `x[0..length]`.
pub fn sample_signal(descriptor: &ForcingDescriptor, length: usize) -> RecurrenceResult<Vec<f64>> {
    descriptor.validate()?;
    (0..length)
        .map(|n| evaluate_signal(descriptor, n as i64))
        .collect()
}

fn require_finite(name: &str, value: f64) -> RecurrenceResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RecurrenceError::InvalidSignal {
            reason: format!("{name} must be finite, got {value}"),
        })
    }
}

fn shift_from_param(value: f64) -> RecurrenceResult<i64> {
    if !value.is_finite() || value.fract() != 0.0 || value.abs() > i32::MAX as f64 {
        return Err(RecurrenceError::InvalidSignal {
            reason: format!("shift must be an integer, got {value}"),
        });
    }
    Ok(value as i64)
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

    #[test]
    fn exponential_is_zero_before_shift_and_geometric_after() {
        let signal = ForcingDescriptor::Exponential { base: 3.0, shift: 2 };
        assert_eq!(evaluate_signal(&signal, 1).unwrap(), 0.0);
        assert_eq!(evaluate_signal(&signal, 2).unwrap(), 1.0);
        assert_eq!(evaluate_signal(&signal, 4).unwrap(), 9.0);
    }

    #[test]
    fn harmonics_use_absolute_index() {
        let sine = ForcingDescriptor::Sine {
            omega: PI / 2.0,
            phase: 0.0,
            shift: 1,
        };
        assert_eq!(evaluate_signal(&sine, 0).unwrap(), 0.0);
        assert!((evaluate_signal(&sine, 1).unwrap() - 1.0).abs() < 1e-12);

        let cosine = ForcingDescriptor::Cosine {
            omega: PI,
            phase: 0.0,
            shift: 0,
        };
        assert!((evaluate_signal(&cosine, 3).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn impulse_and_step() {
        let impulse = ForcingDescriptor::Impulse { shift: 2 };
        let step = ForcingDescriptor::Step { shift: 2 };
        assert_eq!(sample_signal(&impulse, 4).unwrap(), vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(sample_signal(&step, 4).unwrap(), vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn combination_sums_members() {
        let signal = ForcingDescriptor::Combination {
            members: vec![
                ForcingDescriptor::Step { shift: 0 },
                ForcingDescriptor::Exponential { base: 2.0, shift: 0 },
                ForcingDescriptor::Impulse { shift: 1 },
            ],
        };
        assert_eq!(sample_signal(&signal, 3).unwrap(), vec![2.0, 4.0, 5.0]);
        assert_eq!(signal.max_shift(), 1);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let signal = ForcingDescriptor::Sine {
            omega: f64::INFINITY,
            phase: 0.0,
            shift: 0,
        };
        assert_err_contains(evaluate_signal(&signal, 0), "omega must be finite");

        let empty = ForcingDescriptor::Combination { members: vec![] };
        assert_err_contains(evaluate_signal(&empty, 0), "no members");
        assert_err_contains(sample_signal(&empty, 2), "no members");
    }

    #[test]
    fn from_shape_parses_tags_and_rejects_unknown() {
        let signal = ForcingDescriptor::from_shape("exp", &[3.0, 2.0]).unwrap();
        assert_eq!(signal, ForcingDescriptor::Exponential { base: 3.0, shift: 2 });

        let signal = ForcingDescriptor::from_shape("Cosine", &[1.0]).unwrap();
        assert_eq!(
            signal,
            ForcingDescriptor::Cosine {
                omega: 1.0,
                phase: 0.0,
                shift: 0
            }
        );

        assert_err_contains(
            ForcingDescriptor::from_shape("sawtooth", &[1.0]),
            "unrecognized shape tag 'sawtooth'",
        );
        assert_err_contains(ForcingDescriptor::from_shape("step", &[0.5]), "integer");
        assert_err_contains(ForcingDescriptor::from_shape("exponential", &[]), "base");
    }
}
