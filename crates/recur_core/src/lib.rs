pub mod characteristic;
pub mod engine;
pub mod error;
mod linalg;
pub mod particular;
pub mod signal;
/// The `recur_core` crate solves linear constant-coefficient difference equations
/// `a0*y[n] + a1*y[n-1] + ... + aN*y[n-N] = x[n]`.
///
/// Key components:
/// - **Signals**: `ForcingDescriptor` catalog of closed-form inputs and their pointwise evaluation.
/// - **Characteristic**: Roots of `a0*r^N + ... + aN` with multiplicities, via the companion matrix.
/// - **Particular**: Undetermined-coefficients particular terms with resonance escalation.
/// - **Engine**: General solutions, constant resolution from initial conditions, and forward recursion.
pub mod types;

pub use characteristic::{characteristic_polynomial, evaluate_polynomial, find_roots, find_roots_with};
pub use engine::{
    forward_recurse, general_solution, general_solution_with, impulse_response,
    recurrence_residuals, resolve_constants, resolve_constants_with, solve, zero_state_response,
    BoundSolution, GeneralSolution, HomogeneousBasis, HomogeneousTerm, ResolvedConstant,
};
pub use error::{RecurrenceError, RecurrenceResult};
pub use particular::{
    build_particular_term, build_particular_term_with, ParticularComponent, ParticularTerm,
};
pub use signal::{evaluate_signal, sample_signal, ForcingDescriptor, SignalShape};
pub use types::{
    CharacteristicRoot, CharacteristicRoots, NumericSequence, RecurrenceSpec, SolverSettings,
};
