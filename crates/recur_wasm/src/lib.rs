mod recurrence;
mod signal;

pub use recurrence::WasmRecurrence;
pub use signal::{evaluate_forcing, forcing_from_shape, sample_forcing};
