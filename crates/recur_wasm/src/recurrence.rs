//! WASM wrapper around one recurrence and its solver settings.

use js_sys::Float64Array;
use recur_core::engine::{
    forward_recurse, general_solution_with, impulse_response, recurrence_residuals,
    resolve_constants_with, zero_state_response, BoundSolution,
};
use recur_core::particular::build_particular_term_with;
use recur_core::{find_roots_with, ForcingDescriptor, RecurrenceSpec, SolverSettings};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

use crate::signal::decode_forcing;

/// Largest imaginary part tolerated when a closed form is sampled as reals.
const IMAGINARY_TOLERANCE: f64 = 1e-8;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonPayload {
    closed_form: Vec<f64>,
    recursion: Vec<f64>,
    max_difference: f64,
}

#[wasm_bindgen]
pub struct WasmRecurrence {
    spec: RecurrenceSpec,
    settings: SolverSettings,
}

#[wasm_bindgen]
impl WasmRecurrence {
    /// `settings_val` may be `undefined`/`null` for the default tolerances.
    #[wasm_bindgen(constructor)]
    pub fn new(coefficients: Vec<f64>, settings_val: JsValue) -> Result<WasmRecurrence, JsValue> {
        console_error_panic_hook::set_once();

        let spec = RecurrenceSpec::new(&coefficients)
            .map_err(|e| JsValue::from_str(&format!("Invalid recurrence: {}", e)))?;
        let settings = if settings_val.is_undefined() || settings_val.is_null() {
            SolverSettings::default()
        } else {
            from_value(settings_val)
                .map_err(|e| JsValue::from_str(&format!("Invalid solver settings: {}", e)))?
        };
        Ok(WasmRecurrence { spec, settings })
    }

    pub fn order(&self) -> usize {
        self.spec.order()
    }

    pub fn get_coefficients(&self) -> Vec<f64> {
        self.spec.coefficients().to_vec()
    }

    pub fn find_roots(&self) -> Result<JsValue, JsValue> {
        let roots = find_roots_with(self.spec.coefficients(), &self.settings)
            .map_err(|e| JsValue::from_str(&format!("Root finding failed: {}", e)))?;
        to_value(&roots).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn particular_term(&self, forcing_val: JsValue) -> Result<JsValue, JsValue> {
        let forcing = decode_forcing(forcing_val)?;
        let term = build_particular_term_with(self.spec.coefficients(), &forcing, &self.settings)
            .map_err(|e| JsValue::from_str(&format!("Particular solution failed: {}", e)))?;
        to_value(&term).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn general_solution(&self, forcing_val: JsValue) -> Result<JsValue, JsValue> {
        let forcing = decode_forcing(forcing_val)?;
        let solution = general_solution_with(self.spec.coefficients(), &forcing, &self.settings)
            .map_err(|e| JsValue::from_str(&format!("General solution failed: {}", e)))?;
        to_value(&solution).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// General solution with its constants bound to `initial_conditions`.
    pub fn solve(
        &self,
        initial_conditions: Vec<f64>,
        forcing_val: JsValue,
    ) -> Result<JsValue, JsValue> {
        let forcing = decode_forcing(forcing_val)?;
        let bound = self.bind(&initial_conditions, &forcing)?;
        to_value(&bound).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Closed form sampled at `n = 0..length`.
    pub fn closed_form_sequence(
        &self,
        initial_conditions: Vec<f64>,
        forcing_val: JsValue,
        length: u32,
    ) -> Result<Float64Array, JsValue> {
        let forcing = decode_forcing(forcing_val)?;
        let bound = self.bind(&initial_conditions, &forcing)?;
        let values = real_samples(&bound, length as usize)
            .map_err(|e| JsValue::from_str(&format!("Closed form sampling failed: {}", e)))?;
        Ok(Float64Array::from(values.as_slice()))
    }

    /// Closed form and forward recursion side by side, for plotting both.
    pub fn compare_solutions(
        &self,
        initial_conditions: Vec<f64>,
        forcing_val: JsValue,
        length: u32,
    ) -> Result<JsValue, JsValue> {
        let forcing = decode_forcing(forcing_val)?;
        let length = length as usize;
        let recursion = forward_recurse(
            self.spec.coefficients(),
            &initial_conditions,
            &forcing,
            length,
        )
        .map_err(|e| JsValue::from_str(&format!("Forward recursion failed: {}", e)))?
        .into_vec();
        let bound = self.bind(&initial_conditions, &forcing)?;
        let closed_form = real_samples(&bound, length)
            .map_err(|e| JsValue::from_str(&format!("Closed form sampling failed: {}", e)))?;
        let max_difference = closed_form
            .iter()
            .zip(&recursion)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);

        let payload = ComparisonPayload {
            closed_form,
            recursion,
            max_difference,
        };
        to_value(&payload).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn forward_recurse(
        &self,
        initial_conditions: Vec<f64>,
        forcing_val: JsValue,
        length: u32,
    ) -> Result<Float64Array, JsValue> {
        let forcing = decode_forcing(forcing_val)?;
        let sequence = forward_recurse(
            self.spec.coefficients(),
            &initial_conditions,
            &forcing,
            length as usize,
        )
        .map_err(|e| JsValue::from_str(&format!("Forward recursion failed: {}", e)))?;
        Ok(Float64Array::from(sequence.values()))
    }

    pub fn zero_state_response(
        &self,
        forcing_val: JsValue,
        length: u32,
    ) -> Result<Float64Array, JsValue> {
        let forcing = decode_forcing(forcing_val)?;
        let sequence = zero_state_response(self.spec.coefficients(), &forcing, length as usize)
            .map_err(|e| JsValue::from_str(&format!("Zero-state response failed: {}", e)))?;
        Ok(Float64Array::from(sequence.values()))
    }

    pub fn impulse_response(&self, length: u32) -> Result<Float64Array, JsValue> {
        let sequence = impulse_response(self.spec.coefficients(), length as usize)
            .map_err(|e| JsValue::from_str(&format!("Impulse response failed: {}", e)))?;
        Ok(Float64Array::from(sequence.values()))
    }

    pub fn residuals(&self, values: Vec<f64>, forcing_val: JsValue) -> Result<Float64Array, JsValue> {
        let forcing = decode_forcing(forcing_val)?;
        let residuals = recurrence_residuals(self.spec.coefficients(), &values, &forcing)
            .map_err(|e| JsValue::from_str(&format!("Residual evaluation failed: {}", e)))?;
        Ok(Float64Array::from(residuals.as_slice()))
    }
}

impl WasmRecurrence {
    fn bind(
        &self,
        initial_conditions: &[f64],
        forcing: &ForcingDescriptor,
    ) -> Result<BoundSolution, JsValue> {
        let solution = general_solution_with(self.spec.coefficients(), forcing, &self.settings)
            .map_err(|e| JsValue::from_str(&format!("General solution failed: {}", e)))?;
        resolve_constants_with(&solution, initial_conditions, &self.settings)
            .map_err(|e| JsValue::from_str(&format!("Constant resolution failed: {}", e)))
    }
}

/// Real parts of `y[0..length]`, rejecting a closed form that is genuinely complex.
fn real_samples(bound: &BoundSolution, length: usize) -> anyhow::Result<Vec<f64>> {
    let mut values = Vec::with_capacity(length);
    for n in 0..length {
        let value = bound.evaluate(n as i64);
        let scale = value.re.abs().max(1.0);
        if !value.re.is_finite() || !value.im.is_finite() {
            anyhow::bail!("Closed form is not finite at n = {}.", n);
        }
        if value.im.abs() > IMAGINARY_TOLERANCE * scale {
            return Err(anyhow::anyhow!(
                "Closed form has imaginary part {:.3e} at n = {}.",
                value.im,
                n
            ));
        }
        values.push(value.re);
    }
    Ok(values)
}
