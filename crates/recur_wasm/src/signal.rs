//! Forcing descriptors across the JS boundary.

use js_sys::Float64Array;
use recur_core::signal::{evaluate_signal, sample_signal};
use recur_core::{ForcingDescriptor, RecurrenceError};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Decodes a `{ type: "...", ... }` object into a validated descriptor.
pub(crate) fn decode_forcing(value: JsValue) -> Result<ForcingDescriptor, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(ForcingDescriptor::None);
    }
    let descriptor: ForcingDescriptor = from_value(value).map_err(|e| {
        let err = RecurrenceError::InvalidSignal {
            reason: e.to_string(),
        };
        JsValue::from_str(&err.to_string())
    })?;
    descriptor
        .validate()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(descriptor)
}

/// Builds a descriptor from a shape tag and positional parameters.
#[wasm_bindgen]
pub fn forcing_from_shape(tag: &str, params: Vec<f64>) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let descriptor = ForcingDescriptor::from_shape(tag, &params)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_value(&descriptor).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen]
pub fn evaluate_forcing(forcing_val: JsValue, n: f64) -> Result<f64, JsValue> {
    let forcing = decode_forcing(forcing_val)?;
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(JsValue::from_str("Sample index must be an integer."));
    }
    evaluate_signal(&forcing, n as i64)
        .map_err(|e| JsValue::from_str(&format!("Signal evaluation failed: {}", e)))
}

#[wasm_bindgen]
pub fn sample_forcing(forcing_val: JsValue, length: u32) -> Result<Float64Array, JsValue> {
    let forcing = decode_forcing(forcing_val)?;
    let samples = sample_signal(&forcing, length as usize)
        .map_err(|e| JsValue::from_str(&format!("Signal evaluation failed: {}", e)))?;
    Ok(Float64Array::from(samples.as_slice()))
}
