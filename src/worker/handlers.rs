//! Built-in demo handlers.
//!
//! Small, pure-Rust units of work used by the worker binary and the test
//! suite. Parameters arrive as a JSON object; values dispatched through
//! the HTTP gateway are strings, so numeric parameters accept both forms.

use serde_json::{json, Value};

use super::registry::{HandlerError, HandlerRegistry, HandlerResult};
use crate::protocol::Params;

/// Register every built-in handler.
pub fn register_builtin(registry: &mut HandlerRegistry) {
    registry.register("echo", |params: Params| async move { echo(params) });
    registry.register("gaussian_heatmap", |params: Params| async move {
        gaussian_heatmap(params)
    });
    registry.register("trig_plot", |params: Params| async move { trig_plot(params) });
}

/// Read a numeric parameter that may be a JSON number or a string.
fn param_usize(params: &Params, key: &str, default: usize) -> Result<usize, HandlerError> {
    match params.get(key) {
        None => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| HandlerError::new(format!("parameter '{}' must be a non-negative integer", key))),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| HandlerError::new(format!("parameter '{}' is not a number: '{}'", key, s))),
        Some(_) => Err(HandlerError::new(format!(
            "parameter '{}' must be a number",
            key
        ))),
    }
}

/// Returns the parameter set unchanged.
fn echo(params: Params) -> HandlerResult {
    Ok(Value::Object(params))
}

/// Square matrix of a 2-D Gaussian with a little per-call jitter in the
/// spread, sampled over [-1, 1] x [-1, 1].
fn gaussian_heatmap(params: Params) -> HandlerResult {
    let size = param_usize(&params, "size", 20)?.max(2);
    let jitter = (time_seed() % 1000) as f64 / 2000.0; // 0.0 .. 0.5
    let sigma = 0.5 + jitter * 0.5;

    let mut rows = Vec::with_capacity(size);
    for i in 0..size {
        let mut row = Vec::with_capacity(size);
        for j in 0..size {
            let y = (i as f64 / (size - 1) as f64) * 2.0 - 1.0;
            let x = (j as f64 / (size - 1) as f64) * 2.0 - 1.0;
            let value = (-((x * x + y * y) / (2.0 * sigma * sigma))).exp();
            row.push(value);
        }
        rows.push(row);
    }
    Ok(json!({ "heatmap_data": rows }))
}

/// Sine and cosine series over one period.
fn trig_plot(params: Params) -> HandlerResult {
    let points = param_usize(&params, "points", 100)?.max(2);

    let mut xs = Vec::with_capacity(points);
    let mut sins = Vec::with_capacity(points);
    let mut coss = Vec::with_capacity(points);
    for i in 0..points {
        let x = i as f64 / (points - 1) as f64 * std::f64::consts::TAU;
        xs.push(x);
        sins.push(x.sin());
        coss.push(x.cos());
    }
    Ok(json!({ "x": xs, "sin": sins, "cos": coss }))
}

/// Cheap per-call seed from the system clock.
fn time_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
        .wrapping_mul(0x517cc1b727220a95)
}
