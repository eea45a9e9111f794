//! Scalar accumulator helpers over local variables.
//!
//! Local variables are plain tensors; these helpers give them running-metric
//! semantics (counts, sums, weighted means) without adding state of their own.

use crate::tensor::Variable;

/// Adds `delta` to a rank-0 accumulator.
pub fn add_scalar(var: &Variable, delta: f32) {
    var.update(|t| {
        if let Some(v) = t.data_mut().first_mut() {
            *v += delta;
        }
    });
}

/// Current value of a rank-0 accumulator, 0.0 if it holds none.
pub fn scalar(var: &Variable) -> f32 {
    var.value().scalar_value().unwrap_or(0.0)
}

/// Weighted mean `sum / count`, 0.0 while nothing has been accumulated.
pub fn mean(sum: &Variable, count: &Variable) -> f32 {
    let c = scalar(count);
    if c == 0.0 { 0.0 } else { scalar(sum) / c }
}
