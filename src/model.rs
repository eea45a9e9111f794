//! The model contract for federated training and evaluation pipelines.
//!
//! A `Model` exposes three ordered variable collections and two operations.
//! `forward_pass` evaluates one batch and may accumulate into local variables;
//! it must leave trainable and non-trainable variables untouched.
//! `aggregated_outputs` reads the accumulated local state without mutating
//! anything, so repeated calls with no intervening forward pass agree.
//!
//! Variable collections are declared at construction and live as long as the
//! model; the trait performs no initialization of its own. Parameter updates
//! and cross-client aggregation happen outside this crate.

use anyhow::Result;
use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Histogram, Meter};

use crate::tensor::{Tensor, TensorMap, TensorSpec, Variable};

/// Result of one forward pass. `loss` is required for gradient-based
/// training; `predictions` carries implementation-defined extras.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub loss: Tensor,
    pub predictions: TensorMap,
    pub num_examples: usize,
}

pub trait Model {
    /// Parameters subject to gradient-based updates, in declaration order.
    fn trainable_variables(&self) -> &[Variable];

    /// Parameters exempt from updates (frozen layers, fixed scales).
    fn non_trainable_variables(&self) -> &[Variable];

    /// Metric accumulators local to this execution context. Never transmitted.
    fn local_variables(&self) -> &[Variable];

    /// Structure a batch must have to be accepted by `forward_pass`.
    fn input_spec(&self) -> &[TensorSpec];

    /// Evaluates one batch. `training` selects training-mode computation
    /// (e.g. regularization terms); it must never alter parameters.
    fn forward_pass(&self, batch: &TensorMap, training: bool) -> Result<BatchOutput>;

    /// Aggregate of everything accumulated in local variables since the last
    /// reset. Pure read of current state.
    fn aggregated_outputs(&self) -> TensorMap;
}

/// Checks a batch against a spec: every declared tensor present with a
/// matching shape, and nothing undeclared.
pub fn validate_batch(spec: &[TensorSpec], batch: &TensorMap) -> Result<()> {
    for s in spec {
        match batch.get(&s.name) {
            None => {
                tracing::debug!(tensor = %s.name, "batch rejected: missing tensor");
                anyhow::bail!("batch missing tensor '{}'", s.name);
            }
            Some(t) if !s.matches(t) => {
                tracing::debug!(tensor = %s.name, shape = ?t.shape(), "batch rejected: shape mismatch");
                anyhow::bail!(
                    "batch tensor '{}' has shape {:?}, spec requires {:?}",
                    s.name, t.shape(), s.shape
                );
            }
            Some(_) => {}
        }
    }
    for name in batch.names() {
        if !spec.iter().any(|s| s.name == name) {
            tracing::debug!(tensor = %name, "batch rejected: undeclared tensor");
            anyhow::bail!("batch contains undeclared tensor '{}'", name);
        }
    }
    Ok(())
}

/// Caller-side reset of a model's accumulators. The contract itself defines
/// no reset; this zeroes every local variable in place.
pub fn reset_local_variables(model: &dyn Model) {
    for v in model.local_variables() {
        v.update(|t| t.fill(0.0));
    }
}

pub struct ModelMetrics {
    pub forward_passes_total: Counter<u64>,
    pub loss: Histogram<f64>,
    pub forward_latency_ms: Histogram<f64>,
}

static MODEL_METER: Lazy<Meter> = Lazy::new(|| opentelemetry::global::meter("fed_model"));

pub static MODEL_METRICS: Lazy<ModelMetrics> = Lazy::new(|| ModelMetrics {
    forward_passes_total: MODEL_METER
        .u64_counter("model_forward_passes_total")
        .with_description("Total forward passes executed")
        .build(),
    loss: MODEL_METER
        .f64_histogram("model_forward_loss")
        .with_description("Per-batch loss values")
        .build(),
    forward_latency_ms: MODEL_METER
        .f64_histogram("model_forward_latency_ms")
        .with_description("Forward pass latency ms")
        .build(),
});

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> Vec<TensorSpec> {
        vec![
            TensorSpec::new("x", vec![None, Some(2)]),
            TensorSpec::new("y", vec![None]),
        ]
    }

    fn batch(n: usize) -> TensorMap {
        let mut b = TensorMap::new();
        b.insert("x", Tensor::zeros(vec![n, 2]));
        b.insert("y", Tensor::zeros(vec![n]));
        b
    }

    #[test]
    fn accepts_conforming_batch() {
        assert!(validate_batch(&spec(), &batch(4)).is_ok());
        assert!(validate_batch(&spec(), &batch(1)).is_ok());
    }

    #[test]
    fn rejects_missing_tensor() {
        let mut b = TensorMap::new();
        b.insert("x", Tensor::zeros(vec![4, 2]));
        let err = validate_batch(&spec(), &b).unwrap_err();
        assert!(err.to_string().contains("missing tensor 'y'"));
    }

    #[test]
    fn rejects_shape_mismatch() {
        let mut b = batch(4);
        b.insert("x", Tensor::zeros(vec![4, 3]));
        assert!(validate_batch(&spec(), &b).is_err());
    }

    #[test]
    fn rejects_undeclared_tensor() {
        let mut b = batch(4);
        b.insert("extra", Tensor::scalar(0.0));
        let err = validate_batch(&spec(), &b).unwrap_err();
        assert!(err.to_string().contains("undeclared"));
    }
}
