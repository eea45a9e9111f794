//! Linear regression reference model.
//!
//! Smallest complete implementation of the model contract: weights and bias
//! are trainable, a per-feature input scale is frozen, and two local
//! accumulators (loss sum, example count) back `aggregated_outputs`. Training
//! mode adds an L2 penalty to the loss; evaluation mode reports plain MSE.

use std::time::Instant;

use anyhow::Result;
use rand::Rng;

use crate::metrics;
use crate::model::{validate_batch, BatchOutput, Model, MODEL_METRICS};
use crate::tensor::{Tensor, TensorMap, TensorSpec, Variable};

const LOSS_SUM: usize = 0;
const NUM_EXAMPLES: usize = 1;

pub struct LinearRegression {
    feature_dim: usize,
    l2_penalty: f32,
    trainable: Vec<Variable>,
    non_trainable: Vec<Variable>,
    local: Vec<Variable>,
    input_spec: Vec<TensorSpec>,
}

impl LinearRegression {
    /// Zero-initialized model over `feature_dim` input features.
    pub fn new(feature_dim: usize) -> Result<Self> {
        Self::with_parameters(vec![0.0; feature_dim], 0.0)
    }

    /// Model with explicit starting parameters.
    pub fn with_parameters(weights: Vec<f32>, bias: f32) -> Result<Self> {
        let feature_dim = weights.len();
        if feature_dim == 0 {
            anyhow::bail!("linear model needs at least one feature");
        }
        Ok(Self {
            feature_dim,
            l2_penalty: 0.01,
            trainable: vec![
                Variable::new("weights", Tensor::new(vec![feature_dim], weights)?),
                Variable::new("bias", Tensor::scalar(bias)),
            ],
            non_trainable: vec![Variable::new(
                "feature_scale",
                Tensor::new(vec![feature_dim], vec![1.0; feature_dim])?,
            )],
            local: vec![
                Variable::new("loss_sum", Tensor::scalar(0.0)),
                Variable::new("num_examples", Tensor::scalar(0.0)),
            ],
            input_spec: vec![
                TensorSpec::new("x", vec![None, Some(feature_dim)]),
                TensorSpec::new("y", vec![None]),
            ],
        })
    }

    /// Small random starting parameters.
    pub fn random(feature_dim: usize) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let weights = (0..feature_dim).map(|_| rng.gen_range(-0.1..0.1)).collect();
        Self::with_parameters(weights, rng.gen_range(-0.1..0.1))
    }

    pub fn with_l2_penalty(mut self, l2_penalty: f32) -> Self {
        self.l2_penalty = l2_penalty;
        self
    }

    pub fn feature_dim(&self) -> usize { self.feature_dim }

    fn predict_into(&self, x: &Tensor, out: &mut Vec<f32>) {
        let weights = self.trainable[0].value();
        let bias = self.trainable[1].value().scalar_value().unwrap_or(0.0);
        let scale = self.non_trainable[0].value();
        let d = self.feature_dim;
        let rows = x.shape()[0];
        out.clear();
        out.reserve(rows);
        for row in 0..rows {
            let features = &x.data()[row * d..(row + 1) * d];
            let mut acc = bias;
            for j in 0..d {
                acc += features[j] * scale.data()[j] * weights.data()[j];
            }
            out.push(acc);
        }
    }
}

impl Model for LinearRegression {
    fn trainable_variables(&self) -> &[Variable] { &self.trainable }
    fn non_trainable_variables(&self) -> &[Variable] { &self.non_trainable }
    fn local_variables(&self) -> &[Variable] { &self.local }
    fn input_spec(&self) -> &[TensorSpec] { &self.input_spec }

    fn forward_pass(&self, batch: &TensorMap, training: bool) -> Result<BatchOutput> {
        let start = Instant::now();
        validate_batch(&self.input_spec, batch)?;
        let x = batch.get("x").expect("validated");
        let y = batch.get("y").expect("validated");
        let n = x.shape()[0];
        if n == 0 {
            anyhow::bail!("empty batch");
        }
        if y.len() != n {
            anyhow::bail!("batch has {} rows but {} labels", n, y.len());
        }

        let mut preds = Vec::new();
        self.predict_into(x, &mut preds);

        let mse: f32 = preds
            .iter()
            .zip(y.data())
            .map(|(p, t)| (p - t) * (p - t))
            .sum::<f32>()
            / n as f32;
        let mut loss = mse;
        if training {
            let weights = self.trainable[0].value();
            loss += self.l2_penalty * weights.data().iter().map(|w| w * w).sum::<f32>();
        }

        metrics::add_scalar(&self.local[LOSS_SUM], loss * n as f32);
        metrics::add_scalar(&self.local[NUM_EXAMPLES], n as f32);

        let latency = start.elapsed().as_secs_f64() * 1000.0;
        MODEL_METRICS.forward_passes_total.add(1, &[]);
        MODEL_METRICS.loss.record(loss as f64, &[]);
        MODEL_METRICS.forward_latency_ms.record(latency, &[]);
        tracing::debug!(n, training, loss, "forward pass");

        let mut predictions = TensorMap::new();
        predictions.insert("predictions", Tensor::new(vec![n], preds)?);
        Ok(BatchOutput { loss: Tensor::scalar(loss), predictions, num_examples: n })
    }

    fn aggregated_outputs(&self) -> TensorMap {
        let mut out = TensorMap::new();
        out.insert(
            "loss",
            Tensor::scalar(metrics::mean(&self.local[LOSS_SUM], &self.local[NUM_EXAMPLES])),
        );
        out.insert(
            "num_examples",
            Tensor::scalar(metrics::scalar(&self.local[NUM_EXAMPLES])),
        );
        out
    }
}
