//! The value network: a small multi-layer perceptron with online and
//! target parameter sets.
//!
//! Maps a 3-feature observation to one value estimate per action.
//! Updates go through a Huber loss — reward targets are noisy and
//! timeout penalties make them occasionally extreme, and a squared
//! error would let a single such target swing the whole network.
//!
//! The target set is an immutable [`Arc`] snapshot of the online
//! parameters, replaced wholesale on `sync_target()`; an evaluator can
//! never observe a partially copied target.

use std::sync::Arc;

use rand::Rng;

use qscale_core::{ACTION_COUNT, STATE_SIZE};

/// Hidden layer widths. Topology is an implementation choice; only the
/// input/output dimensionality is load-bearing.
const HIDDEN: [usize; 3] = [16, 32, 16];

/// Huber transition point between quadratic and linear loss.
const HUBER_DELTA: f64 = 1.0;

#[derive(Debug, Clone)]
struct Layer {
    /// Row-major: `weights[out][in]`.
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl Layer {
    fn new<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        // He-style uniform init, scaled to fan-in, for the ReLU stack.
        let limit = (6.0 / inputs as f64).sqrt();
        let weights = (0..outputs)
            .map(|_| (0..inputs).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();
        Self {
            weights,
            biases: vec![0.0; outputs],
        }
    }

    /// Pre-activation output `W·x + b`.
    fn affine(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias
            })
            .collect()
    }
}

/// The parameter set of one network copy.
#[derive(Debug, Clone)]
struct Mlp {
    layers: Vec<Layer>,
}

impl Mlp {
    fn new<R: Rng>(rng: &mut R) -> Self {
        let mut sizes = vec![STATE_SIZE];
        sizes.extend(HIDDEN);
        sizes.push(ACTION_COUNT);
        let layers = sizes
            .windows(2)
            .map(|pair| Layer::new(pair[0], pair[1], rng))
            .collect();
        Self { layers }
    }

    /// ReLU on hidden layers, linear output.
    fn predict(&self, input: &[f64]) -> Vec<f64> {
        let last = self.layers.len() - 1;
        let mut activation = input.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            let mut out = layer.affine(&activation);
            if i != last {
                for v in &mut out {
                    *v = v.max(0.0);
                }
            }
            activation = out;
        }
        activation
    }

    /// Forward pass keeping each layer's (post-activation) output.
    /// `trace[0]` is the input; `trace[i+1]` is the output of layer `i`.
    fn forward_trace(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let last = self.layers.len() - 1;
        let mut trace = Vec::with_capacity(self.layers.len() + 1);
        trace.push(input.to_vec());
        for (i, layer) in self.layers.iter().enumerate() {
            let mut out = layer.affine(trace.last().unwrap());
            if i != last {
                for v in &mut out {
                    *v = v.max(0.0);
                }
            }
            trace.push(out);
        }
        trace
    }
}

/// Per-parameter accumulators shaped like an [`Mlp`]. Used for both
/// gradients and Adam moments.
#[derive(Debug, Clone)]
struct Tensors {
    weights: Vec<Vec<Vec<f64>>>,
    biases: Vec<Vec<f64>>,
}

impl Tensors {
    fn zeros_like(net: &Mlp) -> Self {
        Self {
            weights: net
                .layers
                .iter()
                .map(|l| l.weights.iter().map(|row| vec![0.0; row.len()]).collect())
                .collect(),
            biases: net.layers.iter().map(|l| vec![0.0; l.biases.len()]).collect(),
        }
    }
}

/// Adam optimizer state over one [`Mlp`].
#[derive(Debug)]
struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step: u64,
    m: Tensors,
    v: Tensors,
}

impl Adam {
    fn new(learning_rate: f64, net: &Mlp) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            step: 0,
            m: Tensors::zeros_like(net),
            v: Tensors::zeros_like(net),
        }
    }

    fn apply(&mut self, net: &mut Mlp, grads: &Tensors) {
        self.step += 1;
        let bias1 = 1.0 - self.beta1.powi(self.step as i32);
        let bias2 = 1.0 - self.beta2.powi(self.step as i32);

        for (l, layer) in net.layers.iter_mut().enumerate() {
            for (o, row) in layer.weights.iter_mut().enumerate() {
                for (i, w) in row.iter_mut().enumerate() {
                    let g = grads.weights[l][o][i];
                    let m = &mut self.m.weights[l][o][i];
                    let v = &mut self.v.weights[l][o][i];
                    *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                    *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                    *w -= self.learning_rate * (*m / bias1)
                        / ((*v / bias2).sqrt() + self.epsilon);
                }
            }
            for (o, b) in layer.biases.iter_mut().enumerate() {
                let g = grads.biases[l][o];
                let m = &mut self.m.biases[l][o];
                let v = &mut self.v.biases[l][o];
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                *b -= self.learning_rate * (*m / bias1)
                    / ((*v / bias2).sqrt() + self.epsilon);
            }
        }
    }
}

/// Value function with online and frozen-target parameter sets.
pub struct QNetwork {
    online: Mlp,
    target: Arc<Mlp>,
    optimizer: Adam,
}

impl QNetwork {
    /// Fresh network; the target starts as a copy of the online
    /// parameters.
    pub fn new<R: Rng>(learning_rate: f64, rng: &mut R) -> Self {
        let online = Mlp::new(rng);
        let target = Arc::new(online.clone());
        let optimizer = Adam::new(learning_rate, &online);
        Self {
            online,
            target,
            optimizer,
        }
    }

    /// Per-action value estimates from the online parameters.
    pub fn evaluate(&self, features: &[f64]) -> Vec<f64> {
        self.online.predict(features)
    }

    /// Per-action value estimates from the frozen target snapshot.
    pub fn evaluate_target(&self, features: &[f64]) -> Vec<f64> {
        self.target.predict(features)
    }

    /// One gradient step pulling the chosen action's estimate toward
    /// `target_value`. Returns the Huber loss before the step.
    pub fn fit(&mut self, features: &[f64], action: usize, target_value: f64) -> f64 {
        let trace = self.online.forward_trace(features);
        let prediction = trace.last().unwrap()[action];
        let diff = prediction - target_value;
        let loss = huber(diff);

        // Only the chosen action's output carries error.
        let mut delta = vec![0.0; ACTION_COUNT];
        delta[action] = diff.clamp(-HUBER_DELTA, HUBER_DELTA);

        let mut grads = Tensors::zeros_like(&self.online);
        for l in (0..self.online.layers.len()).rev() {
            let input = &trace[l];
            let layer = &self.online.layers[l];
            let mut prev_delta = vec![0.0; input.len()];

            for (o, d) in delta.iter().enumerate() {
                if *d == 0.0 {
                    continue;
                }
                for (i, x) in input.iter().enumerate() {
                    grads.weights[l][o][i] = d * x;
                    prev_delta[i] += d * layer.weights[o][i];
                }
                grads.biases[l][o] = *d;
            }

            // Hidden activations are post-ReLU: zero output means the
            // unit was inactive and passes no gradient.
            if l > 0 {
                for (i, a) in input.iter().enumerate() {
                    if *a <= 0.0 {
                        prev_delta[i] = 0.0;
                    }
                }
            }
            delta = prev_delta;
        }

        self.optimizer.apply(&mut self.online, &grads);
        loss
    }

    /// Replace the target snapshot with the current online parameters.
    ///
    /// A single pointer assignment: concurrent evaluators see either the
    /// old snapshot or the new one, never a mix.
    pub fn sync_target(&mut self) {
        self.target = Arc::new(self.online.clone());
    }
}

fn huber(diff: f64) -> f64 {
    let abs = diff.abs();
    if abs <= HUBER_DELTA {
        0.5 * diff * diff
    } else {
        HUBER_DELTA * (abs - 0.5 * HUBER_DELTA)
    }
}
