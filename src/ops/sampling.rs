//! Next-token sampling on top of the softmax kernel.
//!
//! The generation loop turns the last position's logits into a probability
//! vector with the same guards as the softmax wrapper (clamp, kernel epsilon,
//! `+1e-8` renormalization). If the vector is still not finite, it is replaced
//! by a uniform distribution instead of propagating NaN into the draw.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{KernelError, KernelResult};
use crate::kernel_types::{ExecutionMode, KernelFloat, SoftmaxConfig};
use crate::ops::softmax::{renormalize_rows, softmax_rows};

/// Configuration for sampling operations.
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Temperature for logit scaling (1.0 = original distribution, <= 0.0 = greedy).
    pub temperature: f32,
    /// Random seed for reproducibility (None = use system entropy).
    pub seed: Option<u64>,
    /// Softmax guards applied to the logits.
    pub softmax: SoftmaxConfig,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            seed: None,
            softmax: SoftmaxConfig::default(),
        }
    }
}

impl SamplingConfig {
    /// Create a greedy sampling config (temperature=0, no randomness).
    pub fn greedy() -> Self {
        Self {
            temperature: 0.0,
            ..Default::default()
        }
    }

    /// Non-positive temperature selects the most likely token.
    #[inline]
    pub fn is_greedy(&self) -> bool {
        self.temperature <= 0.0
    }

    /// Create a config with specific temperature.
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature,
            ..Default::default()
        }
    }
}

/// Apply temperature scaling to logits in-place.
///
/// Non-positive and unit temperatures leave the logits unchanged; greedy
/// decoding for `temperature <= 0` happens in [`Sampler::sample`].
#[inline]
pub fn apply_temperature(logits: &mut [f32], temperature: f32) {
    if temperature <= 0.0 || (temperature - 1.0).abs() < f32::EPSILON {
        return;
    }
    let inv_temp = 1.0 / temperature;
    for v in logits.iter_mut() {
        *v *= inv_temp;
    }
}

/// Replace a non-finite probability vector with the uniform distribution.
///
/// Returns `true` if the fallback was applied.
pub fn uniform_if_degenerate(probs: &mut [f32]) -> bool {
    if probs.is_empty() || probs.iter().all(|p| p.is_finite()) {
        return false;
    }
    let u = 1.0 / probs.len() as f32;
    probs.iter_mut().for_each(|p| *p = u);
    true
}

/// Stabilized next-token distribution for one row of logits.
pub fn next_token_probs<T: KernelFloat>(
    logits: &[T],
    config: &SamplingConfig,
) -> KernelResult<Vec<f32>> {
    if logits.is_empty() {
        return Err(KernelError::ShapeMismatch("cannot sample from empty logits".into()));
    }
    if config.temperature.is_nan() {
        return Err(KernelError::InvalidConfig("sampling temperature is NaN".into()));
    }
    let sm = &config.softmax;
    sm.validate().map_err(KernelError::InvalidConfig)?;
    let mut scaled: Vec<f32> = logits
        .iter()
        .map(|v| v.to_f32().clamp(sm.clamp_min, sm.clamp_max))
        .collect();
    apply_temperature(&mut scaled, config.temperature);

    let n = scaled.len();
    let mut probs = vec![0.0f32; n];
    softmax_rows(&scaled, &mut probs, 1, n, n, n, sm, ExecutionMode::Sequential)?;
    renormalize_rows(&mut probs, 1, n, n, sm.renorm_eps)?;

    if uniform_if_degenerate(&mut probs) {
        log::warn!("non-finite probabilities over {} tokens, sampling uniformly", n);
    }
    Ok(probs)
}

/// Draw one index from `probs` (multinomial, one sample).
pub fn sample_from_probs<R: Rng + ?Sized>(probs: &[f32], rng: &mut R) -> KernelResult<usize> {
    if probs.is_empty() {
        return Err(KernelError::ShapeMismatch("cannot sample from empty distribution".into()));
    }
    match WeightedIndex::new(probs) {
        Ok(dist) => Ok(dist.sample(rng)),
        Err(err) => {
            log::warn!("invalid sampling weights ({err}), sampling uniformly");
            Ok(rng.gen_range(0..probs.len()))
        }
    }
}

/// Index of the largest probability (first one on ties).
pub fn argmax(probs: &[f32]) -> Option<usize> {
    probs
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((i, p)),
        })
        .map(|(i, _)| i)
}

/// Seeded sampler for the autoregressive loop.
#[derive(Debug)]
pub struct Sampler {
    config: SamplingConfig,
    rng: StdRng,
}

impl Sampler {
    pub fn new(config: SamplingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Sample the next token id from one row of logits.
    ///
    /// Greedy configs return the most likely token without touching the rng.
    pub fn sample<T: KernelFloat>(&mut self, logits: &[T]) -> KernelResult<usize> {
        let probs = next_token_probs(logits, &self.config)?;
        if self.config.is_greedy() {
            return argmax(&probs)
                .ok_or_else(|| KernelError::ShapeMismatch("cannot sample from empty logits".into()));
        }
        sample_from_probs(&probs, &mut self.rng)
    }
}
