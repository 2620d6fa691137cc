//! Numerical stability tests for the softmax, layer-norm and GELU paths.
//!
//! These tests verify that:
//! 1. Softmax stays finite and normalized for extreme and masked logits
//! 2. Layer norm produces unit statistics and can be inverted
//! 3. GELU stays within its documented distance from the exact GELU

use nanogpt_kernels::ops::activations::{gelu_exact, gelu_rational};
use nanogpt_kernels::ops::layer_norm::mean_var;
use nanogpt_kernels::ops::softmax::softmax_rows;
use nanogpt_kernels::{
    ExecutionMode, Gelu, LayerNorm, LayerNormConfig, LayerNormParams, LossGuard, Sampler, SamplingConfig,
    Softmax, SoftmaxConfig, StepAction, Tensor, WeightVector,
};

/// Generate deterministic test data.
fn generate_values(n: usize, seed: u64, scale: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(n);
    let mut state = seed;
    for _ in 0..n {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let val = ((state >> 32) as f32) / (u32::MAX as f32) * 2.0 - 1.0;
        data.push(val * scale);
    }
    data
}

// =============================================================================
// Softmax
// =============================================================================

#[test]
fn test_softmax_reference_row() {
    let x = Tensor::<f32>::from_f32(vec![1, 3], &[1.0, 2.0, 3.0]).unwrap();
    let y = Softmax::default().forward(&x).unwrap();
    let expected = [0.0900, 0.2447, 0.6652];
    for (i, (&got, &want)) in y.storage().iter().zip(expected.iter()).enumerate() {
        assert!((got - want).abs() < 1e-3, "softmax[{}] = {}, expected {}", i, got, want);
    }
}

#[test]
fn test_softmax_very_negative_row_is_uniform() {
    let x = Tensor::<f32>::from_f32(vec![3], &[-1000.0, -1000.0, -1000.0]).unwrap();
    let y = Softmax::default().forward(&x).unwrap();
    for &p in y.storage() {
        assert!((p - 1.0 / 3.0).abs() < 1e-5, "expected 1/3, got {}", p);
    }
}

#[test]
fn test_softmax_rows_sum_to_one_at_scale() {
    // 64 positions x 65 characters, logits up to +-500 (clamped to +-100).
    let (rows, cols) = (64, 65);
    let values = generate_values(rows * cols, 42, 500.0);
    let x = Tensor::<f32>::from_f32(vec![rows, cols], &values).unwrap();
    let y = Softmax::default().forward(&x).unwrap();
    for r in 0..rows {
        let row = y.row(r);
        assert!(row.iter().all(|p| p.is_finite() && *p >= 0.0), "row {} not finite", r);
        let sum: f32 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4, "row {} sums to {}", r, sum);
    }
}

#[test]
fn test_softmax_masked_row_kernel_is_finite() {
    // Raw kernel, no clamp: an all -inf row hits only the kernel guards.
    let input = [f32::NEG_INFINITY; 8];
    let mut out = [f32::NAN; 8];
    softmax_rows(
        &input,
        &mut out,
        2,
        4,
        4,
        4,
        &SoftmaxConfig::default(),
        ExecutionMode::Parallel,
    )
    .unwrap();
    assert!(out.iter().all(|p| p.is_finite()));
}

#[test]
fn test_softmax_half_precision() {
    let values = generate_values(4 * 33, 7, 8.0);
    let x = Tensor::<half::bf16>::from_f32(vec![4, 33], &values).unwrap();
    let y = Softmax::default().forward(&x).unwrap();
    for r in 0..4 {
        let sum: f32 = y.row(r).iter().map(|p| p.to_f32()).sum();
        assert!((sum - 1.0).abs() < 2e-2, "bf16 row {} sums to {}", r, sum);
    }
}

// =============================================================================
// Layer norm
// =============================================================================

#[test]
fn test_layer_norm_unit_statistics() {
    let (rows, dim) = (32, 384);
    let values = generate_values(rows * dim, 3, 10.0);
    let x = Tensor::<f32>::from_f32(vec![rows, dim], &values).unwrap();
    let ln = LayerNorm::new(vec![dim], LayerNormConfig::default(), ExecutionMode::Parallel).unwrap();
    let y = ln.forward(&x).unwrap();
    for r in 0..rows {
        let (mean, var) = mean_var(y.row(r));
        assert!(mean.abs() < 1e-3, "row {} mean {}", r, mean);
        assert!((var - 1.0).abs() < 1e-3, "row {} var {}", r, var);
    }
}

#[test]
fn test_layer_norm_inverse_recovers_input() {
    let dim = 384;
    let values = generate_values(2 * dim, 11, 3.0);
    let scale: Vec<f32> = generate_values(dim, 5, 1.0).iter().map(|v| 1.5 + v).collect();
    let bias = generate_values(dim, 6, 0.5);
    let params = LayerNormParams::new(WeightVector::new(scale.clone()), WeightVector::new(bias.clone())).unwrap();
    let config = LayerNormConfig { eps: 1e-12, block_size: None };
    let ln = LayerNorm::with_params(vec![dim], params, config, ExecutionMode::Sequential).unwrap();

    let x = Tensor::<f32>::from_f32(vec![2, dim], &values).unwrap();
    let y = ln.forward(&x).unwrap();
    for r in 0..2 {
        let row_in = x.row(r);
        let (mean, var) = mean_var(row_in);
        let std = var.sqrt();
        for (i, &yv) in y.row(r).iter().enumerate() {
            let recovered = (yv - bias[i]) / scale[i] * std + mean;
            assert!(
                (recovered - row_in[i]).abs() < 1e-3,
                "row {} col {}: recovered {} vs {}",
                r,
                i,
                recovered,
                row_in[i]
            );
        }
    }
}

#[test]
fn test_layer_norm_constant_row_returns_bias() {
    let bias = vec![0.25f32, -0.5, 1.0, 0.0];
    let params = LayerNormParams::new(WeightVector::ones(4), WeightVector::new(bias.clone())).unwrap();
    let ln = LayerNorm::with_params(vec![4], params, LayerNormConfig::default(), ExecutionMode::Sequential).unwrap();
    let x = Tensor::<f32>::from_f32(vec![4], &[2.0, 2.0, 2.0, 2.0]).unwrap();
    assert_eq!(ln.forward(&x).unwrap().storage(), bias.as_slice());
}

// =============================================================================
// GELU
// =============================================================================

#[test]
fn test_gelu_fixed_points() {
    let x = Tensor::<f32>::from_f32(vec![3], &[0.0, 100.0, -100.0]).unwrap();
    let y = Gelu::default().forward(&x).unwrap();
    let out = y.storage();
    assert_eq!(out[0], 0.0);
    assert!((out[1] - 100.0).abs() < 1e-2, "gelu(100) = {}", out[1]);
    assert!(out[2].abs() < 1e-2, "gelu(-100) = {}", out[2]);
}

#[test]
fn test_gelu_deviation_bound_on_grid() {
    let n = 10_001;
    let xs: Vec<f32> = (0..n).map(|i| -5.0 + 10.0 * i as f32 / (n - 1) as f32).collect();
    let x = Tensor::<f32>::from_f32(vec![n], &xs).unwrap();
    let y = Gelu::default().forward(&x).unwrap();
    let max_dev = xs
        .iter()
        .zip(y.storage())
        .map(|(&a, &b)| (b - gelu_exact(a)).abs())
        .fold(0.0f32, f32::max);
    assert!(max_dev < 0.35, "max deviation {}", max_dev);
    for (&a, &b) in xs.iter().zip(y.storage()) {
        assert_eq!(b, gelu_rational(a));
    }
}

// =============================================================================
// Sampling and training guards
// =============================================================================

#[test]
fn test_sampler_survives_nan_logits() {
    let mut sampler = Sampler::new(SamplingConfig {
        seed: Some(2024),
        ..SamplingConfig::default()
    });
    let mut logits = generate_values(65, 9, 4.0);
    logits[10] = f32::NAN;
    for _ in 0..100 {
        let token = sampler.sample(&logits).unwrap();
        assert!(token < 65);
    }
}

#[test]
fn test_loss_guard_skips_nan_steps() {
    let mut guard = LossGuard::new();
    let losses = [4.17, 3.9, f32::NAN, 3.5];
    let applied: Vec<StepAction> = losses.iter().map(|&l| guard.check(l)).collect();
    assert_eq!(applied[2], StepAction::Skip);
    assert_eq!(guard.skipped(), 1);
}
