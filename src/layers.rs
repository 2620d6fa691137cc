//! Host-side wrappers: tensor in, fresh tensor of the same shape out.
//!
//! Each wrapper derives the `[rows, n_cols]` view (or the flat length for
//! GELU), picks the block size, launches the kernel and restores the shape.
//!
//! ```ignore
//! let ln = LayerNorm::new(vec![384], LayerNormConfig::default(), ExecutionMode::Parallel)?;
//! let h = ln.forward(&x)?;
//! let h = Gelu::default().forward(&h)?;
//! let p = Softmax::default().forward(&scores)?;
//! ```

use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::kernel_types::{ExecutionMode, GeluConfig, KernelFloat, LayerNormConfig, SoftmaxConfig};
use crate::ops::activations::gelu_tiled;
use crate::ops::layer_norm::layer_norm_rows;
use crate::ops::softmax::{renormalize_rows, softmax_rows};
use crate::tensor::Tensor;
use crate::validation::{compute_numel, validate_trailing_dims};
use crate::weights::{LayerNormParams, SharedParams};

/// Row softmax over the last dimension with clamp and renormalization.
#[derive(Clone, Copy, Debug, Default)]
pub struct Softmax {
    config: SoftmaxConfig,
    mode: ExecutionMode,
}

impl Softmax {
    pub fn new(config: SoftmaxConfig, mode: ExecutionMode) -> KernelResult<Self> {
        config.validate().map_err(KernelError::InvalidConfig)?;
        Ok(Self { config, mode })
    }

    pub fn from_config(config: &KernelConfig) -> KernelResult<Self> {
        Self::new(config.softmax, config.execution)
    }

    pub fn config(&self) -> &SoftmaxConfig {
        &self.config
    }

    /// Probabilities along the last dimension; every row sums to 1.
    pub fn forward<T: KernelFloat>(&self, x: &Tensor<T>) -> KernelResult<Tensor<T>> {
        let (rows, cols) = (x.rows(), x.cols());
        log::trace!("softmax forward: shape={:?} rows={} cols={}", x.shape(), rows, cols);

        let (lo, hi) = (self.config.clamp_min, self.config.clamp_max);
        let clamped = x.map_f32(|v| v.clamp(lo, hi));

        let mut out = vec![T::zero(); rows * cols];
        softmax_rows(
            clamped.storage(),
            &mut out,
            rows,
            cols,
            clamped.row_stride(),
            cols,
            &self.config,
            self.mode,
        )?;
        renormalize_rows(&mut out, rows, cols, cols, self.config.renorm_eps)?;
        Tensor::from_vec(x.shape().to_vec(), out)
    }
}

/// Layer norm over the trailing `normalized_shape` dimensions.
///
/// Owns its scale and bias through a [`SharedParams`] handle; clones of the
/// handle observe optimizer updates made through [`LayerNorm::update_params`].
#[derive(Clone, Debug)]
pub struct LayerNorm {
    normalized_shape: Vec<usize>,
    n_cols: usize,
    config: LayerNormConfig,
    mode: ExecutionMode,
    params: SharedParams,
}

impl LayerNorm {
    /// Layer norm with identity parameters (scale 1, bias 0).
    pub fn new(normalized_shape: Vec<usize>, config: LayerNormConfig, mode: ExecutionMode) -> KernelResult<Self> {
        let n = compute_numel(&normalized_shape).map_err(KernelError::ShapeMismatch)?;
        Self::with_params(normalized_shape, LayerNormParams::identity(n), config, mode)
    }

    pub fn with_params(
        normalized_shape: Vec<usize>,
        params: LayerNormParams,
        config: LayerNormConfig,
        mode: ExecutionMode,
    ) -> KernelResult<Self> {
        if normalized_shape.is_empty() {
            return Err(KernelError::ShapeMismatch("normalized_shape cannot be empty".into()));
        }
        let n_cols = compute_numel(&normalized_shape).map_err(KernelError::ShapeMismatch)?;
        if params.len() != n_cols {
            return Err(KernelError::ShapeMismatch(format!(
                "params len {} != normalized size {} ({:?})",
                params.len(),
                n_cols,
                normalized_shape
            )));
        }
        config.validate().map_err(KernelError::InvalidConfig)?;
        Ok(Self {
            normalized_shape,
            n_cols,
            config,
            mode,
            params: SharedParams::new(params),
        })
    }

    pub fn from_config(normalized_shape: Vec<usize>, config: &KernelConfig) -> KernelResult<Self> {
        Self::new(normalized_shape, config.layer_norm, config.execution)
    }

    pub fn normalized_shape(&self) -> &[usize] {
        &self.normalized_shape
    }

    pub fn config(&self) -> &LayerNormConfig {
        &self.config
    }

    /// Shared handle to scale and bias.
    pub fn params(&self) -> &SharedParams {
        &self.params
    }

    /// Optimizer step: `f(scale, bias)` runs under the write lock.
    pub fn update_params<F>(&self, f: F) -> KernelResult<()>
    where
        F: FnOnce(&mut [f32], &mut [f32]),
    {
        let mut guard = self.params.write()?;
        let LayerNormParams { scale, bias } = &mut *guard;
        f(scale.as_mut_slice(), bias.as_mut_slice());
        Ok(())
    }

    pub fn forward<T: KernelFloat>(&self, x: &Tensor<T>) -> KernelResult<Tensor<T>> {
        validate_trailing_dims(x.shape(), &self.normalized_shape).map_err(KernelError::ShapeMismatch)?;
        let lead = x.ndim() - self.normalized_shape.len();
        let rows: usize = x.shape()[..lead].iter().product();
        let n = self.n_cols;
        log::trace!("layer_norm forward: shape={:?} rows={} n={}", x.shape(), rows, n);

        // Multi-dim rows span several padded tensor rows; flatten them first.
        let flattened;
        let (src, stride) = if self.normalized_shape.len() == 1 {
            (x, x.row_stride())
        } else {
            flattened = x.contiguous();
            (&flattened, n)
        };

        let mut out = vec![T::zero(); rows * n];
        {
            let params = self.params.read()?;
            layer_norm_rows(
                src.storage(),
                params.scale.as_slice(),
                params.bias.as_slice(),
                &mut out,
                rows,
                n,
                stride,
                n,
                &self.config,
                self.mode,
            )?;
        }
        Tensor::from_vec(x.shape().to_vec(), out)
    }
}

/// Elementwise GELU (rational tanh surrogate) over any shape.
#[derive(Clone, Copy, Debug, Default)]
pub struct Gelu {
    config: GeluConfig,
    mode: ExecutionMode,
}

impl Gelu {
    pub fn new(config: GeluConfig, mode: ExecutionMode) -> Self {
        Self { config, mode }
    }

    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(config.gelu, config.execution)
    }

    pub fn forward<T: KernelFloat>(&self, x: &Tensor<T>) -> KernelResult<Tensor<T>> {
        let src = x.contiguous();
        log::trace!("gelu forward: shape={:?} n={}", x.shape(), src.numel());
        let mut out = vec![T::zero(); src.numel()];
        gelu_tiled(src.storage(), &mut out, self.config.block_size, self.mode)?;
        Tensor::from_vec(x.shape().to_vec(), out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::activations::gelu_rational;
    use crate::ops::layer_norm::mean_var;

    #[test]
    fn test_softmax_forward_preserves_shape() {
        let values: Vec<f32> = (0..24).map(|i| (i as f32 * 0.37).sin() * 4.0).collect();
        let x = Tensor::<f32>::from_f32(vec![2, 3, 4], &values).unwrap();
        let y = Softmax::default().forward(&x).unwrap();
        assert_eq!(y.shape(), &[2, 3, 4]);
        for r in 0..y.rows() {
            let sum: f32 = y.row(r).iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_softmax_forward_clamps_extreme_logits() {
        let x = Tensor::<f32>::from_f32(vec![3], &[-1000.0, -1000.0, -1000.0]).unwrap();
        let y = Softmax::default().forward(&x).unwrap();
        for &p in y.storage() {
            assert!((p - 1.0 / 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_softmax_forward_all_neg_inf_is_uniform() {
        let x = Tensor::<f32>::from_f32(vec![1, 4], &[f32::NEG_INFINITY; 4]).unwrap();
        let y = Softmax::default().forward(&x).unwrap();
        assert!(y.storage().iter().all(|&p| (p - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_softmax_forward_strided_input() {
        let x = Tensor::with_row_stride(vec![2, 3], vec![1.0f32, 2.0, 3.0, 50.0, 3.0, 2.0, 1.0], 4).unwrap();
        let y = Softmax::default().forward(&x).unwrap();
        assert!(y.is_contiguous());
        assert!((y.row(0)[2] - 0.6652).abs() < 1e-3);
        assert!((y.row(1)[0] - 0.6652).abs() < 1e-3);
    }

    #[test]
    fn test_softmax_rejects_inverted_clamp() {
        let cfg = SoftmaxConfig {
            clamp_min: 1.0,
            clamp_max: -1.0,
            ..SoftmaxConfig::default()
        };
        assert!(Softmax::new(cfg, ExecutionMode::Sequential).is_err());
    }

    #[test]
    fn test_softmax_rejects_bad_eps() {
        for renorm_eps in [f32::NAN, -1e-8, 0.0] {
            let cfg = SoftmaxConfig {
                renorm_eps,
                ..SoftmaxConfig::default()
            };
            assert!(matches!(Softmax::new(cfg, ExecutionMode::Sequential), Err(KernelError::InvalidConfig(_))));
        }
        let cfg = SoftmaxConfig {
            kernel_eps: f32::INFINITY,
            ..SoftmaxConfig::default()
        };
        assert!(Softmax::new(cfg, ExecutionMode::Sequential).is_err());
    }

    #[test]
    fn test_layer_norm_forward_normalizes_rows() {
        let values: Vec<f32> = (0..4 * 384).map(|i| ((i * 7919) % 1000) as f32 / 100.0).collect();
        let x = Tensor::<f32>::from_f32(vec![4, 384], &values).unwrap();
        let ln = LayerNorm::new(vec![384], LayerNormConfig::default(), ExecutionMode::Parallel).unwrap();
        let y = ln.forward(&x).unwrap();
        assert_eq!(y.shape(), &[4, 384]);
        for r in 0..4 {
            let (m, v) = mean_var(y.row(r));
            assert!(m.abs() < 1e-3, "row {r} mean {m}");
            assert!((v - 1.0).abs() < 1e-3, "row {r} var {v}");
        }
    }

    #[test]
    fn test_layer_norm_forward_rejects_wrong_trailing_dims() {
        let ln = LayerNorm::new(vec![8], LayerNormConfig::default(), ExecutionMode::Sequential).unwrap();
        let x = Tensor::<f32>::zeros(vec![2, 4]).unwrap();
        assert!(matches!(ln.forward(&x), Err(KernelError::ShapeMismatch(_))));
    }

    #[test]
    fn test_layer_norm_multi_dim_normalized_shape() {
        let values: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let x = Tensor::<f32>::from_f32(vec![2, 2, 3], &values).unwrap();
        let ln = LayerNorm::new(vec![2, 3], LayerNormConfig::default(), ExecutionMode::Sequential).unwrap();
        let y = ln.forward(&x).unwrap();
        let flat = y.to_f32_vec();
        for half in flat.chunks(6) {
            let (m, v) = mean_var(half);
            assert!(m.abs() < 1e-5);
            assert!((v - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_layer_norm_update_params_visible_to_forward() {
        let ln = LayerNorm::new(vec![4], LayerNormConfig::default(), ExecutionMode::Sequential).unwrap();
        ln.update_params(|_scale, bias| bias.iter_mut().for_each(|b| *b = 0.5)).unwrap();
        let x = Tensor::<f32>::from_f32(vec![1, 4], &[2.0; 4]).unwrap();
        let y = ln.forward(&x).unwrap();
        assert_eq!(y.storage(), &[0.5; 4]);
        assert_eq!(ln.params().snapshot().unwrap().bias.as_slice(), &[0.5; 4]);
    }

    #[test]
    fn test_layer_norm_forward_strided_input() {
        // Two rows of 4 in a stride of 6; the padding must not leak into the stats.
        let data = vec![1.0f32, 2.0, 3.0, 4.0, 999.0, -999.0, -2.0, 0.0, 2.0, 4.0];
        let x = Tensor::with_row_stride(vec![2, 4], data, 6).unwrap();
        let ln = LayerNorm::new(vec![4], LayerNormConfig::default(), ExecutionMode::Sequential).unwrap();
        let y = ln.forward(&x).unwrap();
        assert!(y.is_contiguous());
        assert_eq!(y.shape(), &[2, 4]);
        for r in 0..2 {
            let (m, v) = mean_var(y.row(r));
            assert!(m.abs() < 1e-5, "row {r} mean {m}");
            assert!((v - 1.0).abs() < 1e-3, "row {r} var {v}");
        }
        // Both rows are evenly spaced, so they normalize to the same values.
        for (a, b) in y.row(0).iter().zip(y.row(1)) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_layer_norm_rejects_zero_eps() {
        let cfg = LayerNormConfig {
            eps: 0.0,
            ..LayerNormConfig::default()
        };
        assert!(matches!(
            LayerNorm::new(vec![4], cfg, ExecutionMode::Sequential),
            Err(KernelError::InvalidConfig(_))
        ));
        let cfg = LayerNormConfig {
            eps: f32::NAN,
            ..LayerNormConfig::default()
        };
        assert!(LayerNorm::new(vec![4], cfg, ExecutionMode::Sequential).is_err());
    }

    #[test]
    fn test_layer_norm_params_len_checked() {
        let params = LayerNormParams::identity(3);
        assert!(LayerNorm::with_params(vec![4], params, LayerNormConfig::default(), ExecutionMode::Sequential).is_err());
    }

    #[test]
    fn test_layer_norm_concurrent_forwards_and_update() {
        let ln = LayerNorm::new(vec![16], LayerNormConfig::default(), ExecutionMode::Parallel).unwrap();
        let values: Vec<f32> = (0..64).map(|i| i as f32).collect();
        let x = Tensor::<f32>::from_f32(vec![4, 16], &values).unwrap();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let y = ln.forward(&x).unwrap();
                    assert!(y.storage().iter().all(|v| v.is_finite()));
                });
            }
            s.spawn(|| ln.update_params(|scale, _| scale.iter_mut().for_each(|w| *w = 2.0)).unwrap());
        });
        let (_, v) = mean_var(ln.forward(&x).unwrap().row(0));
        assert!((v - 4.0).abs() < 1e-2);
    }

    #[test]
    fn test_gelu_forward_any_shape() {
        let values: Vec<f32> = (0..30).map(|i| i as f32 / 3.0 - 5.0).collect();
        let x = Tensor::<f32>::from_f32(vec![2, 5, 3], &values).unwrap();
        let gelu = Gelu::new(GeluConfig { block_size: 8 }, ExecutionMode::Parallel);
        let y = gelu.forward(&x).unwrap();
        assert_eq!(y.shape(), &[2, 5, 3]);
        for (&a, &b) in values.iter().zip(y.storage()) {
            assert_eq!(b, gelu_rational(a));
        }
    }

    #[test]
    fn test_gelu_forward_strided_input() {
        let x = Tensor::with_row_stride(vec![2, 2], vec![0.0f32, 1.0, 9.0, -1.0, 2.0], 3).unwrap();
        let y = Gelu::default().forward(&x).unwrap();
        assert_eq!(y.storage().len(), 4);
        assert_eq!(y.storage()[0], 0.0);
        assert_eq!(y.storage()[3], gelu_rational(2.0));
    }
}
