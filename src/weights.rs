//! Learnable parameter containers for the layer-norm wrapper.
//!
//! Parameters are thin wrappers around `Vec<f32>`. The layer-norm scale and bias
//! live behind [`SharedParams`]: forward passes take read guards and may overlap,
//! the optimizer step takes the single write guard between training steps.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{KernelError, KernelResult};

/// A 1D weight vector (layer-norm scale or bias).
#[derive(Clone, Debug, PartialEq)]
pub struct WeightVector {
    /// Raw weight data
    pub data: Vec<f32>,
}

impl WeightVector {
    /// Create a new weight vector.
    #[inline(always)]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Create a zero-initialized weight vector (bias).
    #[inline(always)]
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    /// Create a ones-initialized weight vector (scale).
    #[inline(always)]
    pub fn ones(len: usize) -> Self {
        Self {
            data: vec![1.0; len],
        }
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Per-column affine parameters of one layer norm.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerNormParams {
    pub scale: WeightVector,
    pub bias: WeightVector,
}

impl LayerNormParams {
    /// Identity transform: scale 1, bias 0.
    pub fn identity(len: usize) -> Self {
        Self {
            scale: WeightVector::ones(len),
            bias: WeightVector::zeros(len),
        }
    }

    pub fn new(scale: WeightVector, bias: WeightVector) -> KernelResult<Self> {
        if scale.len() != bias.len() {
            return Err(KernelError::ShapeMismatch(format!(
                "scale len {} != bias len {}",
                scale.len(),
                bias.len()
            )));
        }
        Ok(Self { scale, bias })
    }

    pub fn len(&self) -> usize {
        self.scale.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scale.is_empty()
    }
}

/// Reference-counted parameter handle with a single-writer/multi-reader discipline.
#[derive(Clone, Debug)]
pub struct SharedParams {
    inner: Arc<RwLock<LayerNormParams>>,
}

impl SharedParams {
    pub fn new(params: LayerNormParams) -> Self {
        Self {
            inner: Arc::new(RwLock::new(params)),
        }
    }

    /// Read guard held for the duration of a launch.
    pub fn read(&self) -> KernelResult<RwLockReadGuard<'_, LayerNormParams>> {
        self.inner
            .read()
            .map_err(|_| KernelError::ParamsPoisoned("layer_norm params (read)"))
    }

    /// Write guard for the optimizer step; blocks until no launch holds a read guard.
    pub fn write(&self) -> KernelResult<RwLockWriteGuard<'_, LayerNormParams>> {
        self.inner
            .write()
            .map_err(|_| KernelError::ParamsPoisoned("layer_norm params (write)"))
    }

    /// Owned copy of the current values (checkpointing, inspection).
    pub fn snapshot(&self) -> KernelResult<LayerNormParams> {
        Ok(self.read()?.clone())
    }

    /// Number of handles sharing this storage.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}
