//! Kernel-related types shared by the launch model, the ops and the layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Softmax input clamp: logits are limited to `[-SOFTMAX_CLAMP, SOFTMAX_CLAMP]` before launch.
pub const SOFTMAX_CLAMP: f32 = 100.0;

/// Epsilon added to the exp-sum inside the softmax kernel.
pub const SOFTMAX_KERNEL_EPS: f32 = 1e-6;

/// Epsilon added to every probability before the host-side renormalization.
pub const SOFTMAX_RENORM_EPS: f32 = 1e-8;

/// Default layer-norm epsilon.
pub const LAYER_NORM_EPS: f32 = 1e-5;

/// Default GELU tile size (lanes per program).
pub const GELU_BLOCK_SIZE: usize = 1024;

/// Float type identifier for const-time kernel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatType {
    F32,
    F16,
    BF16,
}

impl FloatType {
    /// Size of one element in bytes.
    #[inline(always)]
    pub const fn size_bytes(self) -> usize {
        match self {
            FloatType::F32 => 4,
            FloatType::F16 | FloatType::BF16 => 2,
        }
    }
}

/// Trait for kernel-compatible floating point types.
/// Implemented for f32, half::f16, and half::bf16. Lanes always compute in f32.
pub trait KernelFloat: Copy + Default + Send + Sync + fmt::Debug + 'static {
    /// Compile-time type identifier.
    const TYPE_ID: FloatType;

    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
    fn zero() -> Self;
    fn one() -> Self;
}

impl KernelFloat for f32 {
    const TYPE_ID: FloatType = FloatType::F32;

    #[inline(always)]
    fn to_f32(self) -> f32 { self }
    #[inline(always)]
    fn from_f32(v: f32) -> Self { v }
    #[inline(always)]
    fn zero() -> Self { 0.0 }
    #[inline(always)]
    fn one() -> Self { 1.0 }
}

impl KernelFloat for half::f16 {
    const TYPE_ID: FloatType = FloatType::F16;

    #[inline(always)]
    fn to_f32(self) -> f32 { half::f16::to_f32(self) }
    #[inline(always)]
    fn from_f32(v: f32) -> Self { half::f16::from_f32(v) }
    #[inline(always)]
    fn zero() -> Self { half::f16::ZERO }
    #[inline(always)]
    fn one() -> Self { half::f16::ONE }
}

impl KernelFloat for half::bf16 {
    const TYPE_ID: FloatType = FloatType::BF16;

    #[inline(always)]
    fn to_f32(self) -> f32 { half::bf16::to_f32(self) }
    #[inline(always)]
    fn from_f32(v: f32) -> Self { half::bf16::from_f32(v) }
    #[inline(always)]
    fn zero() -> Self { half::bf16::ZERO }
    #[inline(always)]
    fn one() -> Self { half::bf16::ONE }
}

/// Identity of a launchable kernel, used in launch logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelId {
    Softmax,
    LayerNorm,
    Gelu,
}

impl KernelId {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Softmax => "softmax",
            Self::LayerNorm => "layer_norm",
            Self::Gelu => "gelu",
        }
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the programs of one launch are scheduled on the host.
///
/// Programs never communicate, so both modes produce identical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Programs run one after another on the calling thread.
    Sequential,
    /// Programs are spread over the rayon pool.
    #[default]
    Parallel,
}

impl ExecutionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sequential" | "seq" | "serial" => Some(Self::Sequential),
            "parallel" | "par" | "rayon" => Some(Self::Parallel),
            _ => None,
        }
    }
}

/// Configuration for the row-softmax kernel and its host wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftmaxConfig {
    /// Lower clamp applied to logits before launch.
    pub clamp_min: f32,
    /// Upper clamp applied to logits before launch.
    pub clamp_max: f32,
    /// Epsilon added to the exp-sum inside the kernel.
    pub kernel_eps: f32,
    /// Epsilon added before the host-side renormalization.
    pub renorm_eps: f32,
    /// Lanes per program; `None` picks the next power of two of the row length.
    pub block_size: Option<usize>,
}

impl Default for SoftmaxConfig {
    fn default() -> Self {
        Self {
            clamp_min: -SOFTMAX_CLAMP,
            clamp_max: SOFTMAX_CLAMP,
            kernel_eps: SOFTMAX_KERNEL_EPS,
            renorm_eps: SOFTMAX_RENORM_EPS,
            block_size: None,
        }
    }
}

impl SoftmaxConfig {
    /// Clamp range ordered and finite; both epsilons finite and positive.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.clamp_min.is_finite() && self.clamp_max.is_finite()) || self.clamp_min > self.clamp_max {
            return Err(format!(
                "softmax clamp range [{}, {}] is invalid",
                self.clamp_min, self.clamp_max
            ));
        }
        validate_eps("softmax.kernel_eps", self.kernel_eps)?;
        validate_eps("softmax.renorm_eps", self.renorm_eps)
    }
}

/// Configuration for the row layer-norm kernel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerNormConfig {
    /// Added to the variance before the reciprocal square root.
    pub eps: f32,
    /// Lanes per program; `None` picks the next power of two of the row length.
    pub block_size: Option<usize>,
}

impl Default for LayerNormConfig {
    fn default() -> Self {
        Self {
            eps: LAYER_NORM_EPS,
            block_size: None,
        }
    }
}

impl LayerNormConfig {
    /// `eps` must be finite and positive: a constant row has zero variance.
    pub fn validate(&self) -> Result<(), String> {
        validate_eps("layer_norm.eps", self.eps)
    }
}

/// Stabilization epsilons must be finite and `> 0`.
pub fn validate_eps(name: &str, eps: f32) -> Result<(), String> {
    if eps.is_finite() && eps > 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be finite and > 0, got {eps}"))
    }
}

/// Configuration for the tiled GELU kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeluConfig {
    /// Elements per program (tile size).
    pub block_size: usize,
}

impl Default for GeluConfig {
    fn default() -> Self {
        Self {
            block_size: GELU_BLOCK_SIZE,
        }
    }
}
