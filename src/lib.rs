//! nanogpt-kernels: fused softmax, layer-norm and GELU kernels for a
//! character-level GPT.
//!
//! The crate provides:
//! - **Launch model**: a 1-D grid of independent programs over masked lane blocks
//! - **Row kernels**: numerically stabilized softmax and layer norm, one program per row
//! - **Elementwise kernel**: tiled GELU with a rational tanh surrogate
//! - **Host wrappers**: tensor in, same-shape tensor out
//!
//! # Quick Start
//!
//! ```ignore
//! use nanogpt_kernels::{KernelConfig, LayerNorm, Gelu, Softmax, Tensor};
//!
//! let config = KernelConfig::from_env();
//! let ln = LayerNorm::from_config(vec![384], &config)?;
//! let h = Gelu::from_config(&config).forward(&ln.forward(&x)?)?;
//! let probs = Softmax::from_config(&config)?.forward(&logits)?;
//! ```

pub mod config;
pub mod error;
pub mod kernel_types;
pub mod launch;
pub mod layers;
pub mod ops;
pub mod tensor;
pub mod training;
pub mod validation;
pub mod weights;

pub use config::{KernelConfig, EXECUTION_ENV};
pub use error::{KernelError, KernelResult};
pub use kernel_types::{
    ExecutionMode, FloatType, GeluConfig, KernelFloat, KernelId, LayerNormConfig, SoftmaxConfig,
};
pub use launch::{launch, next_power_of_two, Kernel, LaneMask, Lanes, LaunchConfig, ProgramContext};
pub use layers::{Gelu, LayerNorm, Softmax};
pub use ops::sampling::{next_token_probs, sample_from_probs, Sampler, SamplingConfig};
pub use tensor::Tensor;
pub use training::{LossGuard, StepAction};
pub use weights::{LayerNormParams, SharedParams, WeightVector};
