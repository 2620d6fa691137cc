pub mod activations;
pub mod layer_norm;
pub mod sampling;
pub mod softmax;

pub use activations::{gelu_exact, gelu_rational, gelu_tiled, GeluKernel};
pub use layer_norm::{layer_norm_rows, mean_var, LayerNormKernel};
pub use sampling::{Sampler, SamplingConfig};
pub use softmax::{renormalize_rows, softmax_rows, SoftmaxKernel};
