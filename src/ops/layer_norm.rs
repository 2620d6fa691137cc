//! Row layer-normalization kernel.
//!
//! # Formula
//!
//! ```text
//! mean = sum(x) / N
//! var  = sum((x - mean)^2) / N
//! y    = (x - mean) / sqrt(var + eps) * scale + bias
//! ```
//!
//! # Design
//!
//! - One program per row; the whole row must fit in one block (`block_size >= N`)
//! - Masked lanes load 0 and are re-zeroed after centering, so padding lanes
//!   contribute nothing to either reduction
//! - `scale`/`bias` are borrowed read-only for the whole launch

use crate::error::KernelResult;
use crate::kernel_types::{validate_eps, ExecutionMode, KernelFloat, KernelId, LayerNormConfig};
use crate::launch::{launch, next_power_of_two, Kernel, Lanes, LaunchConfig, ProgramContext};
use crate::validation::{validate_block_covers_row, validate_input_len, validate_row_buffer};

/// Row layer-norm kernel arguments.
#[derive(Clone, Copy, Debug)]
pub struct LayerNormKernel<'a, T> {
    pub input: &'a [T],
    pub scale: &'a [f32],
    pub bias: &'a [f32],
    pub input_row_stride: usize,
    pub output_row_stride: usize,
    pub n_rows: usize,
    pub n_cols: usize,
    pub eps: f32,
}

impl<T: KernelFloat> Kernel<T> for LayerNormKernel<'_, T> {
    const ID: KernelId = KernelId::LayerNorm;

    fn work_size(&self) -> usize {
        self.n_rows
    }

    fn program_span(&self, _block_size: usize) -> usize {
        self.output_row_stride
    }

    fn validate(&self, block_size: usize, output_len: usize) -> Result<(), String> {
        validate_block_covers_row(block_size, self.n_cols)?;
        validate_input_len(self.scale.len(), self.n_cols, "scale")?;
        validate_input_len(self.bias.len(), self.n_cols, "bias")?;
        if self.output_row_stride < self.n_cols {
            return Err(format!(
                "output row_stride {} < n_cols {}",
                self.output_row_stride, self.n_cols
            ));
        }
        validate_eps("eps", self.eps)?;
        validate_row_buffer(
            self.input.len(),
            self.n_rows,
            self.n_cols,
            self.input_row_stride,
            "input",
        )?;
        validate_row_buffer(
            output_len,
            self.n_rows,
            self.n_cols,
            self.output_row_stride,
            "output",
        )
    }

    fn program(&self, ctx: ProgramContext, output: &mut [T]) {
        let mask = ctx.mask(self.n_cols);
        let n = self.n_cols as f32;

        let x = Lanes::load(self.input, ctx.program_id * self.input_row_stride, mask, 0.0);
        let mean = x.reduce_sum() / n;

        let centered = x.map(|v| v - mean).select(mask, 0.0);
        let var = centered.map(|c| c * c).reduce_sum() / n;
        let rstd = 1.0 / (var + self.eps).sqrt();

        let w = Lanes::load(self.scale, 0, mask, 1.0);
        let b = Lanes::load(self.bias, 0, mask, 0.0);

        let y = centered
            .zip_map(&w, |c, w| c * rstd * w)
            .zip_map(&b, |v, b| v + b);
        y.store(output, 0, mask);
    }
}

/// Launch the layer-norm kernel over a strided `[n_rows, n_cols]` buffer.
///
/// The block size defaults to `next_power_of_two(n_cols)`; an explicit block
/// smaller than `n_cols` is rejected before launch.
#[allow(clippy::too_many_arguments)]
pub fn layer_norm_rows<T: KernelFloat>(
    input: &[T],
    scale: &[f32],
    bias: &[f32],
    output: &mut [T],
    n_rows: usize,
    n_cols: usize,
    input_row_stride: usize,
    output_row_stride: usize,
    config: &LayerNormConfig,
    mode: ExecutionMode,
) -> KernelResult<()> {
    let block_size = config.block_size.unwrap_or_else(|| next_power_of_two(n_cols));
    let kernel = LayerNormKernel {
        input,
        scale,
        bias,
        input_row_stride,
        output_row_stride,
        n_rows,
        n_cols,
        eps: config.eps,
    };
    launch(&kernel, &LaunchConfig::per_row(block_size).with_mode(mode), output)?;
    Ok(())
}

/// Mean and (population) variance of a row, accumulated in f64.
///
/// Reference statistics for checking and inverting the kernel output.
pub fn mean_var(data: &[f32]) -> (f32, f32) {
    if data.is_empty() {
        return (0.0, 0.0);
    }
    let n = data.len() as f64;
    let mean = data.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = data.iter().map(|&x| (x as f64 - mean).powi(2)).sum::<f64>() / n;
    (mean as f32, var as f32)
}
