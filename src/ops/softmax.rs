//! Row-softmax kernel.
//!
//! One program per row of a `[n_rows, n_cols]` view. Each program:
//!
//! ```text
//! x        = load(row, mask, other = -inf)
//! shifted  = x - max(x)
//! e        = exp(shifted)
//! y        = e / (sum(e) + kernel_eps)
//! store(y, mask)
//! ```
//!
//! Input and output carry independent row strides. The host-side
//! stabilization (clamp before launch, `+renorm_eps` and renormalize after)
//! lives in [`softmax_rows`] and [`renormalize_rows`].

use crate::error::{KernelError, KernelResult};
use crate::kernel_types::{validate_eps, ExecutionMode, KernelFloat, KernelId, SoftmaxConfig};
use crate::launch::{launch, next_power_of_two, Kernel, Lanes, LaunchConfig, ProgramContext};
use crate::validation::{validate_block_covers_row, validate_row_buffer};

/// Row-softmax kernel arguments.
#[derive(Clone, Copy, Debug)]
pub struct SoftmaxKernel<'a, T> {
    pub input: &'a [T],
    pub input_row_stride: usize,
    pub output_row_stride: usize,
    pub n_rows: usize,
    pub n_cols: usize,
    /// Added to the exp-sum so an all `-inf` row never divides by zero.
    pub eps: f32,
}

impl<T: KernelFloat> Kernel<T> for SoftmaxKernel<'_, T> {
    const ID: KernelId = KernelId::Softmax;

    fn work_size(&self) -> usize {
        self.n_rows
    }

    fn program_span(&self, _block_size: usize) -> usize {
        self.output_row_stride
    }

    fn validate(&self, block_size: usize, output_len: usize) -> Result<(), String> {
        validate_block_covers_row(block_size, self.n_cols)?;
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
        let row_start = ctx.program_id * self.input_row_stride;

        let logits = Lanes::load(self.input, row_start, mask, f32::NEG_INFINITY);
        let row_max = logits.reduce_max();
        // No finite lane: keep exp(-inf) = 0 instead of exp(-inf - -inf) = NaN.
        let shift = if row_max == f32::NEG_INFINITY { 0.0 } else { row_max };

        let exp_logits = logits.map(|x| (x - shift).exp());
        let denom = exp_logits.reduce_sum() + self.eps;

        exp_logits.map(|e| e / denom).store(output, 0, mask);
    }
}

/// Launch the row-softmax kernel over a strided `[n_rows, n_cols]` buffer.
///
/// This is the raw kernel launch: no clamping and no renormalization.
/// The block size defaults to `next_power_of_two(n_cols)`.
#[allow(clippy::too_many_arguments)]
pub fn softmax_rows<T: KernelFloat>(
    input: &[T],
    output: &mut [T],
    n_rows: usize,
    n_cols: usize,
    input_row_stride: usize,
    output_row_stride: usize,
    config: &SoftmaxConfig,
    mode: ExecutionMode,
) -> KernelResult<()> {
    let block_size = config.block_size.unwrap_or_else(|| next_power_of_two(n_cols));
    let kernel = SoftmaxKernel {
        input,
        input_row_stride,
        output_row_stride,
        n_rows,
        n_cols,
        eps: config.kernel_eps,
    };
    launch(&kernel, &LaunchConfig::per_row(block_size).with_mode(mode), output)?;
    Ok(())
}

/// Host-side second stabilization: `y = (y + eps) / sum(y + eps)` per row.
pub fn renormalize_rows<T: KernelFloat>(
    data: &mut [T],
    n_rows: usize,
    n_cols: usize,
    row_stride: usize,
    eps: f32,
) -> KernelResult<()> {
    validate_row_buffer(data.len(), n_rows, n_cols, row_stride, "probs")
        .map_err(KernelError::ShapeMismatch)?;
    for r in 0..n_rows {
        let row = &mut data[r * row_stride..r * row_stride + n_cols];
        let sum: f32 = row.iter().map(|&p| p.to_f32() + eps).sum();
        for p in row.iter_mut() {
            *p = T::from_f32((p.to_f32() + eps) / sum);
        }
    }
    Ok(())
}
