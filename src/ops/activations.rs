//! Elementwise GELU kernel.
//!
//! The kernel uses a rational surrogate for tanh (`t / (1 + |t|)`) on top of the
//! usual cubic GELU argument:
//!
//! ```text
//! coeff = sqrt(2/pi) * (1 + 0.044715 * x^2)
//! y     = 0.5 * x * (1 + (x * coeff) / (1 + |x * coeff|))
//! ```
//!
//! This is cheaper than both the erf form and the tanh form and is NOT
//! numerically equal to either. Against the exact erf GELU the deviation over
//! `[-5, 5]` peaks at about 0.342 near `x = 2.83`; it vanishes at 0 and decays
//! like `1/x^2` in both tails.
//!
//! # Design
//!
//! - Flattened input, fixed tile per program, tail tile masked
//! - No reductions: every lane is independent

use crate::error::KernelResult;
use crate::kernel_types::{ExecutionMode, KernelFloat, KernelId};
use crate::launch::{launch, Kernel, Lanes, LaunchConfig, ProgramContext};
use crate::validation::validate_input_len;

const SQRT_2_OVER_PI: f32 = 0.797_884_6;
const COEF: f32 = 0.044715;

/// Rational-surrogate GELU for one element.
#[inline(always)]
pub fn gelu_rational(x: f32) -> f32 {
    let coeff = SQRT_2_OVER_PI * (1.0 + COEF * x * x);
    let t = x * coeff;
    0.5 * x * (1.0 + t / (1.0 + t.abs()))
}

/// Exact GELU: `0.5 * x * (1 + erf(x / sqrt(2)))`.
#[inline(always)]
pub fn gelu_exact(x: f32) -> f32 {
    const INV_SQRT2: f32 = std::f32::consts::FRAC_1_SQRT_2;
    0.5 * x * (1.0 + erf(x * INV_SQRT2))
}

/// Abramowitz & Stegun 7.1.26 (max abs error 1.5e-7).
#[inline(always)]
pub fn erf(x: f32) -> f32 {
    const A1: f32 = 0.254829592;
    const A2: f32 = -0.284496736;
    const A3: f32 = 1.421413741;
    const A4: f32 = -1.453152027;
    const A5: f32 = 1.061405429;
    const P: f32 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    sign * y
}

/// Tiled GELU kernel arguments.
#[derive(Clone, Copy, Debug)]
pub struct GeluKernel<'a, T> {
    pub input: &'a [T],
    pub n_elements: usize,
}

impl<T: KernelFloat> Kernel<T> for GeluKernel<'_, T> {
    const ID: KernelId = KernelId::Gelu;

    fn work_size(&self) -> usize {
        self.n_elements
    }

    fn program_span(&self, block_size: usize) -> usize {
        block_size
    }

    fn validate(&self, _block_size: usize, output_len: usize) -> Result<(), String> {
        validate_input_len(self.input.len(), self.n_elements, "input")?;
        validate_input_len(output_len, self.n_elements, "output")
    }

    fn program(&self, ctx: ProgramContext, output: &mut [T]) {
        let mask = ctx.tile_mask(self.n_elements);
        let x = Lanes::load(self.input, ctx.block_start(), mask, 0.0);
        x.map(gelu_rational).store(output, 0, mask);
    }
}

/// Launch the GELU kernel over a flat buffer with `block_size` elements per program.
pub fn gelu_tiled<T: KernelFloat>(
    input: &[T],
    output: &mut [T],
    block_size: usize,
    mode: ExecutionMode,
) -> KernelResult<()> {
    let kernel = GeluKernel {
        input,
        n_elements: input.len(),
    };
    launch(&kernel, &LaunchConfig::tiled(block_size).with_mode(mode), output)?;
    Ok(())
}
