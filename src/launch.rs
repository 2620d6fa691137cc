//! Data-parallel launch model.
//!
//! A launch maps an amount of work (rows, or scalar elements) onto a 1-D grid of
//! independent programs. Every program owns `block_size` lanes; lane `i` of
//! program `p` addresses global offset `p * block_size + i`. Lanes past the valid
//! extent are disabled by a [`LaneMask`]: they load a neutral fill value and are
//! never stored.
//!
//! # Design
//!
//! - [`LaunchConfig`] separates "how much work" (`grid_fn`) from "how it is chunked" (`block_size`)
//! - Each program receives only its own output span, so programs cannot race
//! - Programs may run in any order; rayon is used in [`ExecutionMode::Parallel`]
//! - Preconditions are validated once per launch, never per lane
//!
//! ```ignore
//! let config = LaunchConfig::per_row(next_power_of_two(n_cols));
//! launch(&kernel, &config, &mut output)?;
//! ```

use std::ops::Range;

use rayon::prelude::*;

use crate::error::{KernelError, KernelResult};
use crate::kernel_types::{ExecutionMode, KernelFloat, KernelId};
use crate::validation::validate_block_size;

/// Maps `(work, block_size)` to the number of programs to launch.
pub type GridFn = fn(work: usize, block_size: usize) -> usize;

/// Ceiling division; `0` when `b == 0`.
#[inline(always)]
pub fn cdiv(a: usize, b: usize) -> usize {
    if b == 0 {
        0
    } else {
        a.div_ceil(b)
    }
}

/// Smallest power of two `>= n` (`1` for `n == 0`).
#[inline(always)]
pub fn next_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// One program per row.
pub fn grid_per_row(rows: usize, _block_size: usize) -> usize {
    rows
}

/// One program per `block_size` elements.
pub fn grid_tiled(n_elements: usize, block_size: usize) -> usize {
    cdiv(n_elements, block_size)
}

/// Launch configuration: lanes per program, grid function, host scheduling.
#[derive(Clone, Copy, Debug)]
pub struct LaunchConfig {
    pub block_size: usize,
    pub grid_fn: GridFn,
    pub mode: ExecutionMode,
}

impl LaunchConfig {
    /// Row kernels: one program per row, `block_size >= n_cols`.
    pub fn per_row(block_size: usize) -> Self {
        Self {
            block_size,
            grid_fn: grid_per_row,
            mode: ExecutionMode::default(),
        }
    }

    /// Elementwise kernels: `ceil(n / block_size)` programs.
    pub fn tiled(block_size: usize) -> Self {
        Self {
            block_size,
            grid_fn: grid_tiled,
            mode: ExecutionMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    #[inline]
    pub fn grid_size(&self, work: usize) -> usize {
        (self.grid_fn)(work, self.block_size)
    }
}

/// Identity of a running program within its grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramContext {
    pub program_id: usize,
    pub block_size: usize,
}

impl ProgramContext {
    /// Local lane offsets `0..block_size`.
    #[inline(always)]
    pub fn offsets(&self) -> Range<usize> {
        0..self.block_size
    }

    /// Global offset of lane 0 for tiled kernels.
    #[inline(always)]
    pub fn block_start(&self) -> usize {
        self.program_id * self.block_size
    }

    /// Mask for row kernels: `lane < extent`.
    #[inline(always)]
    pub fn mask(&self, extent: usize) -> LaneMask {
        LaneMask::new(self.block_size, extent)
    }

    /// Mask for tiled kernels: `block_start + lane < extent`.
    #[inline(always)]
    pub fn tile_mask(&self, extent: usize) -> LaneMask {
        LaneMask::new(self.block_size, extent.saturating_sub(self.block_start()))
    }
}

/// Per-lane validity predicate.
///
/// Valid lanes always form a prefix of the block, so the mask is stored as the
/// number of active lanes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneMask {
    block_size: usize,
    active: usize,
}

impl LaneMask {
    #[inline(always)]
    pub fn new(block_size: usize, extent: usize) -> Self {
        Self {
            block_size,
            active: extent.min(block_size),
        }
    }

    #[inline(always)]
    pub fn is_active(&self, lane: usize) -> bool {
        lane < self.active
    }

    #[inline(always)]
    pub fn active_lanes(&self) -> usize {
        self.active
    }

    #[inline(always)]
    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

/// One block of lane values held by a program, computed in f32.
#[derive(Clone, Debug, PartialEq)]
pub struct Lanes {
    values: Vec<f32>,
}

impl Lanes {
    /// Masked load of `src[base + lane]`; inactive lanes read `other`.
    #[inline]
    pub fn load<T: KernelFloat>(src: &[T], base: usize, mask: LaneMask, other: f32) -> Self {
        let values = (0..mask.block_size())
            .map(|lane| {
                if mask.is_active(lane) {
                    src[base + lane].to_f32()
                } else {
                    other
                }
            })
            .collect();
        Self { values }
    }

    pub fn splat(block_size: usize, value: f32) -> Self {
        Self {
            values: vec![value; block_size],
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    #[inline]
    pub fn zip_map(&self, other: &Lanes, f: impl Fn(f32, f32) -> f32) -> Self {
        debug_assert_eq!(self.len(), other.len());
        Self {
            values: self
                .values
                .iter()
                .zip(other.values.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    /// `where(mask, self, other)`.
    #[inline]
    pub fn select(&self, mask: LaneMask, other: f32) -> Self {
        Self {
            values: self
                .values
                .iter()
                .enumerate()
                .map(|(lane, &v)| if mask.is_active(lane) { v } else { other })
                .collect(),
        }
    }

    /// Max across all lanes (masked lanes included; they hold the neutral fill).
    #[inline]
    pub fn reduce_max(&self) -> f32 {
        self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Sum across all lanes.
    #[inline]
    pub fn reduce_sum(&self) -> f32 {
        self.values.iter().sum()
    }

    /// Masked store into `dst[base + lane]`.
    #[inline]
    pub fn store<T: KernelFloat>(&self, dst: &mut [T], base: usize, mask: LaneMask) {
        for (lane, &v) in self.values.iter().enumerate() {
            if mask.is_active(lane) {
                dst[base + lane] = T::from_f32(v);
            }
        }
    }
}

/// A per-program function plus the metadata the launcher needs.
pub trait Kernel<T: KernelFloat>: Sync {
    const ID: KernelId;

    /// Work the grid function maps onto programs (rows, or elements).
    fn work_size(&self) -> usize;

    /// Output elements owned by one program (row stride, or tile size).
    fn program_span(&self, block_size: usize) -> usize;

    /// Kernel preconditions, checked once before any program runs.
    fn validate(&self, block_size: usize, output_len: usize) -> Result<(), String>;

    /// Body of one program. `output` is the program's own span, addressed from 0.
    fn program(&self, ctx: ProgramContext, output: &mut [T]);
}

/// Launch `kernel` over the grid described by `config`, writing into `output`.
///
/// Returns the number of programs executed. Fails before running any program
/// if the configuration or buffers are invalid; otherwise the whole grid runs.
pub fn launch<T, K>(kernel: &K, config: &LaunchConfig, output: &mut [T]) -> KernelResult<usize>
where
    T: KernelFloat,
    K: Kernel<T>,
{
    validate_block_size(config.block_size).map_err(|e| KernelError::launch(K::ID, e))?;
    kernel
        .validate(config.block_size, output.len())
        .map_err(|e| KernelError::launch(K::ID, e))?;

    let grid = config.grid_size(kernel.work_size());
    let block_size = config.block_size;
    let span = kernel.program_span(block_size);
    log::debug!(
        "launch {}: grid={} block_size={} span={} mode={:?}",
        K::ID,
        grid,
        block_size,
        span,
        config.mode
    );
    if grid == 0 {
        return Ok(0);
    }

    let parallel = config.mode == ExecutionMode::Parallel && grid > 1;

    // Zero-width rows: every program owns an empty span.
    if span == 0 {
        let run = |program_id: usize| {
            kernel.program(ProgramContext { program_id, block_size }, &mut []);
        };
        if parallel {
            (0..grid).into_par_iter().for_each(run);
        } else {
            (0..grid).for_each(run);
        }
        return Ok(grid);
    }

    let available = cdiv(output.len(), span);
    if available < grid {
        return Err(KernelError::launch(
            K::ID,
            format!(
                "output holds {} program spans of {} but grid is {}",
                available, span, grid
            ),
        ));
    }

    if parallel {
        output
            .par_chunks_mut(span)
            .take(grid)
            .enumerate()
            .for_each(|(program_id, out)| {
                kernel.program(ProgramContext { program_id, block_size }, out);
            });
    } else {
        output
            .chunks_mut(span)
            .take(grid)
            .enumerate()
            .for_each(|(program_id, out)| {
                kernel.program(ProgramContext { program_id, block_size }, out);
            });
    }
    Ok(grid)
}
