//! Validation utilities for kernel launch parameters.
//!
//! # Design
//!
//! - All functions return `Result<T, String>` for flexible error conversion
//! - Callers map String errors to `KernelError` variants
//! - Overflow checks use `checked_mul` for safety
//! - const MAX values defined once, used everywhere

/// Maximum lanes a single program may hold.
pub const MAX_BLOCK_SIZE: usize = 1 << 16;

/// Validate a block size: non-zero and at most [`MAX_BLOCK_SIZE`].
#[inline]
pub fn validate_block_size(block_size: usize) -> Result<(), String> {
    if block_size == 0 {
        return Err("block_size must be > 0".into());
    }
    if block_size > MAX_BLOCK_SIZE {
        return Err(format!(
            "block_size {} exceeds MAX_BLOCK_SIZE {}",
            block_size, MAX_BLOCK_SIZE
        ));
    }
    Ok(())
}

/// Validate that one program can hold a full row (row kernels never reduce across programs).
#[inline]
pub fn validate_block_covers_row(block_size: usize, n_cols: usize) -> Result<(), String> {
    validate_block_size(block_size)?;
    if block_size < n_cols {
        return Err(format!(
            "block_size {} is smaller than row length {}",
            block_size, n_cols
        ));
    }
    Ok(())
}

/// Minimum buffer length for `rows` rows of `cols` values spaced `row_stride` apart.
///
/// The last row does not need trailing padding.
#[inline]
pub fn strided_len(rows: usize, cols: usize, row_stride: usize) -> Result<usize, String> {
    if rows == 0 {
        return Ok(0);
    }
    (rows - 1)
        .checked_mul(row_stride)
        .and_then(|v| v.checked_add(cols))
        .ok_or_else(|| "strided buffer length overflow".to_string())
}

/// Validate a row-major buffer described by `(rows, cols, row_stride)`.
#[inline]
pub fn validate_row_buffer(
    len: usize,
    rows: usize,
    cols: usize,
    row_stride: usize,
    name: &str,
) -> Result<(), String> {
    if rows > 1 && row_stride < cols {
        return Err(format!(
            "{} row_stride {} < n_cols {} (rows would overlap)",
            name, row_stride, cols
        ));
    }
    let required = strided_len(rows, cols, row_stride)?;
    if len < required {
        return Err(format!(
            "{} len {} < required {} for [{}, {}] with row_stride {}",
            name, len, required, rows, cols, row_stride
        ));
    }
    Ok(())
}

/// Validate input buffer length matches expected.
#[inline]
pub fn validate_input_len(actual: usize, expected: usize, name: &str) -> Result<(), String> {
    if actual != expected {
        return Err(format!("{} len {} != expected {}", name, actual, expected));
    }
    Ok(())
}

/// Validate that `shape` ends with `normalized`.
pub fn validate_trailing_dims(shape: &[usize], normalized: &[usize]) -> Result<(), String> {
    if normalized.is_empty() {
        return Err("normalized shape must not be empty".into());
    }
    if shape.len() < normalized.len() || shape[shape.len() - normalized.len()..] != *normalized {
        return Err(format!(
            "input shape {:?} does not end with normalized shape {:?}",
            shape, normalized
        ));
    }
    Ok(())
}

/// Compute element count of a shape with overflow check.
#[inline]
pub fn compute_numel(shape: &[usize]) -> Result<usize, String> {
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| format!("element count of {:?} overflows usize", shape))
}
