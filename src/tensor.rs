//! Host tensor handed to and returned from the layer wrappers.
//!
//! A tensor is a shape plus a row-major buffer. The last dimension is the row;
//! rows may be padded (`row_stride > cols`), which is how non-contiguous inputs
//! reach the kernels. Wrapper outputs are always contiguous.

use crate::error::{KernelError, KernelResult};
use crate::kernel_types::KernelFloat;
use crate::validation::{compute_numel, strided_len, validate_row_buffer};

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    data: Vec<T>,
    shape: Vec<usize>,
    row_stride: usize,
}

impl<T: KernelFloat> Tensor<T> {
    /// Contiguous tensor from a shape and row-major data.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the shape is empty or `data.len()` differs from the
    /// element count of `shape`.
    pub fn from_vec(shape: Vec<usize>, data: Vec<T>) -> KernelResult<Self> {
        if shape.is_empty() {
            return Err(KernelError::ShapeMismatch("shape cannot be empty".into()));
        }
        let numel = compute_numel(&shape).map_err(KernelError::ShapeMismatch)?;
        if data.len() != numel {
            return Err(KernelError::ShapeMismatch(format!(
                "data len {} does not match shape {:?} ({} elements)",
                data.len(),
                shape,
                numel
            )));
        }
        let row_stride = shape[shape.len() - 1];
        Ok(Self {
            data,
            shape,
            row_stride,
        })
    }

    /// Tensor whose rows start `row_stride` elements apart in `data`.
    pub fn with_row_stride(shape: Vec<usize>, data: Vec<T>, row_stride: usize) -> KernelResult<Self> {
        if shape.is_empty() {
            return Err(KernelError::ShapeMismatch("shape cannot be empty".into()));
        }
        let cols = shape[shape.len() - 1];
        let rows = compute_numel(&shape[..shape.len() - 1]).map_err(KernelError::ShapeMismatch)?;
        validate_row_buffer(data.len(), rows, cols, row_stride, "tensor")
            .map_err(KernelError::ShapeMismatch)?;
        Ok(Self {
            data,
            shape,
            row_stride,
        })
    }

    pub fn zeros(shape: Vec<usize>) -> KernelResult<Self> {
        let numel = compute_numel(&shape).map_err(KernelError::ShapeMismatch)?;
        Self::from_vec(shape, vec![T::zero(); numel])
    }

    /// Build from f32 values, converting to `T`.
    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> KernelResult<Self> {
        Self::from_vec(shape, values.iter().map(|&v| T::from_f32(v)).collect())
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Logical element count (padding excluded).
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Length of the last dimension.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.shape[self.shape.len() - 1]
    }

    /// Product of all leading dimensions (1 for a 1-D tensor).
    #[must_use]
    pub fn rows(&self) -> usize {
        self.shape[..self.shape.len() - 1].iter().product()
    }

    #[must_use]
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.row_stride == self.cols() || self.rows() <= 1
    }

    /// Raw backing buffer, padding included.
    #[must_use]
    pub fn storage(&self) -> &[T] {
        &self.data
    }

    /// Logical row `r` (panics if out of range).
    #[must_use]
    pub fn row(&self, r: usize) -> &[T] {
        let start = r * self.row_stride;
        &self.data[start..start + self.cols()]
    }

    /// Logical values in row-major order, converted to f32.
    #[must_use]
    pub fn to_f32_vec(&self) -> Vec<f32> {
        (0..self.rows())
            .flat_map(|r| self.row(r).iter().map(|v| v.to_f32()))
            .collect()
    }

    /// Copy with padding removed.
    #[must_use]
    pub fn contiguous(&self) -> Self {
        if self.is_contiguous() && self.data.len() == self.numel() {
            return self.clone();
        }
        let data: Vec<T> = (0..self.rows()).flat_map(|r| self.row(r).iter().copied()).collect();
        Self {
            data,
            shape: self.shape.clone(),
            row_stride: self.cols(),
        }
    }

    /// Apply `f` to every logical element, keeping the buffer layout.
    #[must_use]
    pub fn map_f32(&self, f: impl Fn(f32) -> f32) -> Self {
        let cols = self.cols();
        let mut data = self.data.clone();
        for r in 0..self.rows() {
            let start = r * self.row_stride;
            for v in &mut data[start..start + cols] {
                *v = T::from_f32(f(v.to_f32()));
            }
        }
        Self {
            data,
            shape: self.shape.clone(),
            row_stride: self.row_stride,
        }
    }

    /// Same data under a new shape; the tensor is made contiguous first.
    pub fn reshape(self, shape: Vec<usize>) -> KernelResult<Self> {
        let numel = compute_numel(&shape).map_err(KernelError::ShapeMismatch)?;
        if numel != self.numel() {
            return Err(KernelError::ShapeMismatch(format!(
                "cannot reshape {:?} into {:?}",
                self.shape, shape
            )));
        }
        let t = self.contiguous();
        Self::from_vec(shape, t.data)
    }

    /// Consume into a contiguous row-major buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.contiguous().data
    }

    /// Minimal backing length implied by the shape and stride.
    pub fn required_len(&self) -> usize {
        strided_len(self.rows(), self.cols(), self.row_stride).unwrap_or(usize::MAX)
    }
}
