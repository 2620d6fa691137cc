#![allow(dead_code)]

use rand::Rng;

/// Elementwise read+write bytes (in + out, f32)
pub fn elementwise_rw_bytes(n: usize) -> u64 {
    2 * n as u64 * 4
}

/// Layer-norm bytes (input + scale + bias + output, f32)
pub fn layer_norm_rw_bytes(rows: usize, cols: usize) -> u64 {
    (2 * rows * cols + 2 * cols) as u64 * 4
}

/// Softmax bytes (clamp pass, kernel read/write, renormalize read/write)
pub fn softmax_rw_bytes(n: usize) -> u64 {
    5 * n as u64 * 4
}

/// Random f32 vector in [-scale, scale)
pub fn random_f32_vec(n: usize, scale: f32) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen_range(-scale..scale)).collect()
}
