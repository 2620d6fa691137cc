//! Kernel configuration: JSON file plus environment override.
//!
//! ```ignore
//! let config = KernelConfig::load("kernels.json")?.with_env_overrides();
//! config.validate()?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::kernel_types::{ExecutionMode, GeluConfig, LayerNormConfig, SoftmaxConfig};
use crate::validation::{validate_block_size, MAX_BLOCK_SIZE};

/// Overrides [`KernelConfig::execution`] (`sequential` or `parallel`).
pub const EXECUTION_ENV: &str = "NANOGPT_KERNELS_EXECUTION";

/// Everything the three wrappers need to launch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub softmax: SoftmaxConfig,
    pub layer_norm: LayerNormConfig,
    pub gelu: GeluConfig,
    pub execution: ExecutionMode,
}

impl KernelConfig {
    /// Defaults with the environment override applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `NANOGPT_KERNELS_EXECUTION` if it is set to a known mode.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var(EXECUTION_ENV) {
            match ExecutionMode::parse(&value) {
                Some(mode) => {
                    log::debug!("{}={} -> {:?}", EXECUTION_ENV, value, mode);
                    self.execution = mode;
                }
                None => log::warn!("Ignoring unknown {}={:?}", EXECUTION_ENV, value),
            }
        }
        self
    }

    /// Read a JSON config; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> KernelResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        log::debug!("Loaded kernel config from: {:?}", path);
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> KernelResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Saved kernel config to: {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> KernelResult<()> {
        self.softmax.validate().map_err(KernelError::InvalidConfig)?;
        self.layer_norm.validate().map_err(KernelError::InvalidConfig)?;
        check_block("softmax.block_size", self.softmax.block_size)?;
        check_block("layer_norm.block_size", self.layer_norm.block_size)?;
        validate_block_size(self.gelu.block_size)
            .map_err(|e| KernelError::InvalidConfig(format!("gelu.block_size: {e}")))
    }
}

fn check_block(name: &str, block_size: Option<usize>) -> KernelResult<()> {
    match block_size {
        Some(b) => validate_block_size(b)
            .map_err(|e| KernelError::InvalidConfig(format!("{name}: {e} (max {MAX_BLOCK_SIZE})"))),
        None => Ok(()),
    }
}
