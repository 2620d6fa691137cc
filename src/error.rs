use thiserror::Error;

use crate::kernel_types::KernelId;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("invalid launch for {kernel}: {reason}")]
    InvalidLaunch { kernel: KernelId, reason: String },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("parameter lock poisoned: {0}")]
    ParamsPoisoned(&'static str),
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    pub(crate) fn launch(kernel: KernelId, reason: impl Into<String>) -> Self {
        KernelError::InvalidLaunch {
            kernel,
            reason: reason.into(),
        }
    }
}
