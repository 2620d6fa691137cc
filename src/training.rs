//! Training-loop guard against non-finite losses.
//!
//! The kernels keep activations finite for ordinary inputs but do not promise
//! it for every input, so the loop checks each loss before the optimizer step.

/// What the training loop should do with the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Loss is finite: backpropagate and step the optimizer.
    Apply,
    /// Loss is NaN or infinite: drop this step's gradients.
    Skip,
}

/// Counts and logs skipped optimizer steps.
#[derive(Debug, Clone, Default)]
pub struct LossGuard {
    skipped: u64,
    checked: u64,
}

impl LossGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, loss: f32) -> StepAction {
        self.checked += 1;
        if loss.is_finite() {
            return StepAction::Apply;
        }
        self.skipped += 1;
        log::warn!(
            "non-finite loss {} at check {}, skipping optimizer step ({} skipped so far)",
            loss,
            self.checked,
            self.skipped
        );
        StepAction::Skip
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn checked(&self) -> u64 {
        self.checked
    }
}
