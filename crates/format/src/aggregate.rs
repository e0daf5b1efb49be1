use serde::{Deserialize, Serialize};

use crate::error::{AggregateError, Phase, RegionError, StepFailure};

/// How an [`ErrorAggregator`] reacts to a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMode {
    /// Run every step, then fail with all captured errors if any step failed.
    #[default]
    AllOrNothing,
    /// Skip the remaining steps once one has failed.
    FailFast,
}

/// Step-wise error collection for bulk operations made of independent steps.
///
/// Successful steps are never undone when a later step fails.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    mode: AggregateMode,
    failures: Vec<StepFailure>,
    attempted: usize,
    skipped: usize,
    bytes: u64,
}

impl ErrorAggregator {
    pub fn new(mode: AggregateMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn all_or_nothing() -> Self {
        Self::new(AggregateMode::AllOrNothing)
    }

    /// Run one step, capturing its failure instead of propagating it.
    pub fn step<T, F>(&mut self, phase: Phase, index: usize, f: F) -> Option<T>
    where
        F: FnOnce() -> Result<T, RegionError>,
    {
        if self.mode == AggregateMode::FailFast && !self.failures.is_empty() {
            self.skipped += 1;
            return None;
        }
        self.attempted += 1;
        match f() {
            Ok(value) => Some(value),
            Err(source) => {
                tracing::warn!(%phase, index, error = %source, "step failed");
                self.failures.push(StepFailure {
                    phase,
                    index,
                    source,
                });
                None
            }
        }
    }

    /// Credit bytes to the running total of successful work.
    pub fn add_bytes(&mut self, n: u64) {
        self.bytes += n;
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn has_failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Total bytes on success, or every failure combined.
    pub fn finish(self) -> Result<u64, AggregateError> {
        if self.failures.is_empty() {
            return Ok(self.bytes);
        }
        if self.skipped > 0 {
            tracing::debug!(skipped = self.skipped, "steps skipped after first failure");
        }
        Err(AggregateError::new(
            self.failures,
            self.bytes,
            self.attempted,
        ))
    }
}
