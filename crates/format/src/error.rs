use std::fmt;

use regionkit_nbt::NbtError;

/// Errors raised by a single codec or buffer operation.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed payload: {0}")]
    Format(#[from] NbtError),
    #[error("unsupported compression tag {0}")]
    UnsupportedCompression(u8),
    #[error("invalid declared payload length {0}")]
    InvalidLength(u32),
    #[error("chunk needs {sectors} sectors, a location word holds at most 255")]
    ChunkTooLarge { sectors: u64 },
    #[error("sector {sector} is past the last addressable sector")]
    OutOfSectors { sector: u32 },
    #[error("decompressed payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("slot is occupied but holds no payload")]
    MissingPayload,
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Stage of a bulk operation a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Load,
    Locations,
    Timestamps,
    Layout,
    Payloads,
    Flush,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Load => "load",
            Phase::Locations => "locations",
            Phase::Timestamps => "timestamps",
            Phase::Layout => "layout",
            Phase::Payloads => "payloads",
            Phase::Flush => "flush",
        };
        f.write_str(name)
    }
}

/// One failed step: the phase, the slot index it was working on, and why.
#[derive(Debug, thiserror::Error)]
#[error("{phase}[{index}]: {source}")]
pub struct StepFailure {
    pub phase: Phase,
    pub index: usize,
    #[source]
    pub source: RegionError,
}

/// Every failure of a bulk operation, in the order the steps ran.
///
/// Carries the byte count accumulated by the steps that did succeed, so a
/// failed read still reports its progress.
#[derive(Debug)]
pub struct AggregateError {
    failures: Vec<StepFailure>,
    bytes: u64,
    attempted: usize,
}

impl AggregateError {
    pub(crate) fn new(failures: Vec<StepFailure>, bytes: u64, attempted: usize) -> Self {
        Self {
            failures,
            bytes,
            attempted,
        }
    }

    pub fn failures(&self) -> &[StepFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<StepFailure> {
        self.failures
    }

    /// Bytes processed by the successful steps.
    pub fn bytes_processed(&self) -> u64 {
        self.bytes
    }

    /// Steps that ran, successful or not.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure recorded for a given phase and slot, if any.
    pub fn find(&self, phase: Phase, index: usize) -> Option<&StepFailure> {
        self.failures
            .iter()
            .find(|f| f.phase == phase && f.index == index)
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} steps failed",
            self.failures.len(),
            self.attempted
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
