//! Region container engine: reads and writes the 32x32 chunk archive format.
//!
//! ```text
//! bytes 0..4096      1024 packed location words (sector offset << 8 | sector count)
//! bytes 4096..8192   1024 timestamp words
//! bytes 8192..       sector-aligned payloads: u32 length, u8 compression, body
//! ```
//!
//! # Invariants
//! - Slots are a fixed array of 1024, indexed `z * 32 + x`.
//! - A slot is absent iff its packed location word is below 1.
//! - Bulk reads and writes attempt every step and report all failures together.

mod aggregate;
mod compression;
mod config;
mod error;
mod payload;
mod ranged;
mod region;
mod slot;

pub use aggregate::{AggregateMode, ErrorAggregator};
pub use compression::{CompressWriter, Compression};
pub use config::RegionConfig;
pub use error::{AggregateError, Phase, RegionError, StepFailure};
pub use payload::{ChunkPayload, EncodedChunk, MAX_DECOMPRESSED_BYTES, PAYLOAD_HEADER_BYTES};
pub use ranged::{Range, RangedBuffer};
pub use region::{RegionFile, Slot};
pub use slot::{HEADER_BYTES, HEADER_SECTORS, PackedSlotLocation, SECTOR_BYTES, SlotTimestamp};

pub use regionkit_common::{LocalCoord, SLOT_COUNT};
pub use regionkit_nbt as nbt;

pub fn crate_info() -> &'static str {
    "regionkit-format v0.1.0"
}
