//! Shared coordinate and unit types for the regionkit workspace.
//!
//! # Invariants
//! - A region covers a 32x32 grid of chunks.
//! - Local slot indices are `z * 32 + x` and stay within `0..1024`.

pub mod types;

pub use types::{
    ChunkCoord, CoordError, GIBIBYTE, KIBIBYTE, LocalCoord, MEBIBYTE, REGION_WIDTH, RegionCoord,
    SLOT_COUNT,
};
