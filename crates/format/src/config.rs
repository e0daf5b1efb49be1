use regionkit_nbt::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::aggregate::AggregateMode;
use crate::compression::Compression;
use crate::RegionError;

/// Tunables for reading and writing region files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Compression for payloads created through [`crate::RegionFile::insert`].
    pub compression: Compression,
    /// Failure policy for bulk reads and writes.
    pub mode: AggregateMode,
    /// Nesting limit for payload tag trees.
    pub max_depth: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Zlib,
            mode: AggregateMode::AllOrNothing,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RegionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, RegionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegionError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
