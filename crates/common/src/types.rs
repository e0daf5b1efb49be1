use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of chunks along each axis of a region.
pub const REGION_WIDTH: i32 = 32;

/// Number of slots in a region (32x32).
pub const SLOT_COUNT: usize = (REGION_WIDTH * REGION_WIDTH) as usize;

pub const KIBIBYTE: u64 = 1 << 10;
pub const MEBIBYTE: u64 = 1 << 20;
pub const GIBIBYTE: u64 = 1 << 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordError {
    #[error("local coordinate ({x}, {z}) outside 0..32")]
    OutOfRange { x: i32, z: i32 },
    #[error("slot index {0} outside 0..1024")]
    IndexOutOfRange(usize),
}

/// Chunk position inside a single region, both axes in `0..32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalCoord {
    x: u8,
    z: u8,
}

impl LocalCoord {
    pub fn new(x: i32, z: i32) -> Result<Self, CoordError> {
        if !(0..REGION_WIDTH).contains(&x) || !(0..REGION_WIDTH).contains(&z) {
            return Err(CoordError::OutOfRange { x, z });
        }
        Ok(Self {
            x: x as u8,
            z: z as u8,
        })
    }

    /// Inverse of [`LocalCoord::index`].
    pub fn from_index(index: usize) -> Result<Self, CoordError> {
        if index >= SLOT_COUNT {
            return Err(CoordError::IndexOutOfRange(index));
        }
        let width = REGION_WIDTH as usize;
        Ok(Self {
            x: (index % width) as u8,
            z: (index / width) as u8,
        })
    }

    pub fn x(self) -> i32 {
        self.x as i32
    }

    pub fn z(self) -> i32 {
        self.z as i32
    }

    /// Slot index in the region tables: `z * 32 + x`.
    pub fn index(self) -> usize {
        (self.z as usize) * REGION_WIDTH as usize + self.x as usize
    }
}

impl fmt::Display for LocalCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// World-space chunk coordinate. Wraps every 32 chunks into a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn region(self) -> RegionCoord {
        RegionCoord {
            x: self.x.div_euclid(REGION_WIDTH),
            z: self.z.div_euclid(REGION_WIDTH),
        }
    }

    pub fn local(self) -> LocalCoord {
        LocalCoord {
            x: self.x.rem_euclid(REGION_WIDTH) as u8,
            z: self.z.rem_euclid(REGION_WIDTH) as u8,
        }
    }
}

/// Region coordinate, as found in `r.<x>.<z>.mca` file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionCoord {
    pub x: i32,
    pub z: i32,
}

impl RegionCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Parse a region file name such as `r.0.-1.mca`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let mut parts = name.split('.');
        if parts.next()? != "r" {
            return None;
        }
        let x = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        if parts.next()? != "mca" || parts.next().is_some() {
            return None;
        }
        Some(Self { x, z })
    }

    pub fn file_name(self) -> String {
        format!("r.{}.{}.mca", self.x, self.z)
    }

    /// World chunk coordinate of a slot in this region.
    pub fn chunk(self, local: LocalCoord) -> ChunkCoord {
        ChunkCoord {
            x: self.x * REGION_WIDTH + local.x(),
            z: self.z * REGION_WIDTH + local.z(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn index_matches_row_major_layout() {
        let local = LocalCoord::new(5, 2).unwrap();
        assert_eq!(local.index(), 69);
    }

    #[test]
    fn index_is_injective_over_region() {
        let mut seen = HashSet::new();
        for z in 0..REGION_WIDTH {
            for x in 0..REGION_WIDTH {
                let index = LocalCoord::new(x, z).unwrap().index();
                assert!(index < SLOT_COUNT);
                assert!(seen.insert(index), "duplicate index {index}");
            }
        }
        assert_eq!(seen.len(), SLOT_COUNT);
    }

    #[test]
    fn from_index_inverts_index() {
        for index in [0, 1, 31, 32, 69, 1023] {
            assert_eq!(LocalCoord::from_index(index).unwrap().index(), index);
        }
        assert_eq!(
            LocalCoord::from_index(1024),
            Err(CoordError::IndexOutOfRange(1024))
        );
    }

    #[test]
    fn local_rejects_out_of_range() {
        assert!(LocalCoord::new(32, 0).is_err());
        assert!(LocalCoord::new(0, -1).is_err());
    }

    #[test]
    fn chunk_wraps_into_region() {
        let chunk = ChunkCoord::new(-1, 33);
        assert_eq!(chunk.region(), RegionCoord::new(-1, 1));
        assert_eq!(chunk.local(), LocalCoord::new(31, 1).unwrap());
        assert_eq!(chunk.region().chunk(chunk.local()), chunk);
    }

    #[test]
    fn region_file_name_roundtrip() {
        let coord = RegionCoord::new(0, -1);
        assert_eq!(coord.file_name(), "r.0.-1.mca");
        assert_eq!(RegionCoord::from_file_name("r.0.-1.mca"), Some(coord));
        assert_eq!(RegionCoord::from_file_name("r.0.mca"), None);
        assert_eq!(RegionCoord::from_file_name("r.a.b.mca"), None);
        assert_eq!(RegionCoord::from_file_name("r.1.2.mcr"), None);
    }

    #[test]
    fn units_are_binary() {
        assert_eq!(KIBIBYTE, 1024);
        assert_eq!(MEBIBYTE, 1024 * KIBIBYTE);
        assert_eq!(GIBIBYTE, 1024 * MEBIBYTE);
    }
}
