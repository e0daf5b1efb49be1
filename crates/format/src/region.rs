use regionkit_common::{LocalCoord, SLOT_COUNT};
use regionkit_nbt::NamedTag;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::aggregate::ErrorAggregator;
use crate::config::RegionConfig;
use crate::error::{AggregateError, Phase, RegionError};
use crate::payload::{ChunkPayload, EncodedChunk};
use crate::ranged::RangedBuffer;
use crate::slot::{HEADER_SECTORS, PackedSlotLocation, SECTOR_BYTES, SlotTimestamp};

/// One of the 1024 fixed positions in a region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot {
    pub location: PackedSlotLocation,
    pub timestamp: SlotTimestamp,
    pub payload: Option<ChunkPayload>,
}

impl Slot {
    pub fn is_absent(&self) -> bool {
        self.location.is_absent()
    }
}

/// A 32x32 region archive held in memory.
///
/// Reading and writing are single-pass and take `&mut self`; callers
/// serialize access.
#[derive(Debug, Clone)]
pub struct RegionFile {
    slots: Box<[Slot]>,
    config: RegionConfig,
}

impl Default for RegionFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionFile {
    /// An empty region with every slot absent.
    pub fn new() -> Self {
        Self::with_config(RegionConfig::default())
    }

    pub fn with_config(config: RegionConfig) -> Self {
        Self {
            slots: empty_slots(),
            config,
        }
    }

    /// Settings used by reads, writes and [`RegionFile::insert`].
    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    /// Read a region file from disk. Any failed step fails the whole open.
    pub fn open(path: impl AsRef<Path>, config: RegionConfig) -> Result<Self, RegionError> {
        let file = File::open(path)?;
        let mut region = Self::with_config(config);
        region.read_from(BufReader::new(file))?;
        Ok(region)
    }

    /// Write the region to disk, replacing any existing file.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<u64, RegionError> {
        let file = File::create(path)?;
        Ok(self.write_to(BufWriter::new(file))?)
    }

    /// Replace every slot with the contents of `source`.
    ///
    /// Each table word and each occupied slot's payload is one step; all of
    /// them run even when earlier ones fail. On success returns the bytes
    /// processed; on failure the error carries the same count for the steps
    /// that succeeded, and the slots that decoded are kept.
    pub fn read_from<R: Read>(&mut self, source: R) -> Result<u64, AggregateError> {
        let _span = tracing::info_span!("region_read").entered();
        self.slots = empty_slots();
        let mut errs = ErrorAggregator::new(self.config.mode);

        let mut buf = errs
            .step(Phase::Load, 0, || Ok(RangedBuffer::from_reader(source)?))
            .unwrap_or_default();

        tracing::debug!(len = buf.len(), "decoding slot locations");
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let read = errs.step(Phase::Locations, index, || {
                Ok(PackedSlotLocation::read_from(&mut buf)?)
            });
            if let Some(location) = read {
                slot.location = location;
                errs.add_bytes(PackedSlotLocation::ENCODED_LEN);
            }
        }

        tracing::debug!(bytes = errs.bytes(), "decoding slot timestamps");
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let read = errs.step(Phase::Timestamps, index, || {
                Ok(SlotTimestamp::read_from(&mut buf)?)
            });
            if let Some(timestamp) = read {
                slot.timestamp = timestamp;
                errs.add_bytes(SlotTimestamp::ENCODED_LEN);
            }
        }

        tracing::debug!(bytes = errs.bytes(), "decoding chunk payloads");
        let max_depth = self.config.max_depth;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let location = slot.location;
            if location.is_absent() {
                continue;
            }
            let offset = location.byte_offset();
            let length = location.byte_len();
            tracing::debug!(
                index,
                sector = location.location(),
                sectors = location.sectors(),
                offset,
                length,
                "chunk located"
            );

            let read = errs.step(Phase::Payloads, index, || {
                ChunkPayload::read_from(&mut buf.range(offset, length), max_depth)
            });
            if let Some((payload, n)) = read {
                slot.payload = Some(payload);
                errs.add_bytes(n);
            }
        }

        let result = errs.finish();
        match &result {
            Ok(bytes) => tracing::debug!(bytes, "region read complete"),
            Err(e) => tracing::debug!(
                failures = e.len(),
                bytes = e.bytes_processed(),
                "region read finished with failures"
            ),
        }
        result
    }

    /// Re-encode every occupied slot and write the region to `sink`.
    ///
    /// A slot keeps its location word when the re-encoded payload fits its
    /// current run and that run does not collide with the header or an
    /// earlier slot. Other slots are moved past the last kept sector, in
    /// slot order. A slot that fails layout is written as absent but keeps
    /// its in-memory state. Returns the bytes flushed to `sink`.
    pub fn write_to<W: Write>(&mut self, mut sink: W) -> Result<u64, AggregateError> {
        let _span = tracing::info_span!("region_write").entered();
        let mut errs = ErrorAggregator::new(self.config.mode);

        let mut table = vec![PackedSlotLocation::default(); SLOT_COUNT];
        let mut encoded: Vec<Option<(EncodedChunk, u32, u8)>> = vec![None; SLOT_COUNT];

        for (index, slot) in self.slots.iter().enumerate() {
            if slot.is_absent() {
                continue;
            }
            encoded[index] = errs.step(Phase::Layout, index, || {
                let payload = slot.payload.as_ref().ok_or(RegionError::MissingPayload)?;
                let chunk = payload.encode()?;
                let length = chunk.declared_length()?;
                let sectors = sector_count(&chunk)?;
                Ok((chunk, length, sectors))
            });
        }

        let mut kept: Vec<(u32, u32)> = Vec::new();
        let mut moved = Vec::new();
        for (index, entry) in encoded.iter().enumerate() {
            let Some((_, _, sectors)) = entry else {
                continue;
            };
            let current = self.slots[index].location;
            let run = (current.location(), current.end_sector());
            let fits = current.sectors() >= *sectors
                && run.0 >= HEADER_SECTORS
                && !kept.iter().any(|&other| overlaps(run, other));
            if fits {
                kept.push(run);
                table[index] = current;
            } else {
                moved.push(index);
            }
        }

        let mut next_sector = kept
            .iter()
            .map(|&(_, end)| end)
            .max()
            .unwrap_or(HEADER_SECTORS)
            .max(HEADER_SECTORS);
        for index in moved {
            let Some((_, _, sectors)) = &encoded[index] else {
                continue;
            };
            let sectors = *sectors;
            let placed = errs.step(Phase::Layout, index, || place(next_sector, sectors));
            match placed {
                Some(location) => {
                    tracing::debug!(index, sector = next_sector, sectors, "chunk relocated");
                    next_sector = location.end_sector();
                    table[index] = location;
                }
                None => encoded[index] = None,
            }
        }

        for (index, entry) in encoded.iter().enumerate() {
            let Some((_, length, _)) = entry else {
                continue;
            };
            let slot = &mut self.slots[index];
            slot.location = table[index];
            if let Some(payload) = slot.payload.as_mut() {
                payload.set_declared_length(*length);
            }
        }

        let mut buf = RangedBuffer::new().append_mode();

        tracing::debug!("encoding slot locations");
        for (index, location) in table.iter().enumerate() {
            errs.step(Phase::Locations, index, || Ok(location.write_to(&mut buf)?));
        }

        tracing::debug!("encoding slot timestamps");
        for (index, slot) in self.slots.iter().enumerate() {
            let timestamp = slot.timestamp;
            errs.step(Phase::Timestamps, index, || Ok(timestamp.write_to(&mut buf)?));
        }

        tracing::debug!("encoding chunk payloads");
        for (index, entry) in encoded.iter().enumerate() {
            let Some((chunk, _, _)) = entry else {
                continue;
            };
            let location = table[index];
            errs.step(Phase::Payloads, index, || {
                let mut range = buf.range(location.byte_offset(), location.byte_len());
                Ok(chunk.write_to(&mut range)?)
            });
        }

        tracing::debug!(len = buf.len(), "flushing region");
        let flushed = errs.step(Phase::Flush, 0, || {
            buf.pad_to(SECTOR_BYTES);
            Ok(buf.write_to(&mut sink)?)
        });
        if let Some(n) = flushed {
            errs.add_bytes(n);
        }

        errs.finish()
    }

    /// The slot at `local`, absent or not.
    pub fn slot(&self, local: LocalCoord) -> &Slot {
        &self.slots[local.index()]
    }

    /// All 1024 slots in index order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Occupied slots with their coordinates, in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (LocalCoord, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_absent())
            .filter_map(|(index, slot)| LocalCoord::from_index(index).ok().map(|c| (c, slot)))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_absent()).count()
    }

    /// True when no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded payload at `local`; `None` for absent slots and for slots
    /// whose payload failed to decode.
    pub fn payload(&self, local: LocalCoord) -> Option<&ChunkPayload> {
        self.slot(local).payload.as_ref()
    }

    /// Mutable payload at `local`. Changes are re-encoded on the next write.
    pub fn payload_mut(&mut self, local: LocalCoord) -> Option<&mut ChunkPayload> {
        self.slots[local.index()].payload.as_mut()
    }

    /// Overwrite the timestamp word at `local` without touching its payload.
    pub fn set_timestamp(&mut self, local: LocalCoord, timestamp: SlotTimestamp) {
        self.slots[local.index()].timestamp = timestamp;
    }

    /// Store a payload in a slot and stamp it with the current time.
    ///
    /// The slot keeps its sector run if the new payload fits, otherwise it
    /// is placed after the last used sector. Returns the previous payload.
    pub fn set_payload(
        &mut self,
        local: LocalCoord,
        mut payload: ChunkPayload,
    ) -> Result<Option<ChunkPayload>, RegionError> {
        let chunk = payload.encode()?;
        let sectors = sector_count(&chunk)?;
        payload.set_declared_length(chunk.declared_length()?);

        let index = local.index();
        let current = self.slots[index].location;
        let offset = if !current.is_absent() && current.sectors() >= sectors {
            current.location()
        } else {
            self.next_free_sector()
        };
        let location = place(offset, sectors)?;

        let slot = &mut self.slots[index];
        slot.location = location;
        slot.timestamp.touch();
        Ok(slot.payload.replace(payload))
    }

    /// Store a tag tree using the configured compression.
    pub fn insert(
        &mut self,
        local: LocalCoord,
        root: NamedTag,
    ) -> Result<Option<ChunkPayload>, RegionError> {
        let payload = ChunkPayload::new(self.config.compression, root);
        self.set_payload(local, payload)
    }

    /// Clear a slot, returning its payload.
    pub fn remove(&mut self, local: LocalCoord) -> Option<ChunkPayload> {
        let slot = &mut self.slots[local.index()];
        slot.location.clear();
        slot.timestamp = SlotTimestamp::default();
        slot.payload.take()
    }

    /// First sector past every occupied run, never inside the header.
    fn next_free_sector(&self) -> u32 {
        self.slots
            .iter()
            .filter(|s| !s.is_absent())
            .map(|s| s.location.end_sector())
            .max()
            .unwrap_or(HEADER_SECTORS)
            .max(HEADER_SECTORS)
    }
}

fn empty_slots() -> Box<[Slot]> {
    vec![Slot::default(); SLOT_COUNT].into_boxed_slice()
}

/// A location for `sectors` sectors at `offset`, if the word can address it.
fn place(offset: u32, sectors: u8) -> Result<PackedSlotLocation, RegionError> {
    PackedSlotLocation::checked(offset, sectors)
        .ok_or(RegionError::OutOfSectors { sector: offset })
}

fn overlaps(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

fn sector_count(chunk: &EncodedChunk) -> Result<u8, RegionError> {
    let sectors = chunk.sectors();
    u8::try_from(sectors).map_err(|_| RegionError::ChunkTooLarge { sectors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::Compression;
    use regionkit_nbt::Compound;

    fn root(tag: i32) -> NamedTag {
        let mut c = Compound::new();
        c.insert("tag", tag);
        NamedTag::new("", c)
    }

    fn at(x: i32, z: i32) -> LocalCoord {
        LocalCoord::new(x, z).unwrap()
    }

    #[test]
    fn new_region_is_empty() {
        let region = RegionFile::new();
        assert_eq!(region.slots().len(), SLOT_COUNT);
        assert!(region.is_empty());
        assert!(region.slots().iter().all(Slot::is_absent));
    }

    #[test]
    fn insert_places_after_header_then_appends() {
        let mut region = RegionFile::new();
        region.insert(at(0, 0), root(1)).unwrap();
        region.insert(at(1, 0), root(2)).unwrap();

        let first = region.slot(at(0, 0)).location;
        let second = region.slot(at(1, 0)).location;
        assert_eq!((first.location(), first.sectors()), (2, 1));
        assert_eq!((second.location(), second.sectors()), (3, 1));
        assert_eq!(region.len(), 2);
        assert!(region.slot(at(0, 0)).timestamp.raw() > 0);
    }

    #[test]
    fn replacing_a_payload_reuses_its_run() {
        let mut region = RegionFile::new();
        region.insert(at(4, 4), root(1)).unwrap();
        let before = region.slot(at(4, 4)).location;
        let old = region.insert(at(4, 4), root(2)).unwrap();
        assert_eq!(old.map(|p| p.into_root()), Some(root(1)));
        assert_eq!(region.slot(at(4, 4)).location, before);
    }

    #[test]
    fn remove_clears_slot() {
        let mut region = RegionFile::new();
        region.insert(at(31, 31), root(7)).unwrap();
        let removed = region.remove(at(31, 31)).unwrap();
        assert_eq!(removed.root(), &root(7));
        assert!(region.slot(at(31, 31)).is_absent());
        assert!(region.payload(at(31, 31)).is_none());
    }

    #[test]
    fn occupied_reports_coordinates() {
        let mut region = RegionFile::new();
        region.insert(at(5, 2), root(0)).unwrap();
        let coords: Vec<_> = region.occupied().map(|(c, _)| c.index()).collect();
        assert_eq!(coords, [69]);
    }

    #[test]
    fn grown_payload_moves_past_kept_runs() {
        let mut region = RegionFile::new();
        region.insert(at(0, 0), root(1)).unwrap();
        region.insert(at(1, 0), root(2)).unwrap();
        region
            .payload_mut(at(0, 0))
            .unwrap()
            .root_mut()
            .compound_mut()
            .unwrap()
            .insert("Blob", regionkit_nbt::Tag::ByteArray(vec![1; 5000]));
        region.payload_mut(at(0, 0)).unwrap().set_compression(Compression::None);

        let mut out = Vec::new();
        region.write_to(&mut out).unwrap();
        let moved = region.slot(at(0, 0)).location;
        let kept = region.slot(at(1, 0)).location;
        assert_eq!((kept.location(), kept.sectors()), (3, 1));
        assert_eq!((moved.location(), moved.sectors()), (4, 2));
        assert_eq!(out.len() as u64, 6 * SECTOR_BYTES);
    }

    #[test]
    fn overlapping_runs_are_separated_on_write() {
        let mut region = RegionFile::new();
        region.insert(at(0, 0), root(1)).unwrap();
        region.insert(at(1, 0), root(2)).unwrap();
        region.slots[1].location = PackedSlotLocation::new(2, 1);

        let mut out = Vec::new();
        region.write_to(&mut out).unwrap();
        assert_eq!(region.slot(at(0, 0)).location, PackedSlotLocation::new(2, 1));
        assert_eq!(region.slot(at(1, 0)).location, PackedSlotLocation::new(3, 1));

        let mut reread = RegionFile::new();
        reread.read_from(&out[..]).unwrap();
        assert_eq!(reread.payload(at(1, 0)).unwrap().root(), &root(2));
    }

    #[test]
    fn set_payload_past_last_sector_is_rejected() {
        let mut region = RegionFile::new();
        region.insert(at(0, 0), root(1)).unwrap();
        region.slots[0].location = PackedSlotLocation::new(PackedSlotLocation::MAX_OFFSET, 1);

        let err = region.insert(at(1, 0), root(2)).unwrap_err();
        assert!(matches!(err, RegionError::OutOfSectors { sector: 0x100_0000 }));
        assert!(region.slot(at(1, 0)).is_absent());
        assert!(region.payload(at(1, 0)).is_none());
    }

    #[test]
    fn occupied_slot_without_payload_fails_layout() {
        let mut region = RegionFile::new();
        region.insert(at(0, 0), root(1)).unwrap();
        region.slots[1].location = PackedSlotLocation::new(9, 1);

        let mut out = Vec::new();
        let err = region.write_to(&mut out).unwrap_err();
        assert_eq!(err.len(), 1);
        let failure = err.find(Phase::Layout, 1).unwrap();
        assert!(matches!(failure.source, RegionError::MissingPayload));

        // The rest of the file was still written.
        assert_eq!(out.len() as u64, 3 * SECTOR_BYTES);
        assert_eq!(err.bytes_processed(), out.len() as u64);
    }
}
