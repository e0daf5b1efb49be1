use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use regionkit_common::KIBIBYTE;
use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sector size, used both for a location's offset and for its length.
pub const SECTOR_BYTES: u64 = 4 * KIBIBYTE;

/// The location and timestamp tables occupy the first two sectors.
pub const HEADER_SECTORS: u32 = 2;

pub const HEADER_BYTES: u64 = HEADER_SECTORS as u64 * SECTOR_BYTES;

const COUNT_BITS: u32 = 8;
const COUNT_MASK: u32 = 0xFF;
const OFFSET_MASK: u32 = 0x00FF_FFFF;

/// One location table word: sector offset in the high 24 bits, sector count
/// in the low 8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PackedSlotLocation(u32);

impl PackedSlotLocation {
    pub const ENCODED_LEN: u64 = 4;

    /// Largest sector offset a location word can hold.
    pub const MAX_OFFSET: u32 = OFFSET_MASK;

    /// Pack an offset and count. Offsets wider than 24 bits are truncated;
    /// see [`PackedSlotLocation::checked`].
    pub fn new(offset: u32, sectors: u8) -> Self {
        let mut location = Self(0);
        location.set_location(offset);
        location.set_sectors(sectors);
        location
    }

    /// Like [`PackedSlotLocation::new`], but `None` when `offset` does not
    /// fit in 24 bits.
    pub fn checked(offset: u32, sectors: u8) -> Option<Self> {
        (offset <= Self::MAX_OFFSET).then(|| Self::new(offset, sectors))
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self(reader.read_u32::<BigEndian>()?))
    }

    pub fn write_to<W: Write>(self, writer: &mut W) -> io::Result<u64> {
        writer.write_u32::<BigEndian>(self.0)?;
        Ok(Self::ENCODED_LEN)
    }

    /// Replace the offset, keeping the sector count. Offsets wider than
    /// 24 bits are truncated.
    pub fn set_location(&mut self, offset: u32) {
        self.0 = ((offset & OFFSET_MASK) << COUNT_BITS) | (self.0 & COUNT_MASK);
    }

    /// Sector offset from the start of the file.
    pub fn location(self) -> u32 {
        self.0 >> COUNT_BITS
    }

    /// Replace the sector count, keeping the offset.
    pub fn set_sectors(&mut self, sectors: u8) {
        self.0 = (self.0 & !COUNT_MASK) | sectors as u32;
    }

    pub fn sectors(self) -> u8 {
        (self.0 & COUNT_MASK) as u8
    }

    /// True iff the word, read as a signed 32-bit value, is below 1.
    pub fn is_absent(self) -> bool {
        (self.0 as i32) < 1
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn byte_offset(self) -> u64 {
        self.location() as u64 * SECTOR_BYTES
    }

    pub fn byte_len(self) -> u64 {
        self.sectors() as u64 * SECTOR_BYTES
    }

    /// First sector past this slot's run.
    pub fn end_sector(self) -> u32 {
        self.location() + self.sectors() as u32
    }
}

/// One timestamp table word. Opaque; real archives store Unix seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotTimestamp(u32);

impl SlotTimestamp {
    pub const ENCODED_LEN: u64 = 4;

    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::from_unix_secs(secs)
    }

    /// Unix seconds, saturating at `u32::MAX` past 2106.
    pub fn from_unix_secs(secs: u64) -> Self {
        Self(u32::try_from(secs).unwrap_or(u32::MAX))
    }

    /// Stamp with the current time.
    pub fn touch(&mut self) {
        *self = Self::now();
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self(reader.read_u32::<BigEndian>()?))
    }

    pub fn write_to<W: Write>(self, writer: &mut W) -> io::Result<u64> {
        writer.write_u32::<BigEndian>(self.0)?;
        Ok(Self::ENCODED_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_word_is_absent() {
        assert!(PackedSlotLocation::default().is_absent());
        assert!(PackedSlotLocation::from_raw(0x8000_0001).is_absent());
        assert!(!PackedSlotLocation::from_raw(1).is_absent());
        assert!(!PackedSlotLocation::new(2, 1).is_absent());
    }

    #[test]
    fn setters_do_not_disturb_each_other() {
        let mut loc = PackedSlotLocation::default();
        loc.set_sectors(7);
        loc.set_location(0x12_3456);
        assert_eq!(loc.sectors(), 7);
        assert_eq!(loc.location(), 0x12_3456);

        loc.set_sectors(255);
        assert_eq!(loc.location(), 0x12_3456);
        loc.set_location(2);
        assert_eq!(loc.sectors(), 255);
        assert_eq!(loc.raw(), 0x0000_02FF);
    }

    #[test]
    fn location_roundtrips_every_24_bit_boundary() {
        for v in [0, 1, 2, 255, 256, 0xFFFF, 0x7F_FFFF, OFFSET_MASK] {
            let mut loc = PackedSlotLocation::from_raw(0xAB);
            loc.set_location(v);
            assert_eq!(loc.location(), v);
            assert_eq!(loc.sectors(), 0xAB);
        }
    }

    #[test]
    fn words_are_big_endian() {
        let mut out = Vec::new();
        let n = PackedSlotLocation::new(3, 2).write_to(&mut out).unwrap();
        assert_eq!(n, 4);
        assert_eq!(out, [0, 0, 3, 2]);

        let loc = PackedSlotLocation::read_from(&mut &out[..]).unwrap();
        assert_eq!((loc.location(), loc.sectors()), (3, 2));
        assert_eq!(loc.byte_offset(), 3 * 4096);
        assert_eq!(loc.byte_len(), 2 * 4096);
        assert_eq!(loc.end_sector(), 5);

        let mut out = Vec::new();
        SlotTimestamp::new(0x0102_0304).write_to(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(SlotTimestamp::read_from(&mut &out[..]).unwrap().raw(), 0x0102_0304);
    }

    #[test]
    fn touch_moves_timestamp_forward() {
        let mut ts = SlotTimestamp::default();
        ts.touch();
        assert!(ts.raw() > 1_500_000_000);
    }

    #[test]
    fn unix_seconds_saturate() {
        assert_eq!(SlotTimestamp::from_unix_secs(1_600_000_000).raw(), 1_600_000_000);
        assert_eq!(SlotTimestamp::from_unix_secs(1 << 40).raw(), u32::MAX);
    }

    #[test]
    fn checked_rejects_offsets_past_24_bits() {
        let last = PackedSlotLocation::checked(PackedSlotLocation::MAX_OFFSET, 1).unwrap();
        assert_eq!(last.location(), 0xFF_FFFF);
        assert!(PackedSlotLocation::checked(0x100_0000, 1).is_none());
        // The unchecked constructor wraps into the header.
        assert_eq!(PackedSlotLocation::new(0x100_0002, 1).location(), 2);
    }

    #[test]
    fn short_word_is_io_error() {
        let err = PackedSlotLocation::read_from(&mut &[0u8, 1][..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
