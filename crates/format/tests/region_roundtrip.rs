//! End-to-end behavior of region reads and writes: round trips, truncated
//! sources, and per-slot failure attribution.

use regionkit_common::{LocalCoord, RegionCoord, SLOT_COUNT};
use regionkit_format::nbt::{Compound, List, NamedTag, Tag, TagKind};
use regionkit_format::{
    AggregateMode, ChunkPayload, Compression, HEADER_BYTES, PAYLOAD_HEADER_BYTES,
    PackedSlotLocation, Phase, RegionConfig, RegionError, RegionFile, SECTOR_BYTES,
    SlotTimestamp,
};

fn chunk_root(x: i32, z: i32) -> NamedTag {
    let mut level = Compound::new();
    level.insert("xPos", x);
    level.insert("zPos", z);
    level.insert("LastUpdate", (x as i64) * 1000 + z as i64);
    level.insert("Biomes", Tag::ByteArray(vec![(x % 100) as i8; 256]));

    let mut ticks = List::new(TagKind::Compound);
    let mut tick = Compound::new();
    tick.insert("i", 1);
    tick.insert("t", -1);
    ticks.push(Tag::Compound(tick)).unwrap();
    level.insert("TileTicks", ticks);

    let mut root = Compound::new();
    root.insert("DataVersion", 1343);
    root.insert("Level", level);
    NamedTag::new("", root)
}

fn at(index: usize) -> LocalCoord {
    LocalCoord::from_index(index).unwrap()
}

/// A region with every slot occupied.
fn full_region() -> RegionFile {
    let mut region = RegionFile::new();
    for index in 0..SLOT_COUNT {
        let local = at(index);
        region.insert(local, chunk_root(local.x(), local.z())).unwrap();
        region.set_timestamp(local, SlotTimestamp::new(1_570_215_596 + index as u32));
    }
    region
}

fn write(region: &mut RegionFile) -> Vec<u8> {
    let mut out = Vec::new();
    region.write_to(&mut out).unwrap();
    out
}

#[test]
fn write_then_read_roundtrips_occupied_slots() {
    let mut region = RegionFile::new();
    let picks = [(0, 0, Compression::Zlib), (5, 2, Compression::Gzip), (31, 31, Compression::None)];
    for (x, z, compression) in picks {
        let local = LocalCoord::new(x, z).unwrap();
        let payload = ChunkPayload::new(compression, chunk_root(x, z));
        region.set_payload(local, payload).unwrap();
        region.set_timestamp(local, SlotTimestamp::new(42 + x as u32));
    }

    let bytes = write(&mut region);
    assert_eq!(bytes.len() as u64 % SECTOR_BYTES, 0);

    let mut reread = RegionFile::new();
    let n = reread.read_from(&bytes[..]).unwrap();
    assert!(n > HEADER_BYTES);
    assert_eq!(reread.len(), 3);

    for (x, z, compression) in picks {
        let local = LocalCoord::new(x, z).unwrap();
        let (a, b) = (region.slot(local), reread.slot(local));
        assert_eq!(a.location, b.location, "location at {local}");
        assert_eq!(a.timestamp, b.timestamp, "timestamp at {local}");
        assert_eq!(a.payload, b.payload, "payload at {local}");
        assert_eq!(b.payload.as_ref().unwrap().compression(), compression);
    }
}

#[test]
fn write_keeps_existing_locations() {
    let mut region = RegionFile::new();
    region.insert(LocalCoord::new(3, 0).unwrap(), chunk_root(3, 0)).unwrap();
    region.insert(LocalCoord::new(1, 0).unwrap(), chunk_root(1, 0)).unwrap();
    let before: Vec<_> = region.slots().iter().map(|s| s.location).collect();
    write(&mut region);

    let after: Vec<_> = region.slots().iter().map(|s| s.location).collect();
    assert_eq!(before, after);
    assert_eq!(region.slot(LocalCoord::new(3, 0).unwrap()).location.location(), 2);
    assert_eq!(region.slot(LocalCoord::new(1, 0).unwrap()).location.location(), 3);
}

/// A file whose only chunk sits at sector 5, leaving sectors 2..5 unused.
fn gapped_file() -> (Vec<u8>, NamedTag) {
    let root = chunk_root(0, 0);
    let chunk = ChunkPayload::new(Compression::None, root.clone()).encode().unwrap();

    let mut bytes = vec![0u8; 6 * SECTOR_BYTES as usize];
    bytes[..4].copy_from_slice(&PackedSlotLocation::new(5, 1).raw().to_be_bytes());
    bytes[4096..4100].copy_from_slice(&1_600_000_000u32.to_be_bytes());
    chunk
        .write_to(&mut &mut bytes[5 * SECTOR_BYTES as usize..])
        .unwrap();
    (bytes, root)
}

#[test]
fn read_write_read_preserves_gaps() {
    let (bytes, root) = gapped_file();
    let mut region = RegionFile::new();
    region.read_from(&bytes[..]).unwrap();
    let before = region.slot(at(0)).location;
    assert_eq!((before.location(), before.sectors()), (5, 1));

    let rewritten = write(&mut region);
    assert_eq!(rewritten, bytes);

    let mut reread = RegionFile::new();
    reread.read_from(&rewritten[..]).unwrap();
    assert_eq!(reread.slot(at(0)).location, before);
    assert_eq!(reread.slot(at(0)).timestamp, SlotTimestamp::new(1_600_000_000));
    assert_eq!(reread.payload(at(0)).unwrap().root(), &root);
}

#[test]
fn empty_region_is_header_only() {
    let mut region = RegionFile::new();
    let bytes = write(&mut region);
    assert_eq!(bytes.len() as u64, HEADER_BYTES);
    assert!(bytes.iter().all(|&b| b == 0));

    let mut reread = RegionFile::new();
    assert_eq!(reread.read_from(&bytes[..]).unwrap(), HEADER_BYTES);
    assert!(reread.is_empty());
}

#[test]
fn short_source_fails_tables_without_panicking() {
    let mut region = RegionFile::new();
    let err = region.read_from(&[0u8; 100][..]).unwrap_err();

    // 25 location words decode; the other 999 and all 1024 timestamps fail.
    assert_eq!(err.len(), 999 + 1024);
    assert_eq!(err.bytes_processed(), 100);
    assert!(err.failures().iter().all(|f| matches!(f.source, RegionError::Io(_))));
    assert!(err.find(Phase::Locations, 25).is_some());
    assert!(err.find(Phase::Locations, 24).is_none());
    assert!(err.find(Phase::Timestamps, 0).is_some());
    assert!(region.is_empty());
}

fn corrupt_compression(bytes: &mut [u8], region: &RegionFile, index: usize) {
    let offset = region.slot(at(index)).location.byte_offset() as usize;
    bytes[offset + 4] = 0x7F;
}

fn expected_bytes(region: &RegionFile, skip: usize) -> u64 {
    let payloads: u64 = (0..SLOT_COUNT)
        .filter(|&i| i != skip)
        .map(|i| {
            let payload = region.payload(at(i)).unwrap();
            PAYLOAD_HEADER_BYTES + payload.declared_length() as u64
        })
        .sum();
    HEADER_BYTES + payloads
}

#[test]
fn bad_compression_is_attributed_to_its_slot() {
    let mut region = full_region();
    let mut bytes = write(&mut region);
    corrupt_compression(&mut bytes, &region, 17);

    let mut reread = RegionFile::new();
    let err = reread.read_from(&bytes[..]).unwrap_err();

    assert_eq!(err.len(), 1);
    let failure = err.find(Phase::Payloads, 17).unwrap();
    assert!(matches!(failure.source, RegionError::UnsupportedCompression(0x7F)));

    // Every other slot was attempted and decoded independently.
    assert_eq!(err.attempted(), 1 + 2 * SLOT_COUNT + SLOT_COUNT);
    for index in (0..17).chain(18..SLOT_COUNT) {
        assert_eq!(reread.payload(at(index)), region.payload(at(index)), "slot {index}");
    }
    assert!(reread.payload(at(17)).is_none());
    assert!(!reread.slot(at(17)).is_absent());
}

#[test]
fn single_corrupt_slot_reports_remaining_bytes() {
    let mut region = full_region();
    let mut bytes = write(&mut region);
    corrupt_compression(&mut bytes, &region, 0);

    let mut reread = RegionFile::new();
    let err = reread.read_from(&bytes[..]).unwrap_err();

    assert_eq!(err.len(), 1);
    assert_eq!(err.failures()[0].index, 0);
    assert_eq!(err.bytes_processed(), expected_bytes(&region, 0));
    assert_eq!(reread.len(), SLOT_COUNT);
}

#[test]
fn fail_fast_stops_at_first_bad_slot() {
    let mut region = full_region();
    let mut bytes = write(&mut region);
    corrupt_compression(&mut bytes, &region, 17);

    let config = RegionConfig {
        mode: AggregateMode::FailFast,
        ..RegionConfig::default()
    };
    let mut reread = RegionFile::with_config(config);
    let err = reread.read_from(&bytes[..]).unwrap_err();

    assert_eq!(err.len(), 1);
    assert!(reread.payload(at(16)).is_some());
    assert!(reread.payload(at(18)).is_none());
}

#[test]
fn rewrite_recompresses_payloads() {
    let mut region = full_region();
    let original = write(&mut region);

    let mut reread = RegionFile::new();
    reread.read_from(&original[..]).unwrap();
    for index in 0..SLOT_COUNT {
        reread
            .payload_mut(at(index))
            .unwrap()
            .set_compression(Compression::None);
    }
    let rewritten = write(&mut reread);
    assert_eq!(rewritten[HEADER_BYTES as usize + 4], Compression::None.tag());

    let mut last = RegionFile::new();
    last.read_from(&rewritten[..]).unwrap();
    for index in 0..SLOT_COUNT {
        let payload = last.payload(at(index)).unwrap();
        assert_eq!(payload.compression(), Compression::None);
        assert_eq!(payload.root(), region.payload(at(index)).unwrap().root());
    }
}

#[test]
fn save_and_open_through_the_filesystem() {
    let tmp = tempfile::tempdir().unwrap();
    let coord = RegionCoord::new(-1, 2);
    let path = tmp.path().join(coord.file_name());

    let mut region = RegionFile::new();
    let local = LocalCoord::new(7, 9).unwrap();
    region.insert(local, chunk_root(7, 9)).unwrap();
    let written = region.save(&path).unwrap();
    assert_eq!(written, std::fs::metadata(&path).unwrap().len());

    let opened = RegionFile::open(&path, RegionConfig::default()).unwrap();
    assert_eq!(opened.payload(local), region.payload(local));

    let name = path.file_name().unwrap().to_str().unwrap();
    assert_eq!(RegionCoord::from_file_name(name), Some(coord));
}

#[test]
fn open_surfaces_aggregate_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("r.0.0.mca");
    std::fs::write(&path, [0u8; 16]).unwrap();

    match RegionFile::open(&path, RegionConfig::default()) {
        Err(RegionError::Aggregate(err)) => assert_eq!(err.bytes_processed(), 16),
        other => panic!("expected aggregate error, got {other:?}"),
    }
}
