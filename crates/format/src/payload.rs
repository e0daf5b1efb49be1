use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use regionkit_common::MEBIBYTE;
use regionkit_nbt::{Decoder, NamedTag, to_bytes};
use std::io::{self, Read, Write};

use crate::compression::Compression;
use crate::slot::SECTOR_BYTES;
use crate::RegionError;

/// Length word plus compression byte.
pub const PAYLOAD_HEADER_BYTES: u64 = 5;

/// Upper bound on a payload's decompressed size.
pub const MAX_DECOMPRESSED_BYTES: u64 = 64 * MEBIBYTE;

/// One slot's record: declared length, compression tag and the decoded root.
///
/// The declared length counts the compression byte and the compressed body,
/// matching what the writer produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPayload {
    length: u32,
    compression: Compression,
    root: NamedTag,
}

impl ChunkPayload {
    /// A payload that has not been written yet; its length is set on encode.
    pub fn new(compression: Compression, root: NamedTag) -> Self {
        Self {
            length: 0,
            compression,
            root,
        }
    }

    /// Decode a record through `reader`, returning it with the bytes it
    /// accounts for: `4 + 1 + declared length`, whatever the decoder consumed.
    pub fn read_from<R: Read>(reader: &mut R, max_depth: usize) -> Result<(Self, u64), RegionError> {
        Self::read_limited(reader, max_depth, MAX_DECOMPRESSED_BYTES)
    }

    pub(crate) fn read_limited<R: Read>(
        reader: &mut R,
        max_depth: usize,
        max_bytes: u64,
    ) -> Result<(Self, u64), RegionError> {
        let length = reader.read_u32::<BigEndian>()?;
        let tag = reader.read_u8()?;
        let compression = Compression::try_from(tag)?;
        if length == 0 {
            return Err(RegionError::InvalidLength(length));
        }

        let body = reader.by_ref().take(length as u64 - 1);
        let mut decoded = Vec::new();
        compression
            .reader(body)
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut decoded)?;
        if decoded.len() as u64 > max_bytes {
            return Err(RegionError::PayloadTooLarge { limit: max_bytes });
        }
        let root = Decoder::new(&decoded[..])
            .with_max_depth(max_depth)
            .decode()?;

        let payload = Self {
            length,
            compression,
            root,
        };
        Ok((payload, PAYLOAD_HEADER_BYTES + length as u64))
    }

    /// Re-encode the root with this payload's compression.
    pub fn encode(&self) -> Result<EncodedChunk, RegionError> {
        let raw = to_bytes(&self.root)?;
        let body = self.compression.compress(&raw)?;
        Ok(EncodedChunk {
            compression: self.compression,
            body,
        })
    }

    /// Encode and write header plus body, updating the declared length.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> Result<u64, RegionError> {
        let chunk = self.encode()?;
        self.length = chunk.declared_length()?;
        Ok(chunk.write_to(writer)?)
    }

    /// Declared length as last read or written; 0 for a fresh payload.
    pub fn declared_length(&self) -> u32 {
        self.length
    }

    pub(crate) fn set_declared_length(&mut self, length: u32) {
        self.length = length;
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    pub fn root(&self) -> &NamedTag {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut NamedTag {
        &mut self.root
    }

    pub fn into_root(self) -> NamedTag {
        self.root
    }
}

/// A payload compressed and ready to be placed in sectors.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    compression: Compression,
    body: Vec<u8>,
}

impl EncodedChunk {
    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Compression byte plus body.
    pub fn declared_length(&self) -> Result<u32, RegionError> {
        u32::try_from(self.body.len() + 1).map_err(|_| RegionError::ChunkTooLarge {
            sectors: self.sectors(),
        })
    }

    /// Bytes on disk, before sector padding.
    pub fn byte_len(&self) -> u64 {
        PAYLOAD_HEADER_BYTES + self.body.len() as u64
    }

    pub fn sectors(&self) -> u64 {
        self.byte_len().div_ceil(SECTOR_BYTES)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<u64> {
        let length = u32::try_from(self.body.len() + 1)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload exceeds u32 length"))?;
        writer.write_u32::<BigEndian>(length)?;
        writer.write_u8(self.compression.tag())?;
        writer.write_all(&self.body)?;
        Ok(self.byte_len())
    }
}
