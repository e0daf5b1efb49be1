use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

use crate::tag::{Compound, List, NamedTag, Tag, TagKind};
use crate::{NbtError, Result, mutf8};

/// Nesting limit applied by [`Decoder::new`].
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Upper bound on speculative preallocation from untrusted length prefixes.
const PREALLOC_LIMIT: usize = 4096;

/// Streaming decoder for a single named root tag.
pub struct Decoder<R> {
    reader: R,
    max_depth: usize,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Decode the root: tag id, name, payload.
    pub fn decode(&mut self) -> Result<NamedTag> {
        let kind = TagKind::try_from(self.reader.read_u8()?)?;
        if kind == TagKind::End {
            return Err(NbtError::UnexpectedEnd);
        }
        let name = self.read_string()?;
        tracing::trace!(%kind, name = %name, "decoding root tag");
        let tag = self.read_payload(kind, 0)?;
        Ok(NamedTag { name, tag })
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_payload(&mut self, kind: TagKind, depth: usize) -> Result<Tag> {
        if depth > self.max_depth {
            tracing::debug!(depth, limit = self.max_depth, "tag nesting too deep");
            return Err(NbtError::DepthLimit(self.max_depth));
        }
        Ok(match kind {
            TagKind::End => return Err(NbtError::UnexpectedEnd),
            TagKind::Byte => Tag::Byte(self.reader.read_i8()?),
            TagKind::Short => Tag::Short(self.reader.read_i16::<BigEndian>()?),
            TagKind::Int => Tag::Int(self.reader.read_i32::<BigEndian>()?),
            TagKind::Long => Tag::Long(self.reader.read_i64::<BigEndian>()?),
            TagKind::Float => Tag::Float(self.reader.read_f32::<BigEndian>()?),
            TagKind::Double => Tag::Double(self.reader.read_f64::<BigEndian>()?),
            TagKind::ByteArray => {
                let len = self.read_len(kind)?;
                let bytes = self.read_bytes(kind, len)?;
                Tag::ByteArray(bytes.into_iter().map(|b| b as i8).collect())
            }
            TagKind::String => Tag::String(self.read_string()?),
            TagKind::List => {
                let element = TagKind::try_from(self.reader.read_u8()?)?;
                let len = self.read_len(kind)?;
                // Empty lists may carry any element id, including End.
                if element == TagKind::End && len > 0 {
                    return Err(NbtError::UnexpectedEnd);
                }
                let mut items = Vec::with_capacity(len.min(PREALLOC_LIMIT));
                for _ in 0..len {
                    items.push(self.read_payload(element, depth + 1)?);
                }
                Tag::List(List::from_items(element, items)?)
            }
            TagKind::Compound => {
                let mut compound = Compound::new();
                loop {
                    let child = TagKind::try_from(self.reader.read_u8()?)?;
                    if child == TagKind::End {
                        break;
                    }
                    let name = self.read_string()?;
                    let tag = self.read_payload(child, depth + 1)?;
                    compound.push_raw(name, tag);
                }
                Tag::Compound(compound)
            }
            TagKind::IntArray => {
                let len = self.read_len(kind)?;
                let mut values = Vec::with_capacity(len.min(PREALLOC_LIMIT));
                for _ in 0..len {
                    values.push(self.reader.read_i32::<BigEndian>()?);
                }
                Tag::IntArray(values)
            }
            TagKind::LongArray => {
                let len = self.read_len(kind)?;
                let mut values = Vec::with_capacity(len.min(PREALLOC_LIMIT));
                for _ in 0..len {
                    values.push(self.reader.read_i64::<BigEndian>()?);
                }
                Tag::LongArray(values)
            }
        })
    }

    fn read_len(&mut self, kind: TagKind) -> Result<usize> {
        let length = self.reader.read_i32::<BigEndian>()?;
        if length < 0 {
            return Err(NbtError::NegativeLength { kind, length });
        }
        Ok(length as usize)
    }

    fn read_bytes(&mut self, kind: TagKind, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        let actual = (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        if actual != len {
            return Err(NbtError::Truncated {
                kind,
                expected: len,
                actual,
            });
        }
        Ok(buf)
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.reader.read_u16::<BigEndian>()? as usize;
        let bytes = self.read_bytes(TagKind::String, len)?;
        mutf8::decode(&bytes)
    }
}

/// Decode a root tag from an in-memory buffer.
pub fn from_bytes(bytes: &[u8]) -> Result<NamedTag> {
    Decoder::new(bytes).decode()
}
