use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

use crate::tag::{NamedTag, Tag, TagKind};
use crate::{NbtError, Result, mutf8};

/// Encoder for a single named root tag.
pub struct Encoder<W> {
    writer: W,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn encode(&mut self, root: &NamedTag) -> Result<()> {
        self.writer.write_u8(root.tag.kind() as u8)?;
        self.write_string(&root.name)?;
        self.write_payload(&root.tag)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_payload(&mut self, tag: &Tag) -> Result<()> {
        match tag {
            Tag::Byte(v) => self.writer.write_i8(*v)?,
            Tag::Short(v) => self.writer.write_i16::<BigEndian>(*v)?,
            Tag::Int(v) => self.writer.write_i32::<BigEndian>(*v)?,
            Tag::Long(v) => self.writer.write_i64::<BigEndian>(*v)?,
            Tag::Float(v) => self.writer.write_f32::<BigEndian>(*v)?,
            Tag::Double(v) => self.writer.write_f64::<BigEndian>(*v)?,
            Tag::ByteArray(values) => {
                self.write_len(values.len())?;
                let bytes: Vec<u8> = values.iter().map(|&b| b as u8).collect();
                self.writer.write_all(&bytes)?;
            }
            Tag::String(s) => self.write_string(s)?,
            Tag::List(list) => {
                self.writer.write_u8(list.kind() as u8)?;
                self.write_len(list.len())?;
                for item in list.iter() {
                    if item.kind() != list.kind() {
                        return Err(NbtError::MixedList {
                            expected: list.kind(),
                            found: item.kind(),
                        });
                    }
                    self.write_payload(item)?;
                }
            }
            Tag::Compound(compound) => {
                for (name, child) in compound.iter() {
                    self.writer.write_u8(child.kind() as u8)?;
                    self.write_string(name)?;
                    self.write_payload(child)?;
                }
                self.writer.write_u8(TagKind::End as u8)?;
            }
            Tag::IntArray(values) => {
                self.write_len(values.len())?;
                for v in values {
                    self.writer.write_i32::<BigEndian>(*v)?;
                }
            }
            Tag::LongArray(values) => {
                self.write_len(values.len())?;
                for v in values {
                    self.writer.write_i64::<BigEndian>(*v)?;
                }
            }
        }
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len).map_err(|_| NbtError::TooManyElements(len))?;
        self.writer.write_i32::<BigEndian>(len)?;
        Ok(())
    }

    fn write_string(&mut self, s: &str) -> Result<()> {
        let bytes = mutf8::encode(s);
        let len = u16::try_from(bytes.len()).map_err(|_| NbtError::StringTooLong(bytes.len()))?;
        self.writer.write_u16::<BigEndian>(len)?;
        self.writer.write_all(&bytes)?;
        Ok(())
    }
}

/// Encode a root tag into a fresh buffer.
pub fn to_bytes(root: &NamedTag) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(Vec::new());
    encoder.encode(root)?;
    Ok(encoder.into_inner())
}
