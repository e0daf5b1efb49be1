//! In-memory backing buffer with bounded, offset-addressed sub-views.
//!
//! Slot payloads live at arbitrary sector offsets; [`RangedBuffer::range`]
//! lets each one be decoded or encoded through its own window without a
//! shared forward cursor.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Backing bytes plus a sequential cursor.
///
/// In append mode, writes past the end grow the buffer and zero-fill any gap;
/// otherwise writes are confined to the existing length.
#[derive(Debug, Clone, Default)]
pub struct RangedBuffer {
    data: Vec<u8>,
    pos: u64,
    append: bool,
}

impl RangedBuffer {
    /// An empty, fixed-size buffer. Combine with
    /// [`RangedBuffer::append_mode`] to build output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing bytes with the cursor at 0.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            append: false,
        }
    }

    /// Drain `reader` into memory.
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::from_bytes(data))
    }

    /// Let writes past the end grow the buffer.
    pub fn append_mode(mut self) -> Self {
        self.append = true;
        self
    }

    pub fn is_append(&self) -> bool {
        self.append
    }

    /// Length of the backing bytes, independent of the cursor.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole backing buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Give back the backing bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Window over `[offset, offset + length)` with its own cursor at 0.
    pub fn range(&mut self, offset: u64, length: u64) -> Range<'_> {
        Range {
            buf: self,
            start: offset,
            len: length,
            pos: 0,
        }
    }

    /// Zero-pad to the next multiple of `align`. Never shrinks.
    pub fn pad_to(&mut self, align: u64) {
        if align == 0 {
            return;
        }
        let len = self.len();
        let padded = len.div_ceil(align) * align;
        self.data.resize(padded as usize, 0);
    }

    /// Copy the whole buffer to `writer`, ignoring the cursor.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<u64> {
        writer.write_all(&self.data)?;
        writer.flush()?;
        Ok(self.len())
    }

    fn read_at(&self, pos: u64, limit: u64, out: &mut [u8]) -> usize {
        let end = limit.min(self.len());
        if pos >= end {
            return 0;
        }
        let n = (out.len() as u64).min(end - pos) as usize;
        let start = pos as usize;
        out[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }

    fn write_at(&mut self, pos: u64, limit: u64, src: &[u8]) -> usize {
        let room = limit.saturating_sub(pos);
        let mut n = (src.len() as u64).min(room);
        if n == 0 {
            return 0;
        }
        let end = pos + n;
        if end > self.len() {
            if self.append {
                self.data.resize(end as usize, 0);
            } else {
                n = self.len().saturating_sub(pos);
                if n == 0 {
                    return 0;
                }
            }
        }
        let start = pos as usize;
        let n = n as usize;
        self.data[start..start + n].copy_from_slice(&src[..n]);
        n
    }
}

fn seek_target(base: u64, len: u64, pos: SeekFrom) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(n) => Some(n),
        SeekFrom::End(delta) => len.checked_add_signed(delta),
        SeekFrom::Current(delta) => base.checked_add_signed(delta),
    };
    target.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek to a negative or overflowing position",
        )
    })
}

impl Read for RangedBuffer {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(self.pos, u64::MAX, out);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for RangedBuffer {
    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        let n = self.write_at(self.pos, u64::MAX, src);
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for RangedBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = seek_target(self.pos, self.len(), pos)?;
        Ok(self.pos)
    }
}

/// Bounded view returned by [`RangedBuffer::range`]. Positions are relative
/// to the window start; reads stop at the window end or the end of data,
/// writes past the window end are short.
#[derive(Debug)]
pub struct Range<'a> {
    buf: &'a mut RangedBuffer,
    start: u64,
    len: u64,
    pos: u64,
}

impl Range<'_> {
    /// Absolute start of the window in the backing buffer.
    pub fn offset(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cursor relative to the window start.
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn absolute(&self) -> u64 {
        self.start.saturating_add(self.pos)
    }

    fn limit(&self) -> u64 {
        self.start.saturating_add(self.len)
    }
}

impl Read for Range<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.buf.read_at(self.absolute(), self.limit(), out);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for Range<'_> {
    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        let n = self.buf.write_at(self.absolute(), self.limit(), src);
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Range<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = seek_target(self.pos, self.len, pos)?;
        Ok(self.pos)
    }
}
