use flate2::Compression as Level;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use crate::RegionError;

/// Payload compression tag, the byte after a payload's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Compression {
    Gzip = 1,
    #[default]
    Zlib = 2,
    None = 3,
}

impl TryFrom<u8> for Compression {
    type Error = RegionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Compression::Gzip),
            2 => Ok(Compression::Zlib),
            3 => Ok(Compression::None),
            _ => Err(RegionError::UnsupportedCompression(value)),
        }
    }
}

impl Compression {
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Wrap a raw stream in the matching decompressor.
    pub fn reader<'a, R: Read + 'a>(self, raw: R) -> Box<dyn Read + 'a> {
        match self {
            Compression::Gzip => Box::new(GzDecoder::new(raw)),
            Compression::Zlib => Box::new(ZlibDecoder::new(raw)),
            Compression::None => Box::new(raw),
        }
    }

    /// Wrap a raw stream in the matching compressor. Call
    /// [`CompressWriter::finish`] to flush the trailer.
    pub fn writer<W: Write>(self, raw: W) -> CompressWriter<W> {
        match self {
            Compression::Gzip => CompressWriter::Gzip(GzEncoder::new(raw, Level::default())),
            Compression::Zlib => CompressWriter::Zlib(ZlibEncoder::new(raw, Level::default())),
            Compression::None => CompressWriter::None(raw),
        }
    }

    pub fn compress(self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut writer = self.writer(Vec::with_capacity(data.len() / 2));
        writer.write_all(data)?;
        writer.finish()
    }

    pub fn decompress(self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.reader(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compression::Gzip => "gzip",
            Compression::Zlib => "zlib",
            Compression::None => "none",
        };
        f.write_str(name)
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "1" => Ok(Compression::Gzip),
            "zlib" | "2" => Ok(Compression::Zlib),
            "none" | "3" => Ok(Compression::None),
            other => Err(format!("unknown compression {other:?} (gzip, zlib, none)")),
        }
    }
}

/// Compressing writer returned by [`Compression::writer`].
pub enum CompressWriter<W: Write> {
    Gzip(GzEncoder<W>),
    Zlib(ZlibEncoder<W>),
    None(W),
}

impl<W: Write> CompressWriter<W> {
    pub fn finish(self) -> io::Result<W> {
        match self {
            CompressWriter::Gzip(w) => w.finish(),
            CompressWriter::Zlib(w) => w.finish(),
            CompressWriter::None(mut w) => {
                w.flush()?;
                Ok(w)
            }
        }
    }
}

impl<W: Write> Write for CompressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressWriter::Gzip(w) => w.write(buf),
            CompressWriter::Zlib(w) => w.write(buf),
            CompressWriter::None(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressWriter::Gzip(w) => w.flush(),
            CompressWriter::Zlib(w) => w.flush(),
            CompressWriter::None(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"region payload region payload region payload";

    #[test]
    fn tags_match_on_disk_values() {
        assert_eq!(Compression::Gzip.tag(), 1);
        assert_eq!(Compression::Zlib.tag(), 2);
        assert_eq!(Compression::None.tag(), 3);
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        for tag in [0u8, 4, 127, 255] {
            assert!(matches!(
                Compression::try_from(tag),
                Err(RegionError::UnsupportedCompression(t)) if t == tag
            ));
        }
    }

    #[test]
    fn every_codec_roundtrips() {
        for c in [Compression::Gzip, Compression::Zlib, Compression::None] {
            let packed = c.compress(SAMPLE).unwrap();
            assert_eq!(c.decompress(&packed).unwrap(), SAMPLE, "codec {c}");
        }
    }

    #[test]
    fn zlib_stream_has_zlib_header() {
        let packed = Compression::Zlib.compress(SAMPLE).unwrap();
        assert_eq!(packed[0], 0x78);
        let packed = Compression::Gzip.compress(SAMPLE).unwrap();
        assert_eq!(&packed[..2], &[0x1F, 0x8B]);
    }

    #[test]
    fn corrupt_stream_is_io_error() {
        assert!(Compression::Zlib.decompress(b"not zlib at all").is_err());
    }

    #[test]
    fn parses_names() {
        assert_eq!("GZIP".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert!("lz4".parse::<Compression>().is_err());
    }
}
