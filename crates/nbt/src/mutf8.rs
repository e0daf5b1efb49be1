//! Java modified UTF-8: NUL is written as `C0 80` and characters outside the
//! BMP are written as two three-byte surrogate halves.

use std::borrow::Cow;

use crate::NbtError;

pub(crate) fn decode(bytes: &[u8]) -> Result<String, NbtError> {
    // Plain ASCII without NUL is identical in both encodings.
    if bytes.iter().all(|&b| b != 0 && b < 0x80) {
        return String::from_utf8(bytes.to_vec()).map_err(|_| NbtError::InvalidString);
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        if b0 < 0x80 {
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            units.push(((b0 & 0x1F) << 6) | b1);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            units.push(((b0 & 0x0F) << 12) | (b1 << 6) | b2);
            i += 3;
        } else {
            return Err(NbtError::InvalidString);
        }
    }
    String::from_utf16(&units).map_err(|_| NbtError::InvalidString)
}

fn continuation(bytes: &[u8], at: usize) -> Result<u16, NbtError> {
    match bytes.get(at) {
        Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(NbtError::InvalidString),
    }
}

pub(crate) fn encode(s: &str) -> Cow<'_, [u8]> {
    if s.bytes().all(|b| b != 0 && b < 0x80) {
        return Cow::Borrowed(s.as_bytes());
    }

    let mut out = Vec::with_capacity(s.len() + 8);
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    Cow::Owned(out)
}
