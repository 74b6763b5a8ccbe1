// Primitive wire encoding shared by the handshake and the event protocol
// Big-endian integers and length-prefixed "modified UTF-8" strings

use std::io::{Read, Write};

use super::error::ProtocolError;

/// Largest encoded string the two byte length prefix can describe.
pub const MAX_STRING_BYTES: usize = u16::MAX as usize;

/// Reading side of the wire format, implemented for every `Read`.
pub trait DataInput: Read {
    fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_int(&mut self) -> Result<i32, ProtocolError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_long(&mut self) -> Result<i64, ProtocolError> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    /// Reads a two byte length followed by that many bytes of modified UTF-8.
    fn read_utf(&mut self) -> Result<String, ProtocolError> {
        let mut len = [0u8; 2];
        self.read_exact(&mut len)?;
        let mut bytes = vec![0u8; u16::from_be_bytes(len) as usize];
        self.read_exact(&mut bytes)?;
        decode_modified_utf8(&bytes)
    }
}

impl<R: Read + ?Sized> DataInput for R {}

/// Writing side of the wire format, implemented for every `Write`.
pub trait DataOutput: Write {
    fn write_byte(&mut self, value: u8) -> Result<(), ProtocolError> {
        self.write_all(&[value])?;
        Ok(())
    }

    fn write_int(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_long(&mut self, value: i64) -> Result<(), ProtocolError> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_utf(&mut self, value: &str) -> Result<(), ProtocolError> {
        let bytes = encode_modified_utf8(value);
        if bytes.len() > MAX_STRING_BYTES {
            return Err(ProtocolError::StringTooLong(bytes.len()));
        }
        self.write_all(&(bytes.len() as u16).to_be_bytes())?;
        self.write_all(&bytes)?;
        Ok(())
    }
}

impl<W: Write + ?Sized> DataOutput for W {}

/// Encodes UTF-16 code units as modified UTF-8:
/// NUL takes two bytes and supplementary characters are written as two
/// three-byte surrogates.
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, ProtocolError> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b >> 4 {
            0x0..=0x7 => {
                units.push(b as u16);
                i += 1;
            }
            0xC | 0xD => {
                let b2 = *bytes.get(i + 1).ok_or(ProtocolError::MalformedString)?;
                if b2 & 0xC0 != 0x80 {
                    return Err(ProtocolError::MalformedString);
                }
                units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
                i += 2;
            }
            0xE => {
                let (b2, b3) = match (bytes.get(i + 1), bytes.get(i + 2)) {
                    (Some(&b2), Some(&b3)) => (b2, b3),
                    _ => return Err(ProtocolError::MalformedString),
                };
                if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                    return Err(ProtocolError::MalformedString);
                }
                units.push(
                    (((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16,
                );
                i += 3;
            }
            _ => return Err(ProtocolError::MalformedString),
        }
    }
    String::from_utf16(&units).map_err(|_| ProtocolError::MalformedString)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_integers_are_big_endian() {
        let mut out = Vec::new();
        out.write_int(0x0102_0304).unwrap();
        out.write_long(-2).unwrap();
        assert_eq!(out[..4], [1, 2, 3, 4]);
        assert_eq!(out[4..], [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]);

        let mut input = Cursor::new(out);
        assert_eq!(input.read_int().unwrap(), 0x0102_0304);
        assert_eq!(input.read_long().unwrap(), -2);
    }

    #[test]
    fn test_utf_has_two_byte_length_prefix() {
        let mut out = Vec::new();
        out.write_utf("hej").unwrap();
        assert_eq!(out, vec![0, 3, b'h', b'e', b'j']);
    }

    #[test]
    fn test_nul_and_supplementary_characters_use_modified_encoding() {
        assert_eq!(encode_modified_utf8("\0"), vec![0xC0, 0x80]);
        // U+1F600 becomes two three-byte surrogates
        assert_eq!(encode_modified_utf8("\u{1F600}").len(), 6);

        let text = "a\0å\u{1F600}";
        let mut out = Vec::new();
        out.write_utf(text).unwrap();
        assert_eq!(Cursor::new(out).read_utf().unwrap(), text);
    }

    #[test]
    fn test_string_too_long_is_rejected() {
        let text = "x".repeat(MAX_STRING_BYTES + 1);
        let mut out = Vec::new();
        assert!(matches!(
            out.write_utf(&text),
            Err(ProtocolError::StringTooLong(n)) if n == MAX_STRING_BYTES + 1
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_truncated_input_is_end_of_stream() {
        let mut input = Cursor::new(vec![0, 0, 1]);
        let err = input.read_int().unwrap_err();
        assert!(err.is_end_of_stream());
    }

    #[test]
    fn test_malformed_string_bytes() {
        assert!(matches!(
            decode_modified_utf8(&[0xC3]),
            Err(ProtocolError::MalformedString)
        ));
        assert!(matches!(
            decode_modified_utf8(&[0xF0, 0x9F, 0x98, 0x80]),
            Err(ProtocolError::MalformedString)
        ));
    }
}
