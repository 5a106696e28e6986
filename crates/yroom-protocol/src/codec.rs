//! lib0-compatible binary reader and writer
//!
//! Unsigned integers are little-endian base-128 with a continuation bit,
//! byte blobs and strings are length-prefixed with such an integer.

use crate::error::{ProtocolError, ProtocolResult};
use bytes::BytesMut;

/// Reads lib0-encoded primitives from a borrowed buffer.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_u8(&mut self) -> ProtocolResult<u8> {
        let byte = *self.buf.get(self.pos).ok_or(ProtocolError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read a variable-length unsigned integer.
    pub fn read_var_uint(&mut self) -> ProtocolResult<u64> {
        let mut num: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 || (shift == 63 && byte & 0x7f > 1) {
                return Err(ProtocolError::VarIntTooLarge);
            }
            num |= u64::from(byte & 0x7f) << shift;
            if byte < 0x80 {
                return Ok(num);
            }
            shift += 7;
        }
    }

    /// Read a length-prefixed byte blob.
    pub fn read_var_buf(&mut self) -> ProtocolResult<&'a [u8]> {
        let len = self.read_var_uint()? as usize;
        if self.buf.len() - self.pos < len {
            return Err(ProtocolError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_var_string(&mut self) -> ProtocolResult<&'a str> {
        let buf = self.read_var_buf()?;
        Ok(std::str::from_utf8(buf)?)
    }
}

/// Writes lib0-encoded primitives into a growable buffer.
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(128),
        }
    }

    pub fn write_var_uint(&mut self, mut num: u64) {
        while num > 0x7f {
            self.buf.extend_from_slice(&[0x80 | (num as u8 & 0x7f)]);
            num >>= 7;
        }
        self.buf.extend_from_slice(&[num as u8]);
    }

    pub fn write_var_buf(&mut self, data: &[u8]) {
        self.write_var_uint(data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    pub fn write_var_string(&mut self, s: &str) {
        self.write_var_buf(s.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_uint_single_and_multi_byte() {
        let mut enc = Encoder::new();
        enc.write_var_uint(127);
        enc.write_var_uint(128);
        enc.write_var_uint(300);
        let bytes = enc.to_vec();
        assert_eq!(bytes[0], 127); // single byte
        assert_eq!(&bytes[1..3], &[0x80, 0x01]); // continuation

        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.read_var_uint().unwrap(), 127);
        assert_eq!(dec.read_var_uint().unwrap(), 128);
        assert_eq!(dec.read_var_uint().unwrap(), 300);
        assert!(dec.is_empty());
    }

    #[test]
    fn test_var_uint_truncated() {
        // Continuation bit set but no next byte
        let mut dec = Decoder::new(&[0x80]);
        assert!(matches!(
            dec.read_var_uint(),
            Err(ProtocolError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_var_uint_overflow() {
        let bytes = [0xff; 11];
        let mut dec = Decoder::new(&bytes);
        assert!(matches!(
            dec.read_var_uint(),
            Err(ProtocolError::VarIntTooLarge)
        ));
    }

    #[test]
    fn test_var_buf_truncated() {
        // Length prefix of 10 but only 2 payload bytes
        let mut dec = Decoder::new(&[10, 1, 2]);
        assert!(matches!(
            dec.read_var_buf(),
            Err(ProtocolError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_var_string() {
        let mut enc = Encoder::new();
        enc.write_var_string("room:1");
        let bytes = enc.to_vec();

        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.read_var_string().unwrap(), "room:1");
    }

    #[test]
    fn test_var_string_invalid_utf8() {
        let mut dec = Decoder::new(&[2, 0xff, 0xfe]);
        assert!(matches!(
            dec.read_var_string(),
            Err(ProtocolError::InvalidString(_))
        ));
    }
}
