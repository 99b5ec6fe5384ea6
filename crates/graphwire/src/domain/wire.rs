//! Low-level wire primitives.
//!
//! All integers are little-endian and fixed width. Lengths and counts are
//! signed 32-bit, tags and booleans are a single byte, strings carry an i32
//! byte length followed by UTF-8, UUIDs are their 16 raw bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;

/// Upper bound on any length/count field unless configured otherwise.
pub const DEFAULT_MAX_COLLECTION_LEN: usize = 1 << 20;

/// Discriminator preceding every serialized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectTag {
    Null = 0,
    Blob = 1,
    Array = 2,
    Pointer = 3,
}

impl ObjectTag {
    pub fn from_byte(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0 => Ok(ObjectTag::Null),
            1 => Ok(ObjectTag::Blob),
            2 => Ok(ObjectTag::Array),
            3 => Ok(ObjectTag::Pointer),
            other => Err(CodecError::UnknownTag(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Append-only encoder over a growable buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64_le(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    pub fn write_tag(&mut self, tag: ObjectTag) {
        self.buf.put_u8(tag.as_byte());
    }

    /// Length-prefixed byte string.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write_len(value.len());
        self.buf.put_slice(value);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn write_uuid(&mut self, value: &[u8; 16]) {
        self.buf.put_slice(value);
    }

    /// Writes a collection length as i32.
    ///
    /// Lengths above `i32::MAX` cannot be represented and are clamped; the
    /// peer's limit check rejects them long before that point.
    pub fn write_len(&mut self, len: usize) {
        self.write_i32(i32::try_from(len).unwrap_or(i32::MAX));
    }

    /// Raw bytes with no prefix.
    pub fn write_raw(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over one complete inbound message.
#[derive(Debug, Clone)]
pub struct WireReader {
    buf: Bytes,
    max_len: usize,
}

impl WireReader {
    pub fn new(buf: Bytes) -> Self {
        Self::with_limit(buf, DEFAULT_MAX_COLLECTION_LEN)
    }

    pub fn with_limit(buf: Bytes, max_len: usize) -> Self {
        Self { buf, max_len }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(CodecError::Truncated { needed, remaining });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64_le())
    }

    pub fn read_tag(&mut self) -> Result<ObjectTag, CodecError> {
        ObjectTag::from_byte(self.read_u8()?)
    }

    /// Reads an i32 length/count and checks it against the configured limit.
    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        let raw = self.read_i32()?;
        let len = usize::try_from(raw).map_err(|_| CodecError::NegativeLength(raw))?;
        if len > self.max_len {
            return Err(CodecError::LengthLimit {
                len,
                max: self.max_len,
            });
        }
        Ok(len)
    }

    pub fn read_bytes(&mut self) -> Result<Bytes, CodecError> {
        let len = self.read_len()?;
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }

    pub fn read_str(&mut self) -> Result<String, CodecError> {
        let raw = self.read_bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn read_uuid(&mut self) -> Result<[u8; 16], CodecError> {
        self.ensure(16)?;
        let mut out = [0u8; 16];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Takes every unread byte, leaving the reader empty.
    pub fn rest(&mut self) -> Bytes {
        std::mem::take(&mut self.buf)
    }
}
