//! Bounds-checked forward reader over an in-memory byte buffer.
//!
//! Every read either consumes exactly the requested number of bytes or fails
//! with [`CursorError::Truncated`] and leaves the cursor where it was.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Error raised when a read runs past the end of the buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    /// Not enough bytes remain for the requested read.
    #[error("Unexpected end of data at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Cursor position when the read was attempted.
        offset: usize,
        /// Number of bytes the read required.
        needed: usize,
        /// Number of bytes left in the buffer.
        remaining: usize,
    },
}

/// Forward-only cursor over an immutable byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Number of bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Read `len` raw bytes as a view into the underlying buffer.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CursorError> {
        if len > self.remaining() {
            return Err(CursorError::Truncated {
                offset: self.position,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read a single signed byte.
    pub fn read_i8(&mut self) -> Result<i8, CursorError> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    /// Read a little-endian `i16`.
    pub fn read_i16(&mut self) -> Result<i16, CursorError> {
        Ok(LittleEndian::read_i16(self.read_bytes(2)?))
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// Read a big-endian `u32`.
    pub fn read_u32_be(&mut self) -> Result<u32, CursorError> {
        Ok(BigEndian::read_u32(self.read_bytes(4)?))
    }

    /// Read a little-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32, CursorError> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    /// Read a little-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64, CursorError> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    /// Read a little-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64, CursorError> {
        Ok(LittleEndian::read_i64(self.read_bytes(8)?))
    }

    /// Read a little-endian IEEE-754 `f32`, preserving the bit pattern.
    pub fn read_f32(&mut self) -> Result<f32, CursorError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a little-endian IEEE-754 `f64`, preserving the bit pattern.
    pub fn read_f64(&mut self) -> Result<f64, CursorError> {
        Ok(f64::from_bits(self.read_u64()?))
    }
}
