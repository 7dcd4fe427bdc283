//! Byte Reader — big-endian primitive reads over any `Read` source, with
//! short-read detection and a running byte offset for diagnostics.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{ErrorKind, Result};
use crate::typecode::StreamTypecode;

/// Wraps an `impl Read` and exposes the primitive reads the grammar
/// walker needs, all consuming big-endian bytes off the wire.
pub struct ByteReader<R: Read> {
    inner: R,
    position: u64,
}

impl<R: Read> ByteReader<R> {
    /// Wrap a byte source.
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Current byte offset since the reader was created.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn short_read(&self, expected: usize, e: std::io::Error) -> crate::error::DecodeError {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            crate::error::DecodeError::from(ErrorKind::ShortRead { expected })
                .with_offset(self.position)
        } else {
            crate::error::DecodeError::from(e).with_offset(self.position)
        }
    }

    /// Read a single unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self
            .inner
            .read_u8()
            .map_err(|e| self.short_read(1, e))?;
        self.position += 1;
        Ok(v)
    }

    /// Read a big-endian unsigned 16-bit integer.
    pub fn read_u16(&mut self) -> Result<u16> {
        let v = self
            .inner
            .read_u16::<BigEndian>()
            .map_err(|e| self.short_read(2, e))?;
        self.position += 2;
        Ok(v)
    }

    /// Read a big-endian unsigned 32-bit integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self
            .inner
            .read_u32::<BigEndian>()
            .map_err(|e| self.short_read(4, e))?;
        self.position += 4;
        Ok(v)
    }

    /// Read a big-endian unsigned 64-bit integer.
    pub fn read_u64(&mut self) -> Result<u64> {
        let v = self
            .inner
            .read_u64::<BigEndian>()
            .map_err(|e| self.short_read(8, e))?;
        self.position += 8;
        Ok(v)
    }

    /// Read a big-endian signed 16-bit integer.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Read a big-endian signed 32-bit integer.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Read a big-endian signed 64-bit integer.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Read a 4-byte IEEE-754 single-precision float, reinterpreting the
    /// big-endian bit pattern directly (never byte-swapping the float
    /// value arithmetically).
    pub fn read_f32(&mut self) -> Result<f32> {
        let bits = self.read_u32()?;
        Ok(f32::from_bits(bits))
    }

    /// Read an 8-byte IEEE-754 double-precision float, reinterpreting the
    /// big-endian bit pattern directly.
    pub fn read_f64(&mut self) -> Result<f64> {
        let bits = self.read_u64()?;
        Ok(f64::from_bits(bits))
    }

    /// Read exactly `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| self.short_read(n, e))?;
        self.position += n as u64;
        Ok(buf)
    }

    /// Read `n` raw bytes and decode them as UTF-8.
    ///
    /// Per the spec, stream-string bytes are surfaced as UTF-8 directly;
    /// Java Modified UTF-8 reinterpretation is left to a host embedding
    /// layer.
    pub fn read_fixed_string(&mut self, n: usize) -> Result<String> {
        let bytes = self.read_bytes(n)?;
        String::from_utf8(bytes).map_err(|e| {
            crate::error::DecodeError::from(ErrorKind::InvalidBlockData(format!(
                "string bytes were not valid UTF-8: {e}"
            )))
            .with_offset(self.position)
        })
    }

    /// Read one stream typecode byte and decode it.
    pub fn read_typecode(&mut self) -> Result<StreamTypecode> {
        let byte = self.read_u8()?;
        StreamTypecode::try_from(byte).map_err(|e| e.with_offset(self.position))
    }
}
