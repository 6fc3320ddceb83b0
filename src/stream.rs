//! Stream adapter (C13): buffered read/write over an in-memory code-stream.
//!
//! Splits byte access and bit access across a pair of types, narrowed to
//! what the J2K marker codec and Tier-2 layer actually need, including the
//! Annex B.10.1 byte-stuffing rule for bit reads immediately following an
//! 0xFF byte.

use crate::error::{CodecError, CodecResult};
use crate::marker::{MarkerCode, MARKER_PREFIX};
use std::convert::TryFrom;

/// A cursor over a borrowed, memory-backed code-stream.
pub struct StreamReader<'a> {
    source: &'a [u8],
    position: usize,
    bit_buffer: u8,
    bits_left: u8,
    prev_byte_was_ff: bool,
}

impl<'a> StreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            bit_buffer: 0,
            bits_left: 0,
            prev_byte_was_ff: false,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining_data(&self) -> &'a [u8] {
        &self.source[self.position.min(self.source.len())..]
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_data().is_empty()
    }

    pub fn seek(&mut self, position: usize) -> CodecResult<()> {
        if position > self.source.len() {
            return Err(CodecError::truncated(position, position - self.source.len()));
        }
        self.position = position;
        self.align_to_byte();
        Ok(())
    }

    pub fn advance(&mut self, count: usize) -> CodecResult<()> {
        self.seek(self.position + count)
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        if self.position >= self.source.len() {
            return Err(CodecError::truncated(self.position, 1));
        }
        let b = self.source[self.position];
        self.position += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> CodecResult<u16> {
        let hi = self.read_u8()? as u16;
        let lo = self.read_u8()? as u16;
        Ok((hi << 8) | lo)
    }

    pub fn read_u32(&mut self) -> CodecResult<u32> {
        let b1 = self.read_u8()? as u32;
        let b2 = self.read_u8()? as u32;
        let b3 = self.read_u8()? as u32;
        let b4 = self.read_u8()? as u32;
        Ok((b1 << 24) | (b2 << 16) | (b3 << 8) | b4)
    }

    /// Peeks the next two bytes as a marker without consuming them.
    pub fn peek_marker(&self) -> CodecResult<MarkerCode> {
        if self.position + 1 >= self.source.len() {
            return Err(CodecError::truncated(self.position, 2));
        }
        if self.source[self.position] != MARKER_PREFIX {
            return Err(CodecError::malformed(
                "marker",
                self.position,
                "expected 0xFF marker prefix",
            ));
        }
        let code = ((self.source[self.position] as u16) << 8) | self.source[self.position + 1] as u16;
        MarkerCode::try_from(code)
    }

    pub fn read_marker(&mut self) -> CodecResult<MarkerCode> {
        let prefix = self.read_u8()?;
        if prefix != MARKER_PREFIX {
            return Err(CodecError::malformed(
                "marker",
                self.position - 1,
                "expected 0xFF marker prefix",
            ));
        }
        let byte = self.read_u8()?;
        MarkerCode::try_from(((prefix as u16) << 8) | byte as u16)
    }

    /// Reads a single bit, applying the JPEG 2000 byte-stuffing rule
    /// (Annex B.10.1): a byte immediately following an 0xFF byte has only
    /// seven valid data bits (its MSB is implicitly 0, to avoid forming a
    /// spurious marker code in the coded bit stream).
    pub fn read_bit(&mut self) -> CodecResult<u8> {
        if self.bits_left == 0 {
            if self.position >= self.source.len() {
                return Err(CodecError::truncated(self.position, 1));
            }
            let b = self.source[self.position];
            self.position += 1;
            self.bit_buffer = b;
            self.bits_left = if self.prev_byte_was_ff { 7 } else { 8 };
            self.prev_byte_was_ff = b == 0xFF;
        }
        let shift = self.bits_left - 1;
        let bit = (self.bit_buffer >> shift) & 1;
        self.bits_left -= 1;
        Ok(bit)
    }

    pub fn read_bits(&mut self, count: u8) -> CodecResult<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            value = (value << 1) | self.read_bit()? as u32;
        }
        Ok(value)
    }

    /// Discards any partially-consumed bit buffer, realigning to the next
    /// byte boundary (always a no-op between byte-level reads, but
    /// required after a bit-level packet header before reading raw bytes).
    pub fn align_to_byte(&mut self) {
        self.bits_left = 0;
        self.bit_buffer = 0;
        self.prev_byte_was_ff = false;
    }
}

/// A cursor over a borrowed, mutable code-stream destination buffer.
pub struct StreamWriter<'a> {
    destination: &'a mut [u8],
    position: usize,
}

impl<'a> StreamWriter<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            destination,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    pub fn write_byte(&mut self, value: u8) -> CodecResult<()> {
        if self.position >= self.destination.len() {
            return Err(CodecError::invariant("destination buffer exhausted"));
        }
        self.destination[self.position] = value;
        self.position += 1;
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> CodecResult<()> {
        for &b in data {
            self.write_byte(b)?;
        }
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> CodecResult<()> {
        let bytes = value.to_be_bytes();
        self.write_byte(bytes[0])?;
        self.write_byte(bytes[1])
    }

    pub fn write_u32(&mut self, value: u32) -> CodecResult<()> {
        for b in value.to_be_bytes() {
            self.write_byte(b)?;
        }
        Ok(())
    }

    pub fn write_marker(&mut self, marker: MarkerCode) -> CodecResult<()> {
        self.write_u16(marker as u16)
    }

    pub fn remaining_slice(&mut self) -> &mut [u8] {
        if self.position >= self.destination.len() {
            &mut []
        } else {
            &mut self.destination[self.position..]
        }
    }

    pub fn advance(&mut self, count: usize) {
        self.position += count;
    }
}
