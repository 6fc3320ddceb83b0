//! Bit I/O (C3) for the packet-header and tag-tree layer: a raw-slice bit
//! reader/writer implementing the Annex B.10.1 byte-stuffing rule (a 0x00
//! bit-stuff byte follows every 0xFF byte so the packet header can never
//! contain a marker code).

use crate::error::{CodecError, CodecResult};

pub struct J2kBitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
    prev_byte_was_ff: bool,
}

impl<'a> J2kBitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
            prev_byte_was_ff: false,
        }
    }

    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }

    pub fn read_bit(&mut self) -> CodecResult<u8> {
        if self.byte_pos >= self.data.len() {
            return Err(CodecError::truncated(self.byte_pos, self.byte_pos + 1));
        }

        let current = self.data[self.byte_pos];
        let bits_in_byte: u8 = if self.prev_byte_was_ff { 7 } else { 8 };

        let bit = (current >> (bits_in_byte - 1 - self.bit_pos)) & 1;
        self.bit_pos += 1;

        if self.bit_pos >= bits_in_byte {
            self.prev_byte_was_ff = current == 0xFF;
            self.byte_pos += 1;
            self.bit_pos = 0;
        }

        Ok(bit)
    }

    pub fn read_bits(&mut self, mut count: u8) -> CodecResult<u32> {
        let mut bits = 0u32;
        while count > 0 {
            let bit = self.read_bit()?;
            bits = (bits << 1) | (bit as u32);
            count -= 1;
        }
        Ok(bits)
    }

    pub fn align_to_byte(&mut self) {
        if self.bit_pos != 0 {
            self.bit_pos = 0;
            self.prev_byte_was_ff = self.data.get(self.byte_pos).copied() == Some(0xFF);
            self.byte_pos += 1;
        }
    }
}

pub struct J2kBitWriter {
    data: Vec<u8>,
    bit_buffer: u8,
    bits_count: u8,
    prev_byte_was_ff: bool,
}

impl Default for J2kBitWriter {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            bit_buffer: 0,
            bits_count: 0,
            prev_byte_was_ff: false,
        }
    }
}

impl J2kBitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bit(&mut self, bit: u8) {
        let bits_in_byte: u8 = if self.prev_byte_was_ff { 7 } else { 8 };
        self.bit_buffer = (self.bit_buffer << 1) | (bit & 1);
        self.bits_count += 1;
        if self.bits_count == bits_in_byte {
            self.flush_byte();
        }
    }

    pub fn write_bits(&mut self, value: u32, mut count: u8) {
        while count > 0 {
            let bit = ((value >> (count - 1)) & 1) as u8;
            self.write_bit(bit);
            count -= 1;
        }
    }

    fn flush_byte(&mut self) {
        self.data.push(self.bit_buffer);
        self.prev_byte_was_ff = self.bit_buffer == 0xFF;
        self.bit_buffer = 0;
        self.bits_count = 0;
    }

    pub fn align_to_byte(&mut self) {
        if self.bits_count > 0 {
            let bits_in_byte: u8 = if self.prev_byte_was_ff { 7 } else { 8 };
            self.bit_buffer <<= bits_in_byte - self.bits_count;
            self.flush_byte();
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }

    pub fn get_output(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bit_sequence() {
        let mut writer = J2kBitWriter::new();
        let bits = [1u8, 0, 1, 1, 0, 0, 1, 0, 1, 1, 1, 0];
        for &b in &bits {
            writer.write_bit(b);
        }
        let bytes = writer.finish();

        let mut reader = J2kBitReader::new(&bytes);
        for &expected in &bits {
            assert_eq!(reader.read_bit().unwrap(), expected);
        }
    }

    #[test]
    fn stuffs_zero_bit_after_0xff_byte() {
        let mut writer = J2kBitWriter::new();
        writer.write_bits(0xFF, 8);
        writer.write_bit(1);
        let bytes = writer.finish();
        assert_eq!(bytes[0], 0xFF);
        // Only 7 bits are usable in the byte following an 0xFF byte.
        let mut reader = J2kBitReader::new(&bytes);
        assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
        assert_eq!(reader.read_bit().unwrap(), 1);
    }
}
