//! Tier-2 packet layer (C9, §4.3): packet-header inclusion/zero-bitplane
//! tag trees, the `Lblock` variable-length code-block data length, and the
//! standard's unary-prefixed number-of-coding-passes code (Annex B.10,
//! Table B.4).

use super::bit_io::{J2kBitReader, J2kBitWriter};
use super::tag_tree::TagTree;
use crate::error::{CodecError, CodecResult};
use std::collections::HashMap;

/// Per-precinct decode/encode state that persists across the layers of a
/// single tile-part: the three tag trees (inclusion, zero bit-plane,
/// `Lblock`) plus each code-block's already-included flag and current
/// `Lblock` value, neither of which resets between layers (§4.3).
pub struct PrecinctState {
    pub inclusion_tree: TagTree,
    pub zero_bp_tree: TagTree,
    included: HashMap<(usize, usize), bool>,
    lblock: HashMap<(usize, usize), u32>,
}

/// Default starting value of `Lblock` (Annex B.10.5).
const DEFAULT_LBLOCK: u32 = 3;
/// Sentinel threshold used to fully resolve a zero-bit-plane tag tree leaf;
/// larger than any legal code-block bit-plane count (<= ~38).
const ZERO_BP_RESOLVE_THRESHOLD: i32 = 64;

impl PrecinctState {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            inclusion_tree: TagTree::new(w as u32, h as u32),
            zero_bp_tree: TagTree::new(w as u32, h as u32),
            included: HashMap::new(),
            lblock: HashMap::new(),
        }
    }

    /// Resets decode progress but keeps no per-layer history — used when
    /// starting a brand-new precinct (not between layers of one precinct).
    pub fn reset(&mut self) {
        self.inclusion_tree.reset();
        self.zero_bp_tree.reset();
        self.included.clear();
        self.lblock.clear();
    }

    fn is_first_inclusion(&self, x: usize, y: usize) -> bool {
        !self.included.get(&(x, y)).copied().unwrap_or(false)
    }

    fn mark_included(&mut self, x: usize, y: usize) {
        self.included.insert((x, y), true);
    }

    fn lblock_for(&self, x: usize, y: usize) -> u32 {
        self.lblock.get(&(x, y)).copied().unwrap_or(DEFAULT_LBLOCK)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PacketHeader {
    pub packet_seq_num: u32,
    pub empty: bool,
    pub layer_index: u32,
    pub included_cblks: Vec<CodeBlockInfo>,
}

#[derive(Debug, Clone)]
pub struct CodeBlockInfo {
    pub x: usize,
    pub y: usize,
    pub included: bool,
    pub num_passes: u32,
    pub data_len: u32,
    pub zero_bp: u8,
}

/// Decodes the unary-prefixed number-of-new-coding-passes code (Table B.4).
fn decode_num_passes(reader: &mut J2kBitReader) -> CodecResult<u32> {
    if reader.read_bit()? == 1 {
        return Ok(1);
    }
    if reader.read_bit()? == 1 {
        return Ok(2);
    }
    let val = reader.read_bits(2)?;
    if val != 3 {
        return Ok(3 + val);
    }
    let val2 = reader.read_bits(5)?;
    if val2 != 31 {
        return Ok(6 + val2);
    }
    let val3 = reader.read_bits(7)?;
    Ok(37 + val3)
}

fn encode_num_passes(writer: &mut J2kBitWriter, n: u32) {
    if n == 1 {
        writer.write_bit(1);
        return;
    }
    writer.write_bit(0);
    if n == 2 {
        writer.write_bit(1);
        return;
    }
    writer.write_bit(0);
    if n <= 5 {
        writer.write_bits(n - 3, 2);
        return;
    }
    writer.write_bits(3, 2);
    if n <= 36 {
        writer.write_bits(n - 6, 5);
        return;
    }
    writer.write_bits(31, 5);
    writer.write_bits(n - 37, 7);
}

fn floor_log2(n: u32) -> u32 {
    31 - n.leading_zeros()
}

impl PacketHeader {
    /// Reads one packet header, mutating `state`'s persistent per-block
    /// inclusion/Lblock bookkeeping.
    pub fn read(
        reader: &mut J2kBitReader,
        state: &mut PrecinctState,
        layer: u32,
        grid_width: usize,
        grid_height: usize,
    ) -> CodecResult<Self> {
        let mut header = PacketHeader {
            packet_seq_num: 0,
            empty: false,
            layer_index: layer,
            included_cblks: Vec::new(),
        };

        if reader.read_bit()? == 0 {
            header.empty = true;
            return Ok(header);
        }

        for y in 0..grid_height {
            for x in 0..grid_width {
                let first_time = state.is_first_inclusion(x, y);
                let included = if first_time {
                    let low = state
                        .inclusion_tree
                        .decode(reader, x as u32, y as u32, (layer + 1) as i32)?;
                    state.inclusion_tree.is_known(x as u32, y as u32) && low <= layer as i32
                } else {
                    reader.read_bit()? == 1
                };

                if !included {
                    continue;
                }

                let zero_bp = if first_time {
                    state.mark_included(x, y);
                    let val = state.zero_bp_tree.decode(
                        reader,
                        x as u32,
                        y as u32,
                        ZERO_BP_RESOLVE_THRESHOLD,
                    )?;
                    val as u8
                } else {
                    0
                };

                let num_passes = decode_num_passes(reader)?;

                let mut lblock = state.lblock_for(x, y);
                while reader.read_bit()? == 1 {
                    lblock += 1;
                }
                state.lblock.insert((x, y), lblock);

                let length_bits = lblock + floor_log2(num_passes.max(1));
                let data_len = reader.read_bits(length_bits.min(32) as u8)?;

                header.included_cblks.push(CodeBlockInfo {
                    x,
                    y,
                    included,
                    num_passes,
                    data_len,
                    zero_bp,
                });
            }
        }

        Ok(header)
    }

    /// Writes one packet header; `self.included_cblks` must list exactly the
    /// code-blocks newly or still included in this layer, in raster order.
    pub fn write(&self, writer: &mut J2kBitWriter, state: &mut PrecinctState, grid_width: usize, grid_height: usize) {
        if self.empty {
            writer.write_bit(0);
            return;
        }
        writer.write_bit(1);

        for y in 0..grid_height {
            for x in 0..grid_width {
                let cb_info = self.included_cblks.iter().find(|c| c.x == x && c.y == y);

                let first_time = state.is_first_inclusion(x, y);

                if let Some(cb) = cb_info {
                    if first_time {
                        state
                            .inclusion_tree
                            .encode(writer, x as u32, y as u32, (self.layer_index + 1) as i32);
                        state.mark_included(x, y);
                        state.zero_bp_tree.encode(
                            writer,
                            x as u32,
                            y as u32,
                            ZERO_BP_RESOLVE_THRESHOLD,
                        );
                    } else {
                        writer.write_bit(1);
                    }

                    encode_num_passes(writer, cb.num_passes.max(1));

                    let mut lblock = state.lblock_for(x, y);
                    let needed = floor_log2(cb.num_passes.max(1)) + 1;
                    while lblock < needed {
                        writer.write_bit(1);
                        lblock += 1;
                    }
                    writer.write_bit(0);
                    state.lblock.insert((x, y), lblock);

                    let length_bits = lblock + floor_log2(cb.num_passes.max(1));
                    writer.write_bits(cb.data_len, length_bits.min(32) as u8);
                } else if first_time {
                    state
                        .inclusion_tree
                        .encode(writer, x as u32, y as u32, (self.layer_index + 1) as i32);
                } else {
                    writer.write_bit(0);
                }
            }
        }
    }
}

/// Returns the code-block's compressed data from `source` at the header's
/// recorded `data_len`, advancing `offset`.
pub fn slice_codeblock_data<'a>(source: &'a [u8], offset: &mut usize, info: &CodeBlockInfo) -> CodecResult<&'a [u8]> {
    let len = info.data_len as usize;
    if *offset + len > source.len() {
        return Err(CodecError::truncated(*offset, *offset + len));
    }
    let slice = &source[*offset..*offset + len];
    *offset += len;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_read_empty() {
        let data = vec![0x00];
        let mut reader = J2kBitReader::new(&data);
        let mut state = PrecinctState::new(2, 2);

        let header = PacketHeader::read(&mut reader, &mut state, 0, 2, 2).unwrap();
        assert!(header.empty);
    }

    #[test]
    fn num_passes_round_trips_across_table_boundaries() {
        for &n in &[1u32, 2, 3, 5, 6, 36, 37, 40] {
            let mut writer = J2kBitWriter::new();
            encode_num_passes(&mut writer, n);
            let bytes = writer.finish();
            let mut reader = J2kBitReader::new(&bytes);
            assert_eq!(decode_num_passes(&mut reader).unwrap(), n);
        }
    }

    #[test]
    fn single_codeblock_packet_round_trips() {
        let mut enc_state = PrecinctState::new(1, 1);
        let header = PacketHeader {
            packet_seq_num: 0,
            empty: false,
            layer_index: 0,
            included_cblks: vec![CodeBlockInfo {
                x: 0,
                y: 0,
                included: true,
                num_passes: 3,
                data_len: 42,
                zero_bp: 2,
            }],
        };
        let mut writer = J2kBitWriter::new();
        header.write(&mut writer, &mut enc_state, 1, 1);
        let bytes = writer.finish();

        let mut dec_state = PrecinctState::new(1, 1);
        let mut reader = J2kBitReader::new(&bytes);
        let decoded = PacketHeader::read(&mut reader, &mut dec_state, 0, 1, 1).unwrap();
        assert!(!decoded.empty);
        assert_eq!(decoded.included_cblks.len(), 1);
        assert_eq!(decoded.included_cblks[0].num_passes, 3);
        assert_eq!(decoded.included_cblks[0].data_len, 42);
        assert_eq!(decoded.included_cblks[0].zero_bp, 2);
    }
}
