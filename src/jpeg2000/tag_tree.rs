//! Tag-tree coding (Annex B.10.2): the quad-tree-of-minima structure used
//! by packet headers to signal per-code-block inclusion and zero
//! bit-plane counts without re-transmitting already-known values.
//!
//! Leaves sit at level 0 (one per code block in the precinct); each higher
//! level halves both dimensions (rounding up) until a single root remains.
//! Decoding/encoding a leaf against a `threshold` walks root-to-leaf,
//! emitting/consuming one bit per level until either a level's value
//! becomes fully known (bit `1`) or `threshold` is reached with the value
//! still undetermined.

use crate::jpeg2000::bit_io::{J2kBitReader, J2kBitWriter};
use crate::error::CodecResult;

#[derive(Clone, Copy, Debug)]
struct TagNode {
    low: i32,
    value: i32,
    known: bool,
}

impl Default for TagNode {
    fn default() -> Self {
        Self {
            low: 0,
            value: i32::MAX,
            known: false,
        }
    }
}

pub struct TagTree {
    levels: Vec<(u32, u32)>,
    nodes: Vec<Vec<TagNode>>,
}

impl TagTree {
    /// Builds a tag tree covering a `width` x `height` grid of leaves.
    pub fn new(width: u32, height: u32) -> Self {
        let (mut w, mut h) = (width.max(1), height.max(1));
        let mut levels = vec![(w, h)];
        while w > 1 || h > 1 {
            w = w.div_ceil(2);
            h = h.div_ceil(2);
            levels.push((w, h));
        }
        let nodes = levels
            .iter()
            .map(|&(w, h)| vec![TagNode::default(); (w * h) as usize])
            .collect();
        Self { levels, nodes }
    }

    /// Clears all decoded/encoded state (e.g. between tile-parts), leaving
    /// leaf values intact for the encoder's reuse across layers.
    pub fn reset(&mut self) {
        for level in &mut self.nodes {
            for node in level.iter_mut() {
                node.low = 0;
                node.known = false;
            }
        }
    }

    /// Sets leaf values (row-major, width x height from [`Self::new`]) and
    /// recomputes every internal node as the min of its up-to-4 children,
    /// required before [`Self::encode`] can be used.
    pub fn set_values(&mut self, leaf_values: &[i32]) {
        let (w0, h0) = self.levels[0];
        for y in 0..h0 {
            for x in 0..w0 {
                let idx = (y * w0 + x) as usize;
                self.nodes[0][idx].value = leaf_values.get(idx).copied().unwrap_or(i32::MAX);
            }
        }
        for level_idx in 1..self.levels.len() {
            let (w, h) = self.levels[level_idx];
            let (pw, ph) = self.levels[level_idx - 1];
            for y in 0..h {
                for x in 0..w {
                    let mut min_v = i32::MAX;
                    for dy in 0..2u32 {
                        for dx in 0..2u32 {
                            let cx = x * 2 + dx;
                            let cy = y * 2 + dy;
                            if cx < pw && cy < ph {
                                let cidx = (cy * pw + cx) as usize;
                                min_v = min_v.min(self.nodes[level_idx - 1][cidx].value);
                            }
                        }
                    }
                    self.nodes[level_idx][(y * w + x) as usize].value = min_v;
                }
            }
        }
    }

    fn path(&self, x: u32, y: u32) -> Vec<(usize, usize)> {
        let mut path = Vec::with_capacity(self.levels.len());
        let (mut cx, mut cy) = (x, y);
        for (level_idx, &(w, _h)) in self.levels.iter().enumerate() {
            path.push((level_idx, (cy * w + cx) as usize));
            cx /= 2;
            cy /= 2;
        }
        path
    }

    /// Decodes one leaf's current known lower bound against `threshold`,
    /// reading bits from `reader` as needed. The leaf is fully known (the
    /// returned value is exact) once [`Self::is_known`] reports `true`;
    /// otherwise the return value is only a lower bound (>= it, < threshold).
    pub fn decode(
        &mut self,
        reader: &mut J2kBitReader,
        x: u32,
        y: u32,
        threshold: i32,
    ) -> CodecResult<i32> {
        let path = self.path(x, y);
        let mut parent_low = 0i32;
        for &(level_idx, node_idx) in path.iter().rev() {
            let node = &mut self.nodes[level_idx][node_idx];
            if node.low < parent_low {
                node.low = parent_low;
            }
            while !node.known && node.low < threshold {
                let bit = reader.read_bit()?;
                if bit == 1 {
                    node.known = true;
                } else {
                    node.low += 1;
                }
            }
            parent_low = node.low;
        }
        Ok(self.nodes[0][path[0].1].low)
    }

    /// Encodes one leaf against `threshold` using values set by
    /// [`Self::set_values`].
    pub fn encode(&mut self, writer: &mut J2kBitWriter, x: u32, y: u32, threshold: i32) {
        let path = self.path(x, y);
        let mut parent_low = 0i32;
        for &(level_idx, node_idx) in path.iter().rev() {
            let node = &mut self.nodes[level_idx][node_idx];
            if node.low < parent_low {
                node.low = parent_low;
            }
            let bound = threshold.min(node.value);
            while node.low < bound {
                writer.write_bit(0);
                node.low += 1;
            }
            if threshold > node.value && !node.known {
                writer.write_bit(1);
                node.known = true;
            }
            parent_low = node.low;
        }
    }

    pub fn is_known(&self, x: u32, y: u32) -> bool {
        self.nodes[0][(y * self.levels[0].0 + x) as usize].known
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_dimensions_halve_with_ceil() {
        let tree = TagTree::new(5, 3);
        assert_eq!(tree.levels, vec![(5, 3), (3, 2), (2, 1), (1, 1)]);
    }

    #[test]
    fn round_trips_inclusion_style_threshold() {
        let mut tree = TagTree::new(2, 2);
        tree.set_values(&[0, 2, 1, 3]);

        let mut writer = J2kBitWriter::new();
        for layer in 0..4 {
            for y in 0..2 {
                for x in 0..2 {
                    tree.encode(&mut writer, x, y, layer + 1);
                }
            }
        }
        let bytes = writer.finish();

        let mut decode_tree = TagTree::new(2, 2);
        let mut reader = J2kBitReader::new(&bytes);
        let expected = [[0, 2], [1, 3]];
        for layer in 0..4 {
            for y in 0..2u32 {
                for x in 0..2u32 {
                    let low = decode_tree.decode(&mut reader, x, y, layer + 1).unwrap();
                    if decode_tree.is_known(x, y) {
                        assert_eq!(low, expected[y as usize][x as usize]);
                    }
                }
            }
        }
        for y in 0..2u32 {
            for x in 0..2u32 {
                assert!(decode_tree.is_known(x, y));
            }
        }
    }
}
