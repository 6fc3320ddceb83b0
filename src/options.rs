//! Caller-configurable decode/compress options (§6's "Stream options" and
//! "Compressor parameters" tables).
//!
//! Every field defaults to the behavior of a plain, full, single-tile-set
//! decode/compress at full resolution and all layers, so callers only set
//! what they actually want to change.

/// Which tile-cache eviction policy [`crate::scheduler::Scheduler`]-driven
/// multi-tile decodes should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileCacheStrategy {
    /// Keep nothing decoded beyond what the current call needs.
    #[default]
    None,
    /// Cache only the composite image, not per-tile intermediates.
    ImageOnly,
    /// Cache every tile's reconstructed data.
    All,
}

/// Bitmask over the random-access marker families a decode may be told to
/// ignore, forcing a linear tile-part parse even when PLT/TLM/PLM would
/// otherwise let the driver seek directly to data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RandomAccessFlags(u8);

impl RandomAccessFlags {
    pub const PLT: Self = Self(0x01);
    pub const TLM: Self = Self(0x02);
    pub const PLM: Self = Self(0x04);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for RandomAccessFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Options controlling one `decode` call (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOptions {
    /// Discard the top `reduce` resolutions on output (0 = full resolution).
    pub reduce: u8,
    /// Stop Tier-2 packet reading after this many quality layers.
    /// `None` decodes every layer present.
    pub layers_to_decompress: Option<u16>,
    pub tile_cache_strategy: TileCacheStrategy,
    pub disable_random_access_flags: RandomAccessFlags,
    /// When decoding more than one tile, return per-tile images instead of
    /// allocating and filling a single composite canvas.
    pub skip_allocate_composite: bool,
    /// Partial-decode window, in canvas coordinates; `None` decodes the
    /// whole image.
    pub decode_window: Option<DecodeWindow>,
    /// Decode only this tile; `None` decodes every tile in the grid.
    pub tile_index: Option<u32>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            reduce: 0,
            layers_to_decompress: None,
            tile_cache_strategy: TileCacheStrategy::default(),
            disable_random_access_flags: RandomAccessFlags::empty(),
            skip_allocate_composite: false,
            decode_window: None,
            tile_index: None,
        }
    }
}

/// A partial-decode window in canvas (reference-grid) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeWindow {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

/// Either a fixed compression ratio or a target PSNR per layer; a
/// compressor parameter set carries one or the other, never both (§6).
#[derive(Debug, Clone, PartialEq)]
pub enum RateControl {
    CompressionRatios(Vec<f32>),
    Psnr(Vec<f32>),
}

/// How tile-part boundaries are chosen during compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TilePartDivision {
    /// One tile-part per tile.
    #[default]
    None,
    /// One tile-part per resolution.
    Resolution,
    /// One tile-part per layer.
    Layer,
    /// One tile-part per component.
    Component,
}

/// Compressor parameters (§6's "Compressor parameters" table).
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOptions {
    pub progression_order: u8,
    pub progression_changes: Vec<crate::coding_parameters::ProgressionOrderChange>,
    pub num_resolutions: u8,
    pub codeblock_width: u32,
    pub codeblock_height: u32,
    /// Per-resolution precinct sizes, coarsest first; empty means the
    /// codec default of one precinct per resolution.
    pub precinct_sizes: Vec<(u8, u8)>,
    pub cblk_sty: u8,
    /// 0 = none, 1 = reversible (RCT), 2 = irreversible (ICT).
    pub mct: u8,
    pub num_guard_bits: u8,
    pub rate_control: Option<RateControl>,
    pub max_codestream_size: Option<u64>,
    pub max_component_size: Option<u64>,
    pub tile_part_division: TilePartDivision,
    pub write_plt: bool,
    pub write_tlm: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            progression_order: crate::constants::progression::LRCP,
            progression_changes: Vec::new(),
            num_resolutions: 6,
            codeblock_width: 64,
            codeblock_height: 64,
            precinct_sizes: Vec::new(),
            cblk_sty: 0,
            mct: 0,
            num_guard_bits: 2,
            rate_control: None,
            max_codestream_size: None,
            max_component_size: None,
            tile_part_division: TilePartDivision::default(),
            write_plt: false,
            write_tlm: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_options_default_is_full_decode() {
        let opts = DecodeOptions::default();
        assert_eq!(opts.reduce, 0);
        assert!(opts.layers_to_decompress.is_none());
        assert!(opts.decode_window.is_none());
        assert!(opts.tile_index.is_none());
    }

    #[test]
    fn encode_options_default_matches_reference_codeblock_size() {
        let opts = EncodeOptions::default();
        assert_eq!(opts.codeblock_width, 64);
        assert_eq!(opts.codeblock_height, 64);
        assert_eq!(opts.mct, 0);
    }
}
