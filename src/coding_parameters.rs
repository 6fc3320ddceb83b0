//! Process-wide and per-tile coding configuration (§3).

use crate::constants::progression;
use crate::error::{CodecError, CodecResult};

/// A single progression-order-change record (POC marker, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressionOrderChange {
    pub resolution_start: u8,
    pub component_start: u16,
    pub layer_end: u16,
    pub resolution_end: u8,
    pub component_end: u16,
    pub progression_order: u8,
}

/// Quantization style plus per-sub-band (expn, mant) for one component (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationParams {
    pub style: u8,
    pub guard_bits: u8,
    /// (exponent, mantissa) per sub-band, in band order (LL, then HL/LH/HH
    /// per resolution from the coarsest to the finest).
    pub step_sizes: Vec<(u8, u16)>,
}

impl Default for QuantizationParams {
    fn default() -> Self {
        Self {
            style: crate::constants::qcd_style::NONE,
            guard_bits: 2,
            step_sizes: Vec::new(),
        }
    }
}

/// Per-component coding parameters, from COD (defaults) or COC (override).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileComponentCodingParams {
    pub csty: u8,
    pub num_resolutions: u8,
    /// Code-block width/height as a power-of-two exponent minus two
    /// (raw COD/COC field value; actual dimension is `1 << (exp + 2)`).
    pub codeblock_width_exp: u8,
    pub codeblock_height_exp: u8,
    pub cblk_sty: u8,
    /// 0 = 9/7 irreversible, 1 = 5/3 reversible (qmfbid).
    pub wavelet_id: u8,
    /// Precinct size exponents (width_exp, height_exp) per resolution,
    /// coarsest (resolution 0) first. Empty means default (15,15), i.e.
    /// one precinct covering the whole resolution.
    pub precinct_sizes: Vec<(u8, u8)>,
    pub quantization: QuantizationParams,
    pub roi_shift: u8,
}

impl Default for TileComponentCodingParams {
    fn default() -> Self {
        Self {
            csty: 0,
            num_resolutions: 6,
            codeblock_width_exp: 4,
            codeblock_height_exp: 4,
            cblk_sty: 0,
            wavelet_id: 1,
            precinct_sizes: Vec::new(),
            quantization: QuantizationParams::default(),
            roi_shift: 0,
        }
    }
}

impl TileComponentCodingParams {
    pub fn codeblock_width(&self) -> u32 {
        1u32 << (self.codeblock_width_exp as u32 + 2)
    }

    pub fn codeblock_height(&self) -> u32 {
        1u32 << (self.codeblock_height_exp as u32 + 2)
    }

    /// Validates the invariants §4.4 and §6 require at header-parse time.
    pub fn validate(&self) -> CodecResult<()> {
        use crate::constants::{cblk_sty, MAXIMUM_CODEBLOCK_AREA_EXP, MAXIMUM_CODEBLOCK_DIM_EXP, MINIMUM_CODEBLOCK_DIM_EXP};

        if self.codeblock_width_exp as u32 > MAXIMUM_CODEBLOCK_DIM_EXP - 2
            || self.codeblock_height_exp as u32 > MAXIMUM_CODEBLOCK_DIM_EXP - 2
        {
            return Err(CodecError::invariant("code-block dimension exceeds 1024"));
        }
        let _ = MINIMUM_CODEBLOCK_DIM_EXP;
        if self.codeblock_width_exp as u32 + self.codeblock_height_exp as u32 + 4 > MAXIMUM_CODEBLOCK_AREA_EXP {
            return Err(CodecError::invariant("code-block area exceeds 4096 samples"));
        }
        if self.cblk_sty & cblk_sty::HT_ONLY != 0
            && self.cblk_sty & (cblk_sty::LAZY | cblk_sty::RESET) != 0
        {
            return Err(CodecError::invariant(
                "HT_ONLY is incompatible with LAZY/RESET cblk_sty flags",
            ));
        }
        Ok(())
    }
}

/// Per-tile coding configuration (the "TCP" of §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileCodingParams {
    pub progression_order: u8,
    pub num_layers: u16,
    pub mct: u8,
    pub components: Vec<TileComponentCodingParams>,
    pub progression_changes: Vec<ProgressionOrderChange>,
    /// Packed packet headers relocated here via PPT; merged sequentially.
    pub packed_packet_headers: Vec<u8>,
    pub tile_parts_signalled: Option<u8>,
    pub tile_parts_received: u8,
}

impl TileCodingParams {
    pub fn with_defaults(component_count: usize) -> Self {
        Self {
            progression_order: progression::LRCP,
            num_layers: 1,
            mct: 0,
            components: vec![TileComponentCodingParams::default(); component_count],
            progression_changes: Vec::new(),
            packed_packet_headers: Vec::new(),
            tile_parts_signalled: None,
            tile_parts_received: 0,
        }
    }

    pub fn validate_progression_order(order: u8) -> CodecResult<()> {
        if order > progression::MAX {
            return Err(CodecError::invariant(format!(
                "progression order {order} out of range [0,{}]",
                progression::MAX
            )));
        }
        Ok(())
    }
}

/// A single component's geometry as declared in SIZ (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentSize {
    pub precision: u8,
    pub is_signed: bool,
    pub dx: u8,
    pub dy: u8,
}

/// Process-wide, per-image configuration (§3 "CodingParameters").
///
/// Invariant: once header parsing succeeds this is read-only for the rest
/// of decode/compress, so it may be freely shared across scheduler threads
/// behind a plain shared reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingParameters {
    pub image_x0: u32,
    pub image_y0: u32,
    pub image_x1: u32,
    pub image_y1: u32,
    pub tile_x0: u32,
    pub tile_y0: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub rsiz: u16,
    pub pcap: u32,
    pub ccap: Vec<u16>,
    pub components: Vec<ComponentSize>,
    pub comments: Vec<Vec<u8>>,
    pub tiles: Vec<TileCodingParams>,
}

impl CodingParameters {
    pub fn tile_grid_width(&self) -> u32 {
        ceil_div(self.image_x1 - self.tile_x0, self.tile_width)
    }

    pub fn tile_grid_height(&self) -> u32 {
        ceil_div(self.image_y1 - self.tile_y0, self.tile_height)
    }

    pub fn num_tiles(&self) -> u32 {
        self.tile_grid_width() * self.tile_grid_height()
    }

    pub fn is_htj2k(&self) -> bool {
        self.pcap & crate::constants::rsiz::HTJ2K_CAPABILITY_BIT != 0
    }

    /// Validates SIZ-level invariants from §4.1/§4.2.
    pub fn validate(&self) -> CodecResult<()> {
        if self.image_x1 <= self.image_x0 || self.image_y1 <= self.image_y0 {
            return Err(CodecError::invariant("SIZ canvas extent must be positive"));
        }
        if self.tile_x0 > self.image_x0 || self.tile_x0 + self.tile_width <= self.image_x0 {
            return Err(CodecError::invariant("tile grid does not cover image origin"));
        }
        if self.components.is_empty()
            || self.components.len() as u32 > crate::constants::MAXIMUM_COMPONENT_COUNT
        {
            return Err(CodecError::invariant("component count out of range [1, 16384]"));
        }
        for c in &self.components {
            if c.precision as u32 > crate::constants::MAXIMUM_COMPONENT_PRECISION {
                return Err(CodecError::invariant("component precision exceeds 38 bits"));
            }
        }
        Ok(())
    }
}

fn ceil_div(a: u32, b: u32) -> u32 {
    if b == 0 {
        0
    } else {
        (a + b - 1) / b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codeblock_dims_decode_from_exponents() {
        let tccp = TileComponentCodingParams {
            codeblock_width_exp: 4,
            codeblock_height_exp: 4,
            ..Default::default()
        };
        assert_eq!(tccp.codeblock_width(), 64);
        assert_eq!(tccp.codeblock_height(), 64);
        assert!(tccp.validate().is_ok());
    }

    #[test]
    fn ht_only_with_lazy_is_rejected() {
        let tccp = TileComponentCodingParams {
            cblk_sty: crate::constants::cblk_sty::HT_ONLY | crate::constants::cblk_sty::LAZY,
            ..Default::default()
        };
        assert!(tccp.validate().is_err());
    }

    #[test]
    fn tile_grid_covers_canvas() {
        let cp = CodingParameters {
            image_x0: 0,
            image_y0: 0,
            image_x1: 256,
            image_y1: 256,
            tile_x0: 0,
            tile_y0: 0,
            tile_width: 128,
            tile_height: 128,
            rsiz: 0,
            pcap: 0,
            ccap: Vec::new(),
            components: vec![ComponentSize {
                precision: 8,
                is_signed: false,
                dx: 1,
                dy: 1,
            }],
            comments: Vec::new(),
            tiles: Vec::new(),
        };
        assert_eq!(cp.tile_grid_width(), 2);
        assert_eq!(cp.tile_grid_height(), 2);
        assert_eq!(cp.num_tiles(), 4);
        assert!(cp.validate().is_ok());
    }
}
