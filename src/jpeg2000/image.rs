//! Decoded/compressed image data model: `Image`, `Tile`, `TileComponent`,
//! `Resolution`, `Subband`, `CodeBlock`.
//!
//! Per-image and per-tile *coding configuration* (SIZ/COD/QCD/COC/QCC) lives
//! in [`crate::coding_parameters::CodingParameters`]; this module holds the
//! sample data and code-block bookkeeping produced while that configuration
//! is applied to a particular tile.

use crate::coding_parameters::CodingParameters;
use crate::geometry::Rect;

/// A fully parsed (and, once decoded, fully reconstructed) image.
#[derive(Debug, Clone)]
pub struct J2kImage {
    pub params: CodingParameters,
    /// ICC profile extracted from a JP2 `colr` box, if the source was
    /// wrapped in a JP2 container rather than a raw code-stream.
    pub icc_profile: Option<Vec<u8>>,
    pub tiles: Vec<J2kTile>,
}

impl J2kImage {
    pub fn new(params: CodingParameters) -> Self {
        Self {
            params,
            icc_profile: None,
            tiles: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.params.image_x1 - self.params.image_x0
    }

    pub fn height(&self) -> u32 {
        self.params.image_y1 - self.params.image_y0
    }

    pub fn component_count(&self) -> usize {
        self.params.components.len()
    }

    pub fn is_htj2k(&self) -> bool {
        self.params.is_htj2k()
    }
}

#[derive(Debug, Clone)]
pub struct J2kTile {
    pub index: u32,
    pub rect: Rect,
    pub components: Vec<J2kTileComponent>,
}

impl J2kTile {
    pub fn new(index: u32, rect: Rect, component_count: usize) -> Self {
        Self {
            index,
            rect,
            components: (0..component_count)
                .map(|c| J2kTileComponent::new(c as u32))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct J2kTileComponent {
    pub component_index: u32,
    /// This component's rectangle within the tile, in the component's own
    /// (sub-sampled) grid, at full resolution (§4.8).
    pub rect: Rect,
    pub resolutions: Vec<J2kResolution>,
    /// Region of interest applied to this component, if an RGN marker
    /// targeted it (§4.6).
    pub roi: Option<J2kRoi>,
    /// Fully reconstructed samples (post-IDWT/MCT/level-shift/clip),
    /// row-major over the tile-component's rectangle.
    pub data: Vec<i32>,
}

impl J2kTileComponent {
    pub fn new(component_index: u32) -> Self {
        Self {
            component_index,
            rect: Rect::default(),
            resolutions: Vec::new(),
            roi: None,
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct J2kResolution {
    /// Resolution level, 0 = lowest (the NL-th decomposition's LL band).
    pub level: u8,
    pub rect: Rect,
    pub subbands: Vec<J2kSubband>,
}

#[derive(Debug, Clone, Default)]
pub struct J2kSubband {
    pub orientation: SubbandOrientation,
    pub rect: Rect,
    pub codeblocks: Vec<J2kCodeBlock>,
    /// This sub-band's precinct grid; every entry in `codeblocks` belongs to
    /// exactly one precinct. Covers the whole sub-band with exactly one
    /// precinct when COD/COC left the precinct size at its default (15,15).
    pub precincts: Vec<J2kPrecinct>,
    /// Dequantized coefficients, row-major over `rect`.
    pub data: Vec<i32>,
}

/// One cell of a sub-band's precinct grid (Annex B.6): a rectangle plus the
/// indices into the owning sub-band's `codeblocks` that fall inside it, in
/// row-major order.
#[derive(Debug, Clone, Default)]
pub struct J2kPrecinct {
    pub rect: Rect,
    pub codeblock_indices: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubbandOrientation {
    #[default]
    LL,
    HL,
    LH,
    HH,
}

/// Region of interest shift applied to a component's wavelet coefficients
/// before quantization (RGN marker, max-shift method, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct J2kRoi {
    pub component_index: u16,
    pub shift: u8,
}

#[derive(Debug, Clone, Default)]
pub struct J2kCodeBlock {
    pub rect: Rect,
    /// Raw compressed bytes gathered across however many layers have been
    /// read so far; code-blocks are coded once and truncated at layer
    /// boundaries, not re-encoded per layer (§4.4).
    pub compressed_data: Vec<u8>,
    /// Reconstructed (still-quantized) coefficients once Tier-1 has run.
    pub coefficients: Vec<i32>,
    pub width: u32,
    pub height: u32,
    pub zero_bit_planes: u8,
    /// Total coding passes included across every layer read so far.
    pub coding_passes: u32,
    /// Number of quality layers this code-block has contributed data to.
    pub layers_decoded: u32,
}

impl J2kCodeBlock {
    pub fn new(rect: Rect) -> Self {
        Self {
            width: rect.width(),
            height: rect.height(),
            rect,
            ..Default::default()
        }
    }
}

/// Builds one tile's geometry tree (component rects, then resolution and
/// sub-band rects per Annex B.5, then a code-block and precinct partition
/// per sub-band) from coding parameters alone, with every code-block and
/// sub-band's `data`/`coefficients` left empty for the driver to fill in.
pub fn build_tile(params: &CodingParameters, tile_index: u32) -> J2kTile {
    let grid_width = params.tile_grid_width().max(1);
    let p = tile_index % grid_width;
    let q = tile_index / grid_width;

    let tx0 = (params.tile_x0 + p * params.tile_width).max(params.image_x0);
    let ty0 = (params.tile_y0 + q * params.tile_height).max(params.image_y0);
    let tx1 = (params.tile_x0 + (p + 1) * params.tile_width).min(params.image_x1);
    let ty1 = (params.tile_y0 + (q + 1) * params.tile_height).min(params.image_y1);
    let tile_rect = Rect::new(tx0, ty0, tx1, ty1);

    let tcp = &params.tiles[tile_index as usize];
    let mut tile = J2kTile::new(tile_index, tile_rect, params.components.len());

    for (c, component) in tile.components.iter_mut().enumerate() {
        let dx = params.components[c].dx.max(1) as u32;
        let dy = params.components[c].dy.max(1) as u32;
        let comp_rect = tile_rect.subsample(dx, dy);
        component.rect = comp_rect;

        let tccp = &tcp.components[c];
        let num_resolutions = tccp.num_resolutions.max(1) as u32;
        let nl = num_resolutions - 1;
        let cb_w = tccp.codeblock_width();
        let cb_h = tccp.codeblock_height();

        component.resolutions = (0..num_resolutions)
            .map(|r| {
                let shift = nl - r;
                let res_rect = Rect::new(
                    crate::geometry::ceil_div_pow2(comp_rect.x0, shift),
                    crate::geometry::ceil_div_pow2(comp_rect.y0, shift),
                    crate::geometry::ceil_div_pow2(comp_rect.x1, shift),
                    crate::geometry::ceil_div_pow2(comp_rect.y1, shift),
                );
                let orientations: &[SubbandOrientation] = if r == 0 {
                    &[SubbandOrientation::LL]
                } else {
                    &[SubbandOrientation::HL, SubbandOrientation::LH, SubbandOrientation::HH]
                };
                let ndl = if r == 0 { nl } else { nl - r + 1 };
                let (res_ppx, res_ppy) = precinct_exponents(tccp, r as u8);
                let (band_ppx, band_ppy) = if r == 0 {
                    (res_ppx, res_ppy)
                } else {
                    (res_ppx.saturating_sub(1), res_ppy.saturating_sub(1))
                };
                let subbands = orientations
                    .iter()
                    .map(|&orientation| {
                        let rect = subband_rect(comp_rect, orientation, ndl);
                        let codeblocks = partition_codeblocks(rect, cb_w, cb_h);
                        let precincts = partition_precincts(rect, band_ppx, band_ppy, &codeblocks);
                        J2kSubband {
                            orientation,
                            rect,
                            codeblocks,
                            precincts,
                            data: Vec::new(),
                        }
                    })
                    .collect();
                J2kResolution {
                    level: r as u8,
                    rect: res_rect,
                    subbands,
                }
            })
            .collect();
    }

    tile
}

/// Finds the first sub-band with more than one precinct, if any, returning
/// `(component_index, resolution_level, precinct_count)`. Callers that only
/// support one packet per sub-band (rather than one packet per precinct
/// spanning every sub-band of a resolution) use this to reject a genuinely
/// multi-precinct stream instead of silently misreading it.
pub fn find_multi_precinct_subband(tile: &J2kTile) -> Option<(u32, u8, usize)> {
    for comp in &tile.components {
        for res in &comp.resolutions {
            for sb in &res.subbands {
                if sb.precincts.len() > 1 {
                    return Some((comp.component_index, res.level, sb.precincts.len()));
                }
            }
        }
    }
    None
}

/// Sub-band rectangle for one orientation at decomposition level `ndl`
/// counted from the finest resolution, per ISO/IEC 15444-1 Annex B.5
/// (eq. B-15): each sub-band is the even/odd-indexed subset of the parent
/// component rectangle selected by `(xob, yob)`.
fn subband_rect(comp_rect: Rect, orientation: SubbandOrientation, ndl: u32) -> Rect {
    let (xob, yob): (i64, i64) = match orientation {
        SubbandOrientation::LL => (0, 0),
        SubbandOrientation::HL => (1, 0),
        SubbandOrientation::LH => (0, 1),
        SubbandOrientation::HH => (1, 1),
    };
    let shift = ndl.saturating_sub(1);
    let off_x = xob << shift;
    let off_y = yob << shift;
    let d = 1i64 << ndl;

    let x0 = ceil_div_signed(comp_rect.x0 as i64 - off_x, d).max(0) as u32;
    let x1 = ceil_div_signed(comp_rect.x1 as i64 - off_x, d).max(0) as u32;
    let y0 = ceil_div_signed(comp_rect.y0 as i64 - off_y, d).max(0) as u32;
    let y1 = ceil_div_signed(comp_rect.y1 as i64 - off_y, d).max(0) as u32;
    Rect::new(x0, y0, x1.max(x0), y1.max(y0))
}

fn ceil_div_signed(a: i64, d: i64) -> i64 {
    if a >= 0 {
        (a + d - 1) / d
    } else {
        -((-a) / d)
    }
}

/// Looks up resolution `r`'s precinct size exponents from COD/COC's PPx/PPy
/// fields, defaulting to (15,15) — one precinct covering the whole
/// resolution — when the style byte didn't set `SCOD::PRECINCTS` (empty
/// `precinct_sizes`) or the array is short.
fn precinct_exponents(tccp: &crate::coding_parameters::TileComponentCodingParams, r: u8) -> (u32, u32) {
    tccp.precinct_sizes
        .get(r as usize)
        .map(|&(w, h)| (w as u32, h as u32))
        .unwrap_or((15, 15))
}

/// Partitions `codeblocks` (already laid out over `band_rect` in the usual
/// row-major code-block grid) into the precinct grid given by
/// `(ppx_exp, ppy_exp)`, mirroring the floor/ceil-aligned precinct-grid
/// partition used throughout Annex B.6: precinct cell `(px, py)` covers
/// `[px*2^ppx, (px+1)*2^ppx) x [py*2^ppy, (py+1)*2^ppy)`, clipped to
/// `band_rect`.
fn partition_precincts(band_rect: Rect, ppx_exp: u32, ppy_exp: u32, codeblocks: &[J2kCodeBlock]) -> Vec<J2kPrecinct> {
    if band_rect.is_empty() {
        return Vec::new();
    }
    let px0 = crate::geometry::floor_div_pow2(band_rect.x0, ppx_exp);
    let px1 = crate::geometry::ceil_div_pow2(band_rect.x1, ppx_exp).max(px0 + 1);
    let py0 = crate::geometry::floor_div_pow2(band_rect.y0, ppy_exp);
    let py1 = crate::geometry::ceil_div_pow2(band_rect.y1, ppy_exp).max(py0 + 1);
    let grid_w = px1 - px0;

    let mut precincts: Vec<J2kPrecinct> = (py0..py1)
        .flat_map(|py| {
            (px0..px1).map(move |px| {
                let cell = Rect::new(
                    px << ppx_exp,
                    py << ppy_exp,
                    (px + 1) << ppx_exp,
                    (py + 1) << ppy_exp,
                );
                J2kPrecinct {
                    rect: band_rect.intersect(&cell),
                    codeblock_indices: Vec::new(),
                }
            })
        })
        .collect();

    for (idx, cb) in codeblocks.iter().enumerate() {
        let px = crate::geometry::floor_div_pow2(cb.rect.x0, ppx_exp);
        let py = crate::geometry::floor_div_pow2(cb.rect.y0, ppy_exp);
        if px >= px0 && px < px1 && py >= py0 && py < py1 {
            let pi = ((py - py0) * grid_w + (px - px0)) as usize;
            precincts[pi].codeblock_indices.push(idx);
        }
    }
    precincts
}

fn partition_codeblocks(subband_rect: Rect, cb_w: u32, cb_h: u32) -> Vec<J2kCodeBlock> {
    if subband_rect.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut y = subband_rect.y0;
    while y < subband_rect.y1 {
        let y1 = (y + cb_h).min(subband_rect.y1);
        let mut x = subband_rect.x0;
        while x < subband_rect.x1 {
            let x1 = (x + cb_w).min(subband_rect.x1);
            out.push(J2kCodeBlock::new(Rect::new(x, y, x1, y1)));
            x += cb_w;
        }
        y += cb_h;
    }
    out
}

#[cfg(test)]
mod geometry_tests {
    use super::*;
    use crate::coding_parameters::{ComponentSize, TileCodingParams, TileComponentCodingParams};

    fn single_tile_params(width: u32, height: u32, num_resolutions: u8) -> CodingParameters {
        let tccp = TileComponentCodingParams {
            num_resolutions,
            codeblock_width_exp: 6,
            codeblock_height_exp: 6,
            ..Default::default()
        };
        let tile = TileCodingParams {
            components: vec![tccp],
            ..TileCodingParams::with_defaults(1)
        };
        CodingParameters {
            image_x0: 0,
            image_y0: 0,
            image_x1: width,
            image_y1: height,
            tile_x0: 0,
            tile_y0: 0,
            tile_width: width,
            tile_height: height,
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
            tiles: vec![tile],
        }
    }

    #[test]
    fn single_resolution_tile_has_only_ll() {
        let params = single_tile_params(64, 64, 1);
        let tile = build_tile(&params, 0);
        let comp = &tile.components[0];
        assert_eq!(comp.resolutions.len(), 1);
        assert_eq!(comp.resolutions[0].subbands.len(), 1);
        assert_eq!(comp.resolutions[0].subbands[0].orientation, SubbandOrientation::LL);
        assert_eq!(comp.resolutions[0].rect, Rect::new(0, 0, 64, 64));
    }

    #[test]
    fn resolution_rect_covers_its_subbands() {
        let params = single_tile_params(257, 129, 3);
        let tile = build_tile(&params, 0);
        let comp = &tile.components[0];
        assert_eq!(comp.resolutions.len(), 3);
        for res in &comp.resolutions[1..] {
            let rects: Vec<Rect> = res.subbands.iter().map(|s| s.rect).collect();
            // Sub-bands of one resolution never overlap and exactly
            // partition the next-finer resolution's extent once combined
            // with the coarser LL; we only assert the weaker, always-true
            // property that none of them exceed the resolution's rect.
            for r in &rects {
                assert!(r.x1 <= res.rect.x1 * 2 + 2);
                assert!(r.y1 <= res.rect.y1 * 2 + 2);
            }
        }
    }

    #[test]
    fn default_precinct_size_yields_one_precinct_per_subband() {
        let params = single_tile_params(200, 130, 2);
        let tile = build_tile(&params, 0);
        let comp = &tile.components[0];
        for res in &comp.resolutions {
            for sb in &res.subbands {
                assert_eq!(sb.precincts.len(), 1);
                assert_eq!(sb.precincts[0].rect, sb.rect);
                assert_eq!(sb.precincts[0].codeblock_indices.len(), sb.codeblocks.len());
            }
        }
    }

    #[test]
    fn explicit_precinct_size_splits_subband_into_a_real_grid() {
        let mut params = single_tile_params(256, 256, 2);
        // PPx=PPy=7 (128x128) at both resolutions; resolution 1's bands use
        // exponent 6 (64x64) per the band-level halving rule (resno != 0).
        params.tiles[0].components[0].precinct_sizes = vec![(7, 7), (7, 7)];
        let tile = build_tile(&params, 0);
        let comp = &tile.components[0];

        // Resolution 0 (LL, 128x128 @ level 0): one 128x128 precinct
        // exactly covers it.
        assert_eq!(comp.resolutions[0].subbands[0].precincts.len(), 1);

        // Resolution 1's HL/LH/HH bands (128x128 each) partition into a 2x2
        // grid of 64x64 precincts.
        let res1 = &comp.resolutions[1];
        for sb in &res1.subbands {
            assert_eq!(sb.precincts.len(), 4);
            let covered: Vec<Rect> = sb.precincts.iter().map(|p| p.rect).collect();
            assert!(sb.rect.covers_exactly(&covered));
            let total_cbs: usize = sb.precincts.iter().map(|p| p.codeblock_indices.len()).sum();
            assert_eq!(total_cbs, sb.codeblocks.len());
        }
    }

    #[test]
    fn codeblocks_partition_subband_without_gaps() {
        let params = single_tile_params(200, 130, 2);
        let tile = build_tile(&params, 0);
        let comp = &tile.components[0];
        for res in &comp.resolutions {
            for sb in &res.subbands {
                let rects: Vec<Rect> = sb.codeblocks.iter().map(|c| c.rect).collect();
                assert!(sb.rect.covers_exactly(&rects));
            }
        }
    }
}
