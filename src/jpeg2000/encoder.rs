//! JPEG 2000 encoder (C10/C11 driver, compress direction): turns a planar
//! source image into a SOC..EOC code-stream.
//!
//! Mirrors [`super::decoder::J2kDecoder`]'s pipeline in reverse: level-shift
//! -> forward MCT -> forward DWT cascade -> quantize -> Tier-1 -> Tier-2
//! packets. Always emits a single tile covering the whole image and a
//! single quality layer (`EncodeOptions` carries no tiling knobs, see
//! DESIGN.md). HTJ2K's Part-15 block coder is decode-only in this crate;
//! Tier-1 here always goes through the classic MQ-coded path regardless of
//! `cblk_sty`'s HT bits (see DESIGN.md).

use std::collections::HashMap;

use super::bit_io::J2kBitWriter;
use super::bit_plane_coder::BitPlaneCoder;
use super::decoder::subband_step_size;
use super::dwt::{Dwt53, Dwt97};
use super::image::{self, J2kResolution, J2kTile, J2kTileComponent, SubbandOrientation};
use super::packet::{CodeBlockInfo, PacketHeader, PrecinctState};
use super::progression::PacketSequencer;
use super::quantization;
use super::writer::J2kWriter;
use crate::coding_parameters::{
    CodingParameters, ComponentSize, QuantizationParams, TileCodingParams, TileComponentCodingParams,
};
use crate::constants::{cblk_sty, qcd_style, scod};
use crate::error::{CodecError, CodecResult};
use crate::geometry::ceil_div;
use crate::mct::{Ict, Rct};
use crate::options::EncodeOptions;

/// One component's planar samples, pre-level-shift (i.e. in the source's
/// own signed/unsigned range), row-major over `width x height`.
#[derive(Debug, Clone)]
pub struct SourceComponent {
    pub precision: u8,
    pub is_signed: bool,
    pub dx: u8,
    pub dy: u8,
    pub samples: Vec<i32>,
}

/// A component-planar image ready to compress; the mirror of
/// [`super::image::J2kImage`] on the input side.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub width: u32,
    pub height: u32,
    pub components: Vec<SourceComponent>,
}

pub struct J2kEncoder {
    options: EncodeOptions,
}

impl J2kEncoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// Compresses `image` into `destination`, returning the number of bytes
    /// written. `destination` must be large enough to hold the whole
    /// code-stream; callers size it the way they size any other one-shot
    /// encode buffer (no streaming write path here, see DESIGN.md).
    pub fn encode(&self, image: &SourceImage, destination: &mut [u8]) -> CodecResult<usize> {
        if image.components.is_empty() {
            return Err(CodecError::invariant("image must have at least one component"));
        }
        if image.width == 0 || image.height == 0 {
            return Err(CodecError::invariant("image dimensions must be positive"));
        }
        let expected_samples = (image.width * image.height) as usize;
        for c in &image.components {
            if c.samples.len() != expected_samples {
                return Err(CodecError::invariant(
                    "component sample count does not match image dimensions",
                ));
            }
        }

        let params = self.build_params(image)?;
        let tcp = params.tiles[0].clone();
        let mut tile = image::build_tile(&params, 0);
        reject_multi_precinct_streams(&tile)?;

        let reversible = tcp.components[0].wavelet_id == 1;
        let mut planes: Vec<Vec<i32>> = image
            .components
            .iter()
            .map(|c| level_shift_forward(&c.samples, c.precision, c.is_signed))
            .collect();

        if tcp.mct == 1 && planes.len() >= 3 {
            apply_forward_mct(&mut planes, reversible)?;
        }

        for (c, comp) in tile.components.iter_mut().enumerate() {
            comp.data = std::mem::take(&mut planes[c]);
            let tccp = &tcp.components[c];
            let precision = params.components[c].precision;
            forward_transform_component(comp, tccp);
            quantize_component(comp, tccp, precision);
            encode_codeblocks(comp, tccp, precision);
        }

        write_codestream(&params, &tcp, &tile, destination)
    }

    /// Builds a single-tile `CodingParameters` from `self.options` and
    /// `image`'s geometry; the encoder never splits an image into more than
    /// one tile (§4.1, see DESIGN.md).
    fn build_params(&self, image: &SourceImage) -> CodecResult<CodingParameters> {
        let opts = &self.options;
        let reversible = opts.rate_control.is_none();
        let cb_w_exp = exponent_of(opts.codeblock_width.max(4)).saturating_sub(2) as u8;
        let cb_h_exp = exponent_of(opts.codeblock_height.max(4)).saturating_sub(2) as u8;
        let is_ht = opts.cblk_sty & (cblk_sty::HT_ONLY | cblk_sty::HT_MIXED) != 0;

        let precision = image.components.first().map(|c| c.precision).unwrap_or(8);
        let num_bands = 1 + 3 * opts.num_resolutions.saturating_sub(1) as usize;
        let quantization = if reversible {
            QuantizationParams {
                style: qcd_style::NONE,
                guard_bits: opts.num_guard_bits,
                step_sizes: vec![(0u8, 0u16); num_bands],
            }
        } else {
            QuantizationParams {
                style: qcd_style::SCALAR_EXPOUNDED,
                guard_bits: opts.num_guard_bits,
                step_sizes: expounded_step_sizes(precision, opts.num_resolutions),
            }
        };

        let tccp = TileComponentCodingParams {
            csty: if opts.precinct_sizes.is_empty() { 0 } else { scod::PRECINCTS },
            num_resolutions: opts.num_resolutions,
            codeblock_width_exp: cb_w_exp,
            codeblock_height_exp: cb_h_exp,
            cblk_sty: opts.cblk_sty,
            wavelet_id: if reversible { 1 } else { 0 },
            precinct_sizes: opts.precinct_sizes.clone(),
            quantization,
            roi_shift: 0,
        };
        tccp.validate()?;

        let mct_wire = if opts.mct != 0 && image.components.len() >= 3 { 1 } else { 0 };
        let tile = TileCodingParams {
            progression_order: opts.progression_order,
            num_layers: 1,
            mct: mct_wire,
            components: vec![tccp; image.components.len()],
            progression_changes: opts.progression_changes.clone(),
            packed_packet_headers: Vec::new(),
            tile_parts_signalled: Some(1),
            tile_parts_received: 0,
        };
        TileCodingParams::validate_progression_order(tile.progression_order)?;

        let components: Vec<ComponentSize> = image
            .components
            .iter()
            .map(|c| ComponentSize {
                precision: c.precision,
                is_signed: c.is_signed,
                dx: c.dx.max(1),
                dy: c.dy.max(1),
            })
            .collect();

        let params = CodingParameters {
            image_x0: 0,
            image_y0: 0,
            image_x1: image.width,
            image_y1: image.height,
            tile_x0: 0,
            tile_y0: 0,
            tile_width: image.width,
            tile_height: image.height,
            rsiz: if is_ht { crate::constants::rsiz::HTJ2K_CAPABILITY_BIT as u16 } else { 0 },
            pcap: if is_ht { crate::constants::rsiz::HTJ2K_CAPABILITY_BIT } else { 0 },
            ccap: Vec::new(),
            components,
            comments: Vec::new(),
            tiles: vec![tile],
        };
        params.validate()?;
        Ok(params)
    }
}

/// Rejects an `EncodeOptions::precinct_sizes` configuration that would
/// produce more than one precinct per sub-band. `write_codestream` below
/// still speaks one packet per sub-band, so a genuinely multi-precinct
/// layout would be encoded with packet boundaries that don't match what it
/// signals in COD (see DESIGN.md).
fn reject_multi_precinct_streams(tile: &J2kTile) -> CodecResult<()> {
    if let Some((component, resolution, count)) = image::find_multi_precinct_subband(tile) {
        return Err(CodecError::unsupported(format!(
            "component {component} resolution {resolution} would need {count} \
             precincts; multi-precinct encoding is not yet supported"
        )));
    }
    Ok(())
}

/// Floor log2 of a dimension in samples, used to recover COD's exponent
/// fields from a plain width/height; non-power-of-two requests round down.
fn exponent_of(n: u32) -> u32 {
    31 - n.max(1).leading_zeros()
}

/// Expounded (explicit per-sub-band) QCD step sizes for a fresh encode: one
/// entry per sub-band, LL first, then HL/LH/HH per resolution coarsest
/// first, each exponent widened by that sub-band's Table E.1 gain.
fn expounded_step_sizes(precision: u8, num_resolutions: u8) -> Vec<(u8, u16)> {
    use SubbandOrientation::*;
    let mut sizes = vec![(precision, 0u16)];
    for _ in 1..num_resolutions {
        for orientation in [HL, LH, HH] {
            let gain = quantization::subband_gain_bits(orientation) as u8;
            sizes.push((precision.saturating_add(gain), 0u16));
        }
    }
    sizes
}

fn level_shift_forward(samples: &[i32], precision: u8, is_signed: bool) -> Vec<i32> {
    let shift = if is_signed { 0 } else { 1i32 << (precision.max(1) - 1) };
    samples.iter().map(|&v| v - shift).collect()
}

/// Forward RCT/ICT across the first three planes (§4.7); array MCT has no
/// marker support here, matching decode (see DESIGN.md).
fn apply_forward_mct(planes: &mut [Vec<i32>], reversible: bool) -> CodecResult<()> {
    let len = planes[0].len();
    if planes[1].len() != len || planes[2].len() != len {
        return Err(CodecError::invariant("MCT components must have matching sample counts"));
    }
    for i in 0..len {
        let r = planes[0][i];
        let g = planes[1][i];
        let b = planes[2][i];
        let (y, cb, cr) = if reversible {
            Rct::forward(r, g, b)
        } else {
            let (yf, cbf, crf) = Ict::forward(r as f32, g as f32, b as f32);
            (yf.round() as i32, cbf.round() as i32, crf.round() as i32)
        };
        planes[0][i] = y;
        planes[1][i] = cb;
        planes[2][i] = cr;
    }
    Ok(())
}

/// Dimensions of one level's four sub-bands from its parent's width/height,
/// matching the formulas [`Dwt53::inverse_2d`]/[`Dwt97::inverse_2d`] already
/// use on the decode side.
fn cascade_dims(width: u32, height: u32) -> (usize, usize, usize, usize) {
    let w = width as usize;
    let h = height as usize;
    #[allow(clippy::manual_div_ceil)]
    ((w + 1) / 2, (h + 1) / 2, w / 2, h / 2)
}

fn dwt53_analyze(data: &[i32], width: u32, height: u32) -> (Vec<i32>, Vec<i32>, Vec<i32>, Vec<i32>) {
    let w = width as usize;
    let h = height as usize;
    let (ll_w, ll_h, hl_w, lh_h) = cascade_dims(width, height);

    let mut row_l = vec![0i32; ll_w * h];
    let mut row_h = vec![0i32; hl_w * h];
    for y in 0..h {
        let row = &data[y * w..(y + 1) * w];
        Dwt53::forward(row, &mut row_l[y * ll_w..(y + 1) * ll_w], &mut row_h[y * hl_w..(y + 1) * hl_w]);
    }

    let mut ll = vec![0i32; ll_w * ll_h];
    let mut lh = vec![0i32; ll_w * lh_h];
    for x in 0..ll_w {
        let col: Vec<i32> = (0..h).map(|y| row_l[y * ll_w + x]).collect();
        let mut col_l = vec![0i32; ll_h];
        let mut col_h = vec![0i32; lh_h];
        Dwt53::forward(&col, &mut col_l, &mut col_h);
        for y in 0..ll_h {
            ll[y * ll_w + x] = col_l[y];
        }
        for y in 0..lh_h {
            lh[y * ll_w + x] = col_h[y];
        }
    }

    let mut hl = vec![0i32; hl_w * ll_h];
    let mut hh = vec![0i32; hl_w * lh_h];
    for x in 0..hl_w {
        let col: Vec<i32> = (0..h).map(|y| row_h[y * hl_w + x]).collect();
        let mut col_l = vec![0i32; ll_h];
        let mut col_h = vec![0i32; lh_h];
        Dwt53::forward(&col, &mut col_l, &mut col_h);
        for y in 0..ll_h {
            hl[y * hl_w + x] = col_l[y];
        }
        for y in 0..lh_h {
            hh[y * hl_w + x] = col_h[y];
        }
    }

    (ll, hl, lh, hh)
}

fn dwt97_analyze(data: &[f32], width: u32, height: u32) -> (Vec<f32>, Vec<f32>, Vec<f32>, Vec<f32>) {
    let w = width as usize;
    let h = height as usize;
    let (ll_w, ll_h, hl_w, lh_h) = cascade_dims(width, height);

    let mut row_l = vec![0.0f32; ll_w * h];
    let mut row_h = vec![0.0f32; hl_w * h];
    for y in 0..h {
        let row = &data[y * w..(y + 1) * w];
        Dwt97::forward(row, &mut row_l[y * ll_w..(y + 1) * ll_w], &mut row_h[y * hl_w..(y + 1) * hl_w]);
    }

    let mut ll = vec![0.0f32; ll_w * ll_h];
    let mut lh = vec![0.0f32; ll_w * lh_h];
    for x in 0..ll_w {
        let col: Vec<f32> = (0..h).map(|y| row_l[y * ll_w + x]).collect();
        let mut col_l = vec![0.0f32; ll_h];
        let mut col_h = vec![0.0f32; lh_h];
        Dwt97::forward(&col, &mut col_l, &mut col_h);
        for y in 0..ll_h {
            ll[y * ll_w + x] = col_l[y];
        }
        for y in 0..lh_h {
            lh[y * ll_w + x] = col_h[y];
        }
    }

    let mut hl = vec![0.0f32; hl_w * ll_h];
    let mut hh = vec![0.0f32; hl_w * lh_h];
    for x in 0..hl_w {
        let col: Vec<f32> = (0..h).map(|y| row_h[y * hl_w + x]).collect();
        let mut col_l = vec![0.0f32; ll_h];
        let mut col_h = vec![0.0f32; lh_h];
        Dwt97::forward(&col, &mut col_l, &mut col_h);
        for y in 0..ll_h {
            hl[y * hl_w + x] = col_l[y];
        }
        for y in 0..lh_h {
            hh[y * hl_w + x] = col_h[y];
        }
    }

    (ll, hl, lh, hh)
}

/// Runs the forward wavelet cascade from the finest resolution down to the
/// LL, leaving every resolution's HL/LH/HH (and the final LL) populated in
/// `comp.resolutions[*].subbands[*].data`, pre-quantization.
fn forward_transform_component(comp: &mut J2kTileComponent, tccp: &TileComponentCodingParams) {
    let num_resolutions = comp.resolutions.len();
    if num_resolutions == 0 {
        return;
    }
    let top_rect = comp.resolutions[num_resolutions - 1].rect;
    let reversible = tccp.wavelet_id == 1;

    let mut current_i: Vec<i32> = std::mem::take(&mut comp.data);
    let mut current_f: Vec<f32> = if reversible {
        Vec::new()
    } else {
        current_i.iter().map(|&v| v as f32).collect()
    };

    let mut width = top_rect.width();
    let mut height = top_rect.height();

    for r in (1..num_resolutions).rev() {
        let (ll_w, ll_h, _hl_w, _lh_h) = cascade_dims(width, height);
        let res = &mut comp.resolutions[r];
        if reversible {
            let (ll, hl, lh, hh) = dwt53_analyze(&current_i, width, height);
            assign_subband(res, 0, hl);
            assign_subband(res, 1, lh);
            assign_subband(res, 2, hh);
            current_i = ll;
        } else {
            let (ll, hl, lh, hh) = dwt97_analyze(&current_f, width, height);
            assign_subband_rounded(res, 0, &hl);
            assign_subband_rounded(res, 1, &lh);
            assign_subband_rounded(res, 2, &hh);
            current_f = ll;
        }
        width = ll_w as u32;
        height = ll_h as u32;
    }

    if let Some(res0) = comp.resolutions.first_mut() {
        if let Some(ll_sb) = res0.subbands.first_mut() {
            ll_sb.data = if reversible {
                current_i
            } else {
                current_f.iter().map(|&v| v.round() as i32).collect()
            };
        }
    }
}

fn assign_subband(res: &mut J2kResolution, idx: usize, data: Vec<i32>) {
    if let Some(sb) = res.subbands.get_mut(idx) {
        sb.data = data;
    }
}

fn assign_subband_rounded(res: &mut J2kResolution, idx: usize, data: &[f32]) {
    if let Some(sb) = res.subbands.get_mut(idx) {
        sb.data = data.iter().map(|&v| v.round() as i32).collect();
    }
}

/// Applies forward scalar quantization in place; the reversible (5/3) path
/// is the identity (§4.5), so only the irreversible sub-bands are touched.
fn quantize_component(comp: &mut J2kTileComponent, tccp: &TileComponentCodingParams, precision: u8) {
    if tccp.wavelet_id == 1 {
        return;
    }
    for res in &mut comp.resolutions {
        for sb in &mut res.subbands {
            if sb.rect.is_empty() || sb.data.is_empty() {
                continue;
            }
            let step = subband_step_size(tccp, sb.orientation, res.level, precision);
            for v in &mut sb.data {
                *v = quantization::quantize_scalar(*v as f32, step);
            }
        }
    }
}

/// Tier-1 encodes every non-empty code-block via the classic MQ-coded path
/// (see module docs), deriving `zero_bit_planes`/`coding_passes` so that
/// decode's own `M_b - zero_bit_planes` bit-plane count matches exactly how
/// many planes were actually coded here.
fn encode_codeblocks(comp: &mut J2kTileComponent, tccp: &TileComponentCodingParams, precision: u8) {
    let guard_bits = tccp.quantization.guard_bits as i32;
    for res in &mut comp.resolutions {
        for sb in &mut res.subbands {
            if sb.rect.is_empty() || sb.data.is_empty() {
                continue;
            }
            let gain = quantization::subband_gain_bits(sb.orientation) as i32;
            let total = guard_bits + gain + precision as i32 - 1;
            let sb_w = sb.rect.width() as usize;

            for block in &mut sb.codeblocks {
                let bx0 = (block.rect.x0 - sb.rect.x0) as usize;
                let by0 = (block.rect.y0 - sb.rect.y0) as usize;
                let bw = block.width as usize;
                let bh = block.height as usize;

                let mut coeffs = vec![0i32; bw * bh];
                for by in 0..bh {
                    for bx in 0..bw {
                        let src = (by0 + by) * sb_w + (bx0 + bx);
                        coeffs[by * bw + bx] = sb.data.get(src).copied().unwrap_or(0);
                    }
                }

                let max_val = coeffs.iter().map(|v| v.unsigned_abs()).max().unwrap_or(0);
                if max_val == 0 {
                    continue;
                }
                let planes = 32 - max_val.leading_zeros();
                let zero_bp = (total - planes as i32 + 1).clamp(0, 255) as u8;
                let num_passes = (3 * planes).saturating_sub(2);

                let mut bpc = BitPlaneCoder::with_orientation(block.width, block.height, &coeffs, sb.orientation);
                let compressed = bpc.encode_codeblock();

                block.coefficients = coeffs;
                block.compressed_data = compressed;
                block.zero_bit_planes = zero_bp;
                block.coding_passes = num_passes;
                block.layers_decoded = 1;
            }
        }
    }
}

/// Serializes the full code-stream: SOC/SIZ/(CAP)/COD/QCD, one SOT/SOD tile
/// part holding every packet this tile's single quality layer produces, and
/// EOC. Packets are written in the same (component, resolution, sub-band)
/// order `decoder.rs::read_packets` reads them back in, each packet's
/// header immediately followed by its included code-blocks' bytes so a
/// single linear cursor recovers both (see DESIGN.md).
fn write_codestream(
    params: &CodingParameters,
    tcp: &TileCodingParams,
    tile: &J2kTile,
    destination: &mut [u8],
) -> CodecResult<usize> {
    let mut writer = J2kWriter::new(destination);
    writer.write_soc()?;
    writer.write_siz(params)?;
    if params.is_htj2k() {
        writer.write_cap(params.pcap, &params.ccap)?;
    }
    let tccp0 = &tcp.components[0];
    writer.write_cod(tcp.progression_order, tcp.num_layers, tcp.mct, tccp0)?;
    writer.write_qcd(&tccp0.quantization)?;

    let sot_offset = writer.len();
    writer.write_sot(0, 0, 0, 1)?;
    writer.write_sod()?;

    let num_components = tcp.components.len();
    let num_resolutions = tccp0.num_resolutions;
    let precinct_counts: Vec<Vec<u32>> = (0..num_components)
        .map(|_| (0..num_resolutions).map(|r| if r == 0 { 1 } else { 3 }).collect())
        .collect();
    let sequencer = PacketSequencer::new(tcp.num_layers, num_components as u16, num_resolutions, &precinct_counts);
    let sequence = sequencer.sequence_with_poc(tcp.progression_order, &tcp.progression_changes);

    let mut body = Vec::new();
    let mut states: HashMap<(usize, usize, usize), PrecinctState> = HashMap::new();

    for coord in &sequence {
        let component = coord.component as usize;
        let resolution = coord.resolution as usize;
        let subband_index = coord.precinct as usize;

        let Some(comp) = tile.components.get(component) else { continue };
        let Some(res) = comp.resolutions.get(resolution) else { continue };
        let Some(sb) = res.subbands.get(subband_index) else { continue };
        if sb.rect.is_empty() {
            continue;
        }

        let tccp = &tcp.components[component];
        let grid_width = ceil_div(sb.rect.width(), tccp.codeblock_width()) as usize;
        let grid_height = ceil_div(sb.rect.height(), tccp.codeblock_height()) as usize;
        if grid_width == 0 || grid_height == 0 {
            continue;
        }

        let key = (component, resolution, subband_index);
        let first_visit = !states.contains_key(&key);
        let state = states.entry(key).or_insert_with(|| PrecinctState::new(grid_width, grid_height));

        if first_visit {
            let mut inclusion_leaves = vec![i32::MAX; grid_width * grid_height];
            let mut zero_bp_leaves = vec![0i32; grid_width * grid_height];
            for (idx, block) in sb.codeblocks.iter().enumerate() {
                if !block.compressed_data.is_empty() {
                    inclusion_leaves[idx] = 0;
                    zero_bp_leaves[idx] = block.zero_bit_planes as i32;
                }
            }
            state.inclusion_tree.set_values(&inclusion_leaves);
            state.zero_bp_tree.set_values(&zero_bp_leaves);
        }

        let mut included_cblks = Vec::new();
        let mut bodies: Vec<&[u8]> = Vec::new();
        for (idx, block) in sb.codeblocks.iter().enumerate() {
            if block.compressed_data.is_empty() {
                continue;
            }
            included_cblks.push(CodeBlockInfo {
                x: idx % grid_width,
                y: idx / grid_width,
                included: true,
                num_passes: block.coding_passes.max(1),
                data_len: block.compressed_data.len() as u32,
                zero_bp: block.zero_bit_planes,
            });
            bodies.push(&block.compressed_data);
        }

        let header = PacketHeader {
            packet_seq_num: 0,
            empty: included_cblks.is_empty(),
            layer_index: coord.layer as u32,
            included_cblks,
        };

        let mut header_writer = J2kBitWriter::new();
        header.write(&mut header_writer, state, grid_width, grid_height);
        body.extend_from_slice(&header_writer.finish());
        for b in bodies {
            body.extend_from_slice(b);
        }
    }

    writer.write_bytes(&body)?;
    writer.write_eoc()?;

    let total_len = writer.len();
    J2kWriter::patch_tile_part_length(destination, sot_offset, (total_len - sot_offset) as u32);
    Ok(total_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DecodeOptions;

    fn gray_image(width: u32, height: u32) -> SourceImage {
        let samples: Vec<i32> = (0..(width * height) as i32).map(|v| (v * 37) % 256).collect();
        SourceImage {
            width,
            height,
            components: vec![SourceComponent {
                precision: 8,
                is_signed: false,
                dx: 1,
                dy: 1,
                samples,
            }],
        }
    }

    #[test]
    fn writes_marker_sequence_with_sot_sod_eoc() {
        let image = gray_image(8, 8);
        let options = EncodeOptions {
            num_resolutions: 1,
            codeblock_width: 64,
            codeblock_height: 64,
            ..EncodeOptions::default()
        };
        let encoder = J2kEncoder::new(options);
        let mut buffer = vec![0u8; 4096];
        let len = encoder.encode(&image, &mut buffer).unwrap();
        let codestream = &buffer[..len];

        assert_eq!(&codestream[0..2], &[0xFF, 0x4F]);
        assert_eq!(&codestream[2..4], &[0xFF, 0x51]);
        assert!(codestream.windows(2).any(|w| w == [0xFF, 0x52])); // COD
        assert!(codestream.windows(2).any(|w| w == [0xFF, 0x5C])); // QCD
        assert!(codestream.windows(2).any(|w| w == [0xFF, 0x90])); // SOT
        assert!(codestream.windows(2).any(|w| w == [0xFF, 0xD9])); // EOC
    }

    #[test]
    fn round_trips_single_resolution_grayscale_lossless() {
        let image = gray_image(8, 8);
        let options = EncodeOptions {
            num_resolutions: 1,
            codeblock_width: 64,
            codeblock_height: 64,
            ..EncodeOptions::default()
        };
        let encoder = J2kEncoder::new(options);
        let mut buffer = vec![0u8; 4096];
        let len = encoder.encode(&image, &mut buffer).unwrap();

        let (decoded, _diagnostics) = super::super::decoder::J2kDecoder::new(&buffer[..len])
            .decode(&DecodeOptions::default())
            .unwrap();

        assert_eq!(decoded.tiles[0].components[0].data, image.components[0].samples);
    }

    #[test]
    fn rejects_mismatched_sample_count() {
        let mut image = gray_image(8, 8);
        image.components[0].samples.pop();
        let encoder = J2kEncoder::new(EncodeOptions::default());
        let mut buffer = vec![0u8; 4096];
        assert!(encoder.encode(&image, &mut buffer).is_err());
    }
}
