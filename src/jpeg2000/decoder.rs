//! JPEG 2000 / HTJ2K decoder (C10/C11 driver): turns a raw code-stream or
//! JP2-wrapped code-stream into a fully reconstructed [`J2kImage`].
//!
//! Per-tile work (Tier-2 packet parsing, Tier-1 block coding, IDWT, MCT,
//! level-shift/clip) runs through
//! [`crate::scheduler::Scheduler::map_tiles_partial`] since tiles carry no
//! dependency on one another; within a tile, pipeline stages run
//! sequentially on the worker thread that owns that tile (see DESIGN.md for
//! why within-tile parallelism isn't worth the complexity here).

use std::collections::HashMap;

use super::bit_io::J2kBitReader;
use super::dwt::{Dwt53, Dwt97};
use super::image::{self, J2kImage, J2kTile, J2kTileComponent, SubbandOrientation};
use super::jp2::Jp2Reader;
use super::packet::{slice_codeblock_data, PacketHeader, PrecinctState};
use super::parser::J2kParser;
use super::progression::PacketSequencer;
use super::quantization;
use crate::coding_parameters::{CodingParameters, TileComponentCodingParams};
use crate::constants::cblk_sty;
use crate::diagnostics::Diagnostics;
use crate::error::{CodecError, CodecResult};
use crate::geometry::ceil_div;
use crate::marker::MarkerCode;
use crate::mct::{Ict, Rct};
use crate::options::DecodeOptions;
use crate::scheduler::{CancellationToken, Scheduler};

use super::ht_block_coder::coder::HTBlockCoder;
use super::bit_plane_coder::BitPlaneCoder;

/// Drives a single decode call over a borrowed source buffer (raw
/// code-stream or JP2 file).
pub struct J2kDecoder<'a> {
    data: &'a [u8],
}

impl<'a> J2kDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn decode(&self, options: &DecodeOptions) -> CodecResult<(J2kImage, Diagnostics)> {
        self.decode_with_cancellation(options, &CancellationToken::new())
    }

    /// Same as [`Self::decode`] but lets the caller share a token with other
    /// in-flight work so it can be cancelled from outside.
    pub fn decode_with_cancellation(
        &self,
        options: &DecodeOptions,
        token: &CancellationToken,
    ) -> CodecResult<(J2kImage, Diagnostics)> {
        let mut diagnostics = Diagnostics::new();

        let icc_profile = Jp2Reader::new(self.data).find_icc_profile()?;
        let codestream = Jp2Reader::new(self.data)
            .find_codestream()?
            .unwrap_or(self.data);

        let mut reader = crate::stream::StreamReader::new(codestream);
        let mut params = J2kParser::new(&mut reader).parse_main_header()?;

        let mut tile_data: Vec<Vec<u8>> = vec![Vec::new(); params.num_tiles().max(1) as usize];

        loop {
            if reader.is_empty() {
                break;
            }
            let marker = reader.peek_marker()?;
            if marker == MarkerCode::EndOfCodestream {
                break;
            }
            if marker != MarkerCode::StartOfTile {
                return Err(CodecError::malformed(
                    "codestream",
                    reader.position(),
                    "expected SOT or EOC after main header",
                ));
            }

            let tph = J2kParser::new(&mut reader).parse_tile_part_header(&mut params)?;
            let data_end = if tph.tile_part_length == 0 {
                scan_for_next_marker(codestream, tph.data_offset)
            } else {
                tph.header_offset + tph.tile_part_length as usize
            }
            .min(codestream.len());

            if data_end < tph.data_offset {
                return Err(CodecError::invariant(
                    "tile-part length shorter than its own header",
                ));
            }
            if let Some(slot) = tile_data.get_mut(tph.tile_index as usize) {
                slot.extend_from_slice(&codestream[tph.data_offset..data_end]);
            } else {
                diagnostics.warn(
                    None,
                    "tile-index-out-of-range",
                    format!("SOT referenced tile {} outside the grid", tph.tile_index),
                );
            }
            reader.seek(data_end)?;
        }

        let tile_indices: Vec<u32> = match options.tile_index {
            Some(idx) => vec![idx],
            None => (0..params.num_tiles()).collect(),
        };

        let scheduler = Scheduler::new()?;
        let params_ref = &params;
        let tile_data_ref = &tile_data;
        let results = scheduler.map_tiles_partial(&tile_indices, token, |tile_index| {
            decode_tile(params_ref, tile_index, &tile_data_ref[tile_index as usize], options, token)
        })?;

        // A fatal error on one tile must not erase the others: keep every
        // tile that decoded, and surface the rest as diagnostics instead of
        // aborting the whole call.
        let mut tiles = Vec::with_capacity(results.len());
        for (tile_index, result) in results {
            match result {
                Ok(tile) => tiles.push(tile),
                Err(err) => diagnostics.warn(
                    Some(tile_index),
                    "tile-decode-failed",
                    format!("tile {tile_index} failed to decode: {err}"),
                ),
            }
        }

        let mut image = J2kImage::new(params);
        image.icc_profile = icc_profile;
        image.tiles = tiles;
        Ok((image, diagnostics))
    }
}

/// Scans forward for the next marker whose second byte has its top bit set
/// (Annex B.10.1: a stuffed 0x00 following 0xFF can never look like this),
/// used to recover a tile-part's true length when `Psot == 0` (§4.11).
fn scan_for_next_marker(data: &[u8], start: usize) -> usize {
    let mut i = start;
    while i + 1 < data.len() {
        if data[i] == 0xFF && data[i + 1] & 0x80 != 0 {
            return i;
        }
        i += 1;
    }
    data.len()
}

/// Decodes one tile end to end: Tier-2 packet parsing fills every
/// code-block's compressed bytes, then Tier-1/IDWT/MCT/level-shift runs
/// per component.
fn decode_tile(
    params: &CodingParameters,
    tile_index: u32,
    tile_data: &[u8],
    options: &DecodeOptions,
    token: &CancellationToken,
) -> CodecResult<J2kTile> {
    token.check()?;
    let mut tile = image::build_tile(params, tile_index);
    let tcp = &params.tiles[tile_index as usize];

    reject_multi_precinct_streams(tile_index, &tile)?;

    read_packets(params, tcp, &mut tile, tile_data, options, token)?;

    for (c, comp) in tile.components.iter_mut().enumerate() {
        token.check()?;
        let tccp = &tcp.components[c];
        let component_size = params
            .components
            .get(c)
            .copied()
            .unwrap_or_default();
        reconstruct_component(tile_index, c as u32, comp, tccp, component_size.precision)?;
    }

    apply_mct_and_level_shift(tile_index, params, tcp, &mut tile)?;

    if options.reduce > 0 {
        crop_to_reduced_resolution(&mut tile, tcp, options.reduce);
    }

    Ok(tile)
}

/// Rejects streams where any sub-band actually has more than one precinct.
/// [`image::build_tile`] models the real precinct grid (Subband ->
/// Precinct -> Codeblock), but [`read_packets`]/`write_codestream` below
/// still speak one packet per sub-band rather than one packet per precinct
/// spanning every sub-band of a resolution, so a true multi-precinct stream
/// would be silently misread if we let it through (see DESIGN.md).
fn reject_multi_precinct_streams(tile_index: u32, tile: &J2kTile) -> CodecResult<()> {
    if let Some((component, resolution, count)) = image::find_multi_precinct_subband(tile) {
        return Err(CodecError::unsupported(format!(
            "tile {tile_index}: component {component} resolution {resolution} has {count} \
             precincts; multi-precinct streams are not yet supported"
        )));
    }
    Ok(())
}

/// Walks this tile's packet sequence, slicing each included code-block's
/// compressed bytes out of `tile_data` into [`image::J2kCodeBlock`].
///
/// Every (component, resolution) pair's precinct layer is a single precinct
/// in practice here — [`reject_multi_precinct_streams`] has already turned
/// away anything else — so `PacketCoord::precinct` can keep indexing the 1
/// (LL) or 3 (HL/LH/HH) sub-bands a resolution owns directly.
fn read_packets(
    params: &CodingParameters,
    tcp: &crate::coding_parameters::TileCodingParams,
    tile: &mut J2kTile,
    tile_data: &[u8],
    options: &DecodeOptions,
    token: &CancellationToken,
) -> CodecResult<()> {
    let num_components = tcp.components.len();
    let num_resolutions = tcp
        .components
        .first()
        .map(|c| c.num_resolutions)
        .unwrap_or(1);

    let precinct_counts: Vec<Vec<u32>> = (0..num_components)
        .map(|_| (0..num_resolutions).map(|r| if r == 0 { 1 } else { 3 }).collect())
        .collect();

    let layer_limit = options
        .layers_to_decompress
        .unwrap_or(tcp.num_layers)
        .min(tcp.num_layers);

    let sequencer = PacketSequencer::new(tcp.num_layers, num_components as u16, num_resolutions, &precinct_counts);
    let mut sequence = sequencer.sequence_with_poc(tcp.progression_order, &tcp.progression_changes);
    sequence.retain(|coord| coord.layer < layer_limit);

    // PPM (main-header) and PPT (tile-header) relocate packet headers out of
    // the tile-part data; when present, headers come from that buffer and
    // `tile_data`/`cursor` only ever supplies code-block body bytes. The two
    // are mutually exclusive per tile (§4.3.4).
    let packed_headers: &[u8] = if !tcp.packed_packet_headers.is_empty() {
        &tcp.packed_packet_headers
    } else {
        &[]
    };
    let mut header_cursor = 0usize;
    let mut body_cursor = 0usize;
    let mut states: HashMap<(usize, usize, usize), PrecinctState> = HashMap::new();

    for coord in &sequence {
        token.check()?;
        let component = coord.component as usize;
        let resolution = coord.resolution as usize;
        let subband_index = coord.precinct as usize;

        let Some(comp) = tile.components.get_mut(component) else {
            continue;
        };
        let Some(res) = comp.resolutions.get_mut(resolution) else {
            continue;
        };
        let Some(subband) = res.subbands.get_mut(subband_index) else {
            continue;
        };
        if subband.rect.is_empty() {
            continue;
        }

        let tccp = &tcp.components[component];
        let cb_w = tccp.codeblock_width();
        let cb_h = tccp.codeblock_height();
        let grid_width = ceil_div(subband.rect.width(), cb_w) as usize;
        let grid_height = ceil_div(subband.rect.height(), cb_h) as usize;
        if grid_width == 0 || grid_height == 0 {
            continue;
        }

        let state = states
            .entry((component, resolution, subband_index))
            .or_insert_with(|| PrecinctState::new(grid_width, grid_height));

        let (header, body_source): (PacketHeader, &[u8]) = if !packed_headers.is_empty() {
            if header_cursor >= packed_headers.len() {
                continue;
            }
            let mut bit_reader = J2kBitReader::new(&packed_headers[header_cursor..]);
            let header = PacketHeader::read(&mut bit_reader, state, coord.layer as u32, grid_width, grid_height)?;
            bit_reader.align_to_byte();
            header_cursor += bit_reader.byte_position();
            (header, tile_data)
        } else {
            if body_cursor >= tile_data.len() {
                continue;
            }
            let mut bit_reader = J2kBitReader::new(&tile_data[body_cursor..]);
            let header = PacketHeader::read(&mut bit_reader, state, coord.layer as u32, grid_width, grid_height)?;
            bit_reader.align_to_byte();
            body_cursor += bit_reader.byte_position();
            (header, tile_data)
        };

        if header.empty {
            continue;
        }

        for info in &header.included_cblks {
            let slice = slice_codeblock_data(body_source, &mut body_cursor, info)?;
            let cb_index = info.y * grid_width + info.x;
            if let Some(block) = subband.codeblocks.get_mut(cb_index) {
                block.compressed_data.extend_from_slice(slice);
                if block.layers_decoded == 0 {
                    block.zero_bit_planes = info.zero_bp;
                }
                block.coding_passes += info.num_passes;
                block.layers_decoded += 1;
            }
        }
    }

    let _ = params;
    Ok(())
}

/// Tier-1 decode of every code-block in `comp`, followed by dequantization
/// into each sub-band's `data` and a progressive inverse DWT across
/// resolutions, left in `comp.data` pending MCT/level-shift.
fn reconstruct_component(
    tile_index: u32,
    component_index: u32,
    comp: &mut J2kTileComponent,
    tccp: &TileComponentCodingParams,
    precision: u8,
) -> CodecResult<()> {
    let is_ht = tccp.cblk_sty & (cblk_sty::HT_ONLY | cblk_sty::HT_MIXED) != 0;
    let num_resolutions = comp.resolutions.len();

    for res in &mut comp.resolutions {
        for subband in &mut res.subbands {
            if subband.rect.is_empty() {
                continue;
            }
            let step_size = if tccp.wavelet_id == 1 {
                1.0
            } else {
                subband_step_size(tccp, subband.orientation, res.level, precision)
            };

            subband.data = vec![0i32; subband.rect.area() as usize];
            let sb_w = subband.rect.width() as usize;

            for block in &mut subband.codeblocks {
                if block.compressed_data.is_empty() {
                    continue;
                }
                let max_bit_plane = estimate_max_bit_plane(tccp, subband.orientation, precision, block.zero_bit_planes);

                if is_ht {
                    let mid = block.compressed_data.len() / 2;
                    let (mel_data, magsgn_data) = block.compressed_data.split_at(mid);
                    let mut coder = HTBlockCoder::new(mel_data, magsgn_data, block.width as usize, block.height as usize);
                    coder
                        .decode_block(block)
                        .map_err(|_| CodecError::block_coding(tile_index, component_index, "HT block decode failed"))?;
                } else {
                    let placeholder = vec![0i32; (block.width * block.height) as usize];
                    let mut bpc = BitPlaneCoder::with_orientation(block.width, block.height, &placeholder, subband.orientation);
                    block.coefficients = bpc.decode_codeblock(&block.compressed_data, block.width, block.height, max_bit_plane)?;
                }

                let bx0 = (block.rect.x0 - subband.rect.x0) as usize;
                let by0 = (block.rect.y0 - subband.rect.y0) as usize;
                let bw = block.width as usize;
                let bh = block.height as usize;
                for by in 0..bh {
                    for bx in 0..bw {
                        let q = block.coefficients.get(by * bw + bx).copied().unwrap_or(0);
                        let value = if tccp.wavelet_id == 1 {
                            quantization::dequantize_reversible(q)
                        } else {
                            quantization::dequantize_scalar(q, step_size).round() as i32
                        };
                        let value = quantization::apply_roi_unshift(value, tccp.roi_shift);
                        let dst = (by0 + by) * sb_w + (bx0 + bx);
                        if dst < subband.data.len() {
                            subband.data[dst] = value;
                        }
                    }
                }
            }
        }
    }

    if num_resolutions == 0 {
        comp.data = Vec::new();
        return Ok(());
    }

    let mut current: Vec<i32> = comp.resolutions[0]
        .subbands
        .first()
        .map(|sb| sb.data.clone())
        .unwrap_or_default();

    for r in 1..num_resolutions {
        let res = &comp.resolutions[r];
        let hl = res.subbands.first().map(|s| s.data.as_slice()).unwrap_or(&[]);
        let lh = res.subbands.get(1).map(|s| s.data.as_slice()).unwrap_or(&[]);
        let hh = res.subbands.get(2).map(|s| s.data.as_slice()).unwrap_or(&[]);

        let mut output = vec![0i32; res.rect.area() as usize];
        if tccp.wavelet_id == 1 {
            Dwt53::inverse_2d(&current, hl, lh, hh, res.rect.width(), res.rect.height(), &mut output);
        } else {
            let current_f: Vec<f32> = current.iter().map(|&v| v as f32).collect();
            let hl_f: Vec<f32> = hl.iter().map(|&v| v as f32).collect();
            let lh_f: Vec<f32> = lh.iter().map(|&v| v as f32).collect();
            let hh_f: Vec<f32> = hh.iter().map(|&v| v as f32).collect();
            let mut output_f = vec![0.0f32; res.rect.area() as usize];
            Dwt97::inverse_2d(&current_f, &hl_f, &lh_f, &hh_f, res.rect.width(), res.rect.height(), &mut output_f);
            output = output_f.iter().map(|&v| v.round() as i32).collect();
        }
        current = output;
    }

    comp.data = current;
    Ok(())
}

/// Derives a per-sub-band f32 step size from QCD/QCC's (expn, mant) pairs
/// (Annex E.1), only meaningful for the irreversible (9/7) path.
pub(crate) fn subband_step_size(tccp: &TileComponentCodingParams, orientation: SubbandOrientation, resolution: u8, precision: u8) -> f32 {
    let quant = &tccp.quantization;
    let dynamic_range_bits = precision as u32 + quantization::subband_gain_bits(orientation);

    let (expn, mant) = if quantization::is_expounded(quant.style) {
        let band_index = if resolution == 0 {
            0
        } else {
            1 + 3 * (resolution as usize - 1)
                + match orientation {
                    SubbandOrientation::HL => 0,
                    SubbandOrientation::LH => 1,
                    SubbandOrientation::HH => 2,
                    SubbandOrientation::LL => 0,
                }
        };
        quant.step_sizes.get(band_index).copied().unwrap_or((0, 0))
    } else if let Some(&(ll_expn, ll_mant)) = quant.step_sizes.first() {
        quantization::derive_expounded_step(ll_expn, ll_mant, resolution)
    } else {
        (0, 0)
    };

    quantization::step_size_from_expn_mant(expn, mant, dynamic_range_bits)
}

/// Annex E.1's `M_b = G + e_b - 1` bit-plane count, minus the zero
/// bit-planes the packet header already reported as entirely insignificant.
pub(crate) fn estimate_max_bit_plane(
    tccp: &TileComponentCodingParams,
    orientation: SubbandOrientation,
    precision: u8,
    zero_bit_planes: u8,
) -> u8 {
    let guard_bits = tccp.quantization.guard_bits as i32;
    let gain = quantization::subband_gain_bits(orientation) as i32;
    let total = guard_bits + gain + precision as i32 - 1;
    let remaining = total - zero_bit_planes as i32;
    remaining.clamp(0, 37) as u8
}

/// Reverses the multi-component transform (RCT/ICT, mct=1 only — array MCT
/// has no marker support in this crate, see DESIGN.md), then applies the
/// DC level shift and clips to the component's declared precision.
fn apply_mct_and_level_shift(
    tile_index: u32,
    params: &CodingParameters,
    tcp: &crate::coding_parameters::TileCodingParams,
    tile: &mut J2kTile,
) -> CodecResult<()> {
    if tcp.mct == 1 && tile.components.len() >= 3 {
        let reversible = tcp.components.first().map(|c| c.wavelet_id == 1).unwrap_or(true);
        let len = tile.components[0].data.len();
        if tile.components[1].data.len() != len || tile.components[2].data.len() != len {
            return Err(CodecError::invariant(format!(
                "tile {tile_index}: MCT components have mismatched sample counts"
            )));
        }
        for i in 0..len {
            let a = tile.components[0].data[i];
            let b = tile.components[1].data[i];
            let c = tile.components[2].data[i];
            let (r, g, bl) = if reversible {
                Rct::inverse(a, b, c)
            } else {
                let (rf, gf, bf) = Ict::inverse(a as f32, b as f32, c as f32);
                (rf.round() as i32, gf.round() as i32, bf.round() as i32)
            };
            tile.components[0].data[i] = r;
            tile.components[1].data[i] = g;
            tile.components[2].data[i] = bl;
        }
    }

    for (c, comp) in tile.components.iter_mut().enumerate() {
        let size = params.components.get(c).copied().unwrap_or_default();
        let shift = if size.is_signed { 0 } else { 1i32 << (size.precision.max(1) - 1) };
        let max = (1i32 << size.precision.max(1)) - 1;
        let (lo, hi) = if size.is_signed {
            (-(max + 1) / 2, max / 2)
        } else {
            (0, max)
        };
        for v in &mut comp.data {
            *v = (*v + shift).clamp(lo, hi);
        }
    }

    Ok(())
}

/// Drops resolutions above `reduce` levels from the canvas; the per-tile
/// reconstruction above already only builds up to the tile's own recorded
/// resolutions, so this trims `comp.data` down to the coarser resolution's
/// already-reconstructed samples rather than re-running the IDWT.
fn crop_to_reduced_resolution(tile: &mut J2kTile, tcp: &crate::coding_parameters::TileCodingParams, reduce: u8) {
    for (c, comp) in tile.components.iter_mut().enumerate() {
        let Some(tccp) = tcp.components.get(c) else { continue };
        let num_resolutions = tccp.num_resolutions as u32;
        if reduce as u32 >= num_resolutions {
            continue;
        }
        let target_level = num_resolutions - 1 - reduce as u32;
        if let Some(res) = comp.resolutions.get(target_level as usize) {
            if let Some(ll) = res.subbands.first() {
                comp.rect = res.rect;
                comp.data = ll.data.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding_parameters::{ComponentSize, QuantizationParams, TileCodingParams, TileComponentCodingParams};

    fn single_tile_1res_params(width: u32, height: u32) -> CodingParameters {
        let tccp = TileComponentCodingParams {
            num_resolutions: 1,
            codeblock_width_exp: 6,
            codeblock_height_exp: 6,
            wavelet_id: 1,
            quantization: QuantizationParams {
                style: crate::constants::qcd_style::NONE,
                guard_bits: 2,
                step_sizes: vec![(0, 0)],
            },
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
    fn single_resolution_tile_decodes_with_no_packets() {
        let params = single_tile_1res_params(16, 16);
        let tile = decode_tile(&params, 0, &[], &DecodeOptions::default(), &CancellationToken::new()).unwrap();
        assert_eq!(tile.components.len(), 1);
        assert_eq!(tile.components[0].data.len(), 16 * 16);
        // No packets means no code-block data, so every reconstructed sample
        // stays at the unsigned level-shift midpoint.
        assert!(tile.components[0].data.iter().all(|&v| v == 128));
    }

    #[test]
    fn max_bit_plane_never_underflows() {
        let tccp = TileComponentCodingParams::default();
        let bp = estimate_max_bit_plane(&tccp, SubbandOrientation::HH, 8, 200);
        assert_eq!(bp, 0);
    }

    #[test]
    fn scan_for_next_marker_finds_a_real_marker_byte() {
        let data = [0x00, 0xFF, 0x00, 0xAB, 0xFF, 0x90];
        assert_eq!(scan_for_next_marker(&data, 0), 4);
    }
}
