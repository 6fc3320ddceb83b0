//! Marker codec, main-header half (C10, §4.1/§4.2): turns the SOC...SOT
//! prefix of a code-stream into a [`CodingParameters`], then reads each
//! tile-part's header (SOT plus any COD/COC/QCD/QCC/RGN/POC overrides) up
//! to SOD.

use crate::coding_parameters::{
    CodingParameters, ComponentSize, ProgressionOrderChange, QuantizationParams, TileCodingParams,
    TileComponentCodingParams,
};
use crate::error::{CodecError, CodecResult};
use crate::jpeg2000::image::J2kRoi;
use crate::marker::MarkerCode;
use crate::stream::StreamReader;

/// What one SOT...SOD tile-part header contributed, plus where its packet
/// data starts (immediately after SOD).
#[derive(Debug, Clone)]
pub struct TilePartHeader {
    pub tile_index: u16,
    /// Byte offset of this tile-part's SOT marker, i.e. what `Psot` counts from.
    pub header_offset: usize,
    pub tile_part_length: u32,
    pub tile_part_index: u8,
    pub num_tile_parts: u8,
    pub data_offset: usize,
    pub roi: Vec<J2kRoi>,
}

pub struct J2kParser<'a, 'b> {
    reader: &'b mut StreamReader<'a>,
}

impl<'a, 'b> J2kParser<'a, 'b> {
    pub fn new(reader: &'b mut StreamReader<'a>) -> Self {
        Self { reader }
    }

    /// Parses SOC through the end of the main header (everything up to but
    /// not including the first SOT), returning the assembled coding
    /// parameters with one [`TileCodingParams`] template per tile in the
    /// grid, all initialized from the main-header COD/QCD/COC/QCC.
    pub fn parse_main_header(&mut self) -> CodecResult<CodingParameters> {
        let soc = self.reader.read_marker()?;
        if soc != MarkerCode::StartOfCodestream {
            return Err(CodecError::malformed("SOC", 0, "code-stream must begin with SOC"));
        }

        let siz = self.reader.read_marker()?;
        if siz != MarkerCode::ImageAndTileSize {
            return Err(CodecError::malformed(
                "SIZ",
                self.reader.position(),
                "SOC must be immediately followed by SIZ",
            ));
        }
        let mut params = self.parse_siz()?;
        let mut default_tccp = TileComponentCodingParams::default();
        let mut default_quant = QuantizationParams::default();
        let mut progression_order = crate::constants::progression::LRCP;
        let mut num_layers = 1u16;
        let mut mct = 0u8;
        let mut progression_changes = Vec::new();
        let mut packed_packet_headers = Vec::new();
        let mut main_header_roi = Vec::new();

        loop {
            let marker = self.reader.peek_marker()?;
            if marker == MarkerCode::StartOfTile {
                break;
            }
            self.reader.read_marker()?;
            match marker {
                MarkerCode::CodingStyleDefault => {
                    let (po, layers, m, tccp) = self.parse_cod()?;
                    progression_order = po;
                    num_layers = layers;
                    mct = m;
                    default_tccp = tccp;
                }
                MarkerCode::CodingStyleComponent => {
                    let _ = self.parse_coc(params.components.len())?;
                }
                MarkerCode::QuantizationDefault => {
                    default_quant = self.parse_qcd()?;
                }
                MarkerCode::QuantizationComponent => {
                    let _ = self.parse_qcc(params.components.len())?;
                }
                MarkerCode::RegionOfInterest => {
                    main_header_roi.push(self.parse_rgn()?);
                }
                MarkerCode::ProgressionOrderChange => {
                    progression_changes.extend(self.parse_poc()?);
                }
                MarkerCode::PackedPacketHeadersMainHeader => {
                    self.parse_ppm(&mut packed_packet_headers)?;
                }
                MarkerCode::Capability => {
                    let (pcap, ccap) = self.parse_cap()?;
                    params.pcap = pcap;
                    params.ccap = ccap;
                }
                MarkerCode::Comment => {
                    params.comments.push(self.read_length_prefixed_payload()?);
                }
                other if other.has_length_field() => {
                    self.skip_segment()?;
                }
                _ => {
                    return Err(CodecError::malformed(
                        "main header",
                        self.reader.position(),
                        "unexpected delimiter-only marker in main header",
                    ));
                }
            }
        }

        default_tccp.quantization = default_quant;
        let mut tccps = vec![default_tccp; params.components.len()];
        for roi in &main_header_roi {
            if let Some(c) = tccps.get_mut(roi.component_index as usize) {
                c.roi_shift = roi.shift;
            }
        }
        for t in &mut tccps {
            t.validate()?;
        }
        let default_tile = TileCodingParams {
            progression_order,
            num_layers,
            mct,
            components: tccps,
            progression_changes,
            packed_packet_headers,
            tile_parts_signalled: None,
            tile_parts_received: 0,
        };
        TileCodingParams::validate_progression_order(default_tile.progression_order)?;

        let num_tiles = params.num_tiles().max(1) as usize;
        params.tiles = vec![default_tile; num_tiles];
        params.validate()?;
        Ok(params)
    }

    fn parse_siz(&mut self) -> CodecResult<CodingParameters> {
        let _length = self.reader.read_u16()?;
        let rsiz = self.reader.read_u16()?;
        let image_x1 = self.reader.read_u32()?;
        let image_y1 = self.reader.read_u32()?;
        let image_x0 = self.reader.read_u32()?;
        let image_y0 = self.reader.read_u32()?;
        let tile_width = self.reader.read_u32()?;
        let tile_height = self.reader.read_u32()?;
        let tile_x0 = self.reader.read_u32()?;
        let tile_y0 = self.reader.read_u32()?;
        let component_count = self.reader.read_u16()?;

        let mut components = Vec::with_capacity(component_count as usize);
        for _ in 0..component_count {
            let ssiz = self.reader.read_u8()?;
            let dx = self.reader.read_u8()?;
            let dy = self.reader.read_u8()?;
            components.push(ComponentSize {
                precision: (ssiz & 0x7F) + 1,
                is_signed: ssiz & 0x80 != 0,
                dx,
                dy,
            });
        }

        Ok(CodingParameters {
            image_x0,
            image_y0,
            image_x1,
            image_y1,
            tile_x0,
            tile_y0,
            tile_width,
            tile_height,
            rsiz,
            pcap: 0,
            ccap: Vec::new(),
            components,
            comments: Vec::new(),
            tiles: Vec::new(),
        })
    }

    fn parse_cod(&mut self) -> CodecResult<(u8, u16, u8, TileComponentCodingParams)> {
        let _length = self.reader.read_u16()?;
        let scod = self.reader.read_u8()?;
        let progression_order = self.reader.read_u8()?;
        let num_layers = self.reader.read_u16()?;
        let mct = self.reader.read_u8()?;
        let tccp = self.parse_spcod_body(scod)?;
        Ok((progression_order, num_layers, mct, tccp))
    }

    fn parse_coc(&mut self, num_components: usize) -> CodecResult<(u16, TileComponentCodingParams)> {
        let _length = self.reader.read_u16()?;
        let component_index = if num_components < 257 {
            self.reader.read_u8()? as u16
        } else {
            self.reader.read_u16()?
        };
        let ccoc = self.reader.read_u8()?;
        let tccp = self.parse_spcod_body(ccoc)?;
        Ok((component_index, tccp))
    }

    fn parse_spcod_body(&mut self, style_byte: u8) -> CodecResult<TileComponentCodingParams> {
        let num_decomp_levels = self.reader.read_u8()?;
        let codeblock_width_exp = self.reader.read_u8()?;
        let codeblock_height_exp = self.reader.read_u8()?;
        let cblk_sty = self.reader.read_u8()?;
        let wavelet_id = self.reader.read_u8()?;

        let mut precinct_sizes = Vec::new();
        if style_byte & crate::constants::scod::PRECINCTS != 0 {
            for _ in 0..=num_decomp_levels {
                let byte = self.reader.read_u8()?;
                precinct_sizes.push((byte & 0x0F, (byte >> 4) & 0x0F));
            }
        }

        Ok(TileComponentCodingParams {
            csty: style_byte,
            num_resolutions: num_decomp_levels + 1,
            codeblock_width_exp,
            codeblock_height_exp,
            cblk_sty,
            wavelet_id,
            precinct_sizes,
            quantization: QuantizationParams::default(),
            roi_shift: 0,
        })
    }

    fn parse_qcd(&mut self) -> CodecResult<QuantizationParams> {
        let length = self.reader.read_u16()?;
        self.parse_sqcd_body(length)
    }

    fn parse_qcc(&mut self, num_components: usize) -> CodecResult<(u16, QuantizationParams)> {
        let length = self.reader.read_u16()?;
        let component_index = if num_components < 257 {
            self.reader.read_u8()? as u16
        } else {
            self.reader.read_u16()?
        };
        let consumed = if num_components < 257 { 1 } else { 2 };
        let quant = self.parse_sqcd_body(length - consumed)?;
        Ok((component_index, quant))
    }

    fn parse_sqcd_body(&mut self, remaining_length: u16) -> CodecResult<QuantizationParams> {
        let sqcd = self.reader.read_u8()?;
        let style = sqcd & 0x1F;
        let guard_bits = sqcd >> 5;
        let mut remaining = remaining_length.saturating_sub(3) as i32;

        let mut step_sizes = Vec::new();
        if style == crate::constants::qcd_style::NONE {
            while remaining > 0 {
                let byte = self.reader.read_u8()?;
                step_sizes.push((byte >> 3, 0));
                remaining -= 1;
            }
        } else {
            while remaining > 0 {
                let word = self.reader.read_u16()?;
                step_sizes.push(((word >> 11) as u8, word & 0x07FF));
                remaining -= 2;
            }
        }

        Ok(QuantizationParams {
            style,
            guard_bits,
            step_sizes,
        })
    }

    fn parse_rgn(&mut self) -> CodecResult<J2kRoi> {
        let length = self.reader.read_u16()?;
        let num_components_field = if length >= 6 { 2 } else { 1 };
        let component_index = if num_components_field == 1 {
            self.reader.read_u8()? as u16
        } else {
            self.reader.read_u16()?
        };
        let _roi_style = self.reader.read_u8()?;
        let shift = self.reader.read_u8()?;
        Ok(J2kRoi {
            component_index,
            shift,
        })
    }

    fn parse_poc(&mut self) -> CodecResult<Vec<ProgressionOrderChange>> {
        let length = self.reader.read_u16()?;
        let short_form = length < 9 + 7;
        let entry_size = if short_form { 7 } else { 9 };
        let mut remaining = length.saturating_sub(2) as i32;
        let mut out = Vec::new();
        while remaining >= entry_size as i32 {
            let resolution_start = self.reader.read_u8()?;
            let component_start = if short_form {
                self.reader.read_u8()? as u16
            } else {
                self.reader.read_u16()?
            };
            let layer_end = self.reader.read_u16()?;
            let resolution_end = self.reader.read_u8()?;
            let component_end = if short_form {
                self.reader.read_u8()? as u16
            } else {
                self.reader.read_u16()?
            };
            let progression_order = self.reader.read_u8()?;
            out.push(ProgressionOrderChange {
                resolution_start,
                component_start,
                layer_end,
                resolution_end,
                component_end,
                progression_order,
            });
            remaining -= entry_size as i32;
        }
        Ok(out)
    }

    fn parse_cap(&mut self) -> CodecResult<(u32, Vec<u16>)> {
        let length = self.reader.read_u16()?;
        let pcap = self.reader.read_u32()?;
        let mut ccap = Vec::new();
        let mut remaining = length.saturating_sub(6) as i32;
        while remaining >= 2 {
            ccap.push(self.reader.read_u16()?);
            remaining -= 2;
        }
        Ok((pcap, ccap))
    }

    fn parse_ppm(&mut self, packed_headers: &mut Vec<u8>) -> CodecResult<()> {
        let length = self.reader.read_u16()?;
        let mut remaining = length.saturating_sub(2) as i32;
        let _index = self.reader.read_u8()?;
        remaining -= 1;
        while remaining > 0 {
            packed_headers.push(self.reader.read_u8()?);
            remaining -= 1;
        }
        Ok(())
    }

    fn read_length_prefixed_payload(&mut self) -> CodecResult<Vec<u8>> {
        let length = self.reader.read_u16()?;
        let mut remaining = length.saturating_sub(2) as i32;
        let mut payload = Vec::new();
        while remaining > 0 {
            payload.push(self.reader.read_u8()?);
            remaining -= 1;
        }
        Ok(payload)
    }

    fn skip_segment(&mut self) -> CodecResult<()> {
        let length = self.reader.read_u16()?;
        self.reader.advance(length.saturating_sub(2) as usize)
    }

    /// Parses one tile-part header: SOT plus any COD/COC/QCD/QCC/RGN/POC
    /// overrides local to this tile-part, stopping right after SOD. On
    /// return the stream cursor sits at the first byte of packet data.
    pub fn parse_tile_part_header(&mut self, params: &mut CodingParameters) -> CodecResult<TilePartHeader> {
        let header_offset = self.reader.position();
        let sot = self.reader.read_marker()?;
        if sot != MarkerCode::StartOfTile {
            return Err(CodecError::malformed(
                "SOT",
                self.reader.position(),
                "expected SOT at start of tile-part",
            ));
        }
        let _length = self.reader.read_u16()?;
        let tile_index = self.reader.read_u16()?;
        let tile_part_length = self.reader.read_u32()?;
        let tile_part_index = self.reader.read_u8()?;
        let num_tile_parts = self.reader.read_u8()?;

        if params.tiles.is_empty() {
            return Err(CodecError::invariant("SOT encountered before main header established tile defaults"));
        }
        if tile_index as usize >= params.tiles.len() {
            return Err(CodecError::invariant(format!(
                "tile index {tile_index} out of range for {} tiles",
                params.tiles.len()
            )));
        }
        let mut roi = Vec::new();

        loop {
            let marker = self.reader.peek_marker()?;
            if marker == MarkerCode::StartOfData {
                self.reader.read_marker()?;
                break;
            }
            self.reader.read_marker()?;
            match marker {
                MarkerCode::CodingStyleDefault => {
                    let (po, layers, mct, tccp) = self.parse_cod()?;
                    let tile = &mut params.tiles[tile_index as usize];
                    tile.progression_order = po;
                    tile.num_layers = layers;
                    tile.mct = mct;
                    for c in &mut tile.components {
                        *c = tccp.clone();
                    }
                }
                MarkerCode::CodingStyleComponent => {
                    let (component_index, tccp) = self.parse_coc(params.components.len())?;
                    if let Some(c) = params.tiles[tile_index as usize]
                        .components
                        .get_mut(component_index as usize)
                    {
                        *c = tccp;
                    }
                }
                MarkerCode::QuantizationDefault => {
                    let quant = self.parse_qcd()?;
                    for c in &mut params.tiles[tile_index as usize].components {
                        c.quantization = quant.clone();
                    }
                }
                MarkerCode::QuantizationComponent => {
                    let (component_index, quant) = self.parse_qcc(params.components.len())?;
                    if let Some(c) = params.tiles[tile_index as usize]
                        .components
                        .get_mut(component_index as usize)
                    {
                        c.quantization = quant;
                    }
                }
                MarkerCode::RegionOfInterest => {
                    let r = self.parse_rgn()?;
                    if let Some(c) = params.tiles[tile_index as usize]
                        .components
                        .get_mut(r.component_index as usize)
                    {
                        c.roi_shift = r.shift;
                    }
                    roi.push(r);
                }
                MarkerCode::ProgressionOrderChange => {
                    let pocs = self.parse_poc()?;
                    params.tiles[tile_index as usize].progression_changes.extend(pocs);
                }
                MarkerCode::PackedPacketHeadersTilePart => {
                    let length = self.reader.read_u16()?;
                    let mut remaining = length.saturating_sub(2) as i32;
                    let tile = &mut params.tiles[tile_index as usize];
                    while remaining > 0 {
                        tile.packed_packet_headers.push(self.reader.read_u8()?);
                        remaining -= 1;
                    }
                }
                other if other.has_length_field() => {
                    self.skip_segment()?;
                }
                _ => {
                    return Err(CodecError::malformed(
                        "tile-part header",
                        self.reader.position(),
                        "unexpected delimiter-only marker in tile-part header",
                    ));
                }
            }
        }

        params.tiles[tile_index as usize].tile_parts_received += 1;
        if num_tile_parts > 0 {
            params.tiles[tile_index as usize].tile_parts_signalled = Some(num_tile_parts);
        }

        Ok(TilePartHeader {
            tile_index,
            header_offset,
            tile_part_length,
            tile_part_index,
            num_tile_parts,
            data_offset: self.reader.position(),
            roi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_codestream() -> Vec<u8> {
        let mut v = vec![0xFF, 0x4F]; // SOC
        v.extend([0xFF, 0x51]); // SIZ
        v.extend((38 + 3u16).to_be_bytes()); // length, 1 component
        v.extend(0u16.to_be_bytes()); // Rsiz
        v.extend(64u32.to_be_bytes()); // X1
        v.extend(64u32.to_be_bytes()); // Y1
        v.extend(0u32.to_be_bytes()); // X0
        v.extend(0u32.to_be_bytes()); // Y0
        v.extend(64u32.to_be_bytes()); // tile width
        v.extend(64u32.to_be_bytes()); // tile height
        v.extend(0u32.to_be_bytes()); // tile x0
        v.extend(0u32.to_be_bytes()); // tile y0
        v.extend(1u16.to_be_bytes()); // components
        v.push(7); // Ssiz: 8-bit unsigned
        v.push(1); // dx
        v.push(1); // dy

        v.extend([0xFF, 0x52]); // COD
        v.extend(12u16.to_be_bytes());
        v.push(0); // Scod
        v.push(0); // progression order LRCP
        v.extend(1u16.to_be_bytes()); // layers
        v.push(0); // mct
        v.push(1); // decomp levels
        v.push(4); // cb width exp
        v.push(4); // cb height exp
        v.push(0); // cblk_sty
        v.push(1); // 5/3

        v.extend([0xFF, 0x5C]); // QCD
        v.extend(4u16.to_be_bytes());
        v.push(0); // Sqcd: no quantization, 0 guard bits
        v.push(32); // one reversible exponent byte

        v
    }

    #[test]
    fn parses_siz_cod_qcd() {
        let data = minimal_codestream();
        let mut reader = StreamReader::new(&data);
        let mut parser = J2kParser::new(&mut reader);
        let params = parser.parse_main_header().unwrap();
        assert_eq!(params.image_x1, 64);
        assert_eq!(params.components.len(), 1);
        assert_eq!(params.tiles.len(), 1);
        assert_eq!(params.tiles[0].progression_order, 0);
        assert_eq!(params.tiles[0].components[0].codeblock_width(), 64);
    }

    #[test]
    fn parses_tile_part_header_and_stops_at_sod() {
        let mut data = minimal_codestream();
        data.extend([0xFF, 0x90]); // SOT
        data.extend(10u16.to_be_bytes());
        data.extend(0u16.to_be_bytes()); // tile index 0
        data.extend(0u32.to_be_bytes()); // Psot
        data.push(0); // TPsot
        data.push(1); // TNsot
        data.extend([0xFF, 0x93]); // SOD
        data.extend([0xAA, 0xBB]); // packet bytes

        let mut reader = StreamReader::new(&data);
        let mut parser = J2kParser::new(&mut reader);
        let mut params = parser.parse_main_header().unwrap();
        let tph = parser.parse_tile_part_header(&mut params).unwrap();
        assert_eq!(tph.tile_index, 0);
        assert_eq!(params.tiles[0].tile_parts_received, 1);
        assert_eq!(&data[tph.data_offset..], &[0xAA, 0xBB]);
    }
}
