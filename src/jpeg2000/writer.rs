//! Marker codec, write half (C10): SOC/SIZ/COD/QCD/SOT/SOD/EOC serialization
//! mirroring [`super::parser::J2kParser`]'s read side.

use crate::coding_parameters::{CodingParameters, QuantizationParams, TileComponentCodingParams};
use crate::error::CodecResult;
use crate::marker::MarkerCode;
use crate::stream::StreamWriter;

pub struct J2kWriter<'a> {
    writer: StreamWriter<'a>,
}

impl<'a> J2kWriter<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            writer: StreamWriter::new(destination),
        }
    }

    pub fn len(&self) -> usize {
        self.writer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    pub fn write_soc(&mut self) -> CodecResult<()> {
        self.writer.write_marker(MarkerCode::StartOfCodestream)
    }

    pub fn write_eoc(&mut self) -> CodecResult<()> {
        self.writer.write_marker(MarkerCode::EndOfCodestream)
    }

    pub fn write_siz(&mut self, params: &CodingParameters) -> CodecResult<()> {
        self.writer.write_marker(MarkerCode::ImageAndTileSize)?;
        let length = 38 + 3 * params.components.len() as u16;
        self.writer.write_u16(length)?;
        self.writer.write_u16(params.rsiz)?;
        self.writer.write_u32(params.image_x1)?;
        self.writer.write_u32(params.image_y1)?;
        self.writer.write_u32(params.image_x0)?;
        self.writer.write_u32(params.image_y0)?;
        self.writer.write_u32(params.tile_width)?;
        self.writer.write_u32(params.tile_height)?;
        self.writer.write_u32(params.tile_x0)?;
        self.writer.write_u32(params.tile_y0)?;
        self.writer.write_u16(params.components.len() as u16)?;
        for c in &params.components {
            let ssiz = (c.precision - 1) | if c.is_signed { 0x80 } else { 0 };
            self.writer.write_byte(ssiz)?;
            self.writer.write_byte(c.dx)?;
            self.writer.write_byte(c.dy)?;
        }
        Ok(())
    }

    pub fn write_cap(&mut self, pcap: u32, ccap: &[u16]) -> CodecResult<()> {
        self.writer.write_marker(MarkerCode::Capability)?;
        self.writer.write_u16(6 + 2 * ccap.len() as u16)?;
        self.writer.write_u32(pcap)?;
        for &c in ccap {
            self.writer.write_u16(c)?;
        }
        Ok(())
    }

    /// Writes one COD marker describing `progression_order`/`num_layers`/
    /// `mct` plus the first component's coding parameters (assumed shared
    /// across components; per-component overrides go out as COC).
    pub fn write_cod(
        &mut self,
        progression_order: u8,
        num_layers: u16,
        mct: u8,
        tccp: &TileComponentCodingParams,
    ) -> CodecResult<()> {
        self.writer.write_marker(MarkerCode::CodingStyleDefault)?;
        let has_precincts = tccp.csty & crate::constants::scod::PRECINCTS != 0;
        let precinct_bytes = if has_precincts { tccp.precinct_sizes.len() } else { 0 };
        let length = 12 + precinct_bytes as u16;
        self.writer.write_u16(length)?;
        self.writer.write_byte(tccp.csty)?;
        self.writer.write_byte(progression_order)?;
        self.writer.write_u16(num_layers)?;
        self.writer.write_byte(mct)?;
        self.write_spcod_body(tccp)
    }

    fn write_spcod_body(&mut self, tccp: &TileComponentCodingParams) -> CodecResult<()> {
        self.writer.write_byte(tccp.num_resolutions.saturating_sub(1))?;
        self.writer.write_byte(tccp.codeblock_width_exp)?;
        self.writer.write_byte(tccp.codeblock_height_exp)?;
        self.writer.write_byte(tccp.cblk_sty)?;
        self.writer.write_byte(tccp.wavelet_id)?;
        if tccp.csty & crate::constants::scod::PRECINCTS != 0 {
            for &(w, h) in &tccp.precinct_sizes {
                self.writer.write_byte((h << 4) | (w & 0x0F))?;
            }
        }
        Ok(())
    }

    pub fn write_qcd(&mut self, quant: &QuantizationParams) -> CodecResult<()> {
        self.writer.write_marker(MarkerCode::QuantizationDefault)?;
        let per_band_bytes = if quant.style == crate::constants::qcd_style::NONE { 1 } else { 2 };
        let length = 3 + quant.step_sizes.len() as u16 * per_band_bytes;
        self.writer.write_u16(length)?;
        self.writer.write_byte((quant.guard_bits << 5) | quant.style)?;
        for &(expn, mant) in &quant.step_sizes {
            if quant.style == crate::constants::qcd_style::NONE {
                self.writer.write_byte(expn << 3)?;
            } else {
                self.writer.write_u16(((expn as u16) << 11) | (mant & 0x07FF))?;
            }
        }
        Ok(())
    }

    pub fn write_sot(&mut self, tile_index: u16, tile_part_length: u32, tile_part_index: u8, num_tile_parts: u8) -> CodecResult<()> {
        self.writer.write_marker(MarkerCode::StartOfTile)?;
        self.writer.write_u16(10)?;
        self.writer.write_u16(tile_index)?;
        self.writer.write_u32(tile_part_length)?;
        self.writer.write_byte(tile_part_index)?;
        self.writer.write_byte(num_tile_parts)?;
        Ok(())
    }

    pub fn write_sod(&mut self) -> CodecResult<()> {
        self.writer.write_marker(MarkerCode::StartOfData)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> CodecResult<()> {
        self.writer.write_bytes(data)
    }

    /// Patches a previously-written SOT's Psot field now that the tile
    /// part's total length (header + data) is known.
    pub fn patch_tile_part_length(destination: &mut [u8], sot_offset: usize, tile_part_length: u32) {
        let psot_offset = sot_offset + 6;
        if psot_offset + 4 <= destination.len() {
            destination[psot_offset..psot_offset + 4].copy_from_slice(&tile_part_length.to_be_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding_parameters::ComponentSize;

    fn sample_params() -> CodingParameters {
        CodingParameters {
            image_x0: 0,
            image_y0: 0,
            image_x1: 512,
            image_y1: 512,
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
            }; 3],
            comments: Vec::new(),
            tiles: Vec::new(),
        }
    }

    #[test]
    fn writes_marker_sequence_with_sot_sod_eoc() {
        let mut buffer = vec![0u8; 1024];
        let params = sample_params();
        let mut writer = J2kWriter::new(&mut buffer);

        writer.write_soc().unwrap();
        writer.write_siz(&params).unwrap();
        let tccp = TileComponentCodingParams::default();
        writer.write_cod(0, 1, 1, &tccp).unwrap();
        writer.write_qcd(&tccp.quantization).unwrap();
        let sot_offset = writer.len();
        writer.write_sot(0, 0, 0, 1).unwrap();
        writer.write_sod().unwrap();
        writer.write_bytes(&[0x11, 0x22]).unwrap();
        writer.write_eoc().unwrap();
        let len = writer.len();
        drop(writer);

        J2kWriter::patch_tile_part_length(&mut buffer, sot_offset, (len - sot_offset) as u32);
        let written = &buffer[..len];

        assert_eq!(&written[0..2], &[0xFF, 0x4F]);
        assert_eq!(&written[2..4], &[0xFF, 0x51]);
        assert!(written.windows(2).any(|w| w == [0xFF, 0x90]));
        assert!(written.windows(2).any(|w| w == [0xFF, 0x93]));
        assert!(written.windows(2).any(|w| w == [0xFF, 0xD9]));
    }
}
