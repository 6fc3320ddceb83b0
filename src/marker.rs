//! JPEG 2000 marker codes (ISO/IEC 15444-1 Annex A).
//!
//! Kept as a first-class enum rather than matching on raw `0xFFxx` bytes at
//! every call site.

use crate::error::CodecError;
use std::convert::TryFrom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MarkerCode {
    /// SOC: Start of codestream.
    StartOfCodestream = 0xFF4F,
    /// SIZ: Image and tile size.
    ImageAndTileSize = 0xFF51,
    /// COD: Coding style default.
    CodingStyleDefault = 0xFF52,
    /// COC: Coding style component.
    CodingStyleComponent = 0xFF53,
    /// TLM: Tile-part lengths, main header.
    TilePartLengths = 0xFF55,
    /// PLM: Packet length, main header.
    PacketLengthMainHeader = 0xFF57,
    /// PLT: Packet length, tile-part header.
    PacketLengthTilePart = 0xFF58,
    /// QCD: Quantization default.
    QuantizationDefault = 0xFF5C,
    /// QCC: Quantization component.
    QuantizationComponent = 0xFF5D,
    /// RGN: Region of interest.
    RegionOfInterest = 0xFF5E,
    /// POC: Progression order change.
    ProgressionOrderChange = 0xFF5F,
    /// PPM: Packed packet headers, main header.
    PackedPacketHeadersMainHeader = 0xFF60,
    /// PPT: Packed packet headers, tile-part header.
    PackedPacketHeadersTilePart = 0xFF61,
    /// CRG: Component registration.
    ComponentRegistration = 0xFF63,
    /// COM: Comment.
    Comment = 0xFF64,
    /// SOT: Start of tile-part.
    StartOfTile = 0xFF90,
    /// SOP: Start of packet.
    StartOfPacket = 0xFF91,
    /// EPH: End of packet header.
    EndOfPacketHeader = 0xFF92,
    /// SOD: Start of data.
    StartOfData = 0xFF93,
    /// EOC: End of codestream.
    EndOfCodestream = 0xFFD9,
    /// CAP: Extended capabilities (Part-15 / HTJ2K).
    Capability = 0xFF50,
    /// CBD: Component bit depth (array MCT, Part-2).
    ComponentBitDepth = 0xFF78,
    /// MCT: Multi-component transform definition (Part-2).
    MultipleComponentTransform = 0xFF74,
    /// MCC: Multi-component transform collection (Part-2).
    MultipleComponentTransformCollection = 0xFF75,
    /// MCO: Multi-component transform ordering (Part-2).
    MultipleComponentTransformOrdering = 0xFF77,
}

impl MarkerCode {
    /// Whether this marker's segment carries no explicit length field
    /// (only SOC and EOC are delimiter-only markers; SOD is also
    /// length-less but is handled separately by the driver since it
    /// transitions directly into raw tile data).
    pub const fn has_length_field(self) -> bool {
        !matches!(
            self,
            Self::StartOfCodestream | Self::EndOfCodestream | Self::StartOfData
        )
    }
}

impl TryFrom<u16> for MarkerCode {
    type Error = CodecError;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        Ok(match v {
            0xFF4F => Self::StartOfCodestream,
            0xFF51 => Self::ImageAndTileSize,
            0xFF52 => Self::CodingStyleDefault,
            0xFF53 => Self::CodingStyleComponent,
            0xFF55 => Self::TilePartLengths,
            0xFF57 => Self::PacketLengthMainHeader,
            0xFF58 => Self::PacketLengthTilePart,
            0xFF5C => Self::QuantizationDefault,
            0xFF5D => Self::QuantizationComponent,
            0xFF5E => Self::RegionOfInterest,
            0xFF5F => Self::ProgressionOrderChange,
            0xFF60 => Self::PackedPacketHeadersMainHeader,
            0xFF61 => Self::PackedPacketHeadersTilePart,
            0xFF63 => Self::ComponentRegistration,
            0xFF64 => Self::Comment,
            0xFF90 => Self::StartOfTile,
            0xFF91 => Self::StartOfPacket,
            0xFF92 => Self::EndOfPacketHeader,
            0xFF93 => Self::StartOfData,
            0xFFD9 => Self::EndOfCodestream,
            0xFF50 => Self::Capability,
            0xFF78 => Self::ComponentBitDepth,
            0xFF74 => Self::MultipleComponentTransform,
            0xFF75 => Self::MultipleComponentTransformCollection,
            0xFF77 => Self::MultipleComponentTransformOrdering,
            _ => {
                return Err(CodecError::malformed(
                    "marker",
                    0,
                    format!("unknown marker code 0x{v:04X}"),
                ));
            }
        })
    }
}

/// True for reserved markers in 0xFF30..=0xFF3F that the driver tolerates
/// and skips unconditionally even without a length field (§4.1).
pub fn is_tolerated_reserved(marker_byte_pair: u16) -> bool {
    (0xFF30..=0xFF3F).contains(&marker_byte_pair)
}

pub const MARKER_PREFIX: u8 = 0xFF;
