//! Codec-wide limits and constants (ISO/IEC 15444-1).

/// Maximum component count permitted by SIZ (§4.1 invariant).
pub const MAXIMUM_COMPONENT_COUNT: u32 = 16384;

/// Maximum per-component bit depth signalled by SIZ Ssiz (7-bit field, +1).
pub const MAXIMUM_COMPONENT_PRECISION: u32 = 38;

/// Maximum number of decomposition resolutions (numresolutions ∈ [1,33]).
pub const MAXIMUM_DECOMPOSITION_LEVELS: u32 = 32;
pub const MAXIMUM_RESOLUTIONS: u32 = 33;

/// Code-block dimension limits: 4 <= w,h <= 1024, w*h <= 4096.
pub const MINIMUM_CODEBLOCK_DIM_EXP: u32 = 2; // 2^2 = 4
pub const MAXIMUM_CODEBLOCK_DIM_EXP: u32 = 10; // 2^10 = 1024
pub const MAXIMUM_CODEBLOCK_AREA_EXP: u32 = 12; // 2^12 = 4096

/// Maximum tile parts per tile (TPsot is a single byte, TNsot too).
pub const MAXIMUM_TILE_PARTS: u32 = 255;

/// Maximum number of quality layers.
pub const MAXIMUM_LAYERS: u32 = 65535;

/// 5/3 reversible filter pad (lifting taps each side) used by sparse-window IDWT.
pub const DWT_53_PAD: u32 = 2;
/// 9/7 irreversible filter pad used by sparse-window IDWT.
pub const DWT_97_PAD: u32 = 4;

/// 9/7 irreversible lifting constants (ISO/IEC 15444-1 Annex F).
pub mod dwt97 {
    pub const ALPHA: f32 = -1.586_134_3;
    pub const BETA: f32 = -0.052_980_118;
    pub const GAMMA: f32 = 0.882_911_08;
    pub const DELTA: f32 = 0.443_506_85;
    pub const K: f32 = 1.230_174_1;
    pub const INV_K: f32 = 1.0 / K;
}

/// cblk_sty (code-block style) bit flags (Table A.19).
pub mod cblk_sty {
    pub const LAZY: u8 = 0x01;
    pub const RESET: u8 = 0x02;
    pub const TERMALL: u8 = 0x04;
    pub const VSC: u8 = 0x08;
    pub const PTERM: u8 = 0x10;
    pub const SEGSYM: u8 = 0x20;
    pub const HT_MIXED: u8 = 0x40;
    pub const HT_ONLY: u8 = 0x80;
}

/// Scod (coding style, COD byte 0) bit flags.
pub mod scod {
    pub const PRECINCTS: u8 = 0x01;
    pub const SOP: u8 = 0x02;
    pub const EPH: u8 = 0x04;
}

/// Progression order values legal in COD/POC (Table A.16).
pub mod progression {
    pub const LRCP: u8 = 0;
    pub const RLCP: u8 = 1;
    pub const RPCL: u8 = 2;
    pub const PCRL: u8 = 3;
    pub const CPRL: u8 = 4;
    pub const MAX: u8 = CPRL;
}

/// Quantization style (Sqcd low 5 bits, Table A.28).
pub mod qcd_style {
    pub const NONE: u8 = 0;
    pub const SCALAR_DERIVED: u8 = 1;
    pub const SCALAR_EXPOUNDED: u8 = 2;
}

/// RSIZ (SIZ Rsiz field) capability bits relevant to this core.
pub mod rsiz {
    /// Part-15 (HTJ2K) capability bit in CAP's Pcap, bit 14 (1-indexed bit 15
    /// per the standard's own bit numbering, 0-indexed here as `1 << 14`).
    pub const HTJ2K_CAPABILITY_BIT: u32 = 1 << 14;
}

/// The 12-byte JP2 signature box payload (ISO/IEC 15444-1 Annex I.5.1).
pub const JP2_SIGNATURE: [u8; 12] = *b"\x00\x00\x00\x0CjP  \r\n\x87\n";

/// Raw J2K code-stream signature: SOC immediately followed by SIZ.
pub const RAW_CODESTREAM_SIGNATURE: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];
