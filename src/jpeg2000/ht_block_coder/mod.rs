//! High-Throughput block coder (HTJ2K, ISO/IEC 15444-15): the non-iterative
//! cleanup-only Tier-1 alternative to EBCOT's three-pass MQ coding, used
//! when a code-block's `cblk_sty` carries `HT_MIXED`/`HT_ONLY` (§4.5.2).
//!
//! `mel`/`mag_sgn`/`vlc` are the three bitstream components Part-15 packs
//! per code-block (run-length significance, raw magnitude/sign bits, and
//! the variable-length significance-pattern table); `coder`/`encoder` wire
//! them into the decode/encode entry points Tier-1 calls.

pub mod coder;
pub mod encoder;
pub mod mag_sgn;
pub mod mel;
pub mod vlc;
