//! Error taxonomy for the JPEG 2000 codec core.

use thiserror::Error;

/// A fatal failure during marker parsing, Tier-1/Tier-2 coding, or scheduling.
///
/// Matches the taxonomy the codec core reports warnings and failures under:
/// every fallible public entry point returns `Result<T, CodecError>`, and the
/// first fatal error encountered for a tile is what callers see; everything
/// recoverable is instead routed through [`crate::diagnostics::Diagnostics`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A marker segment's length field is inconsistent with its contents,
    /// a reserved field that must be zero was non-zero, or a sub-segment
    /// ran past its parent's declared length.
    #[error("malformed {marker} marker segment at byte {offset}: {detail}")]
    MalformedMarker {
        marker: &'static str,
        offset: usize,
        detail: String,
    },

    /// The stream ended before a required byte could be read.
    #[error("stream truncated at byte {offset}: expected {expected} more byte(s)")]
    StreamTruncated { offset: usize, expected: usize },

    /// A syntactically valid but unimplemented feature was requested:
    /// an RSIZ profile bit this crate doesn't support, an array-MCT
    /// transform stage beyond what MCO stacking supports, a Part-2
    /// extension, etc.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A structural invariant was violated: `numresolutions <= reduce`,
    /// precinct size 0 above resolution 0, an illegal cblk_sty
    /// combination (e.g. HT_ONLY with LAZY or RESET), component count
    /// outside [1, 16384], malformed SIZ geometry.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Tier-1 (EBCOT or HT) detected corruption in a code-block that it
    /// could not recover from locally.
    #[error("block coding failure in tile {tile}, component {component}: {detail}")]
    BlockCodingFailure {
        tile: u32,
        component: u32,
        detail: String,
    },

    /// The caller's cancellation token was observed set at a task
    /// boundary; decoding stopped without touching further tiles.
    #[error("operation cancelled")]
    Cancelled,
}

impl CodecError {
    pub fn malformed(marker: &'static str, offset: usize, detail: impl Into<String>) -> Self {
        Self::MalformedMarker {
            marker,
            offset,
            detail: detail.into(),
        }
    }

    pub fn truncated(offset: usize, expected: usize) -> Self {
        Self::StreamTruncated { offset, expected }
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::UnsupportedFeature(detail.into())
    }

    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::InvariantViolation(detail.into())
    }

    pub fn block_coding(tile: u32, component: u32, detail: impl Into<String>) -> Self {
        Self::BlockCodingFailure {
            tile,
            component,
            detail: detail.into(),
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
