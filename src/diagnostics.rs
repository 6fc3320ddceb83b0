//! Non-fatal warning collection (§7: "warnings surfaced through a callback").
//!
//! This crate carries no structured-logging dependency, so warnings are
//! collected into a plain value rather than printed: a decode/compress call
//! returns its `Image` together with whatever `Diagnostics` it accumulated,
//! and the caller decides whether/how to surface them.

/// One non-fatal condition observed while decoding or compressing a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Tile this warning pertains to, if any.
    pub tile_index: Option<u32>,
    /// Short machine-stable tag, e.g. "duplicate-cod", "tlm-discarded".
    pub kind: &'static str,
    /// Human-readable detail.
    pub detail: String,
}

/// Accumulates [`Warning`]s during one decode or compress call.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, tile_index: Option<u32>, kind: &'static str, detail: impl Into<String>) {
        self.warnings.push(Warning {
            tile_index,
            kind,
            detail: detail.into(),
        });
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
