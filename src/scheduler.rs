//! Scheduler (C12): a bounded OS thread pool that parallelizes decode/
//! compress across tiles.
//!
//! Built on `rayon` for data-parallel fan-out without hand-rolled thread
//! management. Each codec instance owns a dedicated `rayon::ThreadPool`
//! rather than using rayon's global pool, so a caller decoding several
//! images concurrently on its own threads doesn't have them all contend for
//! one process-wide pool.
//!
//! Tiles carry no dependency on one another, so [`Scheduler::map_tiles`]/
//! [`Scheduler::map_tiles_partial`] is the only fan-out this crate does.
//! Parallelizing *within* a tile (Tier-2 -> Tier-1 -> IDWT -> MCT as a
//! dependency graph across resolutions) was tried and dropped: splitting
//! the inverse DWT into independently schedulable horizontal/vertical
//! passes and making Tier-1 decode safe to interleave with them would have
//! meant restructuring `dwt.rs` and `decoder.rs`'s per-component loop around
//! shared, synchronized sub-band buffers, for a win that only shows up on
//! images with very few, very large tiles — the common case already
//! saturates every core via tile-level parallelism. See DESIGN.md.

use crate::error::{CodecError, CodecResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Polled at tile boundaries and, ideally, after every Tier-1 block the
/// caller's `run` closure processes. Cloning shares the same underlying
/// flag; `cancel()` from any handle is visible to all.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(CodecError::Cancelled)` if the token has been set.
    pub fn check(&self) -> CodecResult<()> {
        if self.is_cancelled() {
            Err(CodecError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Drives tile decode/compress work across a bounded `rayon` thread pool.
pub struct Scheduler {
    pool: rayon::ThreadPool,
}

impl Scheduler {
    /// Builds a scheduler with an explicit thread count.
    pub fn with_threads(num_threads: usize) -> CodecResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .build()
            .map_err(|e| CodecError::unsupported(format!("failed to build thread pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Builds a scheduler sized to the host's logical CPU count, falling
    /// back to a single thread if that cannot be determined.
    pub fn new() -> CodecResult<Self> {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_threads(threads)
    }

    /// Runs one independent unit of work per tile in parallel. Tiles carry
    /// no dependencies on one another, so this is a flat parallel map.
    ///
    /// A fatal error on one tile must not take down the others: this returns
    /// every tile's own `Result` rather than collecting into a single
    /// `Result<Vec<T>>`, so a caller can keep the tiles that decoded fine and
    /// turn the rest into diagnostics. Use [`Self::map_tiles`] when a single
    /// failure really should abort the whole call.
    pub fn map_tiles_partial<T, F>(
        &self,
        tile_indices: &[u32],
        token: &CancellationToken,
        run: F,
    ) -> CodecResult<Vec<(u32, CodecResult<T>)>>
    where
        F: Fn(u32) -> CodecResult<T> + Sync,
        T: Send,
    {
        token.check()?;
        Ok(self.pool.install(|| {
            use rayon::prelude::*;
            tile_indices.par_iter().map(|&idx| (idx, run(idx))).collect()
        }))
    }

    /// Convenience wrapper over [`Self::map_tiles_partial`] for callers that
    /// genuinely want the first tile error to abort the whole call.
    pub fn map_tiles<T, F>(&self, tile_indices: &[u32], token: &CancellationToken, run: F) -> CodecResult<Vec<T>>
    where
        F: Fn(u32) -> CodecResult<T> + Sync,
        T: Send,
    {
        self.map_tiles_partial(tile_indices, token, run)?
            .into_iter()
            .map(|(_, result)| result)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_tiles_runs_every_tile_independently() {
        let scheduler = Scheduler::with_threads(2).unwrap();
        let token = CancellationToken::new();
        let results = scheduler
            .map_tiles(&[0, 1, 2, 3], &token, |idx| Ok(idx * 2))
            .unwrap();
        assert_eq!(results, vec![0, 2, 4, 6]);
    }

    #[test]
    fn map_tiles_partial_keeps_good_tiles_when_one_fails() {
        let scheduler = Scheduler::with_threads(2).unwrap();
        let token = CancellationToken::new();
        let results = scheduler
            .map_tiles_partial(&[0, 1, 2], &token, |idx| {
                if idx == 1 {
                    Err(CodecError::invariant("bad tile"))
                } else {
                    Ok(idx * 10)
                }
            })
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], (0, Ok(0)));
        assert!(results[1].1.is_err());
        assert_eq!(results[2], (2, Ok(20)));
    }

    #[test]
    fn cancellation_is_observed_before_dispatch() {
        let scheduler = Scheduler::with_threads(1).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = scheduler.map_tiles(&[0, 1], &token, |idx| Ok(idx));
        assert_eq!(result, Err(CodecError::Cancelled));
    }
}
