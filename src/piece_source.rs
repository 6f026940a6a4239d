// src/piece_source.rs
// The shared, append-only pool of pieces every session draws from.

use std::sync::{Arc, PoisonError, RwLock};

use crate::defs::PIECE_BATCH;
use crate::piece::Piece;

/// Lazily grown pool of pieces, indexed by sequence number.
///
/// Reads of materialized indices only take the shared side of the lock.
/// Growth takes the exclusive side and re-checks the length, so concurrent
/// requests for the same missing index append exactly one batch.
pub struct PieceSource {
    pool: RwLock<Vec<Arc<Piece>>>,
    batch: usize,
    factory: fn(u64) -> Piece,
}

impl PieceSource {
    pub fn new() -> Self {
        Self::with_factory(PIECE_BATCH, Piece::random)
    }

    /// Build a pool with a custom batch size and piece constructor
    pub fn with_factory(batch: usize, factory: fn(u64) -> Piece) -> Self {
        Self {
            pool: RwLock::new(Vec::new()),
            batch: batch.max(1),
            factory,
        }
    }

    /// Return the piece at `index`, growing the pool first if needed
    pub fn take(&self, index: u64) -> Arc<Piece> {
        if let Some(piece) = self.get(index) {
            return piece;
        }

        let mut pool = self.pool.write().unwrap_or_else(PoisonError::into_inner);
        while pool.len() as u64 <= index {
            let start = pool.len() as u64;
            for offset in 0..self.batch as u64 {
                pool.push(Arc::new((self.factory)(start + offset)));
            }
        }
        Arc::clone(&pool[index as usize])
    }

    /// Return the piece at `index` only if it is already materialized
    pub fn get(&self, index: u64) -> Option<Arc<Piece>> {
        let pool = self.pool.read().unwrap_or_else(PoisonError::into_inner);
        pool.get(index as usize).cloned()
    }

    /// Number of materialized pieces; new rounds start their cursors here
    pub fn len(&self) -> u64 {
        self.pool.read().unwrap_or_else(PoisonError::into_inner).len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PieceSource {
    fn default() -> Self {
        Self::new()
    }
}
