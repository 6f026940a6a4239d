// src/piece.rs
// Piece shapes served to players. Every piece is one of a fixed catalogue of
// 3x3 occupancy grids, picked at random when the piece is materialized.

use serde::{Deserialize, Serialize};

use crate::defs::{Cells, PIECE_SIDE};

const F: bool = false;
const T: bool = true;

/// Shapes a piece can take
pub const CATALOGUE: [Cells; 31] = [
    [[T, T, F], [T, F, F], [T, F, F]],
    [[T, F, F], [T, T, T], [F, F, F]],
    [[F, T, F], [F, T, F], [T, T, F]],
    [[T, T, T], [F, F, T], [F, F, F]],
    [[T, T, F], [F, T, F], [F, T, F]],
    [[F, F, T], [T, T, T], [F, F, F]],
    [[T, F, F], [T, F, F], [T, T, F]],
    [[T, T, T], [T, F, F], [F, F, F]],
    [[T, F, F], [T, T, F], [F, T, F]],
    [[F, T, T], [T, T, F], [F, F, F]],
    [[F, T, F], [T, T, F], [T, F, F]],
    [[T, T, F], [F, T, T], [F, F, F]],
    [[F, F, T], [F, F, T], [T, T, T]],
    [[T, F, F], [T, F, F], [T, T, T]],
    [[T, T, T], [T, F, F], [T, F, F]],
    [[T, T, T], [F, F, T], [F, F, T]],
    [[F, T, F], [F, T, F], [T, T, T]],
    [[T, T, T], [F, T, F], [F, T, F]],
    [[T, F, F], [T, T, T], [T, F, F]],
    [[F, F, T], [T, T, T], [F, F, T]],
    [[T, T, T], [F, F, F], [F, F, F]],
    [[T, F, F], [T, F, F], [T, F, F]],
    [[T, F, F], [F, F, F], [F, F, F]],
    [[T, T, F], [T, F, F], [F, F, F]],
    [[T, T, F], [F, T, F], [F, F, F]],
    [[F, T, F], [T, T, F], [F, F, F]],
    [[T, F, F], [T, T, F], [F, F, F]],
    [[T, F, F], [T, T, F], [T, F, F]],
    [[T, T, T], [F, T, F], [F, F, F]],
    [[F, T, F], [T, T, F], [F, T, F]],
    [[F, T, F], [T, T, T], [F, F, F]],
];

/// An immutable piece: its shape and its position in the shared pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    index: u64,
    cells: Cells,
}

impl Piece {
    pub fn new(index: u64, cells: Cells) -> Self {
        Self { index, cells }
    }

    /// Materialize the piece at `index` with a random catalogue shape
    pub fn random(index: u64) -> Self {
        let shape = rand::random_range(0..CATALOGUE.len());
        Self::new(index, CATALOGUE[shape])
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn cells(&self) -> &Cells {
        &self.cells
    }

    /// Whether the piece occupies column `x`, row `y` of its grid
    #[cfg(test)]
    pub fn has(&self, x: usize, y: usize) -> bool {
        x < PIECE_SIDE && y < PIECE_SIDE && self.cells[y][x]
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.iter().flatten().filter(|&&cell| cell).count()
    }
}
