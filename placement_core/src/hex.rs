//! Distances on an odd-q offset hex grid that wraps horizontally.

use crate::grid::GridDims;

/// Cube coordinates `(q, r, s)` with `q + r + s == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cube {
    pub q: i64,
    pub r: i64,
    pub s: i64,
}

impl Cube {
    /// Convert an odd-q offset coordinate. `col` may lie outside the map when
    /// it stands for a copy of a tile across the seam.
    pub fn from_odd_q(col: i64, row: i64) -> Self {
        let q = col;
        let r = row - (col - col.rem_euclid(2)) / 2;
        Self { q, r, s: -q - r }
    }

    pub fn distance(self, other: Cube) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s - other.s).abs();
        dq.max(dr).max(ds) as u32
    }
}

/// Shortest hex distance between two tiles across the horizontal seam.
///
/// On odd widths a copy shifted by one map width lands on a column of the
/// other parity, so the seam is measured from both ends and the shorter wins.
/// The result is symmetric for every width.
pub fn hex_distance(dims: GridDims, a: (u32, u32), b: (u32, u32)) -> u32 {
    let width = dims.width as i64;
    seam_distance(width, a, b).min(seam_distance(width, b, a))
}

/// Distance from `from` to the nearest of `to` and its copies one width away.
fn seam_distance(width: i64, from: (u32, u32), to: (u32, u32)) -> u32 {
    let origin = Cube::from_odd_q(from.0 as i64, from.1 as i64);
    [-width, 0, width]
        .into_iter()
        .map(|shift| origin.distance(Cube::from_odd_q(to.0 as i64 + shift, to.1 as i64)))
        .min()
        .unwrap_or(0)
}

/// [`hex_distance`] addressed by tile index.
pub fn tile_distance(dims: GridDims, a: usize, b: usize) -> u32 {
    hex_distance(dims, dims.coords(a), dims.coords(b))
}
