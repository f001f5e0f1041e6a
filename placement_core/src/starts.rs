//! Start position assignment by farthest-point sampling.
//!
//! Each region seeds at the candidate nearest its centroid, then repeatedly
//! takes the candidate whose minimum hex distance to every start placed so
//! far is largest. Players a region cannot seat are filled from the whole
//! map afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::{AdapterError, EngineAdapter};
use crate::grid::GridDims;
use crate::hex::tile_distance;
use crate::region::{Region, RegionProjection};

/// One bit per tile, set when a start is committed there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyMask {
    bits: Vec<u64>,
    len: usize,
    occupied: Vec<usize>,
}

impl OccupancyMask {
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(64)],
            len,
            occupied: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.len && self.bits[index / 64] & (1 << (index % 64)) != 0
    }

    /// Mark a tile; returns `false` if it was already taken or out of range.
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= self.len || self.contains(index) {
            return false;
        }
        self.bits[index / 64] |= 1 << (index % 64);
        self.occupied.push(index);
        true
    }

    /// Occupied tiles in the order they were taken.
    pub fn occupied(&self) -> &[usize] {
        &self.occupied
    }
}

/// `rows x cols` partition of each region's bounding box. `eligible` holds a
/// single grid shared by both regions, or the West grid followed by the East
/// grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorGrid {
    pub rows: u32,
    pub cols: u32,
    pub eligible: Vec<bool>,
}

impl SectorGrid {
    fn is_active(&self) -> bool {
        self.rows > 0 && self.cols > 0 && !self.eligible.is_empty()
    }

    fn allows(&self, slot: usize, row: u32, col: u32) -> bool {
        let cells = (self.rows * self.cols) as usize;
        let base = if self.eligible.len() >= cells * 2 {
            slot * cells
        } else {
            0
        };
        self.eligible
            .get(base + (row * self.cols + col) as usize)
            .copied()
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartRequest {
    pub players_west: u32,
    pub players_east: u32,
    pub sectors: Option<SectorGrid>,
}

impl StartRequest {
    pub fn total_players(&self) -> u32 {
        self.players_west + self.players_east
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartAssignment {
    /// Tile index per player, West players first.
    pub positions: Vec<i32>,
    pub from_regions: u32,
    pub from_fallback: u32,
}

impl StartAssignment {
    pub fn assigned(&self) -> u32 {
        self.positions.iter().filter(|tile| **tile >= 0).count() as u32
    }
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("only {assigned} of {requested} players received a start position")]
    Shortfall {
        assigned: u32,
        requested: u32,
        positions: Vec<i32>,
    },
    #[error("failed to commit start for player {player} at tile {tile}: {source}")]
    Commit {
        player: u32,
        tile: usize,
        #[source]
        source: AdapterError,
    },
    #[error("region projection covers {projection:?} but the map is {map:?}")]
    DimensionMismatch { projection: GridDims, map: GridDims },
    #[error("occupancy mask covers {mask} tiles but the map has {map}")]
    MaskMismatch { mask: usize, map: usize },
}

/// Wrapped column interval covering a set of tiles, anchored after the
/// widest run of empty columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnSpan {
    west: u32,
    len: u32,
    width: u32,
}

impl ColumnSpan {
    fn of(dims: GridDims, tiles: &[usize]) -> Self {
        let width = dims.width as usize;
        let mut used = vec![false; width];
        for &tile in tiles {
            used[tile % width] = true;
        }
        if used.iter().all(|u| *u) || !used.iter().any(|u| *u) {
            return Self {
                west: 0,
                len: dims.width,
                width: dims.width,
            };
        }

        // Longest circular run of unused columns; the span starts right after it.
        let mut best_end = 0;
        let mut best_len = 0;
        let mut run = 0;
        for step in 0..width * 2 {
            let column = step % width;
            if used[column] {
                run = 0;
                continue;
            }
            run += 1;
            if run > best_len && run <= width {
                best_len = run;
                best_end = column;
            }
        }
        Self {
            west: ((best_end + 1) % width) as u32,
            len: (width - best_len) as u32,
            width: dims.width,
        }
    }

    fn offset(&self, x: u32) -> u32 {
        (x + self.width - self.west) % self.width
    }
}

fn nearest_to_centroid(
    dims: GridDims,
    candidates: &[usize],
    mask: &OccupancyMask,
) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    let span = ColumnSpan::of(dims, candidates);
    let count = candidates.len() as f64;
    let (sum_x, sum_y) = candidates.iter().fold((0.0, 0.0), |(sx, sy), &tile| {
        let (x, y) = dims.coords(tile);
        (sx + span.offset(x) as f64, sy + y as f64)
    });
    let (cx, cy) = (sum_x / count, sum_y / count);

    let mut best: Option<(usize, f64)> = None;
    for &tile in candidates {
        if mask.contains(tile) {
            continue;
        }
        let (x, y) = dims.coords(tile);
        let dx = span.offset(x) as f64 - cx;
        let dy = y as f64 - cy;
        let d2 = dx * dx + dy * dy;
        if best.map_or(true, |(_, best_d2)| d2 < best_d2) {
            best = Some((tile, d2));
        }
    }
    best.map(|(tile, _)| tile)
}

fn farthest_from_occupied(
    dims: GridDims,
    candidates: &[usize],
    mask: &OccupancyMask,
) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for &tile in candidates {
        if mask.contains(tile) {
            continue;
        }
        let nearest = mask
            .occupied()
            .iter()
            .map(|&other| tile_distance(dims, tile, other))
            .min()
            .unwrap_or(u32::MAX);
        if best.map_or(true, |(_, best_distance)| nearest > best_distance) {
            best = Some((tile, nearest));
        }
    }
    best.map(|(tile, _)| tile)
}

/// Region tiles restricted to eligible sectors, or all of them when the
/// filter would leave nothing.
fn sector_candidates(
    dims: GridDims,
    tiles: &[usize],
    sectors: Option<&SectorGrid>,
    slot: usize,
) -> Vec<usize> {
    let Some(sectors) = sectors.filter(|s| s.is_active()) else {
        return tiles.to_vec();
    };
    if tiles.is_empty() {
        return Vec::new();
    }
    let span = ColumnSpan::of(dims, tiles);
    let (min_y, max_y) = tiles.iter().fold((u32::MAX, 0), |(lo, hi), &tile| {
        let y = dims.coords(tile).1;
        (lo.min(y), hi.max(y))
    });
    let rows_tall = max_y - min_y + 1;

    let filtered: Vec<usize> = tiles
        .iter()
        .copied()
        .filter(|&tile| {
            let (x, y) = dims.coords(tile);
            let row = ((y - min_y) * sectors.rows / rows_tall).min(sectors.rows - 1);
            let col = (span.offset(x) * sectors.cols / span.len).min(sectors.cols - 1);
            sectors.allows(slot, row, col)
        })
        .collect();

    if filtered.is_empty() {
        tracing::debug!(
            target: "placement::starts",
            slot,
            candidates = tiles.len(),
            "starts.sector_filter_empty"
        );
        return tiles.to_vec();
    }
    filtered
}

fn commit(
    adapter: &mut dyn EngineAdapter,
    mask: &mut OccupancyMask,
    positions: &mut [i32],
    player: u32,
    tile: usize,
) -> Result<(), StartError> {
    adapter
        .set_start_position(tile, player)
        .map_err(|source| StartError::Commit {
            player,
            tile,
            source,
        })?;
    mask.insert(tile);
    positions[player as usize] = tile as i32;
    Ok(())
}

/// Assign one start per requested player and commit them through the adapter.
pub fn assign_starts(
    adapter: &mut dyn EngineAdapter,
    projection: &RegionProjection,
    request: &StartRequest,
    occupancy: &mut OccupancyMask,
) -> Result<StartAssignment, StartError> {
    let dims = adapter.dims();
    if projection.dims() != dims {
        return Err(StartError::DimensionMismatch {
            projection: projection.dims(),
            map: dims,
        });
    }
    if occupancy.len() != dims.len() {
        return Err(StartError::MaskMismatch {
            mask: occupancy.len(),
            map: dims.len(),
        });
    }

    let requested = request.total_players();
    let mut assignment = StartAssignment {
        positions: vec![-1; requested as usize],
        ..StartAssignment::default()
    };

    let regions = [
        (Region::West, 0u32, request.players_west),
        (Region::East, request.players_west, request.players_east),
    ];
    for (slot, (region, first_player, players)) in regions.into_iter().enumerate() {
        if players == 0 {
            continue;
        }
        let tiles = projection.tiles_in(region);
        let candidates = sector_candidates(dims, &tiles, request.sectors.as_ref(), slot);

        for player in first_player..first_player + players {
            let pick = if player == first_player {
                nearest_to_centroid(dims, &candidates, occupancy)
            } else {
                farthest_from_occupied(dims, &candidates, occupancy)
            };
            let Some(tile) = pick else {
                break;
            };
            commit(adapter, occupancy, &mut assignment.positions, player, tile)?;
            assignment.from_regions += 1;
        }
        tracing::debug!(
            target: "placement::starts",
            region = ?region,
            candidates = candidates.len(),
            requested = players,
            "starts.region_assigned"
        );
    }

    if assignment.assigned() < requested {
        let pool: Vec<usize> = (0..dims.len())
            .filter(|&tile| projection.region(tile) != Region::None)
            .collect();
        for player in 0..requested {
            if assignment.positions[player as usize] >= 0 {
                continue;
            }
            let pick = if occupancy.is_empty() {
                nearest_to_centroid(dims, &pool, occupancy)
            } else {
                farthest_from_occupied(dims, &pool, occupancy)
            };
            let Some(tile) = pick else {
                break;
            };
            commit(adapter, occupancy, &mut assignment.positions, player, tile)?;
            assignment.from_fallback += 1;
        }
        tracing::info!(
            target: "placement::starts",
            filled = assignment.from_fallback,
            pool = pool.len(),
            "starts.fallback_used"
        );
    }

    let assigned = assignment.assigned();
    if assigned < requested {
        tracing::warn!(
            target: "placement::starts",
            assigned,
            requested,
            "starts.shortfall"
        );
        return Err(StartError::Shortfall {
            assigned,
            requested,
            positions: assignment.positions,
        });
    }
    Ok(assignment)
}
