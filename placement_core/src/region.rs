//! West/East region projection of landmasses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::{AdapterError, EngineAdapter, LandmassIdName};
use crate::grid::{GridDims, GridError};

/// A landmass and its wrapped longitude bounds. `west > east` means the
/// interval crosses the seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmass {
    pub id: i32,
    pub west: u32,
    pub east: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmassSnapshot {
    pub width: u32,
    pub height: u32,
    pub landmasses: Vec<Landmass>,
    /// Owning landmass per tile, `-1` for none.
    pub landmass_id: Vec<i32>,
}

impl LandmassSnapshot {
    pub fn dims(&self) -> GridDims {
        GridDims {
            width: self.width,
            height: self.height,
        }
    }

    pub fn validate(&self) -> Result<(), GridError> {
        let dims = GridDims::new(self.width, self.height)?;
        dims.check_len("landmass_id", self.landmass_id.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    West,
    East,
    None,
}

impl Region {
    pub fn landmass_name(self) -> LandmassIdName {
        match self {
            Region::West => LandmassIdName::West,
            Region::East => LandmassIdName::East,
            Region::None => LandmassIdName::None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegionError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("landmass snapshot is {snapshot:?} but the map is {map:?}")]
    DimensionMismatch { snapshot: GridDims, map: GridDims },
    #[error("failed to stamp region ids: {0}")]
    Adapter(#[from] AdapterError),
}

/// Centre column of a wrapped longitude interval.
pub fn interval_center(width: u32, west: u32, east: u32) -> u32 {
    let west = west % width;
    let east = east % width;
    if west <= east {
        (west + east) / 2
    } else {
        let length = width - west + east + 1;
        (west + length / 2) % width
    }
}

pub fn region_for_center(width: u32, center: u32) -> Region {
    if (center as u64) * 2 < width as u64 {
        Region::West
    } else {
        Region::East
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionProjection {
    dims: GridDims,
    regions: Vec<Region>,
    by_landmass: BTreeMap<i32, Region>,
}

impl RegionProjection {
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn region(&self, index: usize) -> Region {
        self.regions[index]
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn landmass_region(&self, landmass: i32) -> Option<Region> {
        self.by_landmass.get(&landmass).copied()
    }

    pub fn tiles_in(&self, region: Region) -> Vec<usize> {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, r)| **r == region)
            .map(|(index, _)| index)
            .collect()
    }
}

/// Classify every landmass and broadcast the result to its tiles.
pub fn compute_regions(snapshot: &LandmassSnapshot) -> Result<RegionProjection, GridError> {
    snapshot.validate()?;
    let dims = snapshot.dims();

    let by_landmass: BTreeMap<i32, Region> = snapshot
        .landmasses
        .iter()
        .map(|landmass| {
            let center = interval_center(dims.width, landmass.west, landmass.east);
            (landmass.id, region_for_center(dims.width, center))
        })
        .collect();

    let regions = snapshot
        .landmass_id
        .iter()
        .map(|id| {
            if *id < 0 {
                Region::None
            } else {
                by_landmass.get(id).copied().unwrap_or(Region::None)
            }
        })
        .collect();

    Ok(RegionProjection {
        dims,
        regions,
        by_landmass,
    })
}

/// Write each tile's region id through the adapter.
pub fn stamp_regions(
    adapter: &mut dyn EngineAdapter,
    projection: &RegionProjection,
) -> Result<(), AdapterError> {
    let ids = [Region::West, Region::East, Region::None]
        .map(|region| (region, adapter.get_landmass_id(region.landmass_name())));
    let dims = projection.dims;
    for (index, region) in projection.regions.iter().enumerate() {
        let (x, y) = dims.coords(index);
        let id = ids
            .iter()
            .find(|(r, _)| r == region)
            .map(|(_, id)| *id)
            .unwrap_or(-1);
        adapter.set_landmass_region_id(x, y, id)?;
    }
    Ok(())
}

pub fn project_regions(
    snapshot: &LandmassSnapshot,
    adapter: &mut dyn EngineAdapter,
) -> Result<RegionProjection, RegionError> {
    let projection = compute_regions(snapshot)?;
    if projection.dims != adapter.dims() {
        return Err(RegionError::DimensionMismatch {
            snapshot: projection.dims,
            map: adapter.dims(),
        });
    }
    stamp_regions(adapter, &projection)?;
    tracing::debug!(
        target: "placement::regions",
        landmasses = snapshot.landmasses.len(),
        west_tiles = projection.tiles_in(Region::West).len(),
        east_tiles = projection.tiles_in(Region::East).len(),
        "regions.projected"
    );
    Ok(projection)
}
