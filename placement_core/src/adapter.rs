//! Boundary to the host engine's map storage.
//!
//! Placement and tag logic talk to the engine only through
//! [`EngineAdapter`]. Queries are plain reads; anything that mutates the map
//! is fallible so callers can decide whether a failure is fatal.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::GridDims;

pub const NO_FEATURE: i32 = -1;
pub const NO_PLOT_EFFECT: i32 = -1;

pub const TERRAIN_MOUNTAIN: &str = "TERRAIN_MOUNTAIN";
pub const TERRAIN_HILL: &str = "TERRAIN_HILL";
pub const TERRAIN_FLAT: &str = "TERRAIN_FLAT";
pub const TERRAIN_COAST: &str = "TERRAIN_COAST";
pub const TERRAIN_OCEAN: &str = "TERRAIN_OCEAN";
pub const TERRAIN_NAVIGABLE_RIVER: &str = "TERRAIN_NAVIGABLE_RIVER";

/// Named landmass region slots understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmassIdName {
    None,
    West,
    East,
}

/// Engine operations that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterOp {
    SetFeature,
    SetPlotEffect,
    SetLandmassRegion,
    SetStartPosition,
    AddNaturalWonders,
    AddFloodplains,
    ValidateAndFixTerrain,
    RecalculateAreas,
    StoreWaterData,
    GenerateResources,
    GenerateDiscoveries,
    RecalculateFertility,
    AssignAdvancedStartRegions,
    VerifyEffect,
}

impl AdapterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AdapterOp::SetFeature => "set_feature_type",
            AdapterOp::SetPlotEffect => "set_plot_effect",
            AdapterOp::SetLandmassRegion => "set_landmass_region_id",
            AdapterOp::SetStartPosition => "set_start_position",
            AdapterOp::AddNaturalWonders => "add_natural_wonders",
            AdapterOp::AddFloodplains => "add_floodplains",
            AdapterOp::ValidateAndFixTerrain => "validate_and_fix_terrain",
            AdapterOp::RecalculateAreas => "recalculate_areas",
            AdapterOp::StoreWaterData => "store_water_data",
            AdapterOp::GenerateResources => "generate_resources",
            AdapterOp::GenerateDiscoveries => "generate_discoveries",
            AdapterOp::RecalculateFertility => "recalculate_fertility",
            AdapterOp::AssignAdvancedStartRegions => "assign_advanced_start_regions",
            AdapterOp::VerifyEffect => "verify_effect",
        }
    }
}

impl fmt::Display for AdapterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("{op} failed: {message}")]
    OperationFailed { op: AdapterOp, message: String },
    #[error("tile ({x}, {y}) is outside the map")]
    OutOfBounds { x: u32, y: u32 },
    #[error("tile index {index} is outside the map")]
    TileIndexOutOfRange { index: usize },
}

impl AdapterError {
    pub fn failed(op: AdapterOp, message: impl Into<String>) -> Self {
        AdapterError::OperationFailed {
            op,
            message: message.into(),
        }
    }
}

pub trait EngineAdapter {
    fn dims(&self) -> GridDims;

    fn is_water(&self, x: u32, y: u32) -> bool;
    fn get_terrain_type(&self, x: u32, y: u32) -> i32;
    fn get_feature_type(&self, x: u32, y: u32) -> i32;
    fn get_plot_effect(&self, x: u32, y: u32) -> i32;
    /// Latitude in degrees, positive north.
    fn get_latitude(&self, x: u32, y: u32) -> f64;
    fn is_adjacent_to_rivers(&self, x: u32, y: u32, radius: u32) -> bool;

    /// Engine index for a feature name, or [`NO_FEATURE`] when unknown.
    fn get_feature_type_index(&self, name: &str) -> i32;
    fn get_terrain_type_index(&self, name: &str) -> i32;
    fn get_plot_effect_index(&self, name: &str) -> i32;
    fn get_landmass_id(&self, name: LandmassIdName) -> i32;

    fn can_have_feature(&self, x: u32, y: u32, feature: i32) -> bool;
    fn set_feature_type(&mut self, x: u32, y: u32, feature: i32) -> Result<(), AdapterError>;
    fn can_have_plot_effect(&self, x: u32, y: u32, effect: i32) -> bool;
    fn set_plot_effect(&mut self, x: u32, y: u32, effect: i32) -> Result<(), AdapterError>;

    fn set_landmass_region_id(&mut self, x: u32, y: u32, id: i32) -> Result<(), AdapterError>;
    fn set_start_position(&mut self, tile: usize, player: u32) -> Result<(), AdapterError>;

    /// Returns the number of wonders actually placed.
    fn add_natural_wonders(&mut self, count: u32) -> Result<u32, AdapterError>;
    /// Returns the number of floodplain tiles created.
    fn add_floodplains(&mut self, min_length: u32, max_length: u32) -> Result<u32, AdapterError>;
    fn validate_and_fix_terrain(&mut self) -> Result<(), AdapterError>;
    fn recalculate_areas(&mut self) -> Result<(), AdapterError>;
    fn store_water_data(&mut self) -> Result<(), AdapterError>;
    /// Returns the number of resources generated.
    fn generate_resources(&mut self) -> Result<u32, AdapterError>;
    /// Returns the number of discoveries generated around the given starts.
    fn generate_discoveries(&mut self, starts: &[i32]) -> Result<u32, AdapterError>;
    fn recalculate_fertility(&mut self) -> Result<(), AdapterError>;
    fn assign_advanced_start_regions(&mut self) -> Result<(), AdapterError>;

    /// Confirm that the engine shows evidence of an effect having run.
    fn verify_effect(&self, tag_id: &str) -> Result<bool, AdapterError>;
}
