//! Placement core for the map generation pipeline.
//!
//! Places terrain features and plot effects from a biome classification,
//! projects landmasses into West/East regions, assigns well-separated player
//! start positions and drives the engine's placement stages through an
//! [`EngineAdapter`]. Stage execution is gated by dependency tags evaluated
//! against a per-run [`MapContext`].

pub mod adapter;
pub mod base_tags;
pub mod biome;
pub mod context;
pub mod features;
pub mod grid;
pub mod grid_adapter;
mod hashing;
pub mod hex;
pub mod orchestrator;
pub mod placement_config;
pub mod plot_effects;
pub mod region;
pub mod rng;
pub mod starts;
pub mod tags;

pub use adapter::{AdapterError, AdapterOp, EngineAdapter, LandmassIdName};
pub use base_tags::{base_registry, base_tags};
pub use biome::{BiomeClassification, BiomeSymbol, TileClimate};
pub use context::{ArtifactStore, MapContext, MapFields};
pub use features::{place_features, FeatureError, FeatureGroups, FeatureKey, FeatureReport};
pub use grid::{GridDims, GridError};
pub use grid_adapter::GridAdapter;
pub use hex::hex_distance;
pub use orchestrator::{
    run_feature_step, run_placement, run_placement_step, PlacementError, PlacementInputs,
    PlacementOutputs, PlacementReport, PlacementRequest, PlacementStage, StageOutcome,
    StageRecord,
};
pub use placement_config::{
    load_placement_config_from_env, PlacementConfig, PlacementConfigError,
    PlacementConfigMetadata, BUILTIN_PLACEMENT_CONFIG,
};
pub use plot_effects::{place_plot_effects, PlotEffectReport, SnowTier};
pub use region::{
    compute_regions, project_regions, Landmass, LandmassSnapshot, Region, RegionError,
    RegionProjection,
};
pub use rng::LabelRng;
pub use starts::{
    assign_starts, OccupancyMask, SectorGrid, StartAssignment, StartError, StartRequest,
};
pub use tags::{DependencyTag, SatisfactionState, TagError, TagKind, TagRegistry};
