//! In-memory [`EngineAdapter`] backed by per-tile vectors.
//!
//! Used for headless runs, benchmarks and tests. Every successful mutation
//! leaves evidence that [`EngineAdapter::verify_effect`] can confirm, and any
//! operation can be made to fail on demand.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::adapter::{
    AdapterError, AdapterOp, EngineAdapter, LandmassIdName, NO_FEATURE, NO_PLOT_EFFECT,
    TERRAIN_COAST, TERRAIN_FLAT, TERRAIN_HILL, TERRAIN_MOUNTAIN, TERRAIN_NAVIGABLE_RIVER,
    TERRAIN_OCEAN,
};
use crate::base_tags;
use crate::features::NATURAL_WONDER_FEATURES;
use crate::grid::GridDims;
use crate::plot_effects::PLOT_EFFECT_NAMES;

const FEATURE_TYPES: &[(&str, i32)] = &[
    ("FEATURE_SAGEBRUSH_STEPPE", 0),
    ("FEATURE_OASIS", 1),
    ("FEATURE_FOREST", 4),
    ("FEATURE_MARSH", 5),
    ("FEATURE_REEF", 8),
    ("FEATURE_COLD_REEF", 9),
    ("FEATURE_ICE", 10),
    ("FEATURE_SAVANNA_WOODLAND", 11),
    ("FEATURE_WATERING_HOLE", 12),
    ("FEATURE_RAINFOREST", 15),
    ("FEATURE_MANGROVE", 16),
    ("FEATURE_TAIGA", 19),
    ("FEATURE_TUNDRA_BOG", 20),
    ("FEATURE_LOTUS", 24),
    ("FEATURE_ATOLL", 25),
];
const FIRST_WONDER_INDEX: i32 = 26;

const TERRAIN_TYPES: &[(&str, i32)] = &[
    (TERRAIN_MOUNTAIN, 0),
    (TERRAIN_HILL, 1),
    (TERRAIN_FLAT, 2),
    (TERRAIN_COAST, 3),
    (TERRAIN_OCEAN, 4),
    (TERRAIN_NAVIGABLE_RIVER, 5),
];

const LANDMASS_NONE: i32 = 0;
const LANDMASS_WEST: i32 = 2;
const LANDMASS_EAST: i32 = 1;

#[derive(Debug, Clone)]
pub struct GridAdapter {
    dims: GridDims,
    terrain: Vec<i32>,
    features: Vec<i32>,
    plot_effects: Vec<i32>,
    rivers: Vec<bool>,
    region_ids: Vec<i32>,
    starts: BTreeMap<u32, usize>,
    blocked_features: HashSet<(usize, i32)>,
    evidence: BTreeSet<String>,
    failing: BTreeSet<AdapterOp>,
    map_ops: Vec<AdapterOp>,
    rivers_as_water: bool,
}

impl GridAdapter {
    /// A map covered entirely by ocean.
    pub fn new(dims: GridDims) -> Self {
        let len = dims.len();
        Self {
            dims,
            terrain: vec![terrain_index(TERRAIN_OCEAN); len],
            features: vec![NO_FEATURE; len],
            plot_effects: vec![NO_PLOT_EFFECT; len],
            rivers: vec![false; len],
            region_ids: vec![LANDMASS_NONE; len],
            starts: BTreeMap::new(),
            blocked_features: HashSet::new(),
            evidence: BTreeSet::new(),
            failing: BTreeSet::new(),
            map_ops: Vec::new(),
            rivers_as_water: false,
        }
    }

    pub fn set_terrain(&mut self, x: u32, y: u32, name: &str) {
        let index = self.dims.index(x, y);
        self.terrain[index] = terrain_index(name);
    }

    pub fn set_land(&mut self, x: u32, y: u32) {
        self.set_terrain(x, y, TERRAIN_FLAT);
    }

    /// Report navigable-river terrain as water, the way some hosts do.
    pub fn treat_navigable_rivers_as_water(&mut self, enabled: bool) {
        self.rivers_as_water = enabled;
    }

    pub fn set_river(&mut self, x: u32, y: u32, river: bool) {
        let index = self.dims.index(x, y);
        self.rivers[index] = river;
    }

    /// Place a feature directly, bypassing validation and evidence.
    pub fn seed_feature(&mut self, x: u32, y: u32, feature: i32) {
        let index = self.dims.index(x, y);
        self.features[index] = feature;
    }

    /// Make `can_have_feature` reject `feature` on this tile.
    pub fn block_feature(&mut self, x: u32, y: u32, feature: i32) {
        self.blocked_features.insert((self.dims.index(x, y), feature));
    }

    pub fn fail_on(&mut self, op: AdapterOp) {
        self.failing.insert(op);
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    pub fn record_evidence(&mut self, tag_id: &str) {
        self.evidence.insert(tag_id.to_string());
    }

    pub fn features(&self) -> &[i32] {
        &self.features
    }

    pub fn plot_effects(&self) -> &[i32] {
        &self.plot_effects
    }

    pub fn region_ids(&self) -> &[i32] {
        &self.region_ids
    }

    pub fn start_positions(&self) -> &BTreeMap<u32, usize> {
        &self.starts
    }

    /// Whole-map operations in the order they were invoked.
    pub fn map_ops(&self) -> &[AdapterOp] {
        &self.map_ops
    }

    fn check(&self, op: AdapterOp) -> Result<(), AdapterError> {
        if self.failing.contains(&op) {
            return Err(AdapterError::failed(op, "injected failure"));
        }
        Ok(())
    }

    fn tile(&self, x: u32, y: u32) -> Result<usize, AdapterError> {
        if x >= self.dims.width || y >= self.dims.height {
            return Err(AdapterError::OutOfBounds { x, y });
        }
        Ok(self.dims.index(x, y))
    }

    fn map_op(&mut self, op: AdapterOp) -> Result<(), AdapterError> {
        self.map_ops.push(op);
        self.check(op)
    }

    fn land_tiles(&self) -> usize {
        (0..self.terrain.len())
            .filter(|&index| !is_water_terrain(self.terrain[index]))
            .count()
    }
}

fn terrain_index(name: &str) -> i32 {
    TERRAIN_TYPES
        .iter()
        .find(|(terrain, _)| *terrain == name)
        .map(|(_, index)| *index)
        .unwrap_or(-1)
}

fn is_water_terrain(terrain: i32) -> bool {
    terrain == terrain_index(TERRAIN_COAST) || terrain == terrain_index(TERRAIN_OCEAN)
}

impl EngineAdapter for GridAdapter {
    fn dims(&self) -> GridDims {
        self.dims
    }

    fn is_water(&self, x: u32, y: u32) -> bool {
        let terrain = self.get_terrain_type(x, y);
        is_water_terrain(terrain)
            || (self.rivers_as_water && terrain == terrain_index(TERRAIN_NAVIGABLE_RIVER))
    }

    fn get_terrain_type(&self, x: u32, y: u32) -> i32 {
        self.terrain[self.dims.index(x, y)]
    }

    fn get_feature_type(&self, x: u32, y: u32) -> i32 {
        self.features[self.dims.index(x, y)]
    }

    fn get_plot_effect(&self, x: u32, y: u32) -> i32 {
        self.plot_effects[self.dims.index(x, y)]
    }

    fn get_latitude(&self, _x: u32, y: u32) -> f64 {
        90.0 - (y as f64 + 0.5) / self.dims.height as f64 * 180.0
    }

    fn is_adjacent_to_rivers(&self, x: u32, y: u32, radius: u32) -> bool {
        self.rivers[self.dims.index(x, y)]
            || self
                .dims
                .neighborhood(x, y, radius)
                .any(|(nx, ny)| self.rivers[self.dims.index(nx, ny)])
    }

    fn get_feature_type_index(&self, name: &str) -> i32 {
        if let Some((_, index)) = FEATURE_TYPES.iter().find(|(feature, _)| *feature == name) {
            return *index;
        }
        NATURAL_WONDER_FEATURES
            .iter()
            .position(|wonder| *wonder == name)
            .map(|offset| FIRST_WONDER_INDEX + offset as i32)
            .unwrap_or(NO_FEATURE)
    }

    fn get_terrain_type_index(&self, name: &str) -> i32 {
        terrain_index(name)
    }

    fn get_plot_effect_index(&self, name: &str) -> i32 {
        PLOT_EFFECT_NAMES
            .iter()
            .position(|effect| *effect == name)
            .map(|index| index as i32)
            .unwrap_or(NO_PLOT_EFFECT)
    }

    fn get_landmass_id(&self, name: LandmassIdName) -> i32 {
        match name {
            LandmassIdName::None => LANDMASS_NONE,
            LandmassIdName::West => LANDMASS_WEST,
            LandmassIdName::East => LANDMASS_EAST,
        }
    }

    fn can_have_feature(&self, x: u32, y: u32, feature: i32) -> bool {
        feature >= 0 && !self.blocked_features.contains(&(self.dims.index(x, y), feature))
    }

    fn set_feature_type(&mut self, x: u32, y: u32, feature: i32) -> Result<(), AdapterError> {
        self.check(AdapterOp::SetFeature)?;
        let index = self.tile(x, y)?;
        self.features[index] = feature;
        self.evidence
            .insert(base_tags::EFFECT_FEATURES_APPLIED.to_string());
        Ok(())
    }

    fn can_have_plot_effect(&self, x: u32, y: u32, effect: i32) -> bool {
        effect >= 0 && !self.is_water(x, y)
    }

    fn set_plot_effect(&mut self, x: u32, y: u32, effect: i32) -> Result<(), AdapterError> {
        self.check(AdapterOp::SetPlotEffect)?;
        let index = self.tile(x, y)?;
        self.plot_effects[index] = effect;
        self.evidence
            .insert(base_tags::EFFECT_PLOT_EFFECTS_APPLIED.to_string());
        Ok(())
    }

    fn set_landmass_region_id(&mut self, x: u32, y: u32, id: i32) -> Result<(), AdapterError> {
        self.check(AdapterOp::SetLandmassRegion)?;
        let index = self.tile(x, y)?;
        self.region_ids[index] = id;
        self.evidence
            .insert(base_tags::EFFECT_LANDMASSES_APPLIED.to_string());
        Ok(())
    }

    fn set_start_position(&mut self, tile: usize, player: u32) -> Result<(), AdapterError> {
        self.check(AdapterOp::SetStartPosition)?;
        if tile >= self.dims.len() {
            return Err(AdapterError::TileIndexOutOfRange { index: tile });
        }
        self.starts.insert(player, tile);
        self.evidence
            .insert(base_tags::EFFECT_PLACEMENT_APPLIED.to_string());
        Ok(())
    }

    fn add_natural_wonders(&mut self, count: u32) -> Result<u32, AdapterError> {
        self.map_op(AdapterOp::AddNaturalWonders)?;
        Ok(count.min(NATURAL_WONDER_FEATURES.len() as u32))
    }

    fn add_floodplains(&mut self, min_length: u32, max_length: u32) -> Result<u32, AdapterError> {
        self.map_op(AdapterOp::AddFloodplains)?;
        if min_length > max_length {
            return Err(AdapterError::failed(
                AdapterOp::AddFloodplains,
                format!("min_length {min_length} exceeds max_length {max_length}"),
            ));
        }
        let river_land = (0..self.rivers.len())
            .filter(|&index| self.rivers[index] && !is_water_terrain(self.terrain[index]))
            .count() as u32;
        Ok(river_land / min_length.max(1))
    }

    fn validate_and_fix_terrain(&mut self) -> Result<(), AdapterError> {
        self.map_op(AdapterOp::ValidateAndFixTerrain)
    }

    fn recalculate_areas(&mut self) -> Result<(), AdapterError> {
        self.map_op(AdapterOp::RecalculateAreas)
    }

    fn store_water_data(&mut self) -> Result<(), AdapterError> {
        self.map_op(AdapterOp::StoreWaterData)
    }

    fn generate_resources(&mut self) -> Result<u32, AdapterError> {
        self.map_op(AdapterOp::GenerateResources)?;
        Ok((self.land_tiles() / 6) as u32)
    }

    fn generate_discoveries(&mut self, starts: &[i32]) -> Result<u32, AdapterError> {
        self.map_op(AdapterOp::GenerateDiscoveries)?;
        Ok(starts.iter().filter(|&&tile| tile >= 0).count() as u32 * 2)
    }

    fn recalculate_fertility(&mut self) -> Result<(), AdapterError> {
        self.map_op(AdapterOp::RecalculateFertility)
    }

    fn assign_advanced_start_regions(&mut self) -> Result<(), AdapterError> {
        self.map_op(AdapterOp::AssignAdvancedStartRegions)?;
        // Last placement pass; marks placement complete even with no players.
        self.evidence
            .insert(base_tags::EFFECT_PLACEMENT_APPLIED.to_string());
        Ok(())
    }

    fn verify_effect(&self, tag_id: &str) -> Result<bool, AdapterError> {
        self.check(AdapterOp::VerifyEffect)?;
        Ok(self.evidence.contains(tag_id))
    }
}
