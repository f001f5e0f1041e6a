//! Biome-conditioned feature scattering.
//!
//! Each family sweeps the grid, filters tiles by its eligibility rules, rolls
//! a label-keyed chance and commits through [`FeatureSweep::try_place`],
//! which re-reads the live engine state right before writing.

use std::collections::{BTreeMap, HashSet};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::{EngineAdapter, NO_FEATURE, TERRAIN_COAST, TERRAIN_NAVIGABLE_RIVER};
use crate::biome::{BiomeClassification, BiomeSymbol, TileClimate};
use crate::grid::{GridDims, GridError};
use crate::placement_config::{FeaturesConfig, VegetatedRules};
use crate::rng::LabelRng;

pub const NATURAL_WONDER_FEATURES: [&str; 14] = [
    "FEATURE_VALLEY_OF_FLOWERS",
    "FEATURE_BARRIER_REEF",
    "FEATURE_REDWOOD_FOREST",
    "FEATURE_GRAND_CANYON",
    "FEATURE_GULLFOSS",
    "FEATURE_HOERIKWAGGO",
    "FEATURE_IGUAZU_FALLS",
    "FEATURE_KILIMANJARO",
    "FEATURE_ZHANGJIAJIE",
    "FEATURE_THERA",
    "FEATURE_TORRES_DEL_PAINE",
    "FEATURE_ULURU",
    "FEATURE_BERMUDA_TRIANGLE",
    "FEATURE_MOUNT_EVEREST",
];

bitflags! {
    /// Feature families that may run in a sweep.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FeatureGroups: u8 {
        const VEGETATED = 1 << 0;
        const WET = 1 << 1;
        const AQUATIC = 1 << 2;
        const ICE = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    Forest,
    Rainforest,
    Taiga,
    SavannaWoodland,
    SagebrushSteppe,
    Marsh,
    TundraBog,
    Mangrove,
    Oasis,
    WateringHole,
    Reef,
    ColdReef,
    Atoll,
    Lotus,
    Ice,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 15] = [
        FeatureKey::Forest,
        FeatureKey::Rainforest,
        FeatureKey::Taiga,
        FeatureKey::SavannaWoodland,
        FeatureKey::SagebrushSteppe,
        FeatureKey::Marsh,
        FeatureKey::TundraBog,
        FeatureKey::Mangrove,
        FeatureKey::Oasis,
        FeatureKey::WateringHole,
        FeatureKey::Reef,
        FeatureKey::ColdReef,
        FeatureKey::Atoll,
        FeatureKey::Lotus,
        FeatureKey::Ice,
    ];

    pub fn engine_name(self) -> &'static str {
        match self {
            FeatureKey::Forest => "FEATURE_FOREST",
            FeatureKey::Rainforest => "FEATURE_RAINFOREST",
            FeatureKey::Taiga => "FEATURE_TAIGA",
            FeatureKey::SavannaWoodland => "FEATURE_SAVANNA_WOODLAND",
            FeatureKey::SagebrushSteppe => "FEATURE_SAGEBRUSH_STEPPE",
            FeatureKey::Marsh => "FEATURE_MARSH",
            FeatureKey::TundraBog => "FEATURE_TUNDRA_BOG",
            FeatureKey::Mangrove => "FEATURE_MANGROVE",
            FeatureKey::Oasis => "FEATURE_OASIS",
            FeatureKey::WateringHole => "FEATURE_WATERING_HOLE",
            FeatureKey::Reef => "FEATURE_REEF",
            FeatureKey::ColdReef => "FEATURE_COLD_REEF",
            FeatureKey::Atoll => "FEATURE_ATOLL",
            FeatureKey::Lotus => "FEATURE_LOTUS",
            FeatureKey::Ice => "FEATURE_ICE",
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            FeatureKey::Forest => "forest",
            FeatureKey::Rainforest => "rainforest",
            FeatureKey::Taiga => "taiga",
            FeatureKey::SavannaWoodland => "savanna_woodland",
            FeatureKey::SagebrushSteppe => "sagebrush_steppe",
            FeatureKey::Marsh => "marsh",
            FeatureKey::TundraBog => "tundra_bog",
            FeatureKey::Mangrove => "mangrove",
            FeatureKey::Oasis => "oasis",
            FeatureKey::WateringHole => "watering_hole",
            FeatureKey::Reef => "reef",
            FeatureKey::ColdReef => "cold_reef",
            FeatureKey::Atoll => "atoll",
            FeatureKey::Lotus => "lotus",
            FeatureKey::Ice => "ice",
        }
    }
}

/// Engine indices for every [`FeatureKey`]; negative when the engine lacks it.
#[derive(Debug, Clone, Copy)]
pub struct FeatureIndices([i32; 15]);

impl FeatureIndices {
    pub fn resolve(adapter: &dyn EngineAdapter) -> Self {
        Self(FeatureKey::ALL.map(|key| adapter.get_feature_type_index(key.engine_name())))
    }

    pub fn get(&self, key: FeatureKey) -> i32 {
        self.0[key as usize]
    }
}

pub fn clamp_chance(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u32
}

pub fn scaled_chance(base: f64, multiplier: f64) -> u32 {
    clamp_chance(base * multiplier)
}

pub(crate) fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Pick the vegetated feature a tile's climate supports, if any.
pub fn pick_vegetated_feature(rules: &VegetatedRules, climate: &TileClimate) -> Option<FeatureKey> {
    match climate.symbol {
        BiomeSymbol::Snow => None,
        BiomeSymbol::Desert => {
            (climate.vegetation > rules.desert_sagebrush_min_vegetation)
                .then_some(FeatureKey::SagebrushSteppe)
        }
        BiomeSymbol::Tundra => (climate.vegetation > rules.tundra_taiga_min_vegetation
            && climate.temperature > rules.tundra_taiga_min_temperature)
            .then_some(FeatureKey::Taiga),
        BiomeSymbol::Boreal => Some(FeatureKey::Taiga),
        BiomeSymbol::TemperateDry => {
            if climate.moisture > rules.temperate_dry_forest_moisture
                || climate.vegetation > rules.temperate_dry_forest_vegetation
            {
                Some(FeatureKey::Forest)
            } else {
                Some(FeatureKey::SagebrushSteppe)
            }
        }
        BiomeSymbol::TemperateHumid => Some(FeatureKey::Forest),
        BiomeSymbol::TropicalSeasonal => {
            if climate.moisture > rules.tropical_seasonal_rainforest_moisture {
                Some(FeatureKey::Rainforest)
            } else {
                Some(FeatureKey::SavannaWoodland)
            }
        }
        BiomeSymbol::TropicalRainforest => Some(FeatureKey::Rainforest),
    }
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("classification is {classification:?} but the map is {map:?}")]
    DimensionMismatch {
        classification: GridDims,
        map: GridDims,
    },
}

/// A single write the engine refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementFailure {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureReport {
    pub placed: BTreeMap<FeatureKey, u32>,
    pub failures: Vec<PlacementFailure>,
}

impl FeatureReport {
    pub fn placed(&self, key: FeatureKey) -> u32 {
        self.placed.get(&key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.placed.values().sum()
    }
}

/// Run every enabled feature family over the map.
pub fn place_features(
    adapter: &mut dyn EngineAdapter,
    classification: &BiomeClassification,
    config: &FeaturesConfig,
    rng: &mut LabelRng,
) -> Result<FeatureReport, FeatureError> {
    classification.validate()?;
    let dims = adapter.dims();
    if classification.dims() != dims {
        return Err(FeatureError::DimensionMismatch {
            classification: classification.dims(),
            map: dims,
        });
    }

    let mut sweep = FeatureSweep::new(adapter, classification, config, rng);
    let groups = config.groups.enabled();
    if groups.contains(FeatureGroups::ICE) {
        sweep.place_ice();
    }
    if groups.contains(FeatureGroups::AQUATIC) {
        sweep.place_reefs();
        sweep.place_atolls();
        sweep.place_lotus();
    }
    if groups.contains(FeatureGroups::WET) {
        sweep.place_river_wetlands();
        sweep.place_mangroves();
        sweep.place_isolated_wetlands();
    }
    if groups.contains(FeatureGroups::VEGETATED) {
        sweep.place_vegetation();
    }

    let report = sweep.report;
    tracing::debug!(
        target: "placement::features",
        placed = report.total(),
        failures = report.failures.len(),
        "features.placed"
    );
    Ok(report)
}

struct FeatureSweep<'a> {
    adapter: &'a mut dyn EngineAdapter,
    climate: &'a BiomeClassification,
    config: &'a FeaturesConfig,
    rng: &'a mut LabelRng,
    dims: GridDims,
    indices: FeatureIndices,
    wonders: HashSet<i32>,
    navigable_river: i32,
    coast: i32,
    report: FeatureReport,
}

impl<'a> FeatureSweep<'a> {
    fn new(
        adapter: &'a mut dyn EngineAdapter,
        climate: &'a BiomeClassification,
        config: &'a FeaturesConfig,
        rng: &'a mut LabelRng,
    ) -> Self {
        let indices = FeatureIndices::resolve(adapter);
        let wonders = NATURAL_WONDER_FEATURES
            .iter()
            .map(|name| adapter.get_feature_type_index(name))
            .filter(|index| *index >= 0)
            .collect();
        let navigable_river = adapter.get_terrain_type_index(TERRAIN_NAVIGABLE_RIVER);
        let coast = adapter.get_terrain_type_index(TERRAIN_COAST);
        Self {
            dims: adapter.dims(),
            adapter,
            climate,
            config,
            rng,
            indices,
            wonders,
            navigable_river,
            coast,
            report: FeatureReport::default(),
        }
    }

    fn chance(&self, key: FeatureKey, multiplier: f64) -> u32 {
        if self.indices.get(key) < 0 {
            return 0;
        }
        scaled_chance(self.config.chances.get(key), multiplier)
    }

    fn is_navigable_river(&self, x: u32, y: u32) -> bool {
        self.navigable_river >= 0 && self.adapter.get_terrain_type(x, y) == self.navigable_river
    }

    fn can_place(&self, x: u32, y: u32, key: FeatureKey) -> bool {
        let feature = self.indices.get(key);
        feature >= 0
            && self.adapter.get_feature_type(x, y) == NO_FEATURE
            && self.adapter.can_have_feature(x, y, feature)
    }

    fn any_neighbor(&self, x: u32, y: u32, radius: u32, test: impl Fn(u32, u32) -> bool) -> bool {
        self.dims
            .neighborhood(x, y, radius)
            .any(|(nx, ny)| test(nx, ny))
    }

    fn is_coastal_land(&self, x: u32, y: u32, radius: u32) -> bool {
        !self.adapter.is_water(x, y)
            && self.any_neighbor(x, y, radius, |nx, ny| self.adapter.is_water(nx, ny))
    }

    fn has_feature_nearby(&self, x: u32, y: u32, key: FeatureKey, radius: u32) -> bool {
        let feature = self.indices.get(key);
        feature >= 0
            && self.any_neighbor(x, y, radius, |nx, ny| {
                self.adapter.get_feature_type(nx, ny) == feature
            })
    }

    /// Commit a feature after re-validating against the live map.
    fn try_place(&mut self, x: u32, y: u32, key: FeatureKey) -> bool {
        if !self.can_place(x, y, key) {
            return false;
        }
        match self.adapter.set_feature_type(x, y, self.indices.get(key)) {
            Ok(()) => {
                *self.report.placed.entry(key).or_insert(0) += 1;
                true
            }
            Err(err) => {
                tracing::warn!(
                    target: "placement::features",
                    feature = key.engine_name(),
                    x,
                    y,
                    error = %err,
                    "features.place_failed"
                );
                self.report.failures.push(PlacementFailure {
                    name: key.engine_name().to_string(),
                    x,
                    y,
                    message: err.to_string(),
                });
                false
            }
        }
    }

    fn roll(&mut self, label: &str, chance: u32) -> bool {
        self.rng.roll_percent(label, chance)
    }

    fn place_ice(&mut self) {
        let chance = self.chance(FeatureKey::Ice, self.config.groups.ice.multiplier);
        if chance == 0 {
            return;
        }
        let rules = self.config.ice;
        for (x, y) in self.dims.tiles() {
            if !self.adapter.is_water(x, y)
                || self.is_navigable_river(x, y)
                || !self.can_place(x, y, FeatureKey::Ice)
            {
                continue;
            }
            if self.adapter.get_latitude(x, y).abs() < rules.min_abs_latitude {
                continue;
            }
            if rules.forbid_adjacent_to_land
                && self.any_neighbor(x, y, rules.land_adjacency_radius, |nx, ny| {
                    !self.adapter.is_water(nx, ny)
                })
            {
                continue;
            }
            if rules.forbid_adjacent_to_natural_wonders
                && self.any_neighbor(x, y, rules.natural_wonder_adjacency_radius, |nx, ny| {
                    self.wonders.contains(&self.adapter.get_feature_type(nx, ny))
                })
            {
                continue;
            }
            if self.roll("features:owned:ice", chance) {
                self.try_place(x, y, FeatureKey::Ice);
            }
        }
    }

    fn place_reefs(&mut self) {
        let multiplier = self.config.groups.aquatic.multiplier;
        let warm = self.chance(FeatureKey::Reef, multiplier);
        let cold = self.chance(FeatureKey::ColdReef, multiplier);
        if warm == 0 && cold == 0 {
            return;
        }
        let split = self.config.aquatic.reef_latitude_split;
        for (x, y) in self.dims.tiles() {
            if !self.adapter.is_water(x, y) || self.is_navigable_river(x, y) {
                continue;
            }
            let (key, chance) = if self.adapter.get_latitude(x, y).abs() >= split {
                (FeatureKey::ColdReef, cold)
            } else {
                (FeatureKey::Reef, warm)
            };
            if chance == 0 || !self.can_place(x, y, key) {
                continue;
            }
            let label = format!("features:owned:reef:{}", key.id());
            if self.roll(&label, chance) {
                self.try_place(x, y, key);
            }
        }
    }

    fn place_atolls(&mut self) {
        let base = self.chance(FeatureKey::Atoll, self.config.groups.aquatic.multiplier);
        if base == 0 {
            return;
        }
        let rules = self.config.aquatic.atoll;
        for (x, y) in self.dims.tiles() {
            if !self.adapter.is_water(x, y) || self.is_navigable_river(x, y) {
                continue;
            }
            if !self.can_place(x, y, FeatureKey::Atoll) {
                continue;
            }

            let mut chance = base;
            if rules.enable_clustering
                && rules.cluster_radius > 0
                && self.has_feature_nearby(x, y, FeatureKey::Atoll, rules.cluster_radius)
            {
                let growth = if self.adapter.get_latitude(x, y).abs()
                    <= rules.equatorial_band_max_abs_latitude
                {
                    rules.growth_chance_equatorial
                } else {
                    rules.growth_chance_non_equatorial
                };
                chance = clamp_chance(growth);
            }
            if chance == 0 {
                continue;
            }

            if rules.shallow_water_adjacency_gate_chance > 0
                && self.coast >= 0
                && self.any_neighbor(x, y, rules.shallow_water_adjacency_radius, |nx, ny| {
                    self.adapter.get_terrain_type(nx, ny) == self.coast
                })
                && !self.roll(
                    "features:owned:atoll:shallow-gate",
                    rules.shallow_water_adjacency_gate_chance.min(100),
                )
            {
                continue;
            }

            if self.roll("features:owned:atoll", chance) {
                self.try_place(x, y, FeatureKey::Atoll);
            }
        }
    }

    fn place_lotus(&mut self) {
        let chance = self.chance(FeatureKey::Lotus, self.config.groups.aquatic.multiplier);
        if chance == 0 {
            return;
        }
        for (x, y) in self.dims.tiles() {
            if !self.adapter.is_water(x, y)
                || self.is_navigable_river(x, y)
                || !self.can_place(x, y, FeatureKey::Lotus)
            {
                continue;
            }
            if self.roll("features:owned:lotus", chance) {
                self.try_place(x, y, FeatureKey::Lotus);
            }
        }
    }

    fn place_river_wetlands(&mut self) {
        let multiplier = self.config.groups.wet.multiplier;
        let marsh = self.chance(FeatureKey::Marsh, multiplier);
        let bog = self.chance(FeatureKey::TundraBog, multiplier);
        if marsh == 0 && bog == 0 {
            return;
        }
        let config = self.config;
        let rules = &config.wet;
        for (x, y) in self.dims.tiles() {
            if self.adapter.is_water(x, y) || self.is_navigable_river(x, y) {
                continue;
            }
            if !self.adapter.is_adjacent_to_rivers(x, y, rules.near_river_radius) {
                continue;
            }
            let index = self.dims.index(x, y);
            let cold = self
                .climate
                .symbol(index)
                .is_some_and(|symbol| rules.cold_biome_symbols.contains(&symbol))
                || self.climate.surface_temperature[index] <= rules.cold_temperature_max;
            let (key, chance) = if cold {
                (FeatureKey::TundraBog, bog)
            } else {
                (FeatureKey::Marsh, marsh)
            };
            if chance == 0 || !self.can_place(x, y, key) {
                continue;
            }
            let label = format!("features:owned:wet:{}", key.id());
            if self.roll(&label, chance) {
                self.try_place(x, y, key);
            }
        }
    }

    fn place_mangroves(&mut self) {
        let chance = self.chance(FeatureKey::Mangrove, self.config.groups.wet.multiplier);
        if chance == 0 {
            return;
        }
        let config = self.config;
        let rules = &config.wet;
        for (x, y) in self.dims.tiles() {
            if self.is_navigable_river(x, y)
                || !self.is_coastal_land(x, y, rules.coastal_adjacency_radius)
            {
                continue;
            }
            let index = self.dims.index(x, y);
            let warm = self
                .climate
                .symbol(index)
                .is_some_and(|symbol| rules.mangrove_warm_biome_symbols.contains(&symbol))
                || self.climate.surface_temperature[index] >= rules.mangrove_warm_temperature_min;
            if !warm || !self.can_place(x, y, FeatureKey::Mangrove) {
                continue;
            }
            if self.roll("features:owned:wet:mangrove", chance) {
                self.try_place(x, y, FeatureKey::Mangrove);
            }
        }
    }

    fn place_isolated_wetlands(&mut self) {
        let multiplier = self.config.groups.wet.multiplier;
        let oasis = self.chance(FeatureKey::Oasis, multiplier);
        let watering = self.chance(FeatureKey::WateringHole, multiplier);
        if oasis == 0 && watering == 0 {
            return;
        }
        let config = self.config;
        let rules = &config.wet;
        for (x, y) in self.dims.tiles() {
            if self.adapter.is_water(x, y) || self.is_navigable_river(x, y) {
                continue;
            }
            if self.is_coastal_land(x, y, rules.coastal_adjacency_radius)
                || self
                    .adapter
                    .is_adjacent_to_rivers(x, y, rules.isolated_river_radius)
            {
                continue;
            }
            let index = self.dims.index(x, y);
            let dry = self
                .climate
                .symbol(index)
                .is_some_and(|symbol| rules.oasis_biome_symbols.contains(&symbol));
            let (key, chance) = if dry {
                (FeatureKey::Oasis, oasis)
            } else {
                (FeatureKey::WateringHole, watering)
            };
            if chance == 0 || !self.can_place(x, y, key) {
                continue;
            }
            if self.has_feature_nearby(x, y, key, rules.isolated_spacing_radius) {
                continue;
            }
            let label = format!("features:owned:wet:{}", key.id());
            if self.roll(&label, chance) {
                self.try_place(x, y, key);
            }
        }
    }

    fn place_vegetation(&mut self) {
        let config = self.config;
        let multiplier = config.groups.vegetated.multiplier;
        let rules = &config.vegetated;
        for (x, y) in self.dims.tiles() {
            if self.adapter.is_water(x, y) || self.is_navigable_river(x, y) {
                continue;
            }
            let Some(climate) = self.climate.tile(self.dims.index(x, y)) else {
                continue;
            };
            if climate.vegetation < rules.min_vegetation {
                continue;
            }
            let Some(key) = pick_vegetated_feature(rules, &climate) else {
                continue;
            };
            if !self.can_place(x, y, key) {
                continue;
            }
            let density = clamp01(climate.vegetation as f64 * rules.vegetation_chance_scalar);
            let chance = clamp_chance(self.chance(key, multiplier) as f64 * density);
            let label = format!("features:owned:vegetated:{}", key.id());
            if self.roll(&label, chance) {
                self.try_place(x, y, key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterOp, TERRAIN_COAST};
    use crate::grid_adapter::GridAdapter;
    use crate::placement_config::FeatureChances;

    fn dims(width: u32, height: u32) -> GridDims {
        GridDims::new(width, height).unwrap()
    }

    fn climate(
        symbol: BiomeSymbol,
        vegetation: f32,
        moisture: f32,
        temperature: f32,
    ) -> TileClimate {
        TileClimate {
            symbol,
            vegetation,
            moisture,
            temperature,
            ..TileClimate::default()
        }
    }

    /// Every family off, then re-enable one group with chosen chances.
    fn only(groups: FeatureGroups, chances: FeatureChances) -> FeaturesConfig {
        let mut config = FeaturesConfig {
            chances,
            ..FeaturesConfig::default()
        };
        for (flag, group) in [
            (FeatureGroups::VEGETATED, &mut config.groups.vegetated),
            (FeatureGroups::WET, &mut config.groups.wet),
            (FeatureGroups::AQUATIC, &mut config.groups.aquatic),
            (FeatureGroups::ICE, &mut config.groups.ice),
        ] {
            group.multiplier = if groups.contains(flag) { 1.0 } else { 0.0 };
        }
        config
    }

    fn zero_chances() -> FeatureChances {
        FeatureChances {
            forest: 0.0,
            rainforest: 0.0,
            taiga: 0.0,
            savanna_woodland: 0.0,
            sagebrush_steppe: 0.0,
            marsh: 0.0,
            tundra_bog: 0.0,
            mangrove: 0.0,
            oasis: 0.0,
            watering_hole: 0.0,
            reef: 0.0,
            cold_reef: 0.0,
            atoll: 0.0,
            lotus: 0.0,
            ice: 0.0,
        }
    }

    #[test]
    fn chance_clamps_and_rounds() {
        assert_eq!(scaled_chance(30.0, 1.5), 45);
        assert_eq!(scaled_chance(90.0, 2.0), 100);
        assert_eq!(scaled_chance(12.0, -1.0), 0);
        assert_eq!(clamp_chance(12.5), 13);
        assert_eq!(clamp_chance(f64::NAN), 0);
    }

    #[test]
    fn vegetated_decision_table() {
        let rules = VegetatedRules::default();
        let cases = [
            (climate(BiomeSymbol::Snow, 0.9, 200.0, 0.0), None),
            (climate(BiomeSymbol::Desert, 0.2, 10.0, 30.0), None),
            (
                climate(BiomeSymbol::Desert, 0.21, 10.0, 30.0),
                Some(FeatureKey::SagebrushSteppe),
            ),
            (climate(BiomeSymbol::Tundra, 0.3, 50.0, -2.0), None),
            (climate(BiomeSymbol::Tundra, 0.25, 50.0, 5.0), None),
            (
                climate(BiomeSymbol::Tundra, 0.3, 50.0, -1.0),
                Some(FeatureKey::Taiga),
            ),
            (
                climate(BiomeSymbol::Boreal, 0.06, 0.0, -20.0),
                Some(FeatureKey::Taiga),
            ),
            (
                climate(BiomeSymbol::TemperateDry, 0.1, 121.0, 10.0),
                Some(FeatureKey::Forest),
            ),
            (
                climate(BiomeSymbol::TemperateDry, 0.46, 20.0, 10.0),
                Some(FeatureKey::Forest),
            ),
            (
                climate(BiomeSymbol::TemperateDry, 0.45, 120.0, 10.0),
                Some(FeatureKey::SagebrushSteppe),
            ),
            (
                climate(BiomeSymbol::TemperateHumid, 0.1, 0.0, 10.0),
                Some(FeatureKey::Forest),
            ),
            (
                climate(BiomeSymbol::TropicalSeasonal, 0.5, 141.0, 25.0),
                Some(FeatureKey::Rainforest),
            ),
            (
                climate(BiomeSymbol::TropicalSeasonal, 0.5, 140.0, 25.0),
                Some(FeatureKey::SavannaWoodland),
            ),
            (
                climate(BiomeSymbol::TropicalRainforest, 0.5, 0.0, 25.0),
                Some(FeatureKey::Rainforest),
            ),
        ];
        for (tile, expected) in cases {
            assert_eq!(pick_vegetated_feature(&rules, &tile), expected, "{tile:?}");
        }
    }

    #[test]
    fn atoll_grows_next_to_existing_atoll_in_equatorial_band() {
        let d = dims(8, 8);
        let mut adapter = GridAdapter::new(d);
        let atoll = adapter.get_feature_type_index("FEATURE_ATOLL");
        // Rows 3 and 4 sit at about 11 degrees either side of the equator.
        adapter.seed_feature(4, 3, atoll);

        let mut config = only(
            FeatureGroups::AQUATIC,
            FeatureChances {
                atoll: 1.0,
                ..zero_chances()
            },
        );
        config.aquatic.atoll.cluster_radius = 1;
        config.aquatic.atoll.growth_chance_equatorial = 100.0;
        config.aquatic.atoll.shallow_water_adjacency_gate_chance = 0;

        let classification = BiomeClassification::filled(d, TileClimate::default());
        let mut rng = LabelRng::new(20240601);
        let report = place_features(&mut adapter, &classification, &config, &mut rng).unwrap();

        for (x, y) in [(3, 3), (5, 3), (3, 4), (4, 4), (5, 4)] {
            assert_eq!(
                adapter.get_feature_type(x, y),
                atoll,
                "expected atoll growth at ({x}, {y})"
            );
        }
        assert!(report.placed(FeatureKey::Atoll) >= 5);
    }

    #[test]
    fn shallow_gate_blocks_when_gate_never_passes() {
        let d = dims(6, 6);
        let mut adapter = GridAdapter::new(d);
        for (x, y) in d.tiles() {
            adapter.set_terrain(x, y, TERRAIN_COAST);
        }
        let mut config = only(
            FeatureGroups::AQUATIC,
            FeatureChances {
                atoll: 100.0,
                ..zero_chances()
            },
        );
        config.aquatic.atoll.enable_clustering = false;
        config.aquatic.atoll.shallow_water_adjacency_gate_chance = 0;

        let classification = BiomeClassification::filled(d, TileClimate::default());
        let report =
            place_features(&mut adapter, &classification, &config, &mut LabelRng::new(3)).unwrap();
        assert_eq!(report.placed(FeatureKey::Atoll), 36);

        let mut gated = GridAdapter::new(d);
        for (x, y) in d.tiles() {
            gated.set_terrain(x, y, TERRAIN_COAST);
        }
        config.aquatic.atoll.shallow_water_adjacency_gate_chance = 1;
        let report =
            place_features(&mut gated, &classification, &config, &mut LabelRng::new(3)).unwrap();
        assert!(report.placed(FeatureKey::Atoll) < 36);
    }

    #[test]
    fn reefs_split_on_latitude() {
        let d = dims(4, 20);
        let mut adapter = GridAdapter::new(d);
        let config = only(
            FeatureGroups::AQUATIC,
            FeatureChances {
                reef: 100.0,
                cold_reef: 100.0,
                ..zero_chances()
            },
        );
        let classification = BiomeClassification::filled(d, TileClimate::default());
        place_features(&mut adapter, &classification, &config, &mut LabelRng::new(9)).unwrap();

        let reef = adapter.get_feature_type_index("FEATURE_REEF");
        let cold = adapter.get_feature_type_index("FEATURE_COLD_REEF");
        // Row 0 is at 85.5 degrees, row 10 at -4.5.
        assert_eq!(adapter.get_feature_type(0, 0), cold);
        assert_eq!(adapter.get_feature_type(0, 10), reef);
    }

    #[test]
    fn ice_needs_polar_open_water() {
        let d = dims(10, 20);
        let mut adapter = GridAdapter::new(d);
        adapter.set_land(5, 0);
        let config = only(
            FeatureGroups::ICE,
            FeatureChances {
                ice: 100.0,
                ..zero_chances()
            },
        );
        let classification = BiomeClassification::filled(d, TileClimate::default());
        place_features(&mut adapter, &classification, &config, &mut LabelRng::new(1)).unwrap();

        let ice = adapter.get_feature_type_index("FEATURE_ICE");
        assert_eq!(adapter.get_feature_type(0, 0), ice);
        assert_eq!(adapter.get_feature_type(0, 19), ice);
        assert_eq!(adapter.get_feature_type(4, 0), NO_FEATURE, "next to land");
        assert_eq!(adapter.get_feature_type(0, 10), NO_FEATURE, "equatorial");
    }

    #[test]
    fn water_families_skip_navigable_rivers() {
        let d = dims(10, 20);
        let mut adapter = GridAdapter::new(d);
        adapter.treat_navigable_rivers_as_water(true);
        adapter.set_terrain(3, 10, TERRAIN_NAVIGABLE_RIVER);
        adapter.set_terrain(3, 0, TERRAIN_NAVIGABLE_RIVER);
        assert!(adapter.is_water(3, 10));

        let mut config = only(
            FeatureGroups::AQUATIC | FeatureGroups::ICE,
            FeatureChances {
                lotus: 100.0,
                ice: 100.0,
                ..zero_chances()
            },
        );
        config.ice.forbid_adjacent_to_land = false;
        let classification = BiomeClassification::filled(d, TileClimate::default());
        place_features(&mut adapter, &classification, &config, &mut LabelRng::new(4)).unwrap();

        let lotus = adapter.get_feature_type_index("FEATURE_LOTUS");
        let ice = adapter.get_feature_type_index("FEATURE_ICE");
        assert_eq!(adapter.get_feature_type(2, 10), lotus);
        assert_eq!(adapter.get_feature_type(3, 10), NO_FEATURE);
        assert_eq!(adapter.get_feature_type(2, 0), ice);
        assert_eq!(adapter.get_feature_type(3, 0), NO_FEATURE);
    }

    #[test]
    fn wetlands_split_on_cold_and_river_proximity() {
        let d = dims(12, 6);
        let mut adapter = GridAdapter::new(d);
        for (x, y) in d.tiles() {
            adapter.set_land(x, y);
        }
        adapter.set_river(2, 2, true);
        adapter.set_river(9, 2, true);

        let mut classification = BiomeClassification::filled(d, TileClimate::default());
        let cold = TileClimate {
            symbol: BiomeSymbol::Tundra,
            temperature: 8.0,
            ..TileClimate::default()
        };
        for (x, y) in d.tiles() {
            if x >= 6 {
                classification.set_tile(d.index(x, y), cold);
            }
        }

        let config = only(
            FeatureGroups::WET,
            FeatureChances {
                marsh: 100.0,
                tundra_bog: 100.0,
                ..zero_chances()
            },
        );
        place_features(&mut adapter, &classification, &config, &mut LabelRng::new(5)).unwrap();

        let marsh = adapter.get_feature_type_index("FEATURE_MARSH");
        let bog = adapter.get_feature_type_index("FEATURE_TUNDRA_BOG");
        assert_eq!(adapter.get_feature_type(2, 2), marsh);
        assert_eq!(adapter.get_feature_type(4, 4), marsh);
        assert_eq!(adapter.get_feature_type(9, 3), bog);
        assert_eq!(adapter.get_feature_type(5, 2), NO_FEATURE, "three tiles from river");
    }

    #[test]
    fn oasis_avoids_coast_rivers_and_neighbours() {
        let d = dims(12, 8);
        let mut adapter = GridAdapter::new(d);
        for y in 1..7 {
            for x in 0..12 {
                adapter.set_land(x, y);
            }
        }
        adapter.set_river(9, 4, true);
        let classification = BiomeClassification::filled(
            d,
            TileClimate {
                symbol: BiomeSymbol::Desert,
                ..TileClimate::default()
            },
        );
        let config = only(
            FeatureGroups::WET,
            FeatureChances {
                oasis: 100.0,
                ..zero_chances()
            },
        );
        let report =
            place_features(&mut adapter, &classification, &config, &mut LabelRng::new(11)).unwrap();

        let oasis = adapter.get_feature_type_index("FEATURE_OASIS");
        assert!(report.placed(FeatureKey::Oasis) > 0);
        for (x, y) in d.tiles() {
            if adapter.get_feature_type(x, y) != oasis {
                continue;
            }
            assert!((2..=5).contains(&y), "coastal oasis at ({x}, {y})");
            assert!(!adapter.is_adjacent_to_rivers(x, y, 1));
            for (nx, ny) in d.neighborhood(x, y, 1) {
                assert_ne!(adapter.get_feature_type(nx, ny), oasis, "clustered oasis");
            }
        }
    }

    #[test]
    fn mangroves_need_warm_coast() {
        let d = dims(8, 8);
        let mut adapter = GridAdapter::new(d);
        for y in 2..6 {
            for x in 2..6 {
                adapter.set_land(x, y);
            }
        }
        let mut classification = BiomeClassification::filled(
            d,
            TileClimate {
                temperature: 25.0,
                ..TileClimate::default()
            },
        );
        classification.set_tile(
            d.index(2, 5),
            TileClimate {
                temperature: 10.0,
                ..TileClimate::default()
            },
        );
        let config = only(
            FeatureGroups::WET,
            FeatureChances {
                mangrove: 100.0,
                ..zero_chances()
            },
        );
        place_features(&mut adapter, &classification, &config, &mut LabelRng::new(2)).unwrap();

        let mangrove = adapter.get_feature_type_index("FEATURE_MANGROVE");
        assert_eq!(adapter.get_feature_type(2, 2), mangrove);
        assert_eq!(adapter.get_feature_type(3, 3), NO_FEATURE, "inland");
        assert_eq!(adapter.get_feature_type(2, 5), NO_FEATURE, "too cold");
    }

    #[test]
    fn commit_revalidates_and_records_failures() {
        let d = dims(4, 4);
        let mut adapter = GridAdapter::new(d);
        for (x, y) in d.tiles() {
            adapter.set_land(x, y);
        }
        let forest = adapter.get_feature_type_index("FEATURE_FOREST");
        adapter.block_feature(1, 1, forest);

        let classification = BiomeClassification::filled(
            d,
            TileClimate {
                vegetation: 1.0,
                ..TileClimate::default()
            },
        );
        let config = only(
            FeatureGroups::VEGETATED,
            FeatureChances {
                forest: 100.0,
                ..zero_chances()
            },
        );
        let report =
            place_features(&mut adapter, &classification, &config, &mut LabelRng::new(4)).unwrap();
        assert_eq!(report.placed(FeatureKey::Forest), 15);
        assert_eq!(adapter.get_feature_type(1, 1), NO_FEATURE);

        let mut failing = GridAdapter::new(d);
        for (x, y) in d.tiles() {
            failing.set_land(x, y);
        }
        failing.fail_on(AdapterOp::SetFeature);
        let report =
            place_features(&mut failing, &classification, &config, &mut LabelRng::new(4)).unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(report.failures.len(), 16);
        assert_eq!(report.failures[0].name, "FEATURE_FOREST");
    }

    #[test]
    fn mismatched_classification_is_rejected() {
        let mut adapter = GridAdapter::new(dims(4, 4));
        let classification = BiomeClassification::filled(dims(5, 4), TileClimate::default());
        let err = place_features(
            &mut adapter,
            &classification,
            &FeaturesConfig::default(),
            &mut LabelRng::new(0),
        )
        .unwrap_err();
        assert!(matches!(err, FeatureError::DimensionMismatch { .. }));
    }
}
