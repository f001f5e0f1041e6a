use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::biome::BiomeSymbol;
use crate::features::{FeatureGroups, FeatureKey};

pub const BUILTIN_PLACEMENT_CONFIG: &str = include_str!("data/placement_config.json");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub features: FeaturesConfig,
    pub plot_effects: PlotEffectsConfig,
    pub floodplains: FloodplainsConfig,
    pub wonders: WondersConfig,
}

impl PlacementConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_PLACEMENT_CONFIG)
                .expect("builtin placement config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, PlacementConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| PlacementConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let config = PlacementConfig::from_json_str(&contents)?;
        Ok(config)
    }
}

#[derive(Debug, Error)]
pub enum PlacementConfigError {
    #[error("failed to parse placement config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read placement config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

const fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureGroupsConfig {
    pub vegetated: GroupConfig,
    pub wet: GroupConfig,
    pub aquatic: GroupConfig,
    pub ice: GroupConfig,
}

impl FeatureGroupsConfig {
    /// Groups whose multiplier leaves any chance of placement.
    pub fn enabled(&self) -> FeatureGroups {
        let mut groups = FeatureGroups::empty();
        for (flag, group) in [
            (FeatureGroups::VEGETATED, self.vegetated),
            (FeatureGroups::WET, self.wet),
            (FeatureGroups::AQUATIC, self.aquatic),
            (FeatureGroups::ICE, self.ice),
        ] {
            if group.multiplier > 0.0 {
                groups.insert(flag);
            }
        }
        groups
    }
}

/// Base placement chance per feature, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureChances {
    pub forest: f64,
    pub rainforest: f64,
    pub taiga: f64,
    pub savanna_woodland: f64,
    pub sagebrush_steppe: f64,
    pub marsh: f64,
    pub tundra_bog: f64,
    pub mangrove: f64,
    pub oasis: f64,
    pub watering_hole: f64,
    pub reef: f64,
    pub cold_reef: f64,
    pub atoll: f64,
    pub lotus: f64,
    pub ice: f64,
}

impl FeatureChances {
    pub fn get(&self, key: FeatureKey) -> f64 {
        match key {
            FeatureKey::Forest => self.forest,
            FeatureKey::Rainforest => self.rainforest,
            FeatureKey::Taiga => self.taiga,
            FeatureKey::SavannaWoodland => self.savanna_woodland,
            FeatureKey::SagebrushSteppe => self.sagebrush_steppe,
            FeatureKey::Marsh => self.marsh,
            FeatureKey::TundraBog => self.tundra_bog,
            FeatureKey::Mangrove => self.mangrove,
            FeatureKey::Oasis => self.oasis,
            FeatureKey::WateringHole => self.watering_hole,
            FeatureKey::Reef => self.reef,
            FeatureKey::ColdReef => self.cold_reef,
            FeatureKey::Atoll => self.atoll,
            FeatureKey::Lotus => self.lotus,
            FeatureKey::Ice => self.ice,
        }
    }
}

impl Default for FeatureChances {
    fn default() -> Self {
        Self {
            forest: 50.0,
            rainforest: 65.0,
            taiga: 50.0,
            savanna_woodland: 30.0,
            sagebrush_steppe: 30.0,
            marsh: 30.0,
            tundra_bog: 30.0,
            mangrove: 30.0,
            oasis: 50.0,
            watering_hole: 30.0,
            reef: 30.0,
            cold_reef: 30.0,
            atoll: 12.0,
            lotus: 15.0,
            ice: 90.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetatedRules {
    pub min_vegetation: f32,
    pub vegetation_chance_scalar: f64,
    pub desert_sagebrush_min_vegetation: f32,
    pub tundra_taiga_min_vegetation: f32,
    pub tundra_taiga_min_temperature: f32,
    pub temperate_dry_forest_moisture: f32,
    pub temperate_dry_forest_vegetation: f32,
    pub tropical_seasonal_rainforest_moisture: f32,
}

impl Default for VegetatedRules {
    fn default() -> Self {
        Self {
            min_vegetation: 0.05,
            vegetation_chance_scalar: 1.0,
            desert_sagebrush_min_vegetation: 0.2,
            tundra_taiga_min_vegetation: 0.25,
            tundra_taiga_min_temperature: -2.0,
            temperate_dry_forest_moisture: 120.0,
            temperate_dry_forest_vegetation: 0.45,
            tropical_seasonal_rainforest_moisture: 140.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WetRules {
    pub near_river_radius: u32,
    pub cold_temperature_max: f32,
    pub cold_biome_symbols: Vec<BiomeSymbol>,
    pub mangrove_warm_temperature_min: f32,
    pub mangrove_warm_biome_symbols: Vec<BiomeSymbol>,
    pub coastal_adjacency_radius: u32,
    pub isolated_river_radius: u32,
    pub isolated_spacing_radius: u32,
    pub oasis_biome_symbols: Vec<BiomeSymbol>,
}

impl Default for WetRules {
    fn default() -> Self {
        Self {
            near_river_radius: 2,
            cold_temperature_max: 2.0,
            cold_biome_symbols: vec![BiomeSymbol::Snow, BiomeSymbol::Tundra, BiomeSymbol::Boreal],
            mangrove_warm_temperature_min: 18.0,
            mangrove_warm_biome_symbols: vec![
                BiomeSymbol::TropicalRainforest,
                BiomeSymbol::TropicalSeasonal,
            ],
            coastal_adjacency_radius: 1,
            isolated_river_radius: 1,
            isolated_spacing_radius: 1,
            oasis_biome_symbols: vec![BiomeSymbol::Desert, BiomeSymbol::TemperateDry],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtollRules {
    pub enable_clustering: bool,
    pub cluster_radius: u32,
    pub equatorial_band_max_abs_latitude: f64,
    pub shallow_water_adjacency_gate_chance: u32,
    pub shallow_water_adjacency_radius: u32,
    pub growth_chance_equatorial: f64,
    pub growth_chance_non_equatorial: f64,
}

impl Default for AtollRules {
    fn default() -> Self {
        Self {
            enable_clustering: true,
            cluster_radius: 1,
            equatorial_band_max_abs_latitude: 23.0,
            shallow_water_adjacency_gate_chance: 30,
            shallow_water_adjacency_radius: 1,
            growth_chance_equatorial: 15.0,
            growth_chance_non_equatorial: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AquaticRules {
    pub reef_latitude_split: f64,
    pub atoll: AtollRules,
}

impl Default for AquaticRules {
    fn default() -> Self {
        Self {
            reef_latitude_split: 55.0,
            atoll: AtollRules::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IceRules {
    pub min_abs_latitude: f64,
    pub forbid_adjacent_to_land: bool,
    pub land_adjacency_radius: u32,
    pub forbid_adjacent_to_natural_wonders: bool,
    pub natural_wonder_adjacency_radius: u32,
}

impl Default for IceRules {
    fn default() -> Self {
        Self {
            min_abs_latitude: 78.0,
            forbid_adjacent_to_land: true,
            land_adjacency_radius: 1,
            forbid_adjacent_to_natural_wonders: true,
            natural_wonder_adjacency_radius: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub groups: FeatureGroupsConfig,
    pub chances: FeatureChances,
    pub vegetated: VegetatedRules,
    pub wet: WetRules,
    pub aquatic: AquaticRules,
    pub ice: IceRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationStrategy {
    Absolute,
    Percentile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowConfig {
    pub enabled: bool,
    pub coverage_chance: f64,
    pub freeze_weight: f64,
    pub elevation_weight: f64,
    pub moisture_weight: f64,
    pub score_normalization: f64,
    pub score_bias: f64,
    pub light_threshold: f64,
    pub medium_threshold: f64,
    pub heavy_threshold: f64,
    pub elevation_strategy: ElevationStrategy,
    pub elevation_min: f64,
    pub elevation_max: f64,
    pub elevation_percentile_min: f64,
    pub elevation_percentile_max: f64,
    pub moisture_min: f64,
    pub moisture_max: f64,
    pub max_temperature: f32,
    pub max_aridity: f32,
}

impl Default for SnowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            coverage_chance: 80.0,
            freeze_weight: 1.0,
            elevation_weight: 1.0,
            moisture_weight: 1.0,
            score_normalization: 3.0,
            score_bias: 0.0,
            light_threshold: 0.35,
            medium_threshold: 0.6,
            heavy_threshold: 0.8,
            elevation_strategy: ElevationStrategy::Absolute,
            elevation_min: 200.0,
            elevation_max: 2400.0,
            elevation_percentile_min: 0.7,
            elevation_percentile_max: 0.98,
            moisture_min: 40.0,
            moisture_max: 160.0,
            max_temperature: 4.0,
            max_aridity: 0.9,
        }
    }
}

/// Thresholds shared by the dry-land plot effects.
#[derive(Debug, Clone, PartialEq)]
pub struct DryEffectRule {
    pub enabled: bool,
    pub chance: f64,
    pub min_aridity: f32,
    pub min_temperature: f32,
    pub max_freeze: f32,
    pub max_vegetation: f32,
    pub max_moisture: f32,
    pub allowed_biomes: Vec<BiomeSymbol>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandConfig {
    pub enabled: bool,
    pub chance: f64,
    pub min_aridity: f32,
    pub min_temperature: f32,
    pub max_freeze: f32,
    pub max_vegetation: f32,
    pub max_moisture: f32,
    pub allowed_biomes: Vec<BiomeSymbol>,
}

impl SandConfig {
    pub fn rule(&self) -> DryEffectRule {
        DryEffectRule {
            enabled: self.enabled,
            chance: self.chance,
            min_aridity: self.min_aridity,
            min_temperature: self.min_temperature,
            max_freeze: self.max_freeze,
            max_vegetation: self.max_vegetation,
            max_moisture: self.max_moisture,
            allowed_biomes: self.allowed_biomes.clone(),
        }
    }
}

impl Default for SandConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chance: 18.0,
            min_aridity: 0.55,
            min_temperature: 18.0,
            max_freeze: 0.25,
            max_vegetation: 0.2,
            max_moisture: 90.0,
            allowed_biomes: vec![BiomeSymbol::Desert, BiomeSymbol::TemperateDry],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnedConfig {
    pub enabled: bool,
    pub chance: f64,
    pub min_aridity: f32,
    pub min_temperature: f32,
    pub max_freeze: f32,
    pub max_vegetation: f32,
    pub max_moisture: f32,
    pub allowed_biomes: Vec<BiomeSymbol>,
}

impl BurnedConfig {
    pub fn rule(&self) -> DryEffectRule {
        DryEffectRule {
            enabled: self.enabled,
            chance: self.chance,
            min_aridity: self.min_aridity,
            min_temperature: self.min_temperature,
            max_freeze: self.max_freeze,
            max_vegetation: self.max_vegetation,
            max_moisture: self.max_moisture,
            allowed_biomes: self.allowed_biomes.clone(),
        }
    }
}

impl Default for BurnedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chance: 8.0,
            min_aridity: 0.45,
            min_temperature: 20.0,
            max_freeze: 0.2,
            max_vegetation: 0.35,
            max_moisture: 110.0,
            allowed_biomes: vec![BiomeSymbol::TemperateDry, BiomeSymbol::TropicalSeasonal],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotEffectsConfig {
    pub snow: SnowConfig,
    pub sand: SandConfig,
    pub burned: BurnedConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodplainsConfig {
    pub min_length: u32,
    pub max_length: u32,
}

impl Default for FloodplainsConfig {
    fn default() -> Self {
        Self {
            min_length: 4,
            max_length: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WondersConfig {
    /// Place one wonder beyond the map size's nominal count.
    pub plus_one: bool,
}

impl Default for WondersConfig {
    fn default() -> Self {
        Self { plus_one: true }
    }
}

impl WondersConfig {
    pub fn wonder_count(&self, nominal: u32) -> u32 {
        if self.plus_one {
            nominal.saturating_add(1)
        } else {
            nominal
        }
    }
}

/// Metadata about where the placement configuration came from.
#[derive(Debug, Clone, Default)]
pub struct PlacementConfigMetadata {
    path: Option<PathBuf>,
}

impl PlacementConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Load placement configuration from `PLACEMENT_CONFIG_PATH`, falling back to
/// the builtin defaults.
pub fn load_placement_config_from_env() -> (Arc<PlacementConfig>, PlacementConfigMetadata) {
    if let Some(path) = env::var("PLACEMENT_CONFIG_PATH").ok().map(PathBuf::from) {
        match PlacementConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "placement::config",
                    path = %path.display(),
                    "placement_config.loaded=file"
                );
                return (Arc::new(config), PlacementConfigMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "placement::config",
                    path = %path.display(),
                    error = %err,
                    "placement_config.load_failed"
                );
            }
        }
    }

    let config = PlacementConfig::builtin();
    tracing::info!(
        target: "placement::config",
        "placement_config.loaded=builtin"
    );
    (config, PlacementConfigMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_defaults() {
        let builtin = PlacementConfig::builtin();
        assert_eq!(*builtin, PlacementConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = PlacementConfig::from_json_str(
            r#"{
                "features": {
                    "groups": { "aquatic": { "multiplier": 0.0 } },
                    "chances": { "atoll": 40 },
                    "aquatic": { "atoll": { "cluster_radius": 2 } }
                },
                "plot_effects": { "burned": { "enabled": true } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.features.chances.atoll, 40.0);
        assert_eq!(config.features.chances.forest, 50.0);
        assert_eq!(config.features.aquatic.atoll.cluster_radius, 2);
        assert_eq!(config.features.aquatic.atoll.growth_chance_equatorial, 15.0);
        assert_eq!(config.features.aquatic.reef_latitude_split, 55.0);
        assert!(!config
            .features
            .groups
            .enabled()
            .contains(FeatureGroups::AQUATIC));
        assert!(config.plot_effects.burned.enabled);
        assert_eq!(config.plot_effects.burned.chance, 8.0);
        assert!(!config.plot_effects.sand.enabled);
    }

    #[test]
    fn wonder_count_adds_one_when_configured() {
        assert_eq!(WondersConfig::default().wonder_count(4), 5);
        assert_eq!(WondersConfig { plus_one: false }.wonder_count(4), 4);
    }

    #[test]
    fn missing_file_reports_read_failure() {
        let err = PlacementConfig::from_file(Path::new("/nonexistent/placement.json")).unwrap_err();
        assert!(matches!(err, PlacementConfigError::ReadFailed { .. }));
    }
}
