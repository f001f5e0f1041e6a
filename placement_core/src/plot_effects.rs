//! Permanent plot effects: snow tiers from a climate score, sand and burned
//! ground from flat chances.

use serde::Serialize;

use crate::adapter::{EngineAdapter, NO_PLOT_EFFECT, TERRAIN_NAVIGABLE_RIVER};
use crate::biome::{BiomeClassification, TileClimate};
use crate::features::{clamp01, clamp_chance, FeatureError, PlacementFailure};
use crate::placement_config::{DryEffectRule, ElevationStrategy, PlotEffectsConfig, SnowConfig};
use crate::rng::LabelRng;

pub const PLOT_EFFECT_SNOW_LIGHT: &str = "PLOTEFFECT_SNOW_LIGHT_PERMANENT";
pub const PLOT_EFFECT_SNOW_MEDIUM: &str = "PLOTEFFECT_SNOW_MEDIUM_PERMANENT";
pub const PLOT_EFFECT_SNOW_HEAVY: &str = "PLOTEFFECT_SNOW_HEAVY_PERMANENT";
pub const PLOT_EFFECT_SAND: &str = "PLOTEFFECT_SAND";
pub const PLOT_EFFECT_BURNED: &str = "PLOTEFFECT_BURNED";

pub const PLOT_EFFECT_NAMES: [&str; 5] = [
    PLOT_EFFECT_SNOW_LIGHT,
    PLOT_EFFECT_SNOW_MEDIUM,
    PLOT_EFFECT_SNOW_HEAVY,
    PLOT_EFFECT_SAND,
    PLOT_EFFECT_BURNED,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnowTier {
    Light,
    Medium,
    Heavy,
}

impl SnowTier {
    pub fn engine_name(self) -> &'static str {
        match self {
            SnowTier::Light => PLOT_EFFECT_SNOW_LIGHT,
            SnowTier::Medium => PLOT_EFFECT_SNOW_MEDIUM,
            SnowTier::Heavy => PLOT_EFFECT_SNOW_HEAVY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlotEffectReport {
    pub snow_light: u32,
    pub snow_medium: u32,
    pub snow_heavy: u32,
    pub sand: u32,
    pub burned: u32,
    pub failures: Vec<PlacementFailure>,
}

impl PlotEffectReport {
    pub fn snow_tiles(&self) -> u32 {
        self.snow_light + self.snow_medium + self.snow_heavy
    }
}

/// Linear ramp of `value` between `min` and `max`, clamped to `[0, 1]`.
pub fn ramp(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return if value >= max { 1.0 } else { 0.0 };
    }
    clamp01((value - min) / (max - min))
}

pub fn snow_score(config: &SnowConfig, freeze: f64, elevation: f64, moisture: f64) -> f64 {
    let weighted = freeze * config.freeze_weight
        + elevation * config.elevation_weight
        + moisture * config.moisture_weight;
    let normalization = if config.score_normalization > 0.0 {
        config.score_normalization
    } else {
        1.0
    };
    clamp01(weighted / normalization + config.score_bias)
}

pub fn snow_tier(config: &SnowConfig, score: f64) -> Option<SnowTier> {
    if score >= config.heavy_threshold {
        Some(SnowTier::Heavy)
    } else if score >= config.medium_threshold {
        Some(SnowTier::Medium)
    } else if score >= config.light_threshold {
        Some(SnowTier::Light)
    } else {
        None
    }
}

/// Value at fraction `p` of an ascending slice.
fn percentile(sorted: &[i32], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (clamp01(p) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)] as f64
}

fn elevation_bounds(
    config: &SnowConfig,
    adapter: &dyn EngineAdapter,
    classification: &BiomeClassification,
) -> (f64, f64) {
    match config.elevation_strategy {
        ElevationStrategy::Absolute => (config.elevation_min, config.elevation_max),
        ElevationStrategy::Percentile => {
            let dims = adapter.dims();
            let mut land: Vec<i32> = dims
                .tiles()
                .filter(|&(x, y)| !adapter.is_water(x, y))
                .map(|(x, y)| classification.elevation[dims.index(x, y)])
                .collect();
            land.sort_unstable();
            (
                percentile(&land, config.elevation_percentile_min),
                percentile(&land, config.elevation_percentile_max),
            )
        }
    }
}

fn dry_rule_allows(rule: &DryEffectRule, climate: &TileClimate) -> bool {
    rule.allowed_biomes.contains(&climate.symbol)
        && climate.aridity >= rule.min_aridity
        && climate.temperature >= rule.min_temperature
        && climate.freeze <= rule.max_freeze
        && climate.vegetation <= rule.max_vegetation
        && climate.moisture <= rule.max_moisture
}

#[derive(Clone, Copy)]
enum Placed {
    Snow(SnowTier),
    Sand,
    Burned,
}

/// Apply snow, sand and burned plot effects to eligible land.
pub fn place_plot_effects(
    adapter: &mut dyn EngineAdapter,
    classification: &BiomeClassification,
    config: &PlotEffectsConfig,
    rng: &mut LabelRng,
) -> Result<PlotEffectReport, FeatureError> {
    classification.validate()?;
    let dims = adapter.dims();
    if classification.dims() != dims {
        return Err(FeatureError::DimensionMismatch {
            classification: classification.dims(),
            map: dims,
        });
    }

    let navigable_river = adapter.get_terrain_type_index(TERRAIN_NAVIGABLE_RIVER);
    let mut report = PlotEffectReport::default();

    let snow = &config.snow;
    let coverage = clamp_chance(snow.coverage_chance);
    let (elevation_min, elevation_max) = elevation_bounds(snow, adapter, classification);
    let sand = config.sand.rule();
    let burned = config.burned.rule();
    let sand_chance = if sand.enabled { clamp_chance(sand.chance) } else { 0 };
    let burned_chance = if burned.enabled {
        clamp_chance(burned.chance)
    } else {
        0
    };

    for (x, y) in dims.tiles() {
        if adapter.is_water(x, y)
            || adapter.get_plot_effect(x, y) != NO_PLOT_EFFECT
            || (navigable_river >= 0 && adapter.get_terrain_type(x, y) == navigable_river)
        {
            continue;
        }
        let Some(climate) = classification.tile(dims.index(x, y)) else {
            continue;
        };

        let mut choice = None;
        if snow.enabled
            && coverage > 0
            && climate.temperature <= snow.max_temperature
            && climate.aridity <= snow.max_aridity
        {
            let score = snow_score(
                snow,
                climate.freeze as f64,
                ramp(climate.elevation as f64, elevation_min, elevation_max),
                ramp(climate.moisture as f64, snow.moisture_min, snow.moisture_max),
            );
            if let Some(tier) = snow_tier(snow, score) {
                if rng.roll_percent("plot-effects:snow", coverage) {
                    choice = Some(Placed::Snow(tier));
                }
            }
        }
        if choice.is_none()
            && sand_chance > 0
            && dry_rule_allows(&sand, &climate)
            && rng.roll_percent("plot-effects:sand", sand_chance)
        {
            choice = Some(Placed::Sand);
        }
        if choice.is_none()
            && burned_chance > 0
            && dry_rule_allows(&burned, &climate)
            && rng.roll_percent("plot-effects:burned", burned_chance)
        {
            choice = Some(Placed::Burned);
        }
        let Some(choice) = choice else {
            continue;
        };

        let name = match choice {
            Placed::Snow(tier) => tier.engine_name(),
            Placed::Sand => PLOT_EFFECT_SAND,
            Placed::Burned => PLOT_EFFECT_BURNED,
        };
        let effect = adapter.get_plot_effect_index(name);
        if effect < 0
            || adapter.get_plot_effect(x, y) != NO_PLOT_EFFECT
            || !adapter.can_have_plot_effect(x, y, effect)
        {
            continue;
        }
        match adapter.set_plot_effect(x, y, effect) {
            Ok(()) => match choice {
                Placed::Snow(SnowTier::Light) => report.snow_light += 1,
                Placed::Snow(SnowTier::Medium) => report.snow_medium += 1,
                Placed::Snow(SnowTier::Heavy) => report.snow_heavy += 1,
                Placed::Sand => report.sand += 1,
                Placed::Burned => report.burned += 1,
            },
            Err(err) => {
                tracing::warn!(
                    target: "placement::features",
                    effect = name,
                    x,
                    y,
                    error = %err,
                    "plot_effects.place_failed"
                );
                report.failures.push(PlacementFailure {
                    name: name.to_string(),
                    x,
                    y,
                    message: err.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        target: "placement::features",
        snow = report.snow_tiles(),
        sand = report.sand,
        burned = report.burned,
        "plot_effects.placed"
    );
    Ok(report)
}
