//! Placement orchestration.
//!
//! Runs the engine-backed placement stages in a fixed order. Every stage
//! except start assignment is best-effort: an adapter error is recorded on the
//! stage and the run continues. A start assignment error aborts the run.
//!
//! [`run_placement_step`] wraps the orchestrator in dependency-tag gating for
//! callers that drive generation through a [`MapContext`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::EngineAdapter;
use crate::base_tags;
use crate::biome::BiomeClassification;
use crate::context::MapContext;
use crate::features::{place_features, FeatureError, FeatureReport};
use crate::grid::{GridDims, GridError};
use crate::placement_config::{FeaturesConfig, PlacementConfig};
use crate::plot_effects::{place_plot_effects, PlotEffectReport};
use crate::region::{compute_regions, stamp_regions, LandmassSnapshot, RegionProjection};
use crate::rng::LabelRng;
use crate::starts::{assign_starts, OccupancyMask, StartError, StartRequest};
use crate::tags::{SatisfactionState, TagError, TagRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStage {
    NaturalWonders,
    Floodplains,
    PlotEffects,
    ValidateTerrain,
    RecalculateAreas,
    StoreWaterData,
    ProjectRegions,
    GenerateResources,
    AssignStarts,
    GenerateDiscoveries,
    RecalculateFertility,
    AdvancedStartRegions,
}

impl PlacementStage {
    pub const ORDER: [PlacementStage; 12] = [
        PlacementStage::NaturalWonders,
        PlacementStage::Floodplains,
        PlacementStage::PlotEffects,
        PlacementStage::ValidateTerrain,
        PlacementStage::RecalculateAreas,
        PlacementStage::StoreWaterData,
        PlacementStage::ProjectRegions,
        PlacementStage::GenerateResources,
        PlacementStage::AssignStarts,
        PlacementStage::GenerateDiscoveries,
        PlacementStage::RecalculateFertility,
        PlacementStage::AdvancedStartRegions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlacementStage::NaturalWonders => "natural_wonders",
            PlacementStage::Floodplains => "floodplains",
            PlacementStage::PlotEffects => "plot_effects",
            PlacementStage::ValidateTerrain => "validate_terrain",
            PlacementStage::RecalculateAreas => "recalculate_areas",
            PlacementStage::StoreWaterData => "store_water_data",
            PlacementStage::ProjectRegions => "project_regions",
            PlacementStage::GenerateResources => "generate_resources",
            PlacementStage::AssignStarts => "assign_starts",
            PlacementStage::GenerateDiscoveries => "generate_discoveries",
            PlacementStage::RecalculateFertility => "recalculate_fertility",
            PlacementStage::AdvancedStartRegions => "advanced_start_regions",
        }
    }
}

impl fmt::Display for PlacementStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded,
    Skipped { reason: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: PlacementStage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

/// Per-run placement inputs, published as an artifact before placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementInputs {
    /// Nominal wonder count for the map size.
    pub natural_wonders: u32,
    pub starts: StartRequest,
}

impl PlacementInputs {
    pub fn total_players(&self) -> u32 {
        self.starts.total_players()
    }
}

/// Summary counts published once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementOutputs {
    pub natural_wonders_placed: u32,
    pub floodplains: u32,
    pub snow_tiles: u32,
    pub resources: u32,
    pub starts_assigned: u32,
    pub discoveries: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct PlacementRequest<'a> {
    pub inputs: &'a PlacementInputs,
    pub landmasses: &'a LandmassSnapshot,
    pub classification: Option<&'a BiomeClassification>,
    pub config: &'a PlacementConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementReport {
    pub stages: Vec<StageRecord>,
    pub outputs: PlacementOutputs,
    /// Tile index per player, West players first.
    pub start_positions: Vec<i32>,
    pub plot_effects: Option<PlotEffectReport>,
    pub regions: RegionProjection,
}

impl PlacementReport {
    pub fn outcome(&self, stage: PlacementStage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|record| record.stage == stage)
            .map(|record| &record.outcome)
    }

    pub fn failed_stages(&self) -> Vec<PlacementStage> {
        self.stages
            .iter()
            .filter(|record| matches!(record.outcome, StageOutcome::Failed { .. }))
            .map(|record| record.stage)
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("landmass snapshot is invalid: {0}")]
    Landmasses(#[source] GridError),
    #[error("landmass snapshot covers {snapshot:?} but the map is {map:?}")]
    DimensionMismatch { snapshot: GridDims, map: GridDims },
    #[error("feature placement failed: {0}")]
    Features(#[from] FeatureError),
    #[error("start assignment failed: {0}")]
    Starts(#[from] StartError),
    #[error("placement requirements not satisfied: {}", .0.join(", "))]
    MissingRequirements(Vec<String>),
    #[error("engine did not confirm effect {0}")]
    EffectNotVerified(String),
    #[error(transparent)]
    Tag(#[from] TagError),
}

struct StageLog {
    records: Vec<StageRecord>,
}

impl StageLog {
    fn new() -> Self {
        Self {
            records: Vec::with_capacity(PlacementStage::ORDER.len()),
        }
    }

    fn succeeded(&mut self, stage: PlacementStage) {
        tracing::debug!(
            target: "placement::orchestrator",
            stage = stage.as_str(),
            "orchestrator.stage_succeeded"
        );
        self.records.push(StageRecord {
            stage,
            outcome: StageOutcome::Succeeded,
        });
    }

    fn skipped(&mut self, stage: PlacementStage, reason: &str) {
        tracing::debug!(
            target: "placement::orchestrator",
            stage = stage.as_str(),
            reason,
            "orchestrator.stage_skipped"
        );
        self.records.push(StageRecord {
            stage,
            outcome: StageOutcome::Skipped {
                reason: reason.to_string(),
            },
        });
    }

    fn failed(&mut self, stage: PlacementStage, message: String) {
        tracing::warn!(
            target: "placement::orchestrator",
            stage = stage.as_str(),
            error = %message,
            "orchestrator.stage_failed"
        );
        self.records.push(StageRecord {
            stage,
            outcome: StageOutcome::Failed { message },
        });
    }

    /// Record a best-effort stage, yielding its value or the default on failure.
    fn best_effort<T: Default, E: fmt::Display>(
        &mut self,
        stage: PlacementStage,
        result: Result<T, E>,
    ) -> T {
        match result {
            Ok(value) => {
                self.succeeded(stage);
                value
            }
            Err(err) => {
                self.failed(stage, err.to_string());
                T::default()
            }
        }
    }
}

/// Run every placement stage against the adapter.
pub fn run_placement(
    adapter: &mut dyn EngineAdapter,
    request: &PlacementRequest<'_>,
    rng: &mut LabelRng,
) -> Result<PlacementReport, PlacementError> {
    let dims = adapter.dims();
    // The projection is pure, so a bad snapshot is rejected before any engine write.
    let regions = compute_regions(request.landmasses).map_err(PlacementError::Landmasses)?;
    if regions.dims() != dims {
        return Err(PlacementError::DimensionMismatch {
            snapshot: regions.dims(),
            map: dims,
        });
    }

    let config = request.config;
    let inputs = request.inputs;
    let mut log = StageLog::new();
    let mut outputs = PlacementOutputs::default();

    let wonders = config.wonders.wonder_count(inputs.natural_wonders);
    outputs.natural_wonders_placed = log.best_effort(
        PlacementStage::NaturalWonders,
        adapter.add_natural_wonders(wonders),
    );
    outputs.floodplains = log.best_effort(
        PlacementStage::Floodplains,
        adapter.add_floodplains(
            config.floodplains.min_length,
            config.floodplains.max_length,
        ),
    );

    let plot_effects = match request.classification {
        Some(classification) => {
            let report = log.best_effort(
                PlacementStage::PlotEffects,
                place_plot_effects(adapter, classification, &config.plot_effects, rng).map(Some),
            );
            if let Some(report) = &report {
                outputs.snow_tiles = report.snow_tiles();
            }
            report
        }
        None => {
            log.skipped(PlacementStage::PlotEffects, "no biome classification");
            None
        }
    };

    log.best_effort(
        PlacementStage::ValidateTerrain,
        adapter.validate_and_fix_terrain(),
    );
    log.best_effort(PlacementStage::RecalculateAreas, adapter.recalculate_areas());
    log.best_effort(PlacementStage::StoreWaterData, adapter.store_water_data());
    log.best_effort(
        PlacementStage::ProjectRegions,
        stamp_regions(adapter, &regions),
    );
    outputs.resources = log.best_effort(
        PlacementStage::GenerateResources,
        adapter.generate_resources(),
    );

    let start_positions = if inputs.total_players() == 0 {
        log.skipped(PlacementStage::AssignStarts, "no players requested");
        Vec::new()
    } else {
        let mut occupancy = OccupancyMask::new(dims.len());
        let assignment = assign_starts(adapter, &regions, &inputs.starts, &mut occupancy)?;
        outputs.starts_assigned = assignment.assigned();
        log.succeeded(PlacementStage::AssignStarts);
        assignment.positions
    };

    outputs.discoveries = log.best_effort(
        PlacementStage::GenerateDiscoveries,
        adapter.generate_discoveries(&start_positions),
    );
    log.best_effort(
        PlacementStage::RecalculateFertility,
        adapter.recalculate_fertility(),
    );
    log.best_effort(
        PlacementStage::AdvancedStartRegions,
        adapter.assign_advanced_start_regions(),
    );

    tracing::info!(
        target: "placement::orchestrator",
        wonders = outputs.natural_wonders_placed,
        floodplains = outputs.floodplains,
        snow = outputs.snow_tiles,
        resources = outputs.resources,
        starts = outputs.starts_assigned,
        discoveries = outputs.discoveries,
        "orchestrator.completed"
    );

    Ok(PlacementReport {
        stages: log.records,
        outputs,
        start_positions,
        plot_effects,
        regions,
    })
}

/// Tags a placement step needs before it may run.
pub const PLACEMENT_REQUIRES: [&str; 3] = [
    base_tags::ARTIFACT_PLACEMENT_INPUTS,
    base_tags::ARTIFACT_LANDMASS_SNAPSHOT,
    base_tags::EFFECT_LANDMASSES_APPLIED,
];

/// Tags a feature step needs before it may run.
pub const FEATURES_REQUIRES: [&str; 1] = [base_tags::ARTIFACT_BIOME_CLASSIFICATION];

/// Gate, run and publish one placement step over a generation context.
///
/// On success the outputs artifact is stored and the placement-applied
/// effect is recorded, then confirmed against the engine.
pub fn run_placement_step<A: EngineAdapter>(
    ctx: &mut MapContext<A>,
    registry: &TagRegistry<MapContext<A>>,
    satisfied: &mut SatisfactionState,
    config: &PlacementConfig,
) -> Result<PlacementReport, PlacementError> {
    let missing = registry.missing(&PLACEMENT_REQUIRES, ctx, satisfied);
    if !missing.is_empty() {
        return Err(PlacementError::MissingRequirements(missing));
    }

    let inputs: PlacementInputs = ctx.artifacts.read(base_tags::ARTIFACT_PLACEMENT_INPUTS)?;
    let landmasses: LandmassSnapshot =
        ctx.artifacts.read(base_tags::ARTIFACT_LANDMASS_SNAPSHOT)?;
    let classification: Option<BiomeClassification> =
        if registry.is_satisfied(base_tags::ARTIFACT_BIOME_CLASSIFICATION, ctx, satisfied) {
            Some(ctx.artifacts.read(base_tags::ARTIFACT_BIOME_CLASSIFICATION)?)
        } else {
            None
        };

    let request = PlacementRequest {
        inputs: &inputs,
        landmasses: &landmasses,
        classification: classification.as_ref(),
        config,
    };
    let report = run_placement(&mut ctx.adapter, &request, &mut ctx.rng)?;

    ctx.artifacts
        .publish(base_tags::ARTIFACT_PLACEMENT_OUTPUTS, &report.outputs)?;
    satisfied.record(base_tags::ARTIFACT_PLACEMENT_OUTPUTS);
    if report.outcome(PlacementStage::PlotEffects) == Some(&StageOutcome::Succeeded)
        && report.outputs.snow_tiles > 0
    {
        satisfied.record(base_tags::EFFECT_PLOT_EFFECTS_APPLIED);
    }
    satisfied.record(base_tags::EFFECT_PLACEMENT_APPLIED);
    if !registry.is_satisfied(base_tags::EFFECT_PLACEMENT_APPLIED, ctx, satisfied) {
        return Err(PlacementError::EffectNotVerified(
            base_tags::EFFECT_PLACEMENT_APPLIED.to_string(),
        ));
    }
    Ok(report)
}

/// Gate and run feature placement over a generation context.
pub fn run_feature_step<A: EngineAdapter>(
    ctx: &mut MapContext<A>,
    registry: &TagRegistry<MapContext<A>>,
    satisfied: &mut SatisfactionState,
    config: &FeaturesConfig,
) -> Result<FeatureReport, PlacementError> {
    let missing = registry.missing(&FEATURES_REQUIRES, ctx, satisfied);
    if !missing.is_empty() {
        return Err(PlacementError::MissingRequirements(missing));
    }
    let classification: BiomeClassification =
        ctx.artifacts.read(base_tags::ARTIFACT_BIOME_CLASSIFICATION)?;
    let report = place_features(&mut ctx.adapter, &classification, config, &mut ctx.rng)?;
    if report.total() > 0 {
        satisfied.record(base_tags::EFFECT_FEATURES_APPLIED);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterOp;
    use crate::grid_adapter::GridAdapter;
    use crate::region::Landmass;

    /// Two 4x4 continents on a 20x8 map.
    fn two_continents() -> (GridAdapter, LandmassSnapshot) {
        let dims = GridDims::new(20, 8).unwrap();
        let mut adapter = GridAdapter::new(dims);
        let mut landmass_id = vec![-1; dims.len()];
        for (id, x0) in [(1, 2u32), (2, 12u32)] {
            for y in 2..6 {
                for x in x0..x0 + 4 {
                    adapter.set_land(x, y);
                    landmass_id[dims.index(x, y)] = id;
                }
            }
        }
        let snapshot = LandmassSnapshot {
            width: 20,
            height: 8,
            landmasses: vec![
                Landmass {
                    id: 1,
                    west: 2,
                    east: 5,
                },
                Landmass {
                    id: 2,
                    west: 12,
                    east: 15,
                },
            ],
            landmass_id,
        };
        (adapter, snapshot)
    }

    fn inputs(west: u32, east: u32) -> PlacementInputs {
        PlacementInputs {
            natural_wonders: 3,
            starts: StartRequest {
                players_west: west,
                players_east: east,
                sectors: None,
            },
        }
    }

    fn run(
        adapter: &mut GridAdapter,
        snapshot: &LandmassSnapshot,
        inputs: &PlacementInputs,
    ) -> Result<PlacementReport, PlacementError> {
        let config = PlacementConfig::default();
        let request = PlacementRequest {
            inputs,
            landmasses: snapshot,
            classification: None,
            config: &config,
        };
        run_placement(adapter, &request, &mut LabelRng::new(11))
    }

    #[test]
    fn stages_run_in_fixed_order() {
        let (mut adapter, snapshot) = two_continents();
        let report = run(&mut adapter, &snapshot, &inputs(1, 1)).unwrap();
        let order: Vec<&str> = report.stages.iter().map(|r| r.stage.as_str()).collect();
        insta::assert_debug_snapshot!(order, @r###"
        [
            "natural_wonders",
            "floodplains",
            "plot_effects",
            "validate_terrain",
            "recalculate_areas",
            "store_water_data",
            "project_regions",
            "generate_resources",
            "assign_starts",
            "generate_discoveries",
            "recalculate_fertility",
            "advanced_start_regions",
        ]
        "###);
        assert_eq!(
            report.outcome(PlacementStage::PlotEffects),
            Some(&StageOutcome::Skipped {
                reason: "no biome classification".into()
            })
        );
        assert_eq!(
            adapter.map_ops(),
            &[
                AdapterOp::AddNaturalWonders,
                AdapterOp::AddFloodplains,
                AdapterOp::ValidateAndFixTerrain,
                AdapterOp::RecalculateAreas,
                AdapterOp::StoreWaterData,
                AdapterOp::GenerateResources,
                AdapterOp::GenerateDiscoveries,
                AdapterOp::RecalculateFertility,
                AdapterOp::AssignAdvancedStartRegions,
            ]
        );
    }

    #[test]
    fn outputs_reflect_engine_counts() {
        let (mut adapter, snapshot) = two_continents();
        let report = run(&mut adapter, &snapshot, &inputs(2, 1)).unwrap();
        assert_eq!(report.outputs.natural_wonders_placed, 4);
        assert_eq!(report.outputs.starts_assigned, 3);
        assert_eq!(report.outputs.discoveries, 6);
        assert_eq!(report.outputs.resources, 32 / 6);
        assert_eq!(adapter.start_positions().len(), 3);
        assert!(report.failed_stages().is_empty());
    }

    #[test]
    fn best_effort_failures_are_recorded_and_run_continues() {
        let (mut adapter, snapshot) = two_continents();
        adapter.fail_on(AdapterOp::AddFloodplains);
        adapter.fail_on(AdapterOp::SetLandmassRegion);
        adapter.fail_on(AdapterOp::GenerateResources);
        let report = run(&mut adapter, &snapshot, &inputs(1, 1)).unwrap();
        assert_eq!(
            report.failed_stages(),
            vec![
                PlacementStage::Floodplains,
                PlacementStage::ProjectRegions,
                PlacementStage::GenerateResources,
            ]
        );
        assert_eq!(report.outputs.floodplains, 0);
        assert_eq!(report.outputs.resources, 0);
        // The in-memory projection still drives starts.
        assert_eq!(report.outputs.starts_assigned, 2);
        assert_eq!(report.stages.len(), PlacementStage::ORDER.len());
    }

    #[test]
    fn start_failure_aborts_the_run() {
        let (mut adapter, snapshot) = two_continents();
        adapter.fail_on(AdapterOp::SetStartPosition);
        let err = run(&mut adapter, &snapshot, &inputs(1, 1)).unwrap_err();
        assert!(matches!(err, PlacementError::Starts(StartError::Commit { .. })));
        assert!(!adapter
            .map_ops()
            .contains(&AdapterOp::GenerateDiscoveries));
    }

    #[test]
    fn unseated_players_abort_the_run() {
        let dims = GridDims::new(20, 8).unwrap();
        let mut adapter = GridAdapter::new(dims);
        let mut landmass_id = vec![-1; dims.len()];
        for x in [3, 4] {
            adapter.set_land(x, 3);
            landmass_id[dims.index(x, 3)] = 1;
        }
        let islet = LandmassSnapshot {
            width: 20,
            height: 8,
            landmasses: vec![Landmass {
                id: 1,
                west: 3,
                east: 4,
            }],
            landmass_id,
        };

        let err = run(&mut adapter, &islet, &inputs(3, 0)).unwrap_err();
        match err {
            PlacementError::Starts(StartError::Shortfall {
                assigned,
                requested,
                ..
            }) => assert_eq!((assigned, requested), (2, 3)),
            other => panic!("unexpected error {other}"),
        }
        assert!(!adapter
            .map_ops()
            .contains(&AdapterOp::GenerateDiscoveries));
        assert!(!adapter
            .map_ops()
            .contains(&AdapterOp::AssignAdvancedStartRegions));
    }

    #[test]
    fn zero_players_skip_start_assignment() {
        let (mut adapter, snapshot) = two_continents();
        let report = run(&mut adapter, &snapshot, &inputs(0, 0)).unwrap();
        assert!(matches!(
            report.outcome(PlacementStage::AssignStarts),
            Some(StageOutcome::Skipped { .. })
        ));
        assert!(report.start_positions.is_empty());
        assert_eq!(report.outputs.discoveries, 0);
    }

    #[test]
    fn mismatched_snapshot_is_rejected_before_writes() {
        let (_, snapshot) = two_continents();
        let mut adapter = GridAdapter::new(GridDims::new(10, 8).unwrap());
        let err = run(&mut adapter, &snapshot, &inputs(1, 1)).unwrap_err();
        assert!(matches!(err, PlacementError::DimensionMismatch { .. }));
        assert!(adapter.map_ops().is_empty());
    }

    #[test]
    fn wonders_without_bonus_use_nominal_count() {
        let (mut adapter, snapshot) = two_continents();
        let mut config = PlacementConfig::default();
        config.wonders.plus_one = false;
        let inputs = inputs(1, 1);
        let request = PlacementRequest {
            inputs: &inputs,
            landmasses: &snapshot,
            classification: None,
            config: &config,
        };
        let report = run_placement(&mut adapter, &request, &mut LabelRng::new(3)).unwrap();
        assert_eq!(report.outputs.natural_wonders_placed, 3);
    }

    #[test]
    fn stage_record_serializes_flat() {
        let record = StageRecord {
            stage: PlacementStage::Floodplains,
            outcome: StageOutcome::Failed {
                message: "boom".into(),
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "stage": "floodplains", "status": "failed", "message": "boom" })
        );
    }
}
