//! Canonical dependency tags shared by the generation stages.
//!
//! Artifact tags decode the published JSON into its typed record and check it
//! against the map grid. Effect tags need both a recorded signal and the
//! engine's confirmation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::adapter::EngineAdapter;
use crate::biome::BiomeClassification;
use crate::context::MapContext;
use crate::grid::{GridDims, GridError};
use crate::orchestrator::{PlacementInputs, PlacementOutputs};
use crate::region::LandmassSnapshot;
use crate::tags::{DependencyTag, SatisfactionState, TagError, TagRegistry};

pub const ARTIFACT_HEIGHTFIELD: &str = "artifact:morphology.heightfield@v1";
pub const ARTIFACT_CLIMATE_FIELD: &str = "artifact:climate.field@v1";
pub const ARTIFACT_BIOME_CLASSIFICATION: &str = "artifact:ecology.biome_classification@v1";
pub const ARTIFACT_LANDMASS_SNAPSHOT: &str = "artifact:morphology.landmasses@v1";
pub const ARTIFACT_PLACEMENT_INPUTS: &str = "artifact:placement.inputs@v1";
pub const ARTIFACT_PLACEMENT_OUTPUTS: &str = "artifact:placement.outputs@v1";

pub const FIELD_TERRAIN: &str = "field:terrain";
pub const FIELD_ELEVATION: &str = "field:elevation";
pub const FIELD_RAINFALL: &str = "field:rainfall";
pub const FIELD_TEMPERATURE: &str = "field:temperature";

pub const EFFECT_LANDMASSES_APPLIED: &str = "effect:engine.landmasses_applied";
pub const EFFECT_FEATURES_APPLIED: &str = "effect:engine.features_applied";
pub const EFFECT_PLOT_EFFECTS_APPLIED: &str = "effect:engine.plot_effects_applied";
pub const EFFECT_PLACEMENT_APPLIED: &str = "effect:engine.placement_applied";

/// Elevation and land mask produced by morphology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightfieldArtifact {
    pub width: u32,
    pub height: u32,
    pub elevation: Vec<i32>,
    pub land_mask: Vec<bool>,
}

/// Per-tile rainfall and temperature produced by climate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateFieldArtifact {
    pub width: u32,
    pub height: u32,
    pub rainfall: Vec<f32>,
    pub temperature: Vec<f32>,
}

/// An artifact laid out over the tile grid.
trait GridArtifact: DeserializeOwned {
    fn grid_dims(&self) -> Result<GridDims, GridError>;
}

impl GridArtifact for HeightfieldArtifact {
    fn grid_dims(&self) -> Result<GridDims, GridError> {
        let dims = GridDims::new(self.width, self.height)?;
        dims.check_len("elevation", self.elevation.len())?;
        dims.check_len("land_mask", self.land_mask.len())?;
        Ok(dims)
    }
}

impl GridArtifact for ClimateFieldArtifact {
    fn grid_dims(&self) -> Result<GridDims, GridError> {
        let dims = GridDims::new(self.width, self.height)?;
        dims.check_len("rainfall", self.rainfall.len())?;
        dims.check_len("temperature", self.temperature.len())?;
        Ok(dims)
    }
}

impl GridArtifact for BiomeClassification {
    fn grid_dims(&self) -> Result<GridDims, GridError> {
        self.validate()?;
        Ok(self.dims())
    }
}

impl GridArtifact for LandmassSnapshot {
    fn grid_dims(&self) -> Result<GridDims, GridError> {
        self.validate()?;
        Ok(self.dims())
    }
}

fn invalid(id: &str, message: impl ToString) -> TagError {
    TagError::InvalidArtifact {
        id: id.to_string(),
        message: message.to_string(),
    }
}

fn grid_artifact_holds<T: GridArtifact, A>(
    ctx: &MapContext<A>,
    id: &str,
) -> Result<bool, TagError> {
    let artifact: T = ctx.artifacts.read(id)?;
    let dims = artifact.grid_dims().map_err(|err| invalid(id, err))?;
    if dims != ctx.dims {
        return Err(invalid(
            id,
            format!("covers {dims:?} but the map is {:?}", ctx.dims),
        ));
    }
    Ok(true)
}

fn grid_demo_is_valid<T: GridArtifact>(value: &JsonValue) -> bool {
    T::deserialize(value)
        .ok()
        .and_then(|artifact| artifact.grid_dims().ok())
        .is_some()
}

fn inputs_are_valid(inputs: &PlacementInputs) -> bool {
    match &inputs.starts.sectors {
        Some(sectors) if sectors.rows > 0 && sectors.cols > 0 && !sectors.eligible.is_empty() => {
            let cells = (sectors.rows * sectors.cols) as usize;
            sectors.eligible.len() == cells || sectors.eligible.len() == cells * 2
        }
        _ => true,
    }
}

fn field_holds<T>(values: Option<&[T]>, dims: GridDims, finite: impl Fn(&T) -> bool) -> bool {
    values.is_some_and(|values| values.len() == dims.len() && values.iter().all(finite))
}

fn effect_confirmed<A: EngineAdapter>(
    ctx: &MapContext<A>,
    satisfied: &SatisfactionState,
    id: &str,
) -> Result<bool, TagError> {
    if !satisfied.contains(id) {
        return Ok(false);
    }
    Ok(ctx.adapter.verify_effect(id)?)
}

fn placement_applied<A: EngineAdapter>(
    ctx: &MapContext<A>,
    satisfied: &SatisfactionState,
) -> Result<bool, TagError> {
    if !effect_confirmed(ctx, satisfied, EFFECT_PLACEMENT_APPLIED)? {
        return Ok(false);
    }
    let outputs: PlacementOutputs = ctx.artifacts.read(ARTIFACT_PLACEMENT_OUTPUTS)?;
    if !ctx.artifacts.contains(ARTIFACT_PLACEMENT_INPUTS) {
        return Ok(true);
    }
    let inputs: PlacementInputs = ctx.artifacts.read(ARTIFACT_PLACEMENT_INPUTS)?;
    Ok(outputs.starts_assigned >= inputs.total_players())
}

/// Every canonical tag, in registration order.
pub fn base_tags<A: EngineAdapter + 'static>() -> Vec<DependencyTag<MapContext<A>>> {
    vec![
        DependencyTag::artifact(ARTIFACT_HEIGHTFIELD)
            .owned_by("morphology")
            .satisfied_by(|ctx, _| {
                grid_artifact_holds::<HeightfieldArtifact, A>(ctx, ARTIFACT_HEIGHTFIELD)
            })
            .with_demo(
                json!({
                    "width": 2,
                    "height": 1,
                    "elevation": [0, 320],
                    "land_mask": [false, true],
                }),
                grid_demo_is_valid::<HeightfieldArtifact>,
            ),
        DependencyTag::artifact(ARTIFACT_CLIMATE_FIELD)
            .owned_by("climate")
            .satisfied_by(|ctx, _| {
                grid_artifact_holds::<ClimateFieldArtifact, A>(ctx, ARTIFACT_CLIMATE_FIELD)
            })
            .with_demo(
                json!({
                    "width": 2,
                    "height": 1,
                    "rainfall": [80.0, 120.0],
                    "temperature": [12.0, 18.5],
                }),
                grid_demo_is_valid::<ClimateFieldArtifact>,
            ),
        DependencyTag::artifact(ARTIFACT_BIOME_CLASSIFICATION)
            .owned_by("ecology")
            .satisfied_by(|ctx, _| {
                grid_artifact_holds::<BiomeClassification, A>(ctx, ARTIFACT_BIOME_CLASSIFICATION)
            })
            .with_demo(
                json!({
                    "width": 2,
                    "height": 1,
                    "biome_index": [4, 7],
                    "vegetation_density": [0.6, 0.1],
                    "effective_moisture": [110.0, 20.0],
                    "surface_temperature": [14.0, 26.0],
                    "aridity_index": [0.2, 0.8],
                    "freeze_index": [0.0, 0.0],
                    "elevation": [150, 90],
                }),
                grid_demo_is_valid::<BiomeClassification>,
            ),
        DependencyTag::artifact(ARTIFACT_LANDMASS_SNAPSHOT)
            .owned_by("morphology")
            .satisfied_by(|ctx, _| {
                grid_artifact_holds::<LandmassSnapshot, A>(ctx, ARTIFACT_LANDMASS_SNAPSHOT)
            })
            .with_demo(
                json!({
                    "width": 2,
                    "height": 1,
                    "landmasses": [{ "id": 0, "west": 0, "east": 0 }],
                    "landmass_id": [0, -1],
                }),
                grid_demo_is_valid::<LandmassSnapshot>,
            ),
        DependencyTag::artifact(ARTIFACT_PLACEMENT_INPUTS)
            .owned_by("placement")
            .satisfied_by(|ctx: &MapContext<A>, _| {
                let inputs: PlacementInputs = ctx.artifacts.read(ARTIFACT_PLACEMENT_INPUTS)?;
                if !inputs_are_valid(&inputs) {
                    return Err(invalid(
                        ARTIFACT_PLACEMENT_INPUTS,
                        "sector eligibility does not match rows x cols",
                    ));
                }
                Ok(true)
            })
            .with_demo(
                json!({
                    "natural_wonders": 4,
                    "starts": { "players_west": 2, "players_east": 2 },
                }),
                |value| {
                    PlacementInputs::deserialize(value)
                        .map(|inputs| inputs_are_valid(&inputs))
                        .unwrap_or(false)
                },
            ),
        DependencyTag::artifact(ARTIFACT_PLACEMENT_OUTPUTS)
            .owned_by("placement")
            .satisfied_by(|ctx: &MapContext<A>, _| {
                ctx.artifacts
                    .read::<PlacementOutputs>(ARTIFACT_PLACEMENT_OUTPUTS)
                    .map(|_| true)
            })
            .with_demo(
                json!({
                    "natural_wonders_placed": 5,
                    "floodplains": 3,
                    "snow_tiles": 40,
                    "resources": 120,
                    "starts_assigned": 4,
                    "discoveries": 8,
                }),
                |value| PlacementOutputs::deserialize(value).is_ok(),
            ),
        DependencyTag::field(FIELD_TERRAIN)
            .owned_by("morphology")
            .satisfied_by(|ctx: &MapContext<A>, _| {
                Ok(field_holds(ctx.fields.terrain.as_deref(), ctx.dims, |_| true))
            }),
        DependencyTag::field(FIELD_ELEVATION)
            .owned_by("morphology")
            .satisfied_by(|ctx: &MapContext<A>, _| {
                Ok(field_holds(ctx.fields.elevation.as_deref(), ctx.dims, |_| true))
            }),
        DependencyTag::field(FIELD_RAINFALL)
            .owned_by("climate")
            .satisfied_by(|ctx: &MapContext<A>, _| {
                Ok(field_holds(ctx.fields.rainfall.as_deref(), ctx.dims, |v: &f32| {
                    v.is_finite()
                }))
            }),
        DependencyTag::field(FIELD_TEMPERATURE)
            .owned_by("climate")
            .satisfied_by(|ctx: &MapContext<A>, _| {
                Ok(field_holds(ctx.fields.temperature.as_deref(), ctx.dims, |v: &f32| {
                    v.is_finite()
                }))
            }),
        DependencyTag::effect(EFFECT_LANDMASSES_APPLIED)
            .owned_by("morphology")
            .satisfied_by(|ctx, satisfied| {
                effect_confirmed(ctx, satisfied, EFFECT_LANDMASSES_APPLIED)
            }),
        DependencyTag::effect(EFFECT_FEATURES_APPLIED)
            .owned_by("ecology")
            .satisfied_by(|ctx, satisfied| {
                effect_confirmed(ctx, satisfied, EFFECT_FEATURES_APPLIED)
            }),
        DependencyTag::effect(EFFECT_PLOT_EFFECTS_APPLIED)
            .owned_by("ecology")
            .satisfied_by(|ctx, satisfied| {
                effect_confirmed(ctx, satisfied, EFFECT_PLOT_EFFECTS_APPLIED)
            }),
        DependencyTag::effect(EFFECT_PLACEMENT_APPLIED)
            .owned_by("placement")
            .satisfied_by(placement_applied::<A>),
    ]
}

/// A registry holding every canonical tag.
pub fn base_registry<A: EngineAdapter + 'static>(
) -> Result<TagRegistry<MapContext<A>>, TagError> {
    let mut registry = TagRegistry::new();
    registry.register_tags(base_tags::<A>())?;
    Ok(registry)
}
