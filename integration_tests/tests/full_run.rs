mod common;

use std::collections::BTreeSet;

use common::{Scenario, WIDTH};
use placement_core::base_tags::{
    ARTIFACT_PLACEMENT_OUTPUTS, EFFECT_FEATURES_APPLIED, EFFECT_PLACEMENT_APPLIED,
    EFFECT_PLOT_EFFECTS_APPLIED,
};
use placement_core::{
    base_registry, load_placement_config_from_env, run_feature_step,
    run_placement_step, EngineAdapter, GridAdapter, GridDims, LandmassIdName, PlacementConfig,
    PlacementOutputs, PlacementStage, StageOutcome,
};

#[test]
fn full_generation_places_features_effects_and_starts() -> anyhow::Result<()> {
    let config = PlacementConfig::builtin();
    let (mut ctx, mut satisfied) = Scenario::two_continents(2, 2).into_context(42);
    let registry = base_registry::<GridAdapter>()?;

    let features = run_feature_step(&mut ctx, &registry, &mut satisfied, &config.features)?;
    assert!(features.total() > 0);
    assert!(registry.is_satisfied(EFFECT_FEATURES_APPLIED, &ctx, &satisfied));

    let report = run_placement_step(&mut ctx, &registry, &mut satisfied, &config)?;
    assert!(report.failed_stages().is_empty());
    assert_eq!(
        report.outcome(PlacementStage::PlotEffects),
        Some(&StageOutcome::Succeeded)
    );
    assert!(report.outputs.snow_tiles > 0);
    assert!(registry.is_satisfied(EFFECT_PLOT_EFFECTS_APPLIED, &ctx, &satisfied));
    assert!(registry.is_satisfied(EFFECT_PLACEMENT_APPLIED, &ctx, &satisfied));

    let published: PlacementOutputs = ctx.artifacts.read(ARTIFACT_PLACEMENT_OUTPUTS)?;
    assert_eq!(published, report.outputs);
    assert_eq!(report.outputs.starts_assigned, 4);
    assert_eq!(report.outputs.natural_wonders_placed, 5);
    Ok(())
}

#[test]
fn starts_are_distinct_and_land_on_their_continent() {
    let config = PlacementConfig::builtin();
    let (mut ctx, mut satisfied) = Scenario::two_continents(3, 2).into_context(7);
    let registry = base_registry::<GridAdapter>().unwrap();
    let report = run_placement_step(&mut ctx, &registry, &mut satisfied, &config).unwrap();

    let dims = GridDims::new(WIDTH, common::HEIGHT).unwrap();
    let positions: Vec<usize> = report
        .start_positions
        .iter()
        .map(|&tile| usize::try_from(tile).expect("assigned"))
        .collect();
    assert_eq!(positions.len(), 5);

    for (player, &tile) in positions.iter().enumerate() {
        let (x, _) = dims.coords(tile);
        if player < 3 {
            assert!((4..=15).contains(&x), "west player {player} at column {x}");
        } else {
            assert!((22..=35).contains(&x), "east player {player} at column {x}");
        }
        assert_eq!(ctx.adapter.start_positions().get(&(player as u32)), Some(&tile));
    }
    let unique: BTreeSet<usize> = positions.iter().copied().collect();
    assert_eq!(unique.len(), positions.len(), "starts must not share a tile");
}

#[test]
fn region_ids_are_stamped_per_continent() {
    let config = PlacementConfig::builtin();
    let (mut ctx, mut satisfied) = Scenario::two_continents(1, 1).into_context(3);
    let registry = base_registry::<GridAdapter>().unwrap();
    run_placement_step(&mut ctx, &registry, &mut satisfied, &config).unwrap();

    let dims = ctx.dims;
    let west = ctx.adapter.get_landmass_id(LandmassIdName::West);
    let east = ctx.adapter.get_landmass_id(LandmassIdName::East);
    let none = ctx.adapter.get_landmass_id(LandmassIdName::None);
    let ids = ctx.adapter.region_ids();
    assert_eq!(ids[dims.index(8, 8)], west);
    assert_eq!(ids[dims.index(30, 8)], east);
    assert_eq!(ids[dims.index(19, 0)], none);
}

#[test]
fn config_from_env_overrides_builtin_values() {
    common::ensure_test_config();
    let (config, metadata) = load_placement_config_from_env();
    assert!(metadata.path().is_some());
    assert!(!config.wonders.plus_one);
    assert_eq!(config.plot_effects.snow.coverage_chance, 100.0);
    assert_eq!(
        config.features,
        PlacementConfig::builtin().features,
        "sections absent from the override keep their defaults"
    );

    let (mut ctx, mut satisfied) = Scenario::two_continents(1, 1).into_context(9);
    let registry = base_registry::<GridAdapter>().unwrap();
    let report = run_placement_step(&mut ctx, &registry, &mut satisfied, &config).unwrap();
    assert_eq!(report.outputs.natural_wonders_placed, 4);
}
