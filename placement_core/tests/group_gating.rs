use placement_core::adapter::NO_FEATURE;
use placement_core::{
    place_features, BiomeClassification, FeatureGroups, FeatureKey, GridAdapter, GridDims,
    LabelRng, PlacementConfig, TileClimate,
};

/// Temperate land in the middle columns, open polar water on both edges.
fn polar_strip() -> (GridAdapter, BiomeClassification) {
    let dims = GridDims::new(24, 12).unwrap();
    let mut adapter = GridAdapter::new(dims);
    for (x, y) in dims.tiles() {
        if (6..18).contains(&x) {
            adapter.set_land(x, y);
        }
    }
    let classification = BiomeClassification::filled(dims, TileClimate::default());
    (adapter, classification)
}

fn sweep(config: &PlacementConfig) -> (GridAdapter, placement_core::FeatureReport) {
    let (mut adapter, classification) = polar_strip();
    let report = place_features(
        &mut adapter,
        &classification,
        &config.features,
        &mut LabelRng::new(2024),
    )
    .unwrap();
    (adapter, report)
}

#[test]
fn default_groups_are_all_enabled() {
    let config = PlacementConfig::default();
    assert_eq!(config.features.groups.enabled(), FeatureGroups::all());
}

#[test]
fn zero_multiplier_disables_only_that_group() {
    let mut config = PlacementConfig::default();
    config.features.groups.vegetated.multiplier = 0.0;
    assert!(!config
        .features
        .groups
        .enabled()
        .contains(FeatureGroups::VEGETATED));

    let (_, report) = sweep(&config);
    assert_eq!(report.placed(FeatureKey::Forest), 0);
    assert!(
        report.placed(FeatureKey::Ice) > 0,
        "ice should still run when only vegetation is disabled"
    );
}

#[test]
fn vegetation_runs_when_ice_is_disabled() {
    let mut config = PlacementConfig::default();
    config.features.groups.ice.multiplier = 0.0;

    let (_, report) = sweep(&config);
    assert_eq!(report.placed(FeatureKey::Ice), 0);
    assert!(report.placed(FeatureKey::Forest) > 0);
}

#[test]
fn no_groups_means_no_writes() {
    let mut config = PlacementConfig::default();
    let groups = &mut config.features.groups;
    groups.vegetated.multiplier = 0.0;
    groups.wet.multiplier = 0.0;
    groups.aquatic.multiplier = 0.0;
    groups.ice.multiplier = 0.0;
    assert!(config.features.groups.enabled().is_empty());

    let (adapter, report) = sweep(&config);
    assert_eq!(report.total(), 0);
    assert!(adapter.features().iter().all(|&feature| feature == NO_FEATURE));
}
