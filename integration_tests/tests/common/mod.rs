use std::path::PathBuf;
use std::sync::Once;

use placement_core::base_tags::{
    ARTIFACT_BIOME_CLASSIFICATION, ARTIFACT_LANDMASS_SNAPSHOT, ARTIFACT_PLACEMENT_INPUTS,
    EFFECT_LANDMASSES_APPLIED,
};
use placement_core::{
    BiomeClassification, BiomeSymbol, GridAdapter, GridDims, Landmass, LandmassSnapshot,
    MapContext, PlacementInputs, SatisfactionState, StartRequest, TileClimate,
};

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_placement_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test placement config at {}",
            config_path.display()
        );

        std::env::set_var("PLACEMENT_CONFIG_PATH", &config_path);
    });
}

pub const WIDTH: u32 = 40;
pub const HEIGHT: u32 = 20;

/// Two continents with cold highland rims, a dry band on the eastern one and
/// a river through each.
pub struct Scenario {
    pub adapter: GridAdapter,
    pub landmasses: LandmassSnapshot,
    pub classification: BiomeClassification,
    pub inputs: PlacementInputs,
}

impl Scenario {
    pub fn two_continents(players_west: u32, players_east: u32) -> Self {
        let dims = GridDims::new(WIDTH, HEIGHT).unwrap();
        let mut adapter = GridAdapter::new(dims);
        let mut classification = BiomeClassification::filled(dims, TileClimate::default());
        let mut landmass_id = vec![-1; dims.len()];
        let spans = [(1, 4u32, 15u32), (2, 22u32, 35u32)];

        for &(id, west, east) in &spans {
            for y in 3..=16u32 {
                for x in west..=east {
                    let index = dims.index(x, y);
                    adapter.set_land(x, y);
                    landmass_id[index] = id;
                    classification.set_tile(index, climate_for(id, y));
                }
            }
            let river_x = (west + east) / 2;
            for y in 5..=14 {
                adapter.set_river(river_x, y, true);
            }
        }

        let landmasses = LandmassSnapshot {
            width: WIDTH,
            height: HEIGHT,
            landmasses: spans
                .iter()
                .map(|&(id, west, east)| Landmass { id, west, east })
                .collect(),
            landmass_id,
        };
        let inputs = PlacementInputs {
            natural_wonders: 4,
            starts: StartRequest {
                players_west,
                players_east,
                sectors: None,
            },
        };

        Self {
            adapter,
            landmasses,
            classification,
            inputs,
        }
    }

    /// Publish every artifact placement reads and signal that morphology has
    /// written landmasses to the engine.
    pub fn into_context(self, seed: u64) -> (MapContext<GridAdapter>, SatisfactionState) {
        let mut ctx = MapContext::new(self.adapter, seed);
        let mut satisfied = SatisfactionState::new();
        ctx.artifacts
            .publish(ARTIFACT_LANDMASS_SNAPSHOT, &self.landmasses)
            .unwrap();
        ctx.artifacts
            .publish(ARTIFACT_BIOME_CLASSIFICATION, &self.classification)
            .unwrap();
        ctx.artifacts
            .publish(ARTIFACT_PLACEMENT_INPUTS, &self.inputs)
            .unwrap();
        ctx.adapter.record_evidence(EFFECT_LANDMASSES_APPLIED);
        satisfied.record(EFFECT_LANDMASSES_APPLIED);
        (ctx, satisfied)
    }
}

fn climate_for(landmass: i32, y: u32) -> TileClimate {
    match y {
        3 | 4 | 15 | 16 => TileClimate {
            symbol: BiomeSymbol::Tundra,
            vegetation: 0.3,
            moisture: 120.0,
            temperature: -6.0,
            aridity: 0.2,
            freeze: 0.9,
            elevation: 1500,
        },
        9 | 10 if landmass == 2 => TileClimate {
            symbol: BiomeSymbol::Desert,
            vegetation: 0.1,
            moisture: 15.0,
            temperature: 28.0,
            aridity: 0.85,
            freeze: 0.0,
            elevation: 220,
        },
        _ => TileClimate {
            symbol: BiomeSymbol::TemperateHumid,
            vegetation: 0.7,
            moisture: 110.0,
            temperature: 14.0,
            aridity: 0.3,
            freeze: 0.0,
            elevation: 180,
        },
    }
}
