use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde_json::json;
use tracing::info;

use placement_core::base_tags::{
    ARTIFACT_BIOME_CLASSIFICATION, ARTIFACT_LANDMASS_SNAPSHOT, ARTIFACT_PLACEMENT_INPUTS,
    EFFECT_LANDMASSES_APPLIED,
};
use placement_core::{
    base_registry, load_placement_config_from_env, run_feature_step, run_placement_step,
    BiomeClassification, BiomeSymbol, GridAdapter, GridDims, Landmass, LandmassSnapshot,
    MapContext, PlacementConfig, PlacementInputs, SatisfactionState, StartRequest, TileClimate,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Synthetic map placement harness", long_about = None)]
struct Args {
    /// Seed for both the synthetic map and placement rolls
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Map width in tiles
    #[arg(long, default_value_t = 84)]
    width: u32,

    /// Map height in tiles
    #[arg(long, default_value_t = 54)]
    height: u32,

    /// Players starting on the western continent
    #[arg(long, default_value_t = 4)]
    players_west: u32,

    /// Players starting on the eastern continent
    #[arg(long, default_value_t = 4)]
    players_east: u32,

    /// Nominal natural wonder count for the map size
    #[arg(long, default_value_t = 5)]
    wonders: u32,

    /// Placement config JSON (defaults to PLACEMENT_CONFIG_PATH, then builtin)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

struct SyntheticMap {
    adapter: GridAdapter,
    landmasses: LandmassSnapshot,
    classification: BiomeClassification,
}

/// Two jittered continents, one per half of the map, with a river each.
fn synthesize(dims: GridDims, rng: &mut SmallRng) -> SyntheticMap {
    let mut adapter = GridAdapter::new(dims);
    let mut classification = BiomeClassification::filled(dims, TileClimate::default());
    let mut landmass_id = vec![-1; dims.len()];
    let mut landmasses = Vec::new();

    let half = dims.width / 2;
    let top = dims.height / 8;
    let bottom = dims.height - dims.height / 8;
    for (id, origin) in [(1, 0u32), (2, half)] {
        let core_west = origin + half / 6;
        let core_east = origin + half - half / 6;
        let (mut west, mut east) = (u32::MAX, 0u32);
        for y in top..bottom {
            let row_west = core_west + rng.gen_range(0..=half / 10);
            let row_east = core_east.saturating_sub(rng.gen_range(0..=half / 10));
            for x in row_west..=row_east {
                let index = dims.index(x, y);
                adapter.set_land(x, y);
                landmass_id[index] = id;
                classification.set_tile(index, climate_at(dims, y, rng));
            }
            west = west.min(row_west);
            east = east.max(row_east);
        }

        let mut river_x = (west + east) / 2;
        for y in top + 2..bottom.saturating_sub(2) {
            adapter.set_river(river_x, y, true);
            let step: i64 = rng.gen_range(-1..=1);
            river_x = (river_x as i64 + step).clamp(west as i64, east as i64) as u32;
        }
        landmasses.push(Landmass { id, west, east });
    }

    SyntheticMap {
        adapter,
        landmasses: LandmassSnapshot {
            width: dims.width,
            height: dims.height,
            landmasses,
            landmass_id,
        },
        classification,
    }
}

/// Climate banded by latitude with a little per-tile noise.
fn climate_at(dims: GridDims, y: u32, rng: &mut SmallRng) -> TileClimate {
    let latitude = (y as f32 + 0.5) / dims.height as f32 * 2.0 - 1.0;
    let polar = latitude.abs();
    let symbol = match polar {
        p if p > 0.72 => BiomeSymbol::Tundra,
        p if p > 0.6 => BiomeSymbol::Boreal,
        p if p > 0.35 => BiomeSymbol::TemperateHumid,
        p if p > 0.25 => BiomeSymbol::TemperateDry,
        p if p > 0.15 => BiomeSymbol::Desert,
        p if p > 0.08 => BiomeSymbol::TropicalSeasonal,
        _ => BiomeSymbol::TropicalRainforest,
    };
    let noise: f32 = rng.gen_range(-0.1..0.1);
    TileClimate {
        symbol,
        vegetation: (0.75 - polar * 0.5 + noise).clamp(0.0, 1.0),
        moisture: if symbol == BiomeSymbol::Desert {
            20.0
        } else {
            130.0 - polar * 60.0
        },
        temperature: 28.0 - polar * 36.0,
        aridity: if symbol == BiomeSymbol::Desert { 0.85 } else { 0.3 },
        freeze: ((polar - 0.6) * 2.5).clamp(0.0, 1.0),
        elevation: 150 + (polar * 1800.0) as i32 + rng.gen_range(0..200),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PlacementConfig> {
    match path {
        Some(path) => PlacementConfig::from_file(path)
            .with_context(|| format!("Failed to load placement config at {}", path.display())),
        None => Ok((*load_placement_config_from_env().0).clone()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.width < 16 || args.height < 8 {
        bail!(
            "synthetic map needs at least 16x8 tiles, got {}x{}",
            args.width,
            args.height
        );
    }
    let dims = GridDims::new(args.width, args.height).context("Invalid map dimensions")?;
    let config = load_config(args.config.as_ref())?;

    let mut map_rng = SmallRng::seed_from_u64(args.seed);
    let map = synthesize(dims, &mut map_rng);
    let inputs = PlacementInputs {
        natural_wonders: args.wonders,
        starts: StartRequest {
            players_west: args.players_west,
            players_east: args.players_east,
            sectors: None,
        },
    };

    let mut ctx = MapContext::new(map.adapter, args.seed);
    ctx.artifacts
        .publish(ARTIFACT_LANDMASS_SNAPSHOT, &map.landmasses)
        .context("Failed to publish landmass snapshot")?;
    ctx.artifacts
        .publish(ARTIFACT_BIOME_CLASSIFICATION, &map.classification)
        .context("Failed to publish biome classification")?;
    ctx.artifacts
        .publish(ARTIFACT_PLACEMENT_INPUTS, &inputs)
        .context("Failed to publish placement inputs")?;

    // The synthetic map stands in for morphology's landmass pass.
    let mut satisfied = SatisfactionState::new();
    ctx.adapter.record_evidence(EFFECT_LANDMASSES_APPLIED);
    satisfied.record(EFFECT_LANDMASSES_APPLIED);

    let registry = base_registry::<GridAdapter>().context("Failed to build tag registry")?;
    let features = run_feature_step(&mut ctx, &registry, &mut satisfied, &config.features)
        .context("Feature placement failed")?;
    let placement = run_placement_step(&mut ctx, &registry, &mut satisfied, &config)
        .context("Placement failed")?;

    info!(
        seed = args.seed,
        features = features.total(),
        starts = placement.outputs.starts_assigned,
        "harness.completed"
    );

    let report = json!({
        "seed": args.seed,
        "width": dims.width,
        "height": dims.height,
        "features": features,
        "placement": {
            "stages": placement.stages,
            "outputs": placement.outputs,
            "start_positions": placement.start_positions,
            "plot_effects": placement.plot_effects,
        },
        "satisfied_tags": satisfied.iter().collect::<Vec<_>>(),
    });
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{rendered}");
    Ok(())
}
