use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use placement_core::{
    place_features, BiomeClassification, BiomeSymbol, GridAdapter, GridDims, LabelRng,
    PlacementConfig, TileClimate,
};

/// Land in the middle half of every row, biomes banded by latitude.
fn banded_map(size: u32) -> (GridAdapter, BiomeClassification) {
    let dims = GridDims::new(size * 2, size).expect("bench dims");
    let mut adapter = GridAdapter::new(dims);
    let mut classification = BiomeClassification::filled(dims, TileClimate::default());
    for (x, y) in dims.tiles() {
        let band = y * 8 / dims.height;
        let symbol = match band {
            0 | 7 => BiomeSymbol::Snow,
            1 | 6 => BiomeSymbol::Boreal,
            2 | 5 => BiomeSymbol::TemperateHumid,
            _ => BiomeSymbol::TropicalRainforest,
        };
        classification.set_tile(
            dims.index(x, y),
            TileClimate {
                symbol,
                vegetation: 0.7,
                moisture: 120.0,
                ..TileClimate::default()
            },
        );
        if x >= dims.width / 4 && x < dims.width * 3 / 4 {
            adapter.set_land(x, y);
            if x % 7 == 0 {
                adapter.set_river(x, y, true);
            }
        }
    }
    (adapter, classification)
}

fn bench_place_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("place_features");
    let config = PlacementConfig::builtin();

    for size in [16u32, 32, 64] {
        let (adapter, classification) = banded_map(size);
        group.bench_with_input(BenchmarkId::new("grid", size), &size, |b, _| {
            b.iter_batched(
                || (adapter.clone(), LabelRng::new(7)),
                |(mut adapter, mut rng)| {
                    place_features(&mut adapter, &classification, &config.features, &mut rng)
                        .expect("features")
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(feature_benches, bench_place_features);
criterion_main!(feature_benches);
