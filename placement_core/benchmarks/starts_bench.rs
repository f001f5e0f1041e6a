use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use placement_core::{
    assign_starts, compute_regions, GridAdapter, GridDims, Landmass, LandmassSnapshot,
    OccupancyMask, StartRequest,
};

/// Two continents each covering a third of the map width.
fn continents(width: u32, height: u32) -> LandmassSnapshot {
    let dims = GridDims::new(width, height).expect("bench dims");
    let third = width / 3;
    let spans = [(1, width / 12, width / 12 + third), (2, width / 2 + 1, width / 2 + third)];
    let mut landmass_id = vec![-1; dims.len()];
    for &(id, west, east) in &spans {
        for y in height / 8..height - height / 8 {
            for x in west..=east {
                landmass_id[dims.index(x, y)] = id;
            }
        }
    }
    LandmassSnapshot {
        width,
        height,
        landmasses: spans
            .iter()
            .map(|&(id, west, east)| Landmass { id, west, east })
            .collect(),
        landmass_id,
    }
}

fn bench_assign_starts(c: &mut Criterion) {
    let mut group = c.benchmark_group("assign_starts");

    for (width, height, players) in [(44u32, 26u32, 4u32), (84, 54, 8), (128, 80, 12)] {
        let snapshot = continents(width, height);
        let projection = compute_regions(&snapshot).expect("bench snapshot");
        let request = StartRequest {
            players_west: players / 2,
            players_east: players - players / 2,
            sectors: None,
        };
        group.bench_with_input(
            BenchmarkId::new("map", format!("{width}x{height}/{players}")),
            &request,
            |b, request| {
                b.iter_batched(
                    || {
                        (
                            GridAdapter::new(projection.dims()),
                            OccupancyMask::new(projection.dims().len()),
                        )
                    },
                    |(mut adapter, mut occupancy)| {
                        assign_starts(&mut adapter, &projection, request, &mut occupancy)
                            .expect("starts")
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(starts_benches, bench_assign_starts);
criterion_main!(starts_benches);
