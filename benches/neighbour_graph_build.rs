use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::Span;

use specgeom::{
    ComponentArena, GeometryCache, NeighbourParams, Quat, SpatialNeighbourGraph,
    SpectrumDetectorIndex, V3D,
};

/// Flat panel: `side * side` pixels on a 1 cm grid at z = 5.
fn flat_panel(side: i32) -> ComponentArena {
    let mut arena = ComponentArena::new();
    let bank = arena.add_component("panel", V3D::new(0.0, 0.0, 5.0), Quat::identity());
    for row in 0..side {
        for col in 0..side {
            let p = V3D::new(col as f64 * 0.01, row as f64 * 0.01, 0.0);
            arena
                .add_detector(Some(bank), row * side + col, Some(p), None)
                .expect("unique detector ids");
        }
    }
    arena
}

fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighbour_graph/build");

    for side in [32, 64, 128] {
        let arena = flat_panel(side);
        let index = SpectrumDetectorIndex::range(0, side * side - 1).unwrap();
        let params = NeighbourParams::builder().neighbour_count(8).build().unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(side * side),
            &(arena, index),
            |b, (arena, index)| {
                b.iter(|| {
                    let graph = SpatialNeighbourGraph::build(index, arena, &params).unwrap();
                    black_box(graph.vertex_count())
                })
            },
        );
    }
    group.finish();
}

fn bench_cached_queries(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let side = 64;
    let arena = flat_panel(side);
    let pixels: Vec<_> = (0..side * side)
        .filter_map(|d| arena.component_for_detector(d))
        .collect();
    let params = NeighbourParams::builder().neighbour_count(8).build().unwrap();
    let cache = GeometryCache::new(Arc::new(arena), params, Span::none());
    let index = Arc::new(SpectrumDetectorIndex::range(0, side * side - 1).unwrap());
    cache.set_index(&index);
    cache.neighbour_graph().unwrap();

    c.bench_function("neighbour_graph/cached_query", |b| {
        b.iter_batched(
            || pixels[rng.random_range(0..pixels.len())],
            |pixel| black_box(cache.neighbours(pixel, 0.0).unwrap().len()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_graph_build, bench_cached_queries);
criterion_main!(benches);
