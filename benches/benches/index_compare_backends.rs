// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use trellis_index::{Aabb2D, Index, QuadIndex, QuadtreeConfig};

fn gen_grid_rects(n: usize, cell: f64) -> Vec<Aabb2D<f64>> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            out.push(Aabb2D::from_xywh(x as f64 * cell, y as f64 * cell, cell * 0.8, cell * 0.8));
        }
    }
    out
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn next_f64(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        ((x >> 11) as f64) / ((1_u64 << 53) as f64)
    }
}

/// Random small boxes over `extent`, like cards scattered on a board.
fn gen_scattered_rects(count: usize, extent: f64, size: f64) -> Vec<Aabb2D<f64>> {
    let mut rng = Rng(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|_| {
            let x = rng.next_f64() * (extent - size);
            let y = rng.next_f64() * (extent - size);
            Aabb2D::from_xywh(x, y, size, size)
        })
        .collect()
}

fn quadtree() -> QuadIndex<u32> {
    Index::<f64, u32>::with_quadtree(QuadtreeConfig::default())
}

fn payloads(rects: &[Aabb2D<f64>]) -> Vec<(Aabb2D<f64>, u32)> {
    rects.iter().copied().zip(0_u32..).collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &n in &[32_usize, 64, 128] {
        let items = payloads(&gen_grid_rects(n, 10.0));
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("quadtree_insert_n{n}"), |b| {
            b.iter_batched(
                quadtree,
                |mut idx| {
                    for &(r, p) in &items {
                        idx.insert(r, p);
                    }
                    black_box(idx.commit().len());
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("quadtree_load_n{n}"), |b| {
            b.iter_batched(
                quadtree,
                |mut idx| black_box(idx.load(&items).len()),
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("flatvec_load_n{n}"), |b| {
            b.iter_batched(
                Index::<f64, u32>::new,
                |mut idx| black_box(idx.load(&items).len()),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let items = payloads(&gen_scattered_rects(10_000, 4000.0, 24.0));
    let mut quad = quadtree();
    quad.load(&items);
    let mut flat = Index::<f64, u32>::new();
    flat.load(&items);
    let viewport = Aabb2D::from_xywh(1200.0, 900.0, 800.0, 600.0);

    group.bench_function("quadtree_viewport", |b| {
        b.iter(|| black_box(quad.query_rect(black_box(viewport)).count()));
    });
    group.bench_function("flatvec_viewport", |b| {
        b.iter(|| black_box(flat.query_rect(black_box(viewport)).count()));
    });
    group.bench_function("quadtree_point", |b| {
        b.iter(|| black_box(quad.query_point(black_box(1500.0), black_box(1100.0)).count()));
    });
    group.bench_function("flatvec_point", |b| {
        b.iter(|| black_box(flat.query_point(black_box(1500.0), black_box(1100.0)).count()));
    });
    group.finish();
}

fn bench_drag(c: &mut Criterion) {
    // One card dragged across a populated board: update then query around it.
    let mut group = c.benchmark_group("drag");
    let items = payloads(&gen_scattered_rects(10_000, 4000.0, 24.0));
    let mut quad = quadtree();
    let keys = quad.load(&items);
    let dragged = keys[0];
    let mut step = 0_u32;
    group.bench_function("quadtree_update_query", |b| {
        b.iter(|| {
            step = (step + 1) % 3000;
            let x = f64::from(step);
            quad.update(dragged, Aabb2D::from_xywh(x, x * 0.5, 24.0, 24.0));
            let hits = quad.query_rect(Aabb2D::from_xywh(x - 50.0, x * 0.5 - 50.0, 124.0, 124.0)).count();
            black_box(quad.commit().len() + hits)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_query, bench_drag);
criterion_main!(benches);
