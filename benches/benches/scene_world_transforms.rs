// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use kurbo::{Point, Rect};
use trellis_scene::{NodeId, QueryFilter, Tree};

/// A board of `groups` groups with `per_group` cards each.
fn board(groups: usize, per_group: usize) -> (Tree, NodeId, Vec<NodeId>) {
    let mut tree = Tree::new();
    let root = tree.create_node(10_000.0, 10_000.0);
    let mut cards = Vec::with_capacity(groups * per_group);
    for g in 0..groups {
        let group = tree.insert(Some(root), 400.0, 400.0);
        tree.set_position(group, (g % 20) as f64 * 450.0, (g / 20) as f64 * 450.0);
        for c in 0..per_group {
            let card = tree.insert(Some(group), 30.0, 20.0);
            tree.set_position(card, (c % 10) as f64 * 40.0, (c / 10) as f64 * 40.0);
            cards.push(card);
        }
    }
    (tree, root, cards)
}

fn bench_lazy_world(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_transform");

    // Moving the root dirties everything, but only the one leaf read is recomputed.
    let (mut tree, root, cards) = board(100, 100);
    let leaf = cards[cards.len() / 2];
    let mut x = 0.0;
    group.bench_function("move_root_read_one_leaf", |b| {
        b.iter(|| {
            x += 1.0;
            tree.set_position(root, x, 0.0);
            black_box(tree.world_transform(leaf))
        });
    });

    // Reading every leaf after a root move, the full cost lazy evaluation defers.
    let (mut tree, root, cards) = board(100, 100);
    group.bench_function("move_root_read_all_leaves", |b| {
        b.iter(|| {
            x += 1.0;
            tree.set_position(root, x, 0.0);
            for &card in &cards {
                black_box(tree.world_transform(card));
            }
        });
    });

    // A 64-deep chain: one set at the top, one read at the bottom.
    let mut tree = Tree::new();
    let top = tree.create_node(10.0, 10.0);
    let mut tip = top;
    for _ in 0..64 {
        tip = tree.insert(Some(tip), 10.0, 10.0);
        tree.set_position(tip, 1.0, 1.0);
    }
    group.bench_function("deep_chain", |b| {
        b.iter(|| {
            x += 1.0;
            tree.set_rotation(top, x * 0.001);
            black_box(tree.world_transform(tip))
        });
    });
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_query");
    let (mut tree, root, _) = board(100, 100);
    group.bench_function("hit_test_10k", |b| {
        b.iter(|| black_box(tree.hit_test(root, black_box(Point::new(2265.0, 1815.0)), QueryFilter::PICKING)));
    });
    let mut out = Vec::new();
    group.bench_function("visit_visible_viewport", |b| {
        b.iter(|| {
            tree.visit_visible(root, Rect::new(1000.0, 1000.0, 2920.0, 2080.0), &mut out);
            black_box(out.len())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_lazy_world, bench_queries);
criterion_main!(benches);
