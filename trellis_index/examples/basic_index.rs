// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Trellis Index: bulk load, update, query, and drain damage.

use trellis_index::{Aabb2D, Index, QuadtreeConfig};

fn main() {
    let items: Vec<_> = (0..16_u32)
        .map(|i| {
            let x = f64::from(i % 4) * 20.0;
            let y = f64::from(i / 4) * 20.0;
            (Aabb2D::from_xywh(x, y, 15.0, 15.0), i)
        })
        .collect();

    let mut idx = Index::<f64, u32>::with_quadtree(QuadtreeConfig::default());
    let keys = idx.load(&items);

    // Move box 0 next to box 15.
    idx.update(keys[0], Aabb2D::from_xywh(70.0, 70.0, 15.0, 15.0));
    let dmg = idx.commit();
    println!("damage: moved={:?} union={:?}", dmg.moved, dmg.union());

    let hits: Vec<_> = idx.query_point(72.0, 72.0).map(|(_, p)| p).collect();
    println!("hits at (72,72): {hits:?}");
    println!("{:?}", idx.backend());
}
