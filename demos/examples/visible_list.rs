// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scrolling a long list: only rows touching the viewport are visited.
//!
//! Run:
//! - `cargo run -p trellis_demos --example visible_list`

use kurbo::Rect;
use trellis_scene::Tree;

const ROW_H: f64 = 20.0;
const WIDTH: f64 = 200.0;

fn main() {
    let mut tree = Tree::new();
    let root = tree.create_node(WIDTH, 100_000.0);

    let rows = 1000_usize;
    let mut ids = Vec::with_capacity(rows);
    for i in 0..rows {
        let row = tree.insert(Some(root), WIDTH, ROW_H);
        tree.set_position(row, 0.0, i as f64 * ROW_H);
        ids.push(row);
    }
    println!("root child index holds {:?} rows", tree.child_index_len(root));

    let mut visible = Vec::new();
    for scroll in [0.0, 30.0, 200.0, 600.0] {
        let viewport = Rect::new(0.0, scroll, WIDTH, scroll + 100.0);
        tree.visit_visible(root, viewport, &mut visible);
        let rows: Vec<_> = visible
            .iter()
            .filter_map(|id| ids.iter().position(|x| x == id))
            .collect();
        println!("scroll={scroll:.1} -> visible rows: {rows:?}");
    }
}
