// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene basics: nested transforms, picking, resize constraints, and
//! invalidation reports.
//!
//! Run:
//! - `cargo run -p trellis_demos --example scene_basics`

use kurbo::{Point, Rect};
use trellis_scene::{Constraint, Constraints, InvalidationSink, QueryFilter, Tree};

struct PrintSink;

impl InvalidationSink for PrintSink {
    fn invalidate(&mut self, world_rect: Option<Rect>) {
        match world_rect {
            Some(r) => println!("  invalidated {r:?}"),
            None => println!("  invalidated everything"),
        }
    }
}

fn main() {
    let mut tree = Tree::new();
    let canvas = tree.create_node(1200.0, 800.0);
    tree.set_invalidation_sink(canvas, Some(Box::new(PrintSink)));

    println!("building:");
    let frame = tree.insert(Some(canvas), 400.0, 300.0);
    tree.set_position(frame, 100.0, 100.0);
    let header = tree.insert(Some(frame), 400.0, 40.0);
    tree.set_constraints(
        header,
        Constraints {
            horizontal: Constraint::Stretch,
            vertical: Constraint::Min,
        },
    );
    let badge = tree.insert(Some(frame), 24.0, 24.0);
    tree.set_position(badge, 366.0, 10.0);
    tree.set_constraints(badge, Constraints::both(Constraint::Max));

    println!("rotating the frame:");
    tree.set_rotation(frame, 0.1);
    if let Some(world) = tree.world_transform(badge) {
        println!("badge origin in world: {:?}", world * Point::ORIGIN);
    }

    for pt in [Point::new(150.0, 130.0), Point::new(470.0, 160.0), Point::new(900.0, 700.0)] {
        let hit = tree.hit_test(canvas, pt, QueryFilter::PICKING);
        match hit {
            Some(hit) => println!("hit at {pt:?}: {:?} via {:?}", hit.node, hit.path),
            None => println!("hit at {pt:?}: nothing"),
        }
    }

    println!("resizing the frame to 600 x 300:");
    tree.set_size(frame, 600.0, 300.0);
    println!(
        "header size {:?}, badge position {:?}",
        tree.size(header),
        tree.position(badge)
    );

    println!("removing the badge:");
    tree.remove_child(frame, badge);
    tree.dispose(badge);
    println!("badge alive: {}", tree.is_alive(badge));
}
