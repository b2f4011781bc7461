// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental frames: edits request ticks, ticks repaint only the damage,
//! and textures decoded on worker threads repaint when they land.
//!
//! Run:
//! - `RUST_LOG=trace cargo run -p trellis_demos --example incremental_frames`

use std::time::Duration;

use kurbo::Size;
use trellis_render::{
    BatchConfig, FrameScheduler, HeadlessBackend, ManualTicker, SchedulerConfig, Stage,
};
use trellis_resource::{DecodedImage, TextureCache, ThreadExecutor};
use trellis_scene::{NodeId, Paint, Tree};

/// Fire the pending host tick, if any, and run one frame.
fn pump(stage: &mut Stage<ManualTicker>, tree: &mut Tree, gpu: &mut HeadlessBackend, label: &str) {
    if stage.scheduler().borrow_mut().host_mut().fire().is_none() {
        println!("{label}: no tick requested");
        return;
    }
    match stage.tick(tree, gpu) {
        Some(stats) => println!(
            "{label}: {} draw calls, {} quads, {} visited, {} still loading",
            stats.draw_calls, stats.quads, stats.nodes_visited, stats.pending_skipped
        ),
        None => println!("{label}: nothing to draw"),
    }
    for draw in gpu.take_draws() {
        println!("    {:?} x{} scissor={:?}", draw.texture, draw.quads, draw.scissor);
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let mut gpu = HeadlessBackend::new();
    let textures = TextureCache::builder().executor(ThreadExecutor::new()).build(&mut gpu);
    let mut tree = Tree::new();
    let root = tree.create_node(1024.0, 768.0);
    let scheduler = FrameScheduler::new(
        ManualTicker::new(),
        SchedulerConfig::ON_DEMAND,
        Size::new(1024.0, 768.0),
    );
    let mut stage = Stage::new(&mut tree, root, textures, scheduler, BatchConfig::DEFAULT);

    let photo = stage
        .textures()
        .load_or_get("photo", DecodedImage::solid(64, 64, [200, 120, 40, 255]));
    let mut cards: Vec<NodeId> = Vec::new();
    for i in 0..12_u32 {
        let card = tree.insert(Some(root), 60.0, 60.0);
        tree.set_position(card, f64::from(i % 6) * 80.0 + 20.0, f64::from(i / 6) * 80.0 + 20.0);
        let paint = if i % 3 == 0 {
            Paint::textured(photo.clone())
        } else {
            Paint::solid([0.2, 0.5, 0.9, 1.0])
        };
        tree.set_paint(card, paint);
        cards.push(card);
    }
    drop(photo);

    pump(&mut stage, &mut tree, &mut gpu, "first frame");

    // Keep ticking while the decode thread works.
    for attempt in 0..50 {
        if stage.textures().pending_loads() == 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
        pump(&mut stage, &mut tree, &mut gpu, &format!("waiting {attempt}"));
    }
    pump(&mut stage, &mut tree, &mut gpu, "after load");

    tree.set_position(cards[7], 600.0, 400.0);
    pump(&mut stage, &mut tree, &mut gpu, "moved one card");

    pump(&mut stage, &mut tree, &mut gpu, "idle");

    tree.set_visible(cards[0], false);
    tree.set_hovered(cards[1], true);
    pump(&mut stage, &mut tree, &mut gpu, "hid one, hovered one");

    stage.detach(&mut tree);
}
