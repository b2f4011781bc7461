// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A streamed tile layer drawn under the scene through the stage.

use std::rc::Rc;

use kurbo::{Affine, Rect, Size};
use trellis_render::{
    BatchConfig, FrameScheduler, HeadlessBackend, ManualTicker, SchedulerConfig, Stage,
};
use trellis_resource::{
    DecodedImage, DeferredExecutor, ManualClock, SourceDescriptor, TextureCache, TileCache,
    TileCacheConfig, TileCoord, TileGrid, Timestamp,
};
use trellis_scene::{Paint, Tree};

fn tile_pixels(coord: TileCoord) -> SourceDescriptor {
    let shade = u8::try_from(coord.x + coord.y).unwrap_or(0);
    SourceDescriptor::Raster(DecodedImage::solid(2, 2, [shade, shade, shade, 255]))
}

#[test]
fn tiles_stream_in_under_the_scene() {
    let mut gpu = HeadlessBackend::new();
    let exec = DeferredExecutor::new();
    let clock = Rc::new(ManualClock::new(Timestamp(0)));
    let textures = TextureCache::builder()
        .executor(exec.clone())
        .clock(Rc::clone(&clock))
        .build(&mut gpu);
    let mut tiles = TileCache::new(
        textures.clone(),
        TileGrid::DEFAULT,
        tile_pixels,
        TileCacheConfig::default(),
    );

    let mut tree = Tree::new();
    let root = tree.create_node(512.0, 512.0);
    let card = tree.insert(Some(root), 64.0, 64.0);
    tree.set_paint(card, Paint::solid([1.0, 0.0, 0.0, 1.0]));

    let viewport = Size::new(512.0, 512.0);
    let scheduler = FrameScheduler::new(ManualTicker::new(), SchedulerConfig::ON_DEMAND, viewport);
    let mut stage = Stage::new(&mut tree, root, textures, scheduler, BatchConfig::DEFAULT);
    stage.set_view(Affine::IDENTITY);

    // 512 x 512 at zoom 1 covers 2 x 2 level-0 tiles.
    let world = Rect::new(0.0, 0.0, 511.0, 511.0);
    let visible = tiles.update_visible(world, 1.0, Timestamp(0)).unwrap().len();
    assert_eq!(visible, 4);

    let stats = stage
        .tick_with(&mut tree, &mut gpu, |painter| painter.draw_tiles(&mut tiles))
        .unwrap();
    assert_eq!(stats.pending_skipped, 4);
    assert_eq!(stats.quads, 1);

    exec.run_pending();
    clock.advance(40);
    let stats = stage
        .tick_with(&mut tree, &mut gpu, |painter| painter.draw_tiles(&mut tiles))
        .unwrap();
    // Four tile textures, then the card on the placeholder.
    assert_eq!(stats.quads, 5);
    assert_eq!(stats.draw_calls, 5);
    let last = gpu.draws().last().unwrap();
    assert_eq!(last.texture, stage.textures().placeholder());

    // Drawing refreshed recency without another visibility pass.
    for coord in [TileCoord::new(0, 0, 0), TileCoord::new(1, 1, 0)] {
        assert_eq!(tiles.last_used(coord), Some(Timestamp(40)));
    }
}
