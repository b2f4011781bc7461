// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Streaming a tile pyramid while panning and zooming, with an LRU budget.
//!
//! Run:
//! - `cargo run -p trellis_demos --example tile_streaming`

use kurbo::Rect;
use trellis_render::HeadlessBackend;
use trellis_resource::{
    DecodedImage, InlineExecutor, SourceDescriptor, TextureCache, TileCache, TileCacheConfig,
    TileCoord, TileGrid, Timestamp,
};

type Source = fn(TileCoord) -> SourceDescriptor;

fn tile_source(coord: TileCoord) -> SourceDescriptor {
    let shade = u8::try_from((coord.x ^ coord.y) & 0xff).unwrap_or(0);
    SourceDescriptor::Raster(DecodedImage::solid(8, 8, [shade, shade, 255 - shade, 255]))
}

fn main() {
    tracing_subscriber::fmt::init();

    let mut gpu = HeadlessBackend::new();
    let textures = TextureCache::builder().executor(InlineExecutor).build(&mut gpu);
    let mut tiles = TileCache::new(
        textures.clone(),
        TileGrid::DEFAULT,
        tile_source as Source,
        TileCacheConfig { max_entries: 64 },
    );

    let viewport = (1280.0, 720.0);
    let mut frame = 0_u64;
    let mut view = |x: f64, y: f64, zoom: f64, tiles: &mut TileCache<Source>| {
        frame += 1;
        let world = Rect::new(x, y, x + viewport.0 / zoom, y + viewport.1 / zoom);
        match tiles.update_visible(world, zoom, Timestamp(frame)) {
            Ok(visible) => {
                let n = visible.len();
                let evicted = tiles.sweep();
                textures.maintain(&mut gpu);
                println!(
                    "frame {frame}: zoom {zoom} at ({x}, {y}) -> {n} visible, {} cached, {evicted} evicted, {} GPU textures",
                    tiles.len(),
                    gpu.live_textures()
                );
            }
            Err(err) => println!("frame {frame}: {err}"),
        }
    };

    for step in 0..8 {
        view(f64::from(step) * 400.0, 0.0, 1.0, &mut tiles);
    }
    view(0.0, 0.0, 4.0, &mut tiles);
    view(0.0, 0.0, 0.25, &mut tiles);
    // Far zoomed out over a huge area, past the per-frame tile limit.
    view(-1.0e7, -1.0e7, 1.0e-9, &mut tiles);
}
