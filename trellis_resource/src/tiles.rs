// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Streaming tile layer on top of [`TextureCache`].
//!
//! A [`TileGrid`] maps the visible world rectangle and zoom to tile
//! coordinates. A [`TileCache`] keeps a [`TextureRef`] per tile, cancels loads
//! for tiles that scrolled away before they arrived, and evicts the least
//! recently used tiles once it holds more than its budget.

use std::collections::{HashMap, HashSet};

use kurbo::Rect;

use crate::cache::{TextureCache, TextureRef, TextureState};
use crate::clock::Timestamp;
use crate::decode::SourceDescriptor;
use crate::error::TileError;
use crate::key::TextureKey;

/// Address of one tile: column, row, and zoom level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Column; tile `x` spans `[x * size, (x + 1) * size)` in world units.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Zoom level; each level halves the tile's world size.
    pub level: i32,
}

impl TileCoord {
    /// Create a tile coordinate.
    pub const fn new(x: i32, y: i32, level: i32) -> Self {
        Self { x, y, level }
    }
}

/// Partition of the world into square tiles per zoom level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileGrid {
    /// World size of a level 0 tile.
    pub tile_size: f64,
    /// Lowest level used when zoomed far out.
    pub min_level: i32,
    /// Highest level used when zoomed far in.
    pub max_level: i32,
    /// More visible tiles than this is refused with [`TileError::TooManyTiles`].
    pub max_visible_tiles: usize,
}

impl TileGrid {
    /// 256 unit tiles, levels -8..=20, at most 1024 tiles per frame.
    pub const DEFAULT: Self = Self {
        tile_size: 256.0,
        min_level: -8,
        max_level: 20,
        max_visible_tiles: 1024,
    };

    /// The level whose tiles are drawn closest to `tile_size` pixels at `zoom`.
    pub fn level_for_zoom(&self, zoom: f64) -> i32 {
        if !(zoom.is_finite() && zoom > 0.0) {
            return self.min_level;
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "float to int casts saturate; the result is clamped anyway"
        )]
        let level = zoom.log2().floor() as i32;
        level.clamp(self.min_level, self.max_level)
    }

    /// World size of one tile at `level`.
    pub fn tile_world_size(&self, level: i32) -> f64 {
        self.tile_size / 2_f64.powi(level)
    }

    /// World rectangle covered by `coord`.
    pub fn tile_rect(&self, coord: TileCoord) -> Rect {
        let s = self.tile_world_size(coord.level);
        let x = f64::from(coord.x) * s;
        let y = f64::from(coord.y) * s;
        Rect::new(x, y, x + s, y + s)
    }

    /// Tiles covering `world` at `zoom`, row-major.
    pub fn visible_tiles(&self, world: Rect, zoom: f64) -> Result<Vec<TileCoord>, TileError> {
        let world = world.abs();
        if world.is_zero_area() || !world.is_finite() {
            return Ok(Vec::new());
        }
        let level = self.level_for_zoom(zoom);
        let s = self.tile_world_size(level);
        let (fx0, fy0, fx1, fy1) = (
            (world.x0 / s).floor(),
            (world.y0 / s).floor(),
            (world.x1 / s).ceil(),
            (world.y1 / s).ceil(),
        );
        let span = (fx1 - fx0) * (fy1 - fy0);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "float to int casts saturate; anything past the limit is refused"
        )]
        let requested = span as usize;
        if span > self.max_visible_tiles as f64 {
            return Err(TileError::TooManyTiles {
                requested,
                limit: self.max_visible_tiles,
            });
        }
        let addressable = f64::from(i32::MIN)..=f64::from(i32::MAX);
        if ![fx0, fy0, fx1, fy1].iter().all(|v| addressable.contains(v)) {
            return Err(TileError::OutOfRange { level });
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "checked against the i32 range above"
        )]
        let (x0, y0, x1, y1) = (fx0 as i32, fy0 as i32, fx1 as i32, fy1 as i32);
        let mut out = Vec::with_capacity(requested);
        for y in y0..y1 {
            for x in x0..x1 {
                out.push(TileCoord::new(x, y, level));
            }
        }
        Ok(out)
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Supplies the texture key and source for a tile.
pub trait TileSource {
    /// Where the tile's pixels come from.
    fn source(&self, coord: TileCoord) -> SourceDescriptor;

    /// Cache key for the tile. Tiles with equal keys share a texture.
    fn key(&self, coord: TileCoord) -> TextureKey {
        TextureKey::from(format!("tile:{}/{}/{}", coord.level, coord.x, coord.y))
    }
}

impl<F: Fn(TileCoord) -> SourceDescriptor> TileSource for F {
    fn source(&self, coord: TileCoord) -> SourceDescriptor {
        self(coord)
    }
}

/// Budget for [`TileCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileCacheConfig {
    /// Tiles kept before [`TileCache::sweep`] starts evicting.
    pub max_entries: usize,
}

impl TileCacheConfig {
    /// Keep up to 256 tiles.
    pub const DEFAULT: Self = Self { max_entries: 256 };
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug)]
struct Tile {
    texture: TextureRef,
    last_used: Timestamp,
    missed: bool,
}

/// LRU cache of tile textures.
pub struct TileCache<S> {
    textures: TextureCache,
    grid: TileGrid,
    source: S,
    config: TileCacheConfig,
    tiles: HashMap<TileCoord, Tile>,
    visible: Vec<TileCoord>,
}

impl<S: TileSource> TileCache<S> {
    /// Create an empty tile cache loading through `textures`.
    pub fn new(textures: TextureCache, grid: TileGrid, source: S, config: TileCacheConfig) -> Self {
        Self {
            textures,
            grid,
            source,
            config,
            tiles: HashMap::new(),
            visible: Vec::new(),
        }
    }

    /// The grid tiles are laid out on.
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// The texture cache tiles load through.
    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// Number of cached tiles, loaded or not.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether no tiles are cached.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Whether `coord` has a cached entry.
    pub fn contains(&self, coord: TileCoord) -> bool {
        self.tiles.contains_key(&coord)
    }

    /// Tiles from the last successful [`update_visible`](Self::update_visible).
    pub fn visible(&self) -> &[TileCoord] {
        &self.visible
    }

    /// Make sure `coord` is cached or loading, and stamp it as used at `now`.
    pub fn request(&mut self, coord: TileCoord, now: Timestamp) -> &TextureRef {
        let (textures, source) = (&self.textures, &self.source);
        let tile = self.tiles.entry(coord).or_insert_with(|| Tile {
            texture: textures.load_or_get(source.key(coord), source.source(coord)),
            last_used: now,
            missed: false,
        });
        tile.last_used = now;
        tile.missed = false;
        tile.texture.mark_used(now);
        &tile.texture
    }

    /// Evaluate which tiles cover `world` at `zoom`.
    ///
    /// Newly visible tiles start loading. A tile that is still loading and was
    /// not visible in this evaluation is marked; if it is still not visible at
    /// the next evaluation its load is cancelled. Loaded tiles stay cached for
    /// [`sweep`](Self::sweep) to decide.
    ///
    /// Returns [`TileError::TooManyTiles`] or [`TileError::OutOfRange`] without
    /// touching the cache when the rectangle cannot be tiled; callers skip tile
    /// work for that frame.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn update_visible(
        &mut self,
        world: Rect,
        zoom: f64,
        now: Timestamp,
    ) -> Result<&[TileCoord], TileError> {
        let coords = match self.grid.visible_tiles(world, zoom) {
            Ok(coords) => coords,
            Err(err) => {
                tracing::warn!(%err, "skipping tile update");
                return Err(err);
            }
        };
        for &coord in &coords {
            self.request(coord, now);
        }
        let visible: HashSet<TileCoord> = coords.iter().copied().collect();
        let mut cancelled = 0_usize;
        self.tiles.retain(|coord, tile| {
            if visible.contains(coord) || tile.texture.resolve() != TextureState::Pending {
                return true;
            }
            if tile.missed {
                cancelled += 1;
                return false;
            }
            tile.missed = true;
            true
        });
        if cancelled > 0 {
            tracing::debug!(cancelled, "cancelled off-screen tile loads");
        }
        self.visible = coords;
        Ok(&self.visible)
    }

    /// Evict least-recently-used tiles when over budget.
    ///
    /// Eviction goes down to `max_entries - max_entries / 16` so that a cache
    /// hovering at its limit is not swept every frame. Tiles visible in the
    /// last evaluation are never evicted. Returns the number of tiles evicted;
    /// their textures are freed on the next [`TextureCache::maintain`].
    pub fn sweep(&mut self) -> usize {
        let max = self.config.max_entries;
        if self.tiles.len() <= max {
            return 0;
        }
        let target = max - max / 16;
        let excess = self.tiles.len() - target;
        let visible: HashSet<TileCoord> = self.visible.iter().copied().collect();
        let mut candidates: Vec<(Timestamp, TileCoord)> = self
            .tiles
            .iter()
            .filter(|(coord, _)| !visible.contains(coord))
            .map(|(coord, tile)| (tile.last_used, *coord))
            .collect();
        candidates.sort_unstable();
        let mut evicted = 0;
        for (_, coord) in candidates.into_iter().take(excess) {
            self.tiles.remove(&coord);
            evicted += 1;
        }
        tracing::debug!(evicted, remaining = self.tiles.len(), "tile cache swept");
        evicted
    }

    /// Stamp `coord` as used at `now`, for LRU eviction. Unknown tiles are ignored.
    pub fn mark_used(&mut self, coord: TileCoord, now: Timestamp) {
        if let Some(tile) = self.tiles.get_mut(&coord) {
            tile.last_used = tile.last_used.max(now);
            tile.texture.mark_used(now);
        }
    }

    /// When `coord` was last requested or drawn.
    pub fn last_used(&self, coord: TileCoord) -> Option<Timestamp> {
        self.tiles.get(&coord).map(|t| t.last_used)
    }

    /// Visible tiles with their world rectangles and current texture state.
    pub fn visible_textures(&self) -> impl Iterator<Item = (TileCoord, Rect, TextureState)> + '_ {
        self.visible.iter().filter_map(|&coord| {
            let tile = self.tiles.get(&coord)?;
            Some((coord, self.grid.tile_rect(coord), tile.texture.resolve()))
        })
    }
}

impl<S> core::fmt::Debug for TileCache<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileCache")
            .field("grid", &self.grid)
            .field("config", &self.config)
            .field("tiles", &self.tiles.len())
            .field("visible", &self.visible.len())
            .finish_non_exhaustive()
    }
}
