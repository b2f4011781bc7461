// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Turning the visible part of a scene into batched draw calls.

use kurbo::{Affine, Point, Rect, Size};
use trellis_resource::{TextureCache, TextureState, TileCache, TileSource, Timestamp};
use trellis_scene::util::{checked_inverse, rects_touch, transform_rect_bbox, transform_rect_corners};
use trellis_scene::{NodeId, Paint, Tree};

use crate::backend::GraphicsBackend;
use crate::batch::{BatchConfig, QuadBatcher, ortho};
use crate::damage::DamageRegion;

/// Everything a frame needs besides the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInput {
    /// World-to-screen transform.
    pub view: Affine,
    /// Viewport size in pixels.
    pub viewport: Size,
    /// What to repaint.
    pub damage: DamageRegion,
    /// Stamp for textures drawn this frame.
    pub now: Timestamp,
}

/// Counts from one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draw calls submitted.
    pub draw_calls: usize,
    /// Quads submitted.
    pub quads: usize,
    /// Visible nodes traversed.
    pub nodes_visited: usize,
    /// Nodes and tiles skipped because their texture is still loading.
    pub pending_skipped: usize,
}

/// Reusable per-frame state: the quad batcher and the visible-node buffer.
#[derive(Debug)]
pub struct Renderer {
    batcher: QuadBatcher,
    visible: Vec<NodeId>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(BatchConfig::DEFAULT)
    }
}

impl Renderer {
    /// A renderer with the given batch limits.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            batcher: QuadBatcher::new(config),
            visible: Vec::new(),
        }
    }

    /// Start a frame. Returns `None` when there is nothing to paint.
    ///
    /// Partial damage becomes the scissor rect of every draw call and, mapped
    /// back to world space, the culling rect of the traversal.
    pub fn begin<'a, B: GraphicsBackend + ?Sized>(
        &'a mut self,
        input: &FrameInput,
        backend: &'a mut B,
    ) -> Option<Painter<'a, B>> {
        let screen = input.damage.clip(input.viewport)?;
        let Some(inverse) = checked_inverse(input.view) else {
            tracing::debug!(view = ?input.view, "degenerate view transform; frame skipped");
            return None;
        };
        let scissor = match input.damage {
            DamageRegion::Partial(r) => Some(r),
            DamageRegion::None | DamageRegion::Full => None,
        };
        self.batcher.begin(ortho(input.viewport), scissor);
        Some(Painter {
            batcher: &mut self.batcher,
            visible: &mut self.visible,
            backend,
            view: input.view,
            now: input.now,
            world_clip: transform_rect_bbox(inverse, screen),
            stats: FrameStats::default(),
        })
    }

    /// Draw the subtree of `root` for one frame.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn render<B: GraphicsBackend + ?Sized>(
        &mut self,
        tree: &mut Tree,
        root: NodeId,
        textures: &TextureCache,
        input: &FrameInput,
        backend: &mut B,
    ) -> FrameStats {
        let Some(mut painter) = self.begin(input, backend) else {
            return FrameStats::default();
        };
        painter.draw_tree(tree, root, textures);
        painter.finish()
    }
}

/// An open frame. Layers are drawn in call order; [`finish`](Self::finish)
/// flushes the last batch.
#[derive(Debug)]
pub struct Painter<'a, B: ?Sized> {
    batcher: &'a mut QuadBatcher,
    visible: &'a mut Vec<NodeId>,
    backend: &'a mut B,
    view: Affine,
    now: Timestamp,
    world_clip: Rect,
    stats: FrameStats,
}

impl<B: GraphicsBackend + ?Sized> Painter<'_, B> {
    /// World-space rectangle being repainted.
    pub fn world_clip(&self) -> Rect {
        self.world_clip
    }

    /// Draw the visible tiles of a tile layer.
    ///
    /// Every tile inside the repainted area is stamped with the frame time,
    /// so [`TileCache::sweep`] evicts by when tiles were last drawn.
    pub fn draw_tiles<S: TileSource>(&mut self, tiles: &mut TileCache<S>) {
        let mut drawn = Vec::new();
        for (coord, rect, state) in tiles.visible_textures() {
            if !rects_touch(rect, self.world_clip) {
                continue;
            }
            drawn.push(coord);
            let Some(texture) = state.texture() else {
                self.stats.pending_skipped += 1;
                continue;
            };
            let corners = transform_rect_corners(self.view, rect);
            self.batcher
                .push_quad(&mut *self.backend, texture, corners, Paint::FULL_UV, [1.0; 4]);
        }
        for coord in drawn {
            tiles.mark_used(coord, self.now);
        }
    }

    /// Draw the visible nodes under `root` in paint order.
    ///
    /// Solid fills sample the placeholder so they batch with each other.
    /// Nodes whose texture is still loading are skipped; failed textures draw
    /// the placeholder.
    pub fn draw_tree(&mut self, tree: &mut Tree, root: NodeId, textures: &TextureCache) {
        tree.visit_visible(root, self.world_clip, self.visible);
        self.stats.nodes_visited += self.visible.len();
        let placeholder = textures.placeholder();
        for &id in self.visible.iter() {
            let Some(world) = tree.world_transform(id) else {
                continue;
            };
            let (Some(size), Some(paint)) = (tree.size(id), tree.paint(id)) else {
                continue;
            };
            if !paint.is_visible() {
                continue;
            }
            let (texture, uv) = match &paint.texture {
                None => (placeholder, Paint::FULL_UV),
                Some(tex) => match tex.resolve() {
                    TextureState::Pending => {
                        self.stats.pending_skipped += 1;
                        continue;
                    }
                    TextureState::Ready(ready) => {
                        tex.mark_used(self.now);
                        (ready, paint.uv)
                    }
                    TextureState::Fallback(fallback) => (fallback, Paint::FULL_UV),
                },
            };
            let corners = transform_rect_corners(
                self.view * world,
                Rect::from_origin_size(Point::ORIGIN, size),
            );
            self.batcher
                .push_quad(&mut *self.backend, texture, corners, uv, paint.color);
        }
    }

    /// Flush and return the frame's counts.
    pub fn finish(self) -> FrameStats {
        let batch = self.batcher.finish(self.backend);
        let stats = FrameStats {
            draw_calls: batch.draw_calls,
            quads: batch.quads,
            ..self.stats
        };
        tracing::trace!(?stats, "frame rendered");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use trellis_resource::{DecodedImage, DeferredExecutor, ManualClock, TextureRef};

    struct Fixture {
        gpu: HeadlessBackend,
        cache: TextureCache,
        exec: DeferredExecutor,
        tree: Tree,
        root: NodeId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut gpu = HeadlessBackend::new();
            let exec = DeferredExecutor::new();
            let cache = TextureCache::builder()
                .executor(exec.clone())
                .clock(ManualClock::new(Timestamp(0)))
                .build(&mut gpu);
            let mut tree = Tree::new();
            let root = tree.create_node(1000.0, 1000.0);
            Self {
                gpu,
                cache,
                exec,
                tree,
                root,
            }
        }

        fn texture(&self, name: &str) -> TextureRef {
            self.cache
                .load_or_get(name, DecodedImage::solid(2, 2, [0, 255, 0, 255]))
        }

        fn card(&mut self, x: f64, paint: Paint) -> NodeId {
            let n = self.tree.insert(Some(self.root), 10.0, 10.0);
            self.tree.set_position(n, x, 0.0);
            self.tree.set_paint(n, paint);
            n
        }

        fn load_all(&mut self) {
            self.exec.run_pending();
            self.cache.maintain(&mut self.gpu);
        }

        fn frame(&mut self, damage: DamageRegion) -> FrameStats {
            let input = FrameInput {
                view: Affine::IDENTITY,
                viewport: Size::new(1000.0, 1000.0),
                damage,
                now: Timestamp(5),
            };
            let mut renderer = Renderer::default();
            renderer.render(&mut self.tree, self.root, &self.cache, &input, &mut self.gpu)
        }
    }

    #[test]
    fn same_texture_nodes_share_one_call() {
        let mut f = Fixture::new();
        let tex = f.texture("a");
        for i in 0..20 {
            f.card(f64::from(i) * 20.0, Paint::textured(tex.clone()));
        }
        f.load_all();
        let stats = f.frame(DamageRegion::Full);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.quads, 20);
        assert_eq!(stats.nodes_visited, 21);
    }

    #[test]
    fn interleaved_textures_cost_a_call_each() {
        let mut f = Fixture::new();
        let (a, b) = (f.texture("a"), f.texture("b"));
        for i in 0..6 {
            let tex = if i % 2 == 0 { a.clone() } else { b.clone() };
            f.card(f64::from(i) * 20.0, Paint::textured(tex));
        }
        f.load_all();
        assert_eq!(f.frame(DamageRegion::Full).draw_calls, 6);
    }

    #[test]
    fn solid_fills_batch_on_the_placeholder() {
        let mut f = Fixture::new();
        for i in 0..5 {
            f.card(f64::from(i) * 20.0, Paint::solid([1.0, 0.0, 0.0, 1.0]));
        }
        let stats = f.frame(DamageRegion::Full);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(f.gpu.draws()[0].texture, f.cache.placeholder());
    }

    #[test]
    fn pending_textures_are_skipped_and_failures_use_the_placeholder() {
        let mut f = Fixture::new();
        let pending = f.texture("slow");
        f.card(0.0, Paint::textured(pending));
        let broken = f.cache.load_or_get("broken", "/definitely/missing.png");
        f.card(20.0, Paint::textured(broken));
        // Neither load has run yet.
        assert_eq!(f.exec.pending(), 2);
        let stats = f.frame(DamageRegion::Full);
        assert_eq!((stats.quads, stats.pending_skipped), (0, 2));

        f.load_all();
        let stats = f.frame(DamageRegion::Full);
        assert_eq!(stats.quads, 2);
        assert_eq!(stats.pending_skipped, 0);
        let placeholder_draws = f
            .gpu
            .draws()
            .iter()
            .filter(|d| d.texture == f.cache.placeholder())
            .count();
        assert_eq!(placeholder_draws, 1);
    }

    #[test]
    fn partial_damage_culls_and_scissors() {
        let mut f = Fixture::new();
        f.card(0.0, Paint::solid([1.0; 4]));
        f.card(500.0, Paint::solid([1.0; 4]));
        let damage = DamageRegion::Partial(Rect::new(490.0, 0.0, 520.0, 20.0));
        let stats = f.frame(damage);
        assert_eq!(stats.quads, 1);
        assert_eq!(f.gpu.draws()[0].scissor, Some(Rect::new(490.0, 0.0, 520.0, 20.0)));
        assert_eq!(f.frame(DamageRegion::None), FrameStats::default());
    }

    #[test]
    fn drawn_textures_are_touched() {
        let mut f = Fixture::new();
        let tex = f.texture("a");
        f.card(0.0, Paint::textured(tex.clone()));
        f.load_all();
        f.frame(DamageRegion::Full);
        assert_eq!(f.cache.last_used(tex.key()), Some(Timestamp(5)));
    }
}
