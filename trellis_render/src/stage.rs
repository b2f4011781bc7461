// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The frame driver: texture maintenance, scheduling, and rendering per tick.

use kurbo::{Affine, Size};
use trellis_resource::TextureCache;
use trellis_scene::{NodeId, Tree};

use crate::backend::GraphicsBackend;
use crate::batch::BatchConfig;
use crate::renderer::{FrameInput, FrameStats, Painter, Renderer};
use crate::scheduler::{FrameScheduler, HostTicker, SharedScheduler};

/// Connects a scene root, a texture cache, and a scheduler.
///
/// The host calls [`tick`](Self::tick) whenever a tick it was asked for fires.
/// Each tick applies finished texture loads, then renders the pending damage,
/// then lets the scheduler decide whether another tick is needed.
#[derive(Debug)]
pub struct Stage<H> {
    root: NodeId,
    textures: TextureCache,
    scheduler: SharedScheduler<H>,
    renderer: Renderer,
}

impl<H: HostTicker + 'static> Stage<H> {
    /// Attach to `root`: the scheduler becomes its invalidation sink and a
    /// first full frame is requested.
    pub fn new(
        tree: &mut Tree,
        root: NodeId,
        textures: TextureCache,
        scheduler: FrameScheduler<H>,
        batch: BatchConfig,
    ) -> Self {
        let scheduler = SharedScheduler::new(scheduler);
        let previous = tree.set_invalidation_sink(root, Some(Box::new(scheduler.clone())));
        if previous.is_some() {
            tracing::debug!(?root, "replaced an existing invalidation sink");
        }
        scheduler.borrow_mut().invalidate(None);
        Self {
            root,
            textures,
            scheduler,
            renderer: Renderer::new(batch),
        }
    }

    /// The scene root being drawn.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The texture cache.
    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// The shared scheduler.
    pub fn scheduler(&self) -> &SharedScheduler<H> {
        &self.scheduler
    }

    /// Pan or zoom.
    pub fn set_view(&self, view: Affine) {
        self.scheduler.borrow_mut().set_view(view);
    }

    /// Resize the viewport.
    pub fn set_viewport(&self, viewport: Size) {
        self.scheduler.borrow_mut().set_viewport(viewport);
    }

    /// Run one frame. Returns `None` when no frame was pending.
    pub fn tick<B: GraphicsBackend + ?Sized>(
        &mut self,
        tree: &mut Tree,
        backend: &mut B,
    ) -> Option<FrameStats> {
        self.tick_with(tree, backend, |_| {})
    }

    /// Run one frame, letting `underlay` draw (e.g. tile layers) before the tree.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn tick_with<B, F>(&mut self, tree: &mut Tree, backend: &mut B, underlay: F) -> Option<FrameStats>
    where
        B: GraphicsBackend + ?Sized,
        F: FnOnce(&mut Painter<'_, B>),
    {
        let report = self.textures.maintain(backend);
        if report.changed_appearance() {
            self.scheduler.borrow_mut().invalidate(None);
        }
        let frame = self.scheduler.borrow_mut().begin_frame();
        let stats = frame.map(|damage| {
            let input = {
                let scheduler = self.scheduler.borrow();
                FrameInput {
                    view: scheduler.view(),
                    viewport: scheduler.viewport(),
                    damage,
                    now: self.textures.now(),
                }
            };
            let stats = match self.renderer.begin(&input, backend) {
                Some(mut painter) => {
                    underlay(&mut painter);
                    painter.draw_tree(tree, self.root, &self.textures);
                    painter.finish()
                }
                None => FrameStats::default(),
            };
            self.scheduler.borrow_mut().end_frame();
            stats
        });
        if self.textures.pending_loads() > 0 {
            // Keep ticking until in-flight loads land.
            self.scheduler.borrow_mut().poll();
        }
        stats
    }

    /// Detach from the tree and withdraw any outstanding tick.
    pub fn detach(self, tree: &mut Tree) {
        tree.set_invalidation_sink(self.root, None);
        self.scheduler.borrow_mut().cancel();
    }
}
