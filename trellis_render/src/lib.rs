// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Render: incremental frames for a Trellis scene.
//!
//! - [`FrameScheduler`] coalesces invalidations into host ticks
//!   (`Clean → PendingFrame → InFrame → Clean`) and accumulates a screen-space
//!   [`DirtyRegion`].
//! - [`Renderer`] walks the visible nodes in paint order and feeds a
//!   [`QuadBatcher`], which emits one [`DrawCall`] per run of quads sharing a
//!   texture.
//! - [`Stage`] ties a scene root, a [`TextureCache`](trellis_resource::TextureCache),
//!   and a scheduler together and runs one frame per host tick.
//!
//! Backends implement [`GraphicsBackend`]. [`HeadlessBackend`] records draw
//! calls instead of drawing, for tests and tools.
//!
//! ## Minimal usage
//!
//! ```
//! use kurbo::Size;
//! use trellis_render::{
//!     BatchConfig, FrameScheduler, HeadlessBackend, ManualTicker, SchedulerConfig, Stage,
//! };
//! use trellis_resource::{InlineExecutor, TextureCache};
//! use trellis_scene::{Paint, Tree};
//!
//! let mut gpu = HeadlessBackend::new();
//! let textures = TextureCache::builder().executor(InlineExecutor).build(&mut gpu);
//! let mut tree = Tree::new();
//! let root = tree.create_node(800.0, 600.0);
//! let scheduler = FrameScheduler::new(
//!     ManualTicker::new(),
//!     SchedulerConfig::ON_DEMAND,
//!     Size::new(800.0, 600.0),
//! );
//! let mut stage = Stage::new(&mut tree, root, textures, scheduler, BatchConfig::DEFAULT);
//!
//! for i in 0..10 {
//!     let card = tree.insert(Some(root), 40.0, 40.0);
//!     tree.set_position(card, f64::from(i) * 50.0, 10.0);
//!     tree.set_paint(card, Paint::solid([0.2, 0.4, 0.8, 1.0]));
//! }
//!
//! let stats = stage.tick(&mut tree, &mut gpu).unwrap();
//! assert_eq!((stats.draw_calls, stats.quads), (1, 10));
//! ```

mod backend;
mod batch;
mod damage;
mod renderer;
mod scheduler;
mod stage;

pub use backend::{GraphicsBackend, HeadlessBackend, RecordedDraw};
pub use batch::{BatchConfig, BatchStats, DrawCall, QuadBatcher, Vertex, ortho};
pub use damage::{DamageRegion, DirtyRegion, DirtyRegionConfig};
pub use renderer::{FrameInput, FrameStats, Painter, Renderer};
pub use scheduler::{
    FrameScheduler, FrameState, HostTicker, ManualTicker, SchedulerConfig, SharedScheduler,
    TickHandle,
};
pub use stage::Stage;
