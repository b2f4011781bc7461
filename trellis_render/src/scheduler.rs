// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental frame scheduling.
//!
//! The [`FrameScheduler`] turns invalidations into host tick requests. It asks
//! the host for at most one tick at a time and keeps the damage of invalidations
//! that arrive mid-frame for the following frame.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use kurbo::{Affine, Rect, Size};
use trellis_scene::InvalidationSink;
use trellis_scene::util::transform_rect_bbox;

use crate::damage::{DamageRegion, DirtyRegion, DirtyRegionConfig};

/// Identifies a tick requested from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickHandle(pub u64);

/// The host's frame callback mechanism, e.g. `requestAnimationFrame` or a
/// display link.
pub trait HostTicker {
    /// Ask for one callback. The host then calls the stage's tick.
    fn request_tick(&mut self) -> TickHandle;
    /// Withdraw a request that has not fired yet.
    fn cancel_tick(&mut self, handle: TickHandle);
}

/// Where the scheduler is in its frame cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameState {
    /// Nothing to draw and no tick requested.
    Clean,
    /// A tick was requested and damage is waiting for it.
    PendingFrame,
    /// Between [`FrameScheduler::begin_frame`] and [`FrameScheduler::end_frame`].
    InFrame,
}

/// Configuration for the [`FrameScheduler`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Request a full frame after every frame, for animation or profiling.
    pub always_render: bool,
    /// Dirty region tuning.
    pub dirty: DirtyRegionConfig,
}

impl SchedulerConfig {
    /// Render only on invalidation.
    pub const ON_DEMAND: Self = Self {
        always_render: false,
        dirty: DirtyRegionConfig::DEFAULT,
    };

    /// Render every tick.
    pub const CONTINUOUS: Self = Self {
        always_render: true,
        dirty: DirtyRegionConfig::DEFAULT,
    };
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::ON_DEMAND
    }
}

/// Coalesces invalidations into frames.
///
/// ```text
/// Clean --invalidate--> PendingFrame --begin_frame--> InFrame --end_frame--> Clean
///                                                        |
///                        (damage arrived mid-frame) <----+--> PendingFrame
/// ```
///
/// World-space rects are mapped to screen space through the current view
/// transform as they arrive.
#[derive(Debug)]
pub struct FrameScheduler<H> {
    host: H,
    config: SchedulerConfig,
    state: FrameState,
    pending_tick: Option<TickHandle>,
    view: Affine,
    current: DirtyRegion,
    next: DirtyRegion,
    frames: u64,
}

impl<H: HostTicker> FrameScheduler<H> {
    /// A clean scheduler over a viewport of `viewport` pixels.
    pub fn new(host: H, config: SchedulerConfig, viewport: Size) -> Self {
        Self {
            host,
            config,
            state: FrameState::Clean,
            pending_tick: None,
            view: Affine::IDENTITY,
            current: DirtyRegion::new(config.dirty, viewport),
            next: DirtyRegion::new(config.dirty, viewport),
            frames: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// World-to-screen transform.
    pub fn view(&self) -> Affine {
        self.view
    }

    /// Viewport size in pixels.
    pub fn viewport(&self) -> Size {
        self.current.viewport()
    }

    /// Number of frames completed.
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// The host ticker.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host ticker, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Damage waiting for the next frame.
    pub fn pending_damage(&self) -> DamageRegion {
        self.current.peek()
    }

    /// Request a repaint of `world_rect`, or of everything when `None`.
    pub fn invalidate(&mut self, world_rect: Option<Rect>) {
        let screen = world_rect.map(|r| transform_rect_bbox(self.view, r));
        self.invalidate_screen(screen);
    }

    /// Request a repaint of a screen-space rect, or of everything when `None`.
    pub fn invalidate_screen(&mut self, screen_rect: Option<Rect>) {
        match self.state {
            FrameState::Clean => {
                self.current.add(screen_rect);
                if !self.current.is_empty() {
                    self.request();
                }
            }
            FrameState::PendingFrame => self.current.add(screen_rect),
            FrameState::InFrame => self.next.add(screen_rect),
        }
    }

    /// Ask for a tick without adding damage, so the host keeps polling (e.g.
    /// while texture loads are in flight).
    pub fn poll(&mut self) {
        if self.state == FrameState::Clean {
            self.request();
        }
    }

    /// Change the world-to-screen transform. Everything is repainted.
    pub fn set_view(&mut self, view: Affine) {
        if self.view != view {
            self.view = view;
            self.invalidate_screen(None);
        }
    }

    /// Change the viewport size. Everything is repainted.
    pub fn set_viewport(&mut self, viewport: Size) {
        if self.viewport() != viewport {
            self.current.set_viewport(viewport);
            self.next.set_viewport(viewport);
            self.next.take();
            self.invalidate_screen(None);
        }
    }

    /// Start the frame for the tick the host just delivered.
    ///
    /// Returns the damage to paint, or `None` when no frame was pending.
    pub fn begin_frame(&mut self) -> Option<DamageRegion> {
        if self.state != FrameState::PendingFrame {
            tracing::debug!(state = ?self.state, "begin_frame without a pending frame");
            return None;
        }
        self.pending_tick = None;
        self.state = FrameState::InFrame;
        Some(self.current.take())
    }

    /// Finish the frame. Requests another tick if damage arrived meanwhile or
    /// when rendering continuously.
    pub fn end_frame(&mut self) {
        if self.state != FrameState::InFrame {
            tracing::debug!(state = ?self.state, "end_frame outside a frame");
            return;
        }
        self.frames += 1;
        self.state = FrameState::Clean;
        self.current.absorb(&mut self.next);
        if self.config.always_render {
            self.current.mark_full();
        }
        if !self.current.is_empty() {
            self.request();
        }
    }

    /// Drop pending damage and withdraw any outstanding tick request.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending_tick.take() {
            self.host.cancel_tick(handle);
        }
        self.current.take();
        self.next.take();
        self.state = FrameState::Clean;
    }

    fn request(&mut self) {
        self.pending_tick = Some(self.host.request_tick());
        self.state = FrameState::PendingFrame;
    }
}

/// A [`FrameScheduler`] shared between the stage and the scene root.
///
/// Install a clone as the root's [`InvalidationSink`] so that every change in
/// the tree reaches the scheduler.
#[derive(Debug)]
pub struct SharedScheduler<H>(Rc<RefCell<FrameScheduler<H>>>);

impl<H> Clone for SharedScheduler<H> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<H: HostTicker> SharedScheduler<H> {
    /// Share `scheduler`.
    pub fn new(scheduler: FrameScheduler<H>) -> Self {
        Self(Rc::new(RefCell::new(scheduler)))
    }

    /// Borrow the scheduler.
    pub fn borrow(&self) -> Ref<'_, FrameScheduler<H>> {
        self.0.borrow()
    }

    /// Borrow the scheduler mutably.
    pub fn borrow_mut(&self) -> RefMut<'_, FrameScheduler<H>> {
        self.0.borrow_mut()
    }
}

impl<H: HostTicker> InvalidationSink for SharedScheduler<H> {
    fn invalidate(&mut self, world_rect: Option<Rect>) {
        match self.0.try_borrow_mut() {
            Ok(mut scheduler) => scheduler.invalidate(world_rect),
            Err(_) => tracing::warn!("invalidation while the scheduler is borrowed; dropped"),
        }
    }
}

/// A [`HostTicker`] driven by hand: tests, headless runs, and simple loops.
#[derive(Clone, Debug, Default)]
pub struct ManualTicker {
    next: u64,
    pending: Option<TickHandle>,
    requests: u64,
    cancels: u64,
}

impl ManualTicker {
    /// A ticker with nothing requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of tick requests.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Total number of cancelled requests.
    pub fn cancels(&self) -> u64 {
        self.cancels
    }

    /// Whether a tick is waiting to fire.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Fire the waiting tick, if any.
    pub fn fire(&mut self) -> Option<TickHandle> {
        self.pending.take()
    }
}

impl HostTicker for ManualTicker {
    fn request_tick(&mut self) -> TickHandle {
        self.next += 1;
        self.requests += 1;
        let handle = TickHandle(self.next);
        self.pending = Some(handle);
        handle
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
            self.cancels += 1;
        }
    }
}
