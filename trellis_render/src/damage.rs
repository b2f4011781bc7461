// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Screen-space dirty region accumulation.

use kurbo::{Point, Rect, Size};

/// Tuning for [`DirtyRegion`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirtyRegionConfig {
    /// Pixels added on every side of each partial rect, covering antialiasing.
    pub padding: f64,
    /// More partial invalidations than this in one frame become a full repaint.
    pub max_partial_invalidations: usize,
    /// A union covering at least this fraction of the viewport becomes a full repaint.
    pub full_area_fraction: f64,
}

impl DirtyRegionConfig {
    /// Default tuning.
    pub const DEFAULT: Self = Self {
        padding: 2.0,
        max_partial_invalidations: 8,
        full_area_fraction: 0.5,
    };
}

impl Default for DirtyRegionConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What needs repainting this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DamageRegion {
    /// Nothing changed.
    None,
    /// Only this screen rectangle.
    Partial(Rect),
    /// The whole viewport.
    Full,
}

impl DamageRegion {
    /// Whether there is nothing to paint.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Screen rectangle to repaint within `viewport`.
    pub fn clip(&self, viewport: Size) -> Option<Rect> {
        match *self {
            Self::None => None,
            Self::Partial(r) => Some(r),
            Self::Full => Some(Rect::from_origin_size(Point::ORIGIN, viewport)),
        }
    }
}

/// Accumulates screen-space invalidations between frames.
///
/// A full invalidation absorbs every partial one. Partial rects are padded and
/// unioned into a single rectangle, which is upgraded to a full repaint when
/// too many arrive or when it covers most of the viewport.
#[derive(Clone, Debug)]
pub struct DirtyRegion {
    config: DirtyRegionConfig,
    viewport: Size,
    full: bool,
    rect: Option<Rect>,
    partials: usize,
}

impl DirtyRegion {
    /// An empty region over a viewport of `viewport` pixels.
    pub fn new(config: DirtyRegionConfig, viewport: Size) -> Self {
        Self {
            config,
            viewport,
            full: false,
            rect: None,
            partials: 0,
        }
    }

    /// Current viewport size.
    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Change the viewport. A different size dirties everything.
    pub fn set_viewport(&mut self, viewport: Size) {
        if self.viewport != viewport {
            self.viewport = viewport;
            self.mark_full();
        }
    }

    /// Add a screen rectangle, or everything when `None`.
    pub fn add(&mut self, screen_rect: Option<Rect>) {
        if self.full {
            return;
        }
        let Some(r) = screen_rect else {
            self.mark_full();
            return;
        };
        if !(r.x0.is_finite() && r.y0.is_finite() && r.x1.is_finite() && r.y1.is_finite()) {
            self.mark_full();
            return;
        }
        let padded = r.abs().inflate(self.config.padding, self.config.padding);
        self.add_padded(padded);
    }

    fn add_padded(&mut self, rect: Rect) {
        let screen = Rect::from_origin_size(Point::ORIGIN, self.viewport);
        let clipped = rect.intersect(screen);
        if clipped.width() <= 0.0 || clipped.height() <= 0.0 {
            return;
        }
        self.partials += 1;
        if self.partials > self.config.max_partial_invalidations {
            self.mark_full();
            return;
        }
        let union = self.rect.map_or(clipped, |u| u.union(clipped));
        if union.area() >= self.config.full_area_fraction * screen.area() {
            self.mark_full();
            return;
        }
        self.rect = Some(union);
    }

    /// Dirty the whole viewport.
    pub fn mark_full(&mut self) {
        self.full = true;
        self.rect = None;
    }

    /// Whether nothing has been added since the last [`take`](Self::take).
    pub fn is_empty(&self) -> bool {
        !self.full && self.rect.is_none()
    }

    /// The accumulated damage without clearing it.
    pub fn peek(&self) -> DamageRegion {
        if self.full {
            DamageRegion::Full
        } else {
            self.rect.map_or(DamageRegion::None, DamageRegion::Partial)
        }
    }

    /// The accumulated damage; the region is empty afterwards.
    pub fn take(&mut self) -> DamageRegion {
        let damage = self.peek();
        self.full = false;
        self.rect = None;
        self.partials = 0;
        damage
    }

    /// Add everything `other` holds.
    pub(crate) fn absorb(&mut self, other: &mut Self) {
        match other.take() {
            DamageRegion::None => {}
            DamageRegion::Partial(r) if !self.full => self.add_padded(r),
            DamageRegion::Partial(_) => {}
            DamageRegion::Full => self.mark_full(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> DirtyRegion {
        DirtyRegion::new(DirtyRegionConfig::DEFAULT, Size::new(1000.0, 1000.0))
    }

    #[test]
    fn partials_are_padded_and_unioned() {
        let mut d = region();
        d.add(Some(Rect::new(10.0, 10.0, 20.0, 20.0)));
        d.add(Some(Rect::new(100.0, 10.0, 110.0, 20.0)));
        assert_eq!(d.take(), DamageRegion::Partial(Rect::new(8.0, 8.0, 112.0, 22.0)));
        assert!(d.is_empty());
    }

    #[test]
    fn full_absorbs_partials() {
        let mut d = region();
        d.add(None);
        d.add(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
        assert_eq!(d.take(), DamageRegion::Full);
    }

    #[test]
    fn too_many_partials_become_full() {
        let mut d = region();
        for i in 0..8 {
            d.add(Some(Rect::new(f64::from(i), 0.0, f64::from(i) + 1.0, 1.0)));
        }
        assert!(matches!(d.peek(), DamageRegion::Partial(_)));
        d.add(Some(Rect::new(50.0, 50.0, 51.0, 51.0)));
        assert_eq!(d.take(), DamageRegion::Full);
    }

    #[test]
    fn large_union_becomes_full() {
        let mut d = region();
        d.add(Some(Rect::new(0.0, 0.0, 600.0, 400.0)));
        assert!(matches!(d.peek(), DamageRegion::Partial(_)));
        d.add(Some(Rect::new(0.0, 400.0, 600.0, 900.0)));
        assert_eq!(d.take(), DamageRegion::Full);
    }

    #[test]
    fn offscreen_rects_are_ignored_and_resize_is_full() {
        let mut d = region();
        d.add(Some(Rect::new(2000.0, 2000.0, 2010.0, 2010.0)));
        assert!(d.is_empty());
        d.set_viewport(Size::new(800.0, 600.0));
        assert_eq!(d.take(), DamageRegion::Full);
    }
}
