// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node transform: position, rotation, scale, and cached matrices.

use kurbo::{Affine, Point, Vec2};

/// Decomposed local transform plus cached local and world matrices.
///
/// Setters compare exactly and are no-ops when nothing changes; otherwise they
/// mark the local matrix dirty. The local matrix is `T(x, y) · R(θ) · S(sx, sy)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    x: f64,
    y: f64,
    rotation: f64,
    sx: f64,
    sy: f64,
    local: Affine,
    world: Affine,
    dirty: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            sx: 1.0,
            sy: 1.0,
            local: Affine::IDENTITY,
            world: Affine::IDENTITY,
            dirty: false,
        }
    }
}

impl Transform {
    /// Identity transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the local matrix from its parts.
    pub fn compose(position: Point, rotation: f64, scale: Vec2) -> Affine {
        Affine::translate(position.to_vec2())
            * Affine::rotate(rotation)
            * Affine::scale_non_uniform(scale.x, scale.y)
    }

    /// Translation in parent space.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Rotation in radians.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Scale factors.
    pub fn scale(&self) -> Vec2 {
        Vec2::new(self.sx, self.sy)
    }

    /// Whether the local matrix needs recomputing.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set the translation. Returns whether anything changed.
    pub fn set_position(&mut self, x: f64, y: f64) -> bool {
        if self.x == x && self.y == y {
            return false;
        }
        self.x = x;
        self.y = y;
        self.dirty = true;
        true
    }

    /// Set the rotation in radians. Returns whether anything changed.
    pub fn set_rotation(&mut self, radians: f64) -> bool {
        if self.rotation == radians {
            return false;
        }
        self.rotation = radians;
        self.dirty = true;
        true
    }

    /// Set the scale factors. Returns whether anything changed.
    pub fn set_scale(&mut self, sx: f64, sy: f64) -> bool {
        if self.sx == sx && self.sy == sy {
            return false;
        }
        self.sx = sx;
        self.sy = sy;
        self.dirty = true;
        true
    }

    /// Set translation and scale together. Returns whether anything changed.
    pub fn set_transform(&mut self, x: f64, y: f64, sx: f64, sy: f64) -> bool {
        let moved = self.set_position(x, y);
        let scaled = self.set_scale(sx, sy);
        moved || scaled
    }

    /// Recompute the local matrix if dirty. Returns whether it was recomputed.
    pub fn update_local_transform(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.local = Self::compose(self.position(), self.rotation, self.scale());
        self.dirty = false;
        true
    }

    /// Recompute the world matrix from the parent's world matrix, or from the
    /// local matrix alone for roots.
    pub fn update_world_transform(&mut self, parent_world: Option<Affine>) {
        self.update_local_transform();
        self.world = match parent_world {
            Some(parent) => parent * self.local,
            None => self.local,
        };
    }

    /// Local matrix as of the last [`update_local_transform`](Self::update_local_transform).
    pub fn local(&self) -> Affine {
        self.local
    }

    /// Cached world matrix.
    pub fn world(&self) -> Affine {
        self.world
    }

    /// Local matrix, computed without touching the cache.
    pub fn current_local(&self) -> Affine {
        if self.dirty {
            Self::compose(self.position(), self.rotation, self.scale())
        } else {
            self.local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::FRAC_PI_2;

    #[test]
    fn setters_are_exact_noops() {
        let mut t = Transform::new();
        assert!(!t.set_position(0.0, 0.0));
        assert!(!t.set_scale(1.0, 1.0));
        assert!(!t.is_dirty());
        assert!(t.set_position(3.0, 4.0));
        assert!(t.is_dirty());
        assert!(!t.set_position(3.0, 4.0));
    }

    #[test]
    fn local_is_translate_rotate_scale() {
        let mut t = Transform::new();
        t.set_position(10.0, 0.0);
        t.set_rotation(FRAC_PI_2);
        t.set_scale(2.0, 1.0);
        assert!(t.update_local_transform());
        assert!(!t.update_local_transform());
        // (1, 0) scales to (2, 0), rotates to (0, 2), translates to (10, 2).
        let p = t.local() * Point::new(1.0, 0.0);
        assert!((p.x - 10.0).abs() < 1e-9 && (p.y - 2.0).abs() < 1e-9, "{p:?}");
    }

    #[test]
    fn world_composes_parent() {
        let mut t = Transform::new();
        t.set_position(1.0, 2.0);
        t.update_world_transform(Some(Affine::translate((10.0, 10.0))));
        assert_eq!(t.world() * Point::ORIGIN, Point::new(11.0, 12.0));
        t.update_world_transform(None);
        assert_eq!(t.world() * Point::ORIGIN, Point::new(1.0, 2.0));
    }
}
