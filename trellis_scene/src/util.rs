// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry helpers shared by the tree and its queries.

use kurbo::{Affine, Point, Rect};
use trellis_index::Aabb2D;

/// Transform an axis-aligned `Rect` by an `Affine` and return a conservative
/// axis-aligned bounding box in the target space.
pub fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    let p0 = affine * Point::new(rect.x0, rect.y0);
    let p1 = affine * Point::new(rect.x1, rect.y0);
    let p2 = affine * Point::new(rect.x0, rect.y1);
    let p3 = affine * Point::new(rect.x1, rect.y1);
    let min_x = p0.x.min(p1.x).min(p2.x).min(p3.x);
    let min_y = p0.y.min(p1.y).min(p2.y).min(p3.y);
    let max_x = p0.x.max(p1.x).max(p2.x).max(p3.x);
    let max_y = p0.y.max(p1.y).max(p2.y).max(p3.y);
    Rect::new(min_x, min_y, max_x, max_y)
}

/// The four corners of `rect` under `affine`, clockwise from the origin corner.
pub fn transform_rect_corners(affine: Affine, rect: Rect) -> [Point; 4] {
    [
        affine * Point::new(rect.x0, rect.y0),
        affine * Point::new(rect.x1, rect.y0),
        affine * Point::new(rect.x1, rect.y1),
        affine * Point::new(rect.x0, rect.y1),
    ]
}

/// Inverse of `affine`, or `None` when it collapses area (zero scale).
pub fn checked_inverse(affine: Affine) -> Option<Affine> {
    let det = affine.determinant();
    (det != 0.0 && det.is_finite()).then(|| affine.inverse())
}

/// Whether two rects overlap, counting shared edges.
pub fn rects_touch(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

pub(crate) fn rect_to_aabb(r: Rect) -> Aabb2D<f64> {
    Aabb2D::new(r.x0, r.y0, r.x1, r.y1)
}

pub(crate) fn aabb_to_rect(a: Aabb2D<f64>) -> Rect {
    Rect::new(a.min_x, a.min_y, a.max_x, a.max_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::FRAC_PI_4;

    #[test]
    fn rotated_bbox_is_conservative() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        let bb = transform_rect_bbox(Affine::rotate(FRAC_PI_4), r);
        let half_diag = 10.0 * core::f64::consts::SQRT_2 / 2.0;
        assert!((bb.width() - 2.0 * half_diag).abs() < 1e-9);
        assert!(bb.x0 < 0.0 && bb.x1 > 0.0);
    }

    #[test]
    fn zero_scale_has_no_inverse() {
        assert!(checked_inverse(Affine::scale(0.0)).is_none());
        assert!(checked_inverse(Affine::translate((3.0, 4.0))).is_some());
    }

    #[test]
    fn edge_contact_counts_as_touching() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rects_touch(a, Rect::new(10.0, 0.0, 20.0, 10.0)));
        assert!(!rects_touch(a, Rect::new(10.5, 0.0, 20.0, 10.0)));
    }
}
