// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The seam between [`IndexGeneric`](crate::IndexGeneric) and its spatial structure.

use crate::types::Aabb2D;

/// A spatial structure over slot numbers.
///
/// The index owns keys, payloads, and damage bookkeeping; a backend only maps
/// slots to boxes and answers which slots a point or rectangle touches.
/// Slots are dense small integers chosen by the index and may be reused after
/// [`remove`](Self::remove).
///
/// Queries report each matching slot exactly once, in no particular order.
pub trait Backend<T: Copy + PartialOrd> {
    /// Add `slot` with bounds `aabb`. Replaces any bounds the slot had.
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>);

    /// Change the bounds of `slot`.
    fn update(&mut self, slot: usize, aabb: Aabb2D<T>) {
        self.remove(slot);
        self.insert(slot, aabb);
    }

    /// Forget `slot`. Unknown slots are ignored.
    fn remove(&mut self, slot: usize);

    /// Forget every slot.
    fn clear(&mut self);

    /// Replace the whole contents with `items`.
    ///
    /// Backends that build a better structure when they see every box up front
    /// override this; the default clears and inserts in order.
    fn load(&mut self, items: &[(usize, Aabb2D<T>)]) {
        self.clear();
        for &(slot, aabb) in items {
            self.insert(slot, aabb);
        }
    }

    /// Call `f` with every slot whose bounds contain `(x, y)`.
    fn visit_point(&self, x: T, y: T, f: &mut dyn FnMut(usize));

    /// Call `f` with every slot whose bounds intersect `rect`.
    fn visit_rect(&self, rect: Aabb2D<T>, f: &mut dyn FnMut(usize));
}
