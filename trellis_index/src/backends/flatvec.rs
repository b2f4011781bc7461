// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dense linear-scan backend.
//!
//! Boxes are packed into one vector with no holes, so a scan touches only
//! live entries. Removal swaps the last entry into the gap.

use alloc::vec::Vec;

use crate::backend::Backend;
use crate::types::Aabb2D;

/// Linear-scan backend. Works for any scalar and is the ground truth the
/// quadtree is checked against.
#[derive(Clone, Debug)]
pub struct FlatVec<T> {
    packed: Vec<(usize, Aabb2D<T>)>,
    /// `slot -> position in packed`.
    position: Vec<Option<usize>>,
}

impl<T> Default for FlatVec<T> {
    fn default() -> Self {
        Self {
            packed: Vec::new(),
            position: Vec::new(),
        }
    }
}

impl<T> FlatVec<T> {
    /// Number of stored boxes.
    pub fn len(&self) -> usize {
        self.packed.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.packed.is_empty()
    }
}

impl<T: Copy + PartialOrd> Backend<T> for FlatVec<T> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>) {
        if self.position.len() <= slot {
            self.position.resize(slot + 1, None);
        }
        match self.position[slot] {
            Some(pos) => self.packed[pos].1 = aabb,
            None => {
                self.position[slot] = Some(self.packed.len());
                self.packed.push((slot, aabb));
            }
        }
    }

    fn update(&mut self, slot: usize, aabb: Aabb2D<T>) {
        self.insert(slot, aabb);
    }

    fn remove(&mut self, slot: usize) {
        let Some(pos) = self.position.get_mut(slot).and_then(Option::take) else {
            return;
        };
        self.packed.swap_remove(pos);
        if let Some(&(moved, _)) = self.packed.get(pos) {
            self.position[moved] = Some(pos);
        }
    }

    fn clear(&mut self) {
        self.packed.clear();
        self.position.clear();
    }

    fn visit_point(&self, x: T, y: T, f: &mut dyn FnMut(usize)) {
        for (slot, aabb) in &self.packed {
            if aabb.contains_point(x, y) {
                f(*slot);
            }
        }
    }

    fn visit_rect(&self, rect: Aabb2D<T>, f: &mut dyn FnMut(usize)) {
        for (slot, aabb) in &self.packed {
            if aabb.intersects(&rect) {
                f(*slot);
            }
        }
    }
}
