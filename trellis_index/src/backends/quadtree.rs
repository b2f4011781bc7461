// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loose quadtree backend for `f64` coordinates.
//!
//! Each slot is stored exactly once, in the deepest quadtree node whose square
//! fully contains its AABB. Boxes that straddle a split line therefore stay at
//! the ancestor that contains them instead of being duplicated into several
//! leaves, so a range query never reports the same slot twice.
//!
//! The root grows on demand: when a box falls outside it, a new root twice the
//! size is created with the old root as one of its quadrants, which keeps the
//! existing subtree intact. Boxes with non-finite coordinates go to an overflow
//! bucket that every query scans.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::Aabb2D;

/// Upper bound on root doublings for a single insert.
const MAX_GROWTH_STEPS: usize = 64;

/// Tuning knobs for [`Quadtree`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadtreeConfig {
    /// Number of slots a leaf holds before it is split into four quadrants.
    pub bucket_capacity: usize,
    /// Maximum subdivision depth below the root. Leaves at this depth keep
    /// accepting slots past `bucket_capacity`.
    pub max_depth: u8,
    /// Quadrants are never made narrower than this.
    pub min_cell_size: f64,
}

impl QuadtreeConfig {
    /// Defaults tuned for sibling sets of canvas nodes.
    pub const DEFAULT: Self = Self {
        bucket_capacity: 16,
        max_depth: 12,
        min_cell_size: 1.0,
    };
}

impl Default for QuadtreeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Home {
    Node(usize),
    Overflow,
}

#[derive(Clone, Copy, Debug)]
struct Placement {
    aabb: Aabb2D<f64>,
    home: Home,
}

#[derive(Clone, Debug)]
struct QuadNode {
    bounds: Aabb2D<f64>,
    items: Vec<usize>,
    children: Option<[usize; 4]>,
}

impl QuadNode {
    fn leaf(bounds: Aabb2D<f64>) -> Self {
        Self {
            bounds,
            items: Vec::new(),
            children: None,
        }
    }
}

/// Loose quadtree backend.
pub struct Quadtree {
    config: QuadtreeConfig,
    nodes: Vec<QuadNode>,
    root: Option<usize>,
    slots: Vec<Option<Placement>>,
    overflow: Vec<usize>,
}

impl Default for Quadtree {
    fn default() -> Self {
        Self::new(QuadtreeConfig::default())
    }
}

impl Quadtree {
    /// Create an empty quadtree with the given configuration.
    pub fn new(config: QuadtreeConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            root: None,
            slots: Vec::new(),
            overflow: Vec::new(),
        }
    }

    /// The configuration this tree was built with.
    pub fn config(&self) -> QuadtreeConfig {
        self.config
    }

    /// Bounds of the root square, if anything has been inserted.
    pub fn root_bounds(&self) -> Option<Aabb2D<f64>> {
        self.root.map(|r| self.nodes[r].bounds)
    }

    /// Depth of the quadtree node holding `slot` (root is 0).
    ///
    /// Returns `None` for unknown slots and for slots in the overflow bucket.
    pub fn depth_of(&self, slot: usize) -> Option<usize> {
        let Home::Node(target) = self.slots.get(slot)?.as_ref()?.home else {
            return None;
        };
        let mut node = self.root?;
        let mut depth = 0;
        loop {
            if node == target {
                return Some(depth);
            }
            let target_bounds = self.nodes[target].bounds;
            let children = self.nodes[node].children?;
            node = children
                .into_iter()
                .find(|&c| self.nodes[c].bounds.contains(&target_bounds))?;
            depth += 1;
        }
    }

    fn ensure_slot(&mut self, slot: usize) {
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
    }

    fn square_at(&self, aabb: &Aabb2D<f64>) -> Aabb2D<f64> {
        let size = aabb
            .width()
            .max(aabb.height())
            .max(self.config.min_cell_size);
        Aabb2D::from_xywh(aabb.min_x, aabb.min_y, size, size)
    }

    fn quadrants(bounds: &Aabb2D<f64>) -> [Aabb2D<f64>; 4] {
        let mid_x = 0.5 * (bounds.min_x + bounds.max_x);
        let mid_y = 0.5 * (bounds.min_y + bounds.max_y);
        [
            Aabb2D::new(bounds.min_x, bounds.min_y, mid_x, mid_y),
            Aabb2D::new(mid_x, bounds.min_y, bounds.max_x, mid_y),
            Aabb2D::new(bounds.min_x, mid_y, mid_x, bounds.max_y),
            Aabb2D::new(mid_x, mid_y, bounds.max_x, bounds.max_y),
        ]
    }

    fn push_node(&mut self, node: QuadNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Double the root toward `aabb` until it is contained. Returns `false`
    /// when the box cannot be reached in a bounded number of steps.
    fn grow_to_contain(&mut self, aabb: &Aabb2D<f64>) -> bool {
        let Some(mut root) = self.root else {
            let bounds = self.square_at(aabb);
            self.root = Some(self.push_node(QuadNode::leaf(bounds)));
            return true;
        };
        for _ in 0..MAX_GROWTH_STEPS {
            let old = self.nodes[root].bounds;
            if old.contains(aabb) {
                return true;
            }
            let size = old.width();
            let grow_left = aabb.min_x < old.min_x;
            let grow_up = aabb.min_y < old.min_y;
            let (min_x, mid_x, max_x) = if grow_left {
                (old.min_x - size, old.min_x, old.max_x)
            } else {
                (old.min_x, old.max_x, old.max_x + size)
            };
            let (min_y, mid_y, max_y) = if grow_up {
                (old.min_y - size, old.min_y, old.max_y)
            } else {
                (old.min_y, old.max_y, old.max_y + size)
            };
            let quads = [
                Aabb2D::new(min_x, min_y, mid_x, mid_y),
                Aabb2D::new(mid_x, min_y, max_x, mid_y),
                Aabb2D::new(min_x, mid_y, mid_x, max_y),
                Aabb2D::new(mid_x, mid_y, max_x, max_y),
            ];
            let old_quadrant = usize::from(grow_left) + 2 * usize::from(grow_up);
            let mut children = [0_usize; 4];
            for (i, q) in quads.into_iter().enumerate() {
                children[i] = if i == old_quadrant {
                    root
                } else {
                    self.push_node(QuadNode::leaf(q))
                };
            }
            let mut new_root = QuadNode::leaf(Aabb2D::new(min_x, min_y, max_x, max_y));
            new_root.children = Some(children);
            root = self.push_node(new_root);
            self.root = Some(root);
        }
        self.nodes[root].bounds.contains(aabb)
    }

    /// Walk down from the root to the deepest node containing `aabb`.
    fn descend(&self, aabb: &Aabb2D<f64>) -> Option<(usize, usize)> {
        let mut node = self.root?;
        let mut depth = 0;
        while let Some(children) = self.nodes[node].children {
            match children
                .into_iter()
                .find(|&c| self.nodes[c].bounds.contains(aabb))
            {
                Some(c) => {
                    node = c;
                    depth += 1;
                }
                None => break,
            }
        }
        Some((node, depth))
    }

    fn can_split(&self, node: usize, depth: usize) -> bool {
        let n = &self.nodes[node];
        n.children.is_none()
            && n.items.len() > self.config.bucket_capacity
            && depth < usize::from(self.config.max_depth)
            && 0.5 * n.bounds.width() >= self.config.min_cell_size
    }

    fn split(&mut self, node: usize, depth: usize) {
        let mut pending = vec![(node, depth)];
        while let Some((node, depth)) = pending.pop() {
            if !self.can_split(node, depth) {
                continue;
            }
            let quads = Self::quadrants(&self.nodes[node].bounds);
            let mut children = [0_usize; 4];
            for (i, q) in quads.into_iter().enumerate() {
                children[i] = self.push_node(QuadNode::leaf(q));
            }
            self.nodes[node].children = Some(children);
            let items = core::mem::take(&mut self.nodes[node].items);
            for slot in items {
                let Some(placement) = self.slots[slot].as_mut() else {
                    continue;
                };
                let target = children
                    .into_iter()
                    .find(|&c| self.nodes[c].bounds.contains(&placement.aabb))
                    .unwrap_or(node);
                placement.home = Home::Node(target);
                self.nodes[target].items.push(slot);
            }
            for c in children {
                pending.push((c, depth + 1));
            }
        }
    }

    fn place(&mut self, slot: usize, aabb: Aabb2D<f64>) {
        if !aabb.is_finite() || !self.grow_to_contain(&aabb) {
            self.overflow.push(slot);
            self.slots[slot] = Some(Placement {
                aabb,
                home: Home::Overflow,
            });
            return;
        }
        let Some((node, depth)) = self.descend(&aabb) else {
            return;
        };
        self.nodes[node].items.push(slot);
        self.slots[slot] = Some(Placement {
            aabb,
            home: Home::Node(node),
        });
        self.split(node, depth);
    }

    fn unlink(&mut self, slot: usize) -> Option<Placement> {
        let placement = self.slots.get_mut(slot)?.take()?;
        let bucket = match placement.home {
            Home::Node(n) => &mut self.nodes[n].items,
            Home::Overflow => &mut self.overflow,
        };
        if let Some(pos) = bucket.iter().position(|&s| s == slot) {
            bucket.swap_remove(pos);
        }
        Some(placement)
    }

    fn visit(
        &self,
        node_hit: impl Fn(&Aabb2D<f64>) -> bool,
        item_hit: impl Fn(&Aabb2D<f64>) -> bool,
        f: &mut dyn FnMut(usize),
    ) {
        let mut check = |slot: usize| {
            if let Some(Some(p)) = self.slots.get(slot)
                && item_hit(&p.aabb)
            {
                f(slot);
            }
        };
        if let Some(root) = self.root {
            let mut stack = vec![root];
            while let Some(n) = stack.pop() {
                let node = &self.nodes[n];
                if !node_hit(&node.bounds) {
                    continue;
                }
                for &slot in &node.items {
                    check(slot);
                }
                if let Some(children) = node.children {
                    stack.extend(children);
                }
            }
        }
        for &slot in &self.overflow {
            check(slot);
        }
    }
}

impl Backend<f64> for Quadtree {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<f64>) {
        self.ensure_slot(slot);
        self.unlink(slot);
        self.place(slot, aabb);
    }

    fn update(&mut self, slot: usize, aabb: Aabb2D<f64>) {
        self.ensure_slot(slot);
        if let Some(Some(p)) = self.slots.get(slot)
            && let Home::Node(n) = p.home
        {
            let node = &self.nodes[n];
            let still_fits = aabb.is_finite() && node.bounds.contains(&aabb);
            let no_deeper_fit = match node.children {
                None => true,
                Some(children) => !children
                    .into_iter()
                    .any(|c| self.nodes[c].bounds.contains(&aabb)),
            };
            if still_fits && no_deeper_fit {
                if let Some(p) = self.slots[slot].as_mut() {
                    p.aabb = aabb;
                }
                return;
            }
        }
        self.unlink(slot);
        self.place(slot, aabb);
    }

    fn remove(&mut self, slot: usize) {
        self.unlink(slot);
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.slots.clear();
        self.overflow.clear();
    }

    fn load(&mut self, items: &[(usize, Aabb2D<f64>)]) {
        self.clear();
        let mut finite: Vec<(usize, Aabb2D<f64>)> = Vec::with_capacity(items.len());
        for &(slot, aabb) in items {
            self.ensure_slot(slot);
            if aabb.is_finite() {
                finite.push((slot, aabb));
            } else {
                self.overflow.push(slot);
                self.slots[slot] = Some(Placement {
                    aabb,
                    home: Home::Overflow,
                });
            }
        }
        let Some(first) = finite.first().map(|&(_, a)| a) else {
            return;
        };
        let all = finite.iter().fold(first, |acc, (_, a)| acc.union(a));
        let root = self.push_node(QuadNode::leaf(self.square_at(&all)));
        self.root = Some(root);

        // Top-down partition: every box is routed once per level instead of
        // being re-bucketed each time a leaf overflows.
        let mut pending = vec![(root, 0_usize, finite)];
        while let Some((node, depth, batch)) = pending.pop() {
            let bounds = self.nodes[node].bounds;
            let splittable = batch.len() > self.config.bucket_capacity
                && depth < usize::from(self.config.max_depth)
                && 0.5 * bounds.width() >= self.config.min_cell_size;
            if !splittable {
                for (slot, aabb) in batch {
                    self.nodes[node].items.push(slot);
                    self.slots[slot] = Some(Placement {
                        aabb,
                        home: Home::Node(node),
                    });
                }
                continue;
            }
            let quads = Self::quadrants(&bounds);
            let mut children = [0_usize; 4];
            let mut buckets: [Vec<(usize, Aabb2D<f64>)>; 4] = core::array::from_fn(|_| Vec::new());
            for (i, q) in quads.into_iter().enumerate() {
                children[i] = self.push_node(QuadNode::leaf(q));
            }
            self.nodes[node].children = Some(children);
            for (slot, aabb) in batch {
                match quads.iter().position(|q| q.contains(&aabb)) {
                    Some(i) => buckets[i].push((slot, aabb)),
                    None => {
                        self.nodes[node].items.push(slot);
                        self.slots[slot] = Some(Placement {
                            aabb,
                            home: Home::Node(node),
                        });
                    }
                }
            }
            for (child, bucket) in children.into_iter().zip(buckets) {
                if !bucket.is_empty() {
                    pending.push((child, depth + 1, bucket));
                }
            }
        }
    }

    fn visit_point(&self, x: f64, y: f64, f: &mut dyn FnMut(usize)) {
        self.visit(|b| b.contains_point(x, y), |a| a.contains_point(x, y), f);
    }

    fn visit_rect(&self, rect: Aabb2D<f64>, f: &mut dyn FnMut(usize)) {
        self.visit(|b| b.intersects(&rect), |a| a.intersects(&rect), f);
    }
}

impl Debug for Quadtree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.slots.len();
        let alive = self.slots.iter().filter(|e| e.is_some()).count();
        f.debug_struct("Quadtree")
            .field("config", &self.config)
            .field("root", &self.root_bounds())
            .field("total_slots", &total)
            .field("alive", &alive)
            .field("nodes", &self.nodes.len())
            .field("overflow", &self.overflow.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(qt: &Quadtree, x: f64, y: f64) -> Vec<usize> {
        let mut out = Vec::new();
        qt.visit_point(x, y, &mut |s| out.push(s));
        out.sort_unstable();
        out
    }

    fn within(qt: &Quadtree, r: Aabb2D<f64>) -> Vec<usize> {
        let mut out = Vec::new();
        qt.visit_rect(r, &mut |s| out.push(s));
        out.sort_unstable();
        out
    }

    #[test]
    fn straddling_box_stays_at_containing_ancestor() {
        let mut qt: Quadtree = Quadtree::new(QuadtreeConfig {
            bucket_capacity: 1,
            ..QuadtreeConfig::DEFAULT
        });
        qt.insert(0, Aabb2D::from_xywh(0.0, 0.0, 100.0, 100.0));
        qt.insert(1, Aabb2D::from_xywh(1.0, 1.0, 2.0, 2.0));
        qt.insert(2, Aabb2D::from_xywh(45.0, 45.0, 10.0, 10.0));
        // Slot 2 crosses the root's center lines.
        assert_eq!(qt.depth_of(2), Some(0));
        assert!(qt.depth_of(1).unwrap() > 0, "small box should sink");
        assert_eq!(within(&qt, Aabb2D::from_xywh(0.0, 0.0, 100.0, 100.0)), [0, 1, 2]);
    }

    #[test]
    fn root_grows_toward_negative_coordinates() {
        let mut qt: Quadtree = Quadtree::default();
        qt.insert(0, Aabb2D::from_xywh(0.0, 0.0, 10.0, 10.0));
        qt.insert(1, Aabb2D::from_xywh(-500.0, -300.0, 10.0, 10.0));
        let root = qt.root_bounds().unwrap();
        assert!(root.contains(&Aabb2D::from_xywh(-500.0, -300.0, 10.0, 10.0)));
        assert_eq!(at(&qt, -495.0, -295.0), [1]);
        assert_eq!(at(&qt, 5.0, 5.0), [0]);
    }

    #[test]
    fn update_moves_between_regions() {
        let mut qt: Quadtree = Quadtree::new(QuadtreeConfig {
            bucket_capacity: 2,
            ..QuadtreeConfig::DEFAULT
        });
        for i in 0..8 {
            let x = f64::from(i) * 20.0;
            qt.insert(i as usize, Aabb2D::from_xywh(x, 0.0, 5.0, 5.0));
        }
        qt.update(0, Aabb2D::from_xywh(140.0, 100.0, 5.0, 5.0));
        assert!(at(&qt, 2.0, 2.0).is_empty());
        assert_eq!(at(&qt, 142.0, 102.0), [0]);
    }

    #[test]
    fn non_finite_boxes_use_overflow() {
        let mut qt: Quadtree = Quadtree::default();
        qt.insert(0, Aabb2D::new(f64::NEG_INFINITY, 0.0, 1.0, 1.0));
        qt.insert(1, Aabb2D::from_xywh(0.0, 0.0, 1.0, 1.0));
        assert_eq!(qt.depth_of(0), None);
        assert_eq!(at(&qt, 0.5, 0.5), [0, 1]);
        qt.remove(0);
        assert_eq!(at(&qt, 0.5, 0.5), [1]);
    }

    #[test]
    fn capacity_at_max_depth_degrades_to_large_bucket() {
        let mut qt: Quadtree = Quadtree::new(QuadtreeConfig {
            bucket_capacity: 2,
            max_depth: 1,
            min_cell_size: 1.0,
        });
        for i in 0..50 {
            qt.insert(i, Aabb2D::from_xywh(1.0, 1.0, 1.0, 1.0));
        }
        assert_eq!(at(&qt, 1.5, 1.5).len(), 50);
    }

    #[test]
    fn load_matches_incremental_inserts() {
        let items: Vec<(usize, Aabb2D<f64>)> = (0..300)
            .map(|i| {
                let x = f64::from(i % 20) * 13.0;
                let y = f64::from(i / 20) * 17.0;
                (i as usize, Aabb2D::from_xywh(x, y, 9.0, 12.0))
            })
            .collect();
        let mut bulk: Quadtree = Quadtree::default();
        bulk.load(&items);
        let mut incremental: Quadtree = Quadtree::default();
        for &(s, a) in &items {
            incremental.insert(s, a);
        }
        for q in [
            Aabb2D::from_xywh(0.0, 0.0, 40.0, 40.0),
            Aabb2D::from_xywh(100.0, 50.0, 3.0, 3.0),
            Aabb2D::from_xywh(-10.0, -10.0, 500.0, 500.0),
        ] {
            assert_eq!(within(&bulk, q), within(&incremental, q));
        }
    }
}
