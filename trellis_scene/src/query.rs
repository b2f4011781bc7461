// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial queries: picking, rectangle selection, and paint-order traversal.

use std::mem;

use kurbo::{Point, Rect};

use crate::tree::Tree;
use crate::types::{Hit, NodeFlags, NodeId, QueryFilter};
use crate::util::{checked_inverse, rect_to_aabb, rects_touch, transform_rect_bbox};

/// Child lists up to this length are scanned directly instead of querying the index.
const SMALL_CHILD_LIST: usize = 8;

#[derive(Clone, Copy)]
enum ChildQuery {
    Point(Point),
    Rect(Rect),
    All,
}

fn contains_inclusive(bounds: Rect, p: Point) -> bool {
    p.x >= bounds.x0 && p.x <= bounds.x1 && p.y >= bounds.y0 && p.y <= bounds.y1
}

fn filtered_out(flags: NodeFlags, filter: QueryFilter) -> bool {
    (filter.visible_only && !flags.contains(NodeFlags::VISIBLE))
        || (filter.unlocked_only && flags.contains(NodeFlags::LOCKED))
}

impl Tree {
    /// Whether the world point lies inside `id`'s rectangle, under its full
    /// world transform (rotation and scale included).
    pub fn hit_test_node(&mut self, id: NodeId, world_pt: Point) -> bool {
        let Some(world) = self.world_transform(id) else {
            return false;
        };
        let Some(inv) = checked_inverse(world) else {
            return false;
        };
        contains_inclusive(self.node(id).local_bounds(), inv * world_pt)
    }

    /// Topmost node under `world_pt` in the subtree of `root`.
    ///
    /// Children are searched before their parent, last child first. Nodes
    /// rejected by `filter` hide their whole subtree, except that
    /// `interactive_only` only stops a node from being reported. Below `root`,
    /// a node's rectangle also clips its descendants.
    pub fn hit_test(&mut self, root: NodeId, world_pt: Point, filter: QueryFilter) -> Option<Hit> {
        if !self.is_alive(root) {
            tracing::debug!(?root, "hit_test ignored: stale id");
            return None;
        }
        let node = self.hit_recursive(root, world_pt, filter, true)?;
        let mut path = vec![node];
        let mut cur = node;
        while cur != root {
            cur = self.node(cur).parent?;
            path.push(cur);
        }
        path.reverse();
        Some(Hit { node, path })
    }

    fn hit_recursive(
        &mut self,
        id: NodeId,
        world_pt: Point,
        filter: QueryFilter,
        is_root: bool,
    ) -> Option<NodeId> {
        let flags = self.node(id).flags;
        if filtered_out(flags, filter) {
            return None;
        }
        let world = self.world_transform(id)?;
        let local = checked_inverse(world)? * world_pt;
        let inside = contains_inclusive(self.node(id).local_bounds(), local);
        if !inside && !is_root {
            return None;
        }
        let mut candidates = Vec::new();
        self.candidate_children(id, ChildQuery::Point(local), &mut candidates);
        for &child in candidates.iter().rev() {
            if let Some(hit) = self.hit_recursive(child, world_pt, filter, false) {
                return Some(hit);
            }
        }
        (inside && (!filter.interactive_only || flags.contains(NodeFlags::INTERACTIVE)))
            .then_some(id)
    }

    /// Nodes in the subtree of `root` whose world bounds touch `world_rect`,
    /// in paint order.
    ///
    /// Below `root`, each container clips the query to its own bounds, as in
    /// [`hit_test`](Self::hit_test): a child lying outside its parent is not
    /// found through the part that sticks out.
    pub fn intersect_rect(
        &mut self,
        root: NodeId,
        world_rect: Rect,
        filter: QueryFilter,
    ) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_in_rect(root, world_rect, filter, false, &mut out);
        out
    }

    /// Visible nodes under `root` that touch `world_rect`, in paint order.
    ///
    /// Containers below `root` clip the query like in
    /// [`intersect_rect`](Self::intersect_rect).
    ///
    /// Parents precede their children and siblings follow child order. Each
    /// visited node's [`render_order`](Self::render_order) is set to its
    /// position in `out`, which is cleared first.
    pub fn visit_visible(&mut self, root: NodeId, world_rect: Rect, out: &mut Vec<NodeId>) {
        out.clear();
        let filter = QueryFilter {
            visible_only: true,
            ..QueryFilter::default()
        };
        self.collect_in_rect(root, world_rect, filter, true, out);
    }

    fn collect_in_rect(
        &mut self,
        root: NodeId,
        world_rect: Rect,
        filter: QueryFilter,
        assign_order: bool,
        out: &mut Vec<NodeId>,
    ) {
        if !self.is_alive(root) {
            tracing::debug!(?root, "rect query ignored: stale id");
            return;
        }
        let mut stack = mem::take(&mut self.query_stack);
        stack.clear();
        stack.push((root, world_rect));
        let mut scratch = Vec::new();
        while let Some((id, clip)) = stack.pop() {
            let flags = self.node(id).flags;
            if filtered_out(flags, filter) {
                continue;
            }
            let Some(world) = self.world_transform(id) else {
                continue;
            };
            let bounds = transform_rect_bbox(world, self.node(id).local_bounds());
            let touches = rects_touch(bounds, clip);
            if !touches && id != root {
                continue;
            }
            if touches && (!filter.interactive_only || flags.contains(NodeFlags::INTERACTIVE)) {
                if assign_order {
                    #[allow(
                        clippy::cast_possible_truncation,
                        reason = "Render order wraps beyond u32::MAX visited nodes."
                    )]
                    let order = out.len() as u32;
                    self.node_mut(id).render_order = order;
                }
                out.push(id);
            }
            let child_clip = if id == root { clip } else { clip.intersect(bounds) };
            let query = match checked_inverse(world) {
                Some(inv) => ChildQuery::Rect(transform_rect_bbox(inv, child_clip)),
                None => ChildQuery::All,
            };
            scratch.clear();
            self.candidate_children(id, query, &mut scratch);
            stack.extend(scratch.iter().rev().map(|&c| (c, child_clip)));
        }
        self.query_stack = stack;
    }

    /// Children of `id` that may match `query` (in `id`'s space), in paint order.
    fn candidate_children(&mut self, id: NodeId, query: ChildQuery, out: &mut Vec<NodeId>) {
        let node = self.node(id);
        let len = node.children.len();
        if len == 0 {
            return;
        }
        let stale = node.flags.contains(NodeFlags::CHILD_INDEX_STALE);
        if len <= SMALL_CHILD_LIST
            || matches!(query, ChildQuery::All)
            || (node.child_index.is_none() && !stale)
        {
            out.extend_from_slice(&node.children);
            return;
        }
        if stale {
            self.load_child_index(id);
        }
        let node = self.node(id);
        let Some(index) = node.child_index.as_ref() else {
            out.extend_from_slice(&node.children);
            return;
        };
        let start = out.len();
        match query {
            ChildQuery::Point(p) => out.extend(index.query_point(p.x, p.y).map(|(_, c)| c)),
            ChildQuery::Rect(r) => out.extend(index.query_rect(rect_to_aabb(r)).map(|(_, c)| c)),
            ChildQuery::All => out.extend_from_slice(&node.children),
        }
        out[start..].sort_unstable_by_key(|&c| self.node(c).sibling_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::FRAC_PI_4;

    fn canvas_with_grid(tree: &mut Tree, n: u32) -> (NodeId, Vec<NodeId>) {
        let root = tree.create_node(10_000.0, 10_000.0);
        let mut ids = Vec::new();
        for i in 0..n {
            let c = tree.insert(Some(root), 20.0, 20.0);
            tree.set_position(c, f64::from(i % 10) * 30.0, f64::from(i / 10) * 30.0);
            ids.push(c);
        }
        (root, ids)
    }

    #[test]
    fn rotated_child_is_picked_by_its_shape() {
        let mut tree = Tree::new();
        let root = tree.create_node(200.0, 200.0);
        let diamond = tree.insert(Some(root), 20.0, 20.0);
        tree.set_position(diamond, 100.0, 100.0);
        tree.set_rotation(diamond, FRAC_PI_4);

        // Straight below the pivot is inside the rotated square.
        let below = Point::new(100.0, 110.0);
        assert!(tree.hit_test_node(diamond, below));
        let hit = tree.hit_test(root, below, QueryFilter::PICKING).unwrap();
        assert_eq!(hit.node, diamond);
        assert_eq!(hit.path, [root, diamond]);

        // Inside the axis-aligned box, outside the rotated one.
        let corner = Point::new(119.0, 101.0);
        assert!(!tree.hit_test_node(diamond, corner));
        assert_eq!(tree.hit_test(root, corner, QueryFilter::PICKING).unwrap().node, root);
    }

    #[test]
    fn topmost_sibling_wins_and_filters_apply() {
        let mut tree = Tree::new();
        let root = tree.create_node(100.0, 100.0);
        let below = tree.insert(Some(root), 50.0, 50.0);
        let above = tree.insert(Some(root), 50.0, 50.0);
        let p = Point::new(10.0, 10.0);
        assert_eq!(tree.hit_test(root, p, QueryFilter::PICKING).unwrap().node, above);

        tree.set_locked(above, true);
        assert_eq!(tree.hit_test(root, p, QueryFilter::PICKING).unwrap().node, below);
        tree.set_visible(below, false);
        tree.set_interactive(root, false);
        assert_eq!(tree.hit_test(root, p, QueryFilter::PICKING), None);
        // Without filters everything is eligible again.
        let all = QueryFilter::default();
        assert_eq!(tree.hit_test(root, p, all).unwrap().node, above);
    }

    #[test]
    fn non_interactive_container_still_passes_to_children() {
        let mut tree = Tree::new();
        let root = tree.create_node(100.0, 100.0);
        let group = tree.insert(Some(root), 50.0, 50.0);
        tree.set_interactive(group, false);
        let leaf = tree.insert(Some(group), 10.0, 10.0);
        let hit = tree.hit_test(root, Point::new(5.0, 5.0), QueryFilter::PICKING).unwrap();
        assert_eq!(hit.path, [root, group, leaf]);
        let hit = tree.hit_test(root, Point::new(30.0, 30.0), QueryFilter::PICKING).unwrap();
        assert_eq!(hit.node, root);
    }

    #[test]
    fn large_child_lists_use_the_index() {
        let mut tree = Tree::new();
        let (root, ids) = canvas_with_grid(&mut tree, 100);
        let hit = tree
            .hit_test(root, Point::new(95.0, 65.0), QueryFilter::PICKING)
            .unwrap();
        assert_eq!(hit.node, ids[23]);

        // Columns 3 and 4 of row 3.
        let found = tree.intersect_rect(
            root,
            Rect::new(85.0, 85.0, 125.0, 95.0),
            QueryFilter::default(),
        );
        assert_eq!(found, [root, ids[33], ids[34]]);
    }

    #[test]
    fn stale_index_is_rebuilt_on_query() {
        let mut tree = Tree::new();
        let root = tree.create_node(1000.0, 1000.0);
        let mut last = None;
        for i in 0..20 {
            let c = tree.create_node(10.0, 10.0);
            tree.set_position(c, f64::from(i) * 20.0, 0.0);
            tree.add_child_untracked(root, c);
            last = Some(c);
        }
        let hit = tree.hit_test(root, Point::new(385.0, 5.0), QueryFilter::PICKING).unwrap();
        assert_eq!(Some(hit.node), last);
        assert_eq!(tree.child_index_len(root), Some(20));
        assert!(!tree.flags(root).unwrap().contains(NodeFlags::CHILD_INDEX_STALE));
    }

    #[test]
    fn visit_visible_is_paint_order_and_culls() {
        let mut tree = Tree::new();
        let root = tree.create_node(1000.0, 1000.0);
        let a = tree.insert(Some(root), 100.0, 100.0);
        let a1 = tree.insert(Some(a), 10.0, 10.0);
        let b = tree.insert(Some(root), 100.0, 100.0);
        tree.set_position(b, 50.0, 50.0);
        let far = tree.insert(Some(root), 10.0, 10.0);
        tree.set_position(far, 900.0, 900.0);
        let hidden = tree.insert(Some(root), 10.0, 10.0);
        tree.set_visible(hidden, false);

        let mut out = Vec::new();
        tree.visit_visible(root, Rect::new(0.0, 0.0, 200.0, 200.0), &mut out);
        assert_eq!(out, [root, a, a1, b]);
        assert_eq!(tree.render_order(b), Some(3));
        assert_eq!(tree.render_order(a1), Some(2));
    }

    #[test]
    fn picking_and_visibility_agree_on_container_clipping() {
        let mut tree = Tree::new();
        let root = tree.create_node(1000.0, 1000.0);
        let group = tree.insert(Some(root), 0.0, 0.0);
        tree.set_position(group, 100.0, 100.0);
        let leaf = tree.insert(Some(group), 20.0, 20.0);
        tree.set_position(leaf, 200.0, 200.0);
        let inside = tree.insert(Some(group), 20.0, 20.0);
        tree.set_position(inside, -10.0, -10.0);

        // The leaf sits at world 300..320, entirely outside its zero-size group.
        let p = Point::new(310.0, 310.0);
        assert!(tree.hit_test_node(leaf, p));
        assert_eq!(tree.hit_test(root, p, QueryFilter::default()).unwrap().node, root);

        let mut out = Vec::new();
        tree.visit_visible(root, Rect::new(0.0, 0.0, 500.0, 500.0), &mut out);
        assert_eq!(out, [root, group, inside]);
        let hit = tree.hit_test(root, Point::new(100.0, 100.0), QueryFilter::default());
        assert_eq!(hit.unwrap().node, inside);
    }

    #[test]
    fn rect_query_sees_through_rotated_parents() {
        let mut tree = Tree::new();
        let root = tree.create_node(1000.0, 1000.0);
        let group = tree.insert(Some(root), 100.0, 100.0);
        tree.set_position(group, 500.0, 500.0);
        tree.set_scale(group, 2.0, 2.0);
        let leaf = tree.insert(Some(group), 10.0, 10.0);
        tree.set_position(leaf, 50.0, 50.0);
        // Leaf covers world 600..620.
        let all = QueryFilter::default();
        let found = tree.intersect_rect(root, Rect::new(610.0, 610.0, 611.0, 611.0), all);
        assert_eq!(found, [root, group, leaf]);
        let found = tree.intersect_rect(root, Rect::new(590.0, 590.0, 595.0, 595.0), all);
        assert_eq!(found, [root, group]);
    }
}
