// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: structure, transforms, and geometry updates.

use std::mem;

use kurbo::{Affine, Point, Rect, Size, Vec2};
use trellis_index::{Aabb2D, Index, Key as IndexKey, QuadIndex, QuadtreeConfig};

use crate::invalidate::InvalidationSink;
use crate::transform::Transform;
use crate::types::{Constraints, NodeFlags, NodeId, Paint};
use crate::util::{aabb_to_rect, rect_to_aabb, transform_rect_bbox};

pub(crate) struct Node {
    pub(crate) generation: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) transform: Transform,
    pub(crate) size: Size,
    pub(crate) flags: NodeFlags,
    pub(crate) constraints: Constraints,
    pub(crate) paint: Paint,
    /// Index over `children`, keyed by each child's bounds in this node's space.
    pub(crate) child_index: Option<QuadIndex<NodeId>>,
    /// This node's key in its parent's `child_index`.
    pub(crate) index_key: Option<IndexKey>,
    /// Position in the parent's `children`, i.e. paint order among siblings.
    pub(crate) sibling_index: usize,
    pub(crate) render_order: u32,
    pub(crate) sink: Option<Box<dyn InvalidationSink>>,
}

impl Node {
    fn new(generation: u32, size: Size) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            size,
            flags: NodeFlags::default() | NodeFlags::SPATIAL_DIRTY,
            constraints: Constraints::default(),
            paint: Paint::default(),
            child_index: None,
            index_key: None,
            sibling_index: 0,
            render_order: 0,
            sink: None,
        }
    }

    pub(crate) fn world_is_clean(&self) -> bool {
        !self.transform.is_dirty() && !self.flags.contains(NodeFlags::SPATIAL_DIRTY)
    }

    pub(crate) fn local_bounds(&self) -> Rect {
        Rect::from_origin_size(Point::ORIGIN, self.size)
    }

    /// Bounds in the parent's coordinate space (world space for roots).
    pub(crate) fn bounds_in_parent(&mut self) -> Rect {
        self.transform.update_local_transform();
        transform_rect_bbox(self.transform.local(), self.local_bounds())
    }
}

/// Arena of scene nodes.
///
/// Nodes are addressed by generational [`NodeId`]s. Every node has a size, a
/// decomposed local [`Transform`], flags, a [`Paint`], and resize
/// [`Constraints`]. Containers keep a quadtree over their direct children so
/// that picking and culling only visit children near the query.
pub struct Tree {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    epoch: u64,
    index_config: QuadtreeConfig,
    path_buf: Vec<NodeId>,
    dirty_buf: Vec<NodeId>,
    pub(crate) query_stack: Vec<(NodeId, Rect)>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        let indexed = self
            .nodes
            .iter()
            .flatten()
            .filter(|n| n.child_index.is_some())
            .count();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("epoch", &self.epoch)
            .field("indexed_containers", &indexed)
            .field("index_config", &self.index_config)
            .finish_non_exhaustive()
    }
}

impl Tree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self::with_index_config(QuadtreeConfig::default())
    }

    /// Create an empty tree whose child indices use `config`.
    pub fn with_index_config(index_config: QuadtreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            epoch: 0,
            index_config,
            path_buf: Vec::new(),
            dirty_buf: Vec::new(),
            query_stack: Vec::new(),
        }
    }

    /// Counter bumped on every structural change (attach, detach, dispose).
    pub fn structure_epoch(&self) -> u64 {
        self.epoch
    }

    /// Create a detached node of the given size.
    pub fn create_node(&mut self, width: f64, height: f64) -> NodeId {
        let size = Size::new(width.max(0.0), height.max(0.0));
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, size));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, size)));
            self.generations.push(generation);
            (self.nodes.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "NodeId uses 32-bit indices by design."
        )]
        NodeId::new(idx as u32, generation)
    }

    /// Create a node and attach it to `parent` (tracked), or leave it as a root.
    pub fn insert(&mut self, parent: Option<NodeId>, width: f64, height: f64) -> NodeId {
        let id = self.create_node(width, height);
        if let Some(p) = parent {
            self.add_child(p, id);
        }
        id
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .is_some_and(|n| n.generation == id.1)
    }

    // --- structure ---

    /// Append `child` to `parent`, keeping the parent's child index current.
    ///
    /// The child is detached from any previous parent first. The first tracked
    /// insertion creates the parent's index and bulk-loads every existing
    /// child into it. Returns `false` (and changes nothing) for stale ids, for
    /// `parent == child`, and when `child` is an ancestor of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.attach(parent, child, None, true)
    }

    /// Append `child` to `parent` without touching the parent's child index.
    ///
    /// The index is marked stale. Call [`rebuild_child_index`](Self::rebuild_child_index)
    /// after a batch of untracked insertions; a stale index is also rebuilt on
    /// the next query that needs it. No invalidation is issued.
    pub fn add_child_untracked(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.attach(parent, child, None, false)
    }

    /// Attach `child` to `parent` at position `index` in paint order (clamped).
    ///
    /// This is the primitive used to replay structural edits.
    pub fn insert_child_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> bool {
        self.attach(parent, child, Some(index), true)
    }

    /// Rebuild `parent`'s child index in one bulk load and invalidate it.
    pub fn rebuild_child_index(&mut self, parent: NodeId) {
        if !self.is_alive(parent) {
            tracing::debug!(?parent, "rebuild_child_index ignored: stale id");
            return;
        }
        self.load_child_index(parent);
        self.invalidate_node(parent);
    }

    /// Detach `child` from `parent`. Returns `false` if it is not a child.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.is_alive(parent)
            || !self.is_alive(child)
            || self.node(child).parent != Some(parent)
        {
            tracing::debug!(?parent, ?child, "remove_child ignored: not a child");
            return false;
        }
        self.detach(parent, child);
        true
    }

    /// Detach `id` from its parent and free it together with its subtree.
    ///
    /// Textures referenced from the freed nodes' paint are released.
    pub fn dispose(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            tracing::debug!(?id, "dispose ignored: stale id");
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.detach(parent, id);
        }
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.nodes[n.idx()].take() {
                stack.extend_from_slice(&node.children);
                self.free_list.push(n.idx());
            }
        }
        self.epoch += 1;
    }

    fn is_ancestor(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.node(id).parent {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, at: Option<usize>, tracked: bool) -> bool {
        if !self.is_alive(parent) || !self.is_alive(child) || self.is_ancestor(child, parent) {
            tracing::debug!(?parent, ?child, "attach ignored: stale id or cycle");
            return false;
        }
        if let Some(old) = self.node(child).parent {
            self.detach(old, child);
        }
        let pos = {
            let p = self.node_mut(parent);
            let pos = at.map_or(p.children.len(), |i| i.min(p.children.len()));
            p.children.insert(pos, child);
            pos
        };
        self.renumber_siblings(parent, pos);
        self.node_mut(child).parent = Some(parent);
        self.mark_spatial_dirty(child);
        self.epoch += 1;
        if tracked {
            self.track_child(parent, child);
            let bounds = self.node_mut(child).bounds_in_parent();
            self.invalidate(parent, Some(bounds));
        } else {
            self.node_mut(parent)
                .flags
                .insert(NodeFlags::CHILD_INDEX_STALE);
        }
        true
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        let (bounds, key) = {
            let c = self.node_mut(child);
            (c.bounds_in_parent(), c.index_key.take())
        };
        let pos = {
            let p = self.node_mut(parent);
            let pos = p.children.iter().position(|&c| c == child);
            if let Some(pos) = pos {
                p.children.remove(pos);
            }
            if let (Some(key), Some(index)) = (key, p.child_index.as_mut()) {
                index.remove(key);
                let _ = index.commit();
            }
            pos
        };
        if let Some(pos) = pos {
            self.renumber_siblings(parent, pos);
        }
        self.node_mut(child).parent = None;
        self.mark_spatial_dirty(child);
        self.epoch += 1;
        self.invalidate(parent, Some(bounds));
    }

    fn renumber_siblings(&mut self, parent: NodeId, from: usize) {
        let len = self.node(parent).children.len();
        for i in from..len {
            let c = self.node(parent).children[i];
            self.node_mut(c).sibling_index = i;
        }
    }

    fn track_child(&mut self, parent: NodeId, child: NodeId) {
        let bounds = self.node_mut(child).bounds_in_parent();
        let p = self.node_mut(parent);
        if p.flags.contains(NodeFlags::CHILD_INDEX_STALE) {
            return;
        }
        let Some(index) = p.child_index.as_mut() else {
            // First tracked insertion: index every current child at once.
            self.load_child_index(parent);
            return;
        };
        let key = index.insert(rect_to_aabb(bounds), child);
        let _ = index.commit();
        self.node_mut(child).index_key = Some(key);
    }

    /// Build (or rebuild) the child index from the current children.
    pub(crate) fn load_child_index(&mut self, parent: NodeId) {
        let children = mem::take(&mut self.node_mut(parent).children);
        let items: Vec<(Aabb2D<f64>, NodeId)> = children
            .iter()
            .map(|&c| (rect_to_aabb(self.node_mut(c).bounds_in_parent()), c))
            .collect();
        let config = self.index_config;
        let keys = {
            let p = self.node_mut(parent);
            p.children = children;
            p.flags.remove(NodeFlags::CHILD_INDEX_STALE);
            p.child_index
                .get_or_insert_with(|| Index::with_quadtree(config))
                .load(&items)
        };
        for ((_, c), key) in items.into_iter().zip(keys) {
            self.node_mut(c).index_key = Some(key);
        }
    }

    /// Mark `id` and its descendants as having stale world matrices.
    ///
    /// Stops at nodes that are already marked: their descendants are too.
    fn mark_spatial_dirty(&mut self, id: NodeId) {
        let mut stack = mem::take(&mut self.dirty_buf);
        stack.clear();
        stack.push(id);
        while let Some(n) = stack.pop() {
            let node = self.node_mut(n);
            if node.flags.contains(NodeFlags::SPATIAL_DIRTY) {
                continue;
            }
            node.flags.insert(NodeFlags::SPATIAL_DIRTY);
            stack.extend_from_slice(&node.children);
        }
        self.dirty_buf = stack;
    }

    // --- transforms ---

    /// World matrix of `id`, recomputing stale matrices on the way.
    ///
    /// Clean nodes answer from cache. Otherwise the ancestors are walked up to
    /// the first clean one (or the root), then resolved top-down; only the
    /// nodes on that path are touched.
    pub fn world_transform(&mut self, id: NodeId) -> Option<Affine> {
        let node = self.node_opt(id)?;
        if node.world_is_clean() {
            return Some(node.transform.world());
        }
        let mut path = mem::take(&mut self.path_buf);
        path.clear();
        let mut parent_world = None;
        let mut cur = Some(id);
        while let Some(c) = cur {
            let n = self.node(c);
            if n.world_is_clean() {
                parent_world = Some(n.transform.world());
                break;
            }
            path.push(c);
            cur = n.parent;
        }
        for &c in path.iter().rev() {
            let n = self.node_mut(c);
            n.transform.update_world_transform(parent_world);
            n.flags.remove(NodeFlags::SPATIAL_DIRTY);
            parent_world = Some(n.transform.world());
        }
        self.path_buf = path;
        parent_world
    }

    /// Local matrix of `id` relative to its parent.
    pub fn local_transform(&self, id: NodeId) -> Option<Affine> {
        Some(self.node_opt(id)?.transform.current_local())
    }

    /// Set the translation in parent space.
    pub fn set_position(&mut self, id: NodeId, x: f64, y: f64) -> bool {
        self.edit_transform(id, |t| t.set_position(x, y))
    }

    /// Set the rotation in radians.
    pub fn set_rotation(&mut self, id: NodeId, radians: f64) -> bool {
        self.edit_transform(id, |t| t.set_rotation(radians))
    }

    /// Set the scale factors.
    pub fn set_scale(&mut self, id: NodeId, sx: f64, sy: f64) -> bool {
        self.edit_transform(id, |t| t.set_scale(sx, sy))
    }

    /// Set translation and scale in one step.
    pub fn set_transform(&mut self, id: NodeId, x: f64, y: f64, sx: f64, sy: f64) -> bool {
        self.edit_transform(id, |t| t.set_transform(x, y, sx, sy))
    }

    fn edit_transform(&mut self, id: NodeId, edit: impl FnOnce(&mut Transform) -> bool) -> bool {
        let Some(node) = self.node_opt_mut(id) else {
            tracing::debug!(?id, "transform edit ignored: stale id");
            return false;
        };
        let old = node.bounds_in_parent();
        if !edit(&mut node.transform) {
            return false;
        }
        let new = node.bounds_in_parent();
        self.mark_spatial_dirty(id);
        self.geometry_changed(id, old, new);
        true
    }

    // --- size and constraints ---

    /// Resize `id` and run the constraint pass over its direct children.
    ///
    /// Negative or non-finite sizes are ignored.
    pub fn set_size(&mut self, id: NodeId, width: f64, height: f64) -> bool {
        if !(width >= 0.0 && height >= 0.0 && width.is_finite() && height.is_finite()) {
            tracing::debug!(?id, width, height, "set_size ignored: invalid size");
            return false;
        }
        let new_size = Size::new(width, height);
        let Some(node) = self.node_opt_mut(id) else {
            tracing::debug!(?id, "set_size ignored: stale id");
            return false;
        };
        let old_size = node.size;
        if old_size == new_size {
            return false;
        }
        let old = node.bounds_in_parent();
        node.size = new_size;
        let new = node.bounds_in_parent();
        self.geometry_changed(id, old, new);
        self.on_resize(id, old_size, new_size);
        true
    }

    /// Reposition and resize constrained children after `id` changed size.
    ///
    /// Children are adjusted directly; their own children are not revisited.
    fn on_resize(&mut self, id: NodeId, old: Size, new: Size) {
        for i in 0..self.node(id).children.len() {
            let child = self.node(id).children[i];
            let c = self.node(child);
            if c.constraints == Constraints::PINNED {
                continue;
            }
            let pos = c.transform.position();
            let (x, w) = c
                .constraints
                .horizontal
                .resolve(pos.x, c.size.width, old.width, new.width);
            let (y, h) = c
                .constraints
                .vertical
                .resolve(pos.y, c.size.height, old.height, new.height);
            self.apply_geometry(child, Point::new(x, y), Size::new(w, h));
        }
    }

    fn apply_geometry(&mut self, id: NodeId, pos: Point, size: Size) {
        let node = self.node_mut(id);
        let old = node.bounds_in_parent();
        let moved = node.transform.set_position(pos.x, pos.y);
        let resized = node.size != size;
        node.size = size;
        if !moved && !resized {
            return;
        }
        let new = node.bounds_in_parent();
        if moved {
            self.mark_spatial_dirty(id);
        }
        self.geometry_changed(id, old, new);
    }

    /// Set how `id` follows its parent's resizes.
    pub fn set_constraints(&mut self, id: NodeId, constraints: Constraints) -> bool {
        let Some(node) = self.node_opt_mut(id) else {
            tracing::debug!(?id, "set_constraints ignored: stale id");
            return false;
        };
        if node.constraints == constraints {
            return false;
        }
        node.constraints = constraints;
        self.invalidate_node(id);
        true
    }

    /// Refresh the parent's index entry and invalidate old and new bounds.
    fn geometry_changed(&mut self, id: NodeId, old: Rect, new: Rect) {
        let damage = self
            .refresh_index_entry(id, new)
            .unwrap_or_else(|| old.union(new));
        match self.node(id).parent {
            Some(parent) => self.invalidate(parent, Some(damage)),
            // A root's parent space is world space.
            None => self.notify(id, Some(damage)),
        }
    }

    fn refresh_index_entry(&mut self, id: NodeId, bounds: Rect) -> Option<Rect> {
        let node = self.node(id);
        let (parent, key) = (node.parent?, node.index_key?);
        let p = self.node_mut(parent);
        if p.flags.contains(NodeFlags::CHILD_INDEX_STALE) {
            return None;
        }
        let index = p.child_index.as_mut()?;
        index.update(key, rect_to_aabb(bounds));
        index.commit().union().map(aabb_to_rect)
    }

    // --- flags and paint ---

    /// Show or hide `id` and its subtree.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> bool {
        self.set_flag(id, NodeFlags::VISIBLE, visible)
    }

    /// Allow or refuse picking `id`.
    pub fn set_interactive(&mut self, id: NodeId, interactive: bool) -> bool {
        self.set_flag(id, NodeFlags::INTERACTIVE, interactive)
    }

    /// Lock or unlock `id` and its subtree.
    pub fn set_locked(&mut self, id: NodeId, locked: bool) -> bool {
        self.set_flag(id, NodeFlags::LOCKED, locked)
    }

    /// Mark `id` as hovered.
    pub fn set_hovered(&mut self, id: NodeId, hovered: bool) -> bool {
        self.set_flag(id, NodeFlags::HOVERED, hovered)
    }

    /// Mark `id` as selected.
    pub fn set_selected(&mut self, id: NodeId, selected: bool) -> bool {
        self.set_flag(id, NodeFlags::SELECTED, selected)
    }

    fn set_flag(&mut self, id: NodeId, flag: NodeFlags, on: bool) -> bool {
        let Some(node) = self.node_opt_mut(id) else {
            tracing::debug!(?id, ?flag, "flag change ignored: stale id");
            return false;
        };
        if node.flags.contains(flag) == on {
            return false;
        }
        node.flags.set(flag, on);
        self.invalidate_node(id);
        true
    }

    /// Replace the paint of `id`. The previous texture reference is released.
    pub fn set_paint(&mut self, id: NodeId, paint: Paint) -> bool {
        let Some(node) = self.node_opt_mut(id) else {
            tracing::debug!(?id, "set_paint ignored: stale id");
            return false;
        };
        if node.paint == paint {
            return false;
        }
        node.paint = paint;
        self.invalidate_node(id);
        true
    }

    pub(crate) fn invalidate_node(&mut self, id: NodeId) {
        let bounds = self.node(id).local_bounds();
        self.invalidate(id, Some(bounds));
    }

    pub(crate) fn set_sink(
        &mut self,
        id: NodeId,
        sink: Option<Box<dyn InvalidationSink>>,
    ) -> Option<Box<dyn InvalidationSink>> {
        let Some(node) = self.node_opt_mut(id) else {
            tracing::debug!(?id, "set_invalidation_sink ignored: stale id");
            return None;
        };
        mem::replace(&mut node.sink, sink)
    }

    // --- accessors ---

    /// Parent of `id`, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.parent
    }

    /// Children of `id` in paint order. Empty for stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node_opt(id).map_or(&[], |n| &n.children)
    }

    /// Flags of `id`.
    pub fn flags(&self, id: NodeId) -> Option<NodeFlags> {
        Some(self.node_opt(id)?.flags)
    }

    /// Size of `id`.
    pub fn size(&self, id: NodeId) -> Option<Size> {
        Some(self.node_opt(id)?.size)
    }

    /// Translation of `id` in parent space.
    pub fn position(&self, id: NodeId) -> Option<Point> {
        Some(self.node_opt(id)?.transform.position())
    }

    /// Rotation of `id` in radians.
    pub fn rotation(&self, id: NodeId) -> Option<f64> {
        Some(self.node_opt(id)?.transform.rotation())
    }

    /// Scale factors of `id`.
    pub fn scale(&self, id: NodeId) -> Option<Vec2> {
        Some(self.node_opt(id)?.transform.scale())
    }

    /// Paint of `id`.
    pub fn paint(&self, id: NodeId) -> Option<&Paint> {
        Some(&self.node_opt(id)?.paint)
    }

    /// Resize constraints of `id`.
    pub fn constraints(&self, id: NodeId) -> Option<Constraints> {
        Some(self.node_opt(id)?.constraints)
    }

    /// Position of `id` in the last [`visit_visible`](Self::visit_visible) traversal.
    pub fn render_order(&self, id: NodeId) -> Option<u32> {
        Some(self.node_opt(id)?.render_order)
    }

    /// Bounds of `id` in its parent's space (world space for roots).
    pub fn bounds_in_parent(&self, id: NodeId) -> Option<Rect> {
        let n = self.node_opt(id)?;
        Some(transform_rect_bbox(
            n.transform.current_local(),
            n.local_bounds(),
        ))
    }

    /// Number of entries in the child index of `id`, if it has one.
    pub fn child_index_len(&self, id: NodeId) -> Option<usize> {
        Some(self.node_opt(id)?.child_index.as_ref()?.len())
    }

    // --- internals ---

    /// Access a node; panics if `id` is stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    /// Access a node mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    pub(crate) fn node_opt(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }
}
