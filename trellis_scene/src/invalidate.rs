// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation: turning local changes into world-space repaint requests.

use kurbo::Rect;

use crate::tree::Tree;
use crate::types::NodeId;
use crate::util::transform_rect_bbox;

/// Receiver of repaint requests.
///
/// Attach one to any node with [`Tree::set_invalidation_sink`]; it hears about
/// every invalidation in that node's subtree. `None` means the whole surface.
pub trait InvalidationSink {
    /// A region (in world space) needs repainting.
    fn invalidate(&mut self, world_rect: Option<Rect>);
}

impl Tree {
    /// Attach a sink to `id`, returning the previous one.
    pub fn set_invalidation_sink(
        &mut self,
        id: NodeId,
        sink: Option<Box<dyn InvalidationSink>>,
    ) -> Option<Box<dyn InvalidationSink>> {
        self.set_sink(id, sink)
    }

    /// Request a repaint of `local_rect` (in `id`'s space), or of everything.
    ///
    /// The rect is mapped to world space once and then reported to every sink
    /// from `id` up to its root.
    pub fn invalidate(&mut self, id: NodeId, local_rect: Option<Rect>) {
        let world_rect = match local_rect {
            Some(r) => match self.world_transform(id) {
                Some(world) => Some(transform_rect_bbox(world, r)),
                None => {
                    tracing::debug!(?id, "invalidate ignored: stale id");
                    return;
                }
            },
            None => None,
        };
        self.notify(id, world_rect);
    }

    /// Report an already world-space rect to the sinks on the parent chain.
    pub(crate) fn notify(&mut self, id: NodeId, world_rect: Option<Rect>) {
        let mut cur = self.node_opt(id).map(|_| id);
        while let Some(c) = cur {
            let node = self.node_mut(c);
            if let Some(sink) = node.sink.as_mut() {
                sink.invalidate(world_rect);
            }
            cur = node.parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Option<Rect>>>>);

    impl InvalidationSink for Recorder {
        fn invalidate(&mut self, world_rect: Option<Rect>) {
            self.0.borrow_mut().push(world_rect);
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<Option<Rect>> {
            core::mem::take(&mut *self.0.borrow_mut())
        }
    }

    #[test]
    fn child_move_reports_old_and_new_world_bounds() {
        let mut tree = Tree::new();
        let root = tree.create_node(500.0, 500.0);
        tree.set_position(root, 100.0, 0.0);
        let child = tree.insert(Some(root), 10.0, 10.0);
        let rec = Recorder::default();
        tree.set_invalidation_sink(root, Some(Box::new(rec.clone())));

        tree.set_position(child, 20.0, 0.0);
        assert_eq!(rec.take(), [Some(Rect::new(100.0, 0.0, 130.0, 10.0))]);
    }

    #[test]
    fn every_sink_on_the_chain_hears_it() {
        let mut tree = Tree::new();
        let root = tree.create_node(100.0, 100.0);
        let mid = tree.insert(Some(root), 50.0, 50.0);
        tree.set_position(mid, 10.0, 10.0);
        let leaf = tree.insert(Some(mid), 5.0, 5.0);
        let (top, inner) = (Recorder::default(), Recorder::default());
        tree.set_invalidation_sink(root, Some(Box::new(top.clone())));
        tree.set_invalidation_sink(mid, Some(Box::new(inner.clone())));

        tree.set_visible(leaf, false);
        let expected = [Some(Rect::new(10.0, 10.0, 15.0, 15.0))];
        assert_eq!(top.take(), expected);
        assert_eq!(inner.take(), expected);

        tree.invalidate(leaf, None);
        assert_eq!(top.take(), [None]);
    }

    #[test]
    fn untracked_inserts_stay_quiet_until_rebuild() {
        let mut tree = Tree::new();
        let root = tree.create_node(100.0, 100.0);
        let rec = Recorder::default();
        tree.set_invalidation_sink(root, Some(Box::new(rec.clone())));
        for _ in 0..3 {
            let c = tree.create_node(1.0, 1.0);
            tree.add_child_untracked(root, c);
        }
        assert!(rec.take().is_empty());
        tree.rebuild_child_index(root);
        assert_eq!(rec.take(), [Some(Rect::new(0.0, 0.0, 100.0, 100.0))]);
    }

    #[test]
    fn root_move_reports_in_world_space() {
        let mut tree = Tree::new();
        let root = tree.create_node(10.0, 10.0);
        let rec = Recorder::default();
        tree.set_invalidation_sink(root, Some(Box::new(rec.clone())));
        tree.set_position(root, 5.0, 0.0);
        assert_eq!(rec.take(), [Some(Rect::new(0.0, 0.0, 15.0, 10.0))]);
    }
}
