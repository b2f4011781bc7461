// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Scene: a retained 2D scene tree for infinite-canvas editors.
//!
//! - Every node is a rectangle of a given size with a local transform
//!   (translation, rotation, scale), flags, a [`Paint`], and resize
//!   [`Constraints`].
//! - World matrices are computed lazily. Moving a node marks its subtree
//!   dirty; the next read walks up to the first clean ancestor and resolves
//!   only that path.
//! - Each container keeps a [`trellis_index::QuadIndex`] over its direct
//!   children, so picking and culling scale with what is near the query
//!   instead of with the child count.
//! - Geometry and appearance changes are reported as world-space rectangles to
//!   any [`InvalidationSink`] on the node's parent chain.
//!
//! This is not a layout engine. Constraints only reposition and resize direct
//! children when their parent is resized.
//!
//! ## API overview
//!
//! - [`Tree`]: arena of nodes. Structure ([`Tree::add_child`],
//!   [`Tree::remove_child`], [`Tree::dispose`]), geometry setters, and queries.
//! - [`NodeId`]: generational handle of a node.
//! - [`NodeFlags`]: visibility, interaction, and bookkeeping bits.
//! - [`QueryFilter`]: restricts hit tests and rectangle queries.
//!
//! Key operations:
//! - [`Tree::world_transform`]
//! - [`Tree::hit_test`] and [`Tree::hit_test_node`]
//! - [`Tree::intersect_rect`] and [`Tree::visit_visible`]
//! - [`Tree::add_child_untracked`] followed by [`Tree::rebuild_child_index`]
//!   for bulk construction.
//!
//! ## Minimal usage
//!
//! ```
//! use kurbo::Point;
//! use trellis_scene::{QueryFilter, Tree};
//!
//! let mut tree = Tree::new();
//! let canvas = tree.create_node(1000.0, 1000.0);
//! let group = tree.insert(Some(canvas), 200.0, 200.0);
//! tree.set_position(group, 100.0, 100.0);
//! let card = tree.insert(Some(group), 50.0, 50.0);
//! tree.set_position(card, 10.0, 10.0);
//!
//! // The card follows its group.
//! tree.set_position(group, 300.0, 100.0);
//! let world = tree.world_transform(card).unwrap();
//! assert_eq!(world * Point::ORIGIN, Point::new(310.0, 110.0));
//!
//! let hit = tree.hit_test(canvas, Point::new(320.0, 120.0), QueryFilter::PICKING).unwrap();
//! assert_eq!(hit.node, card);
//! assert_eq!(hit.path, vec![canvas, group, card]);
//! ```

mod invalidate;
mod query;
mod transform;
mod tree;
mod types;
pub mod util;

pub use invalidate::InvalidationSink;
pub use transform::Transform;
pub use tree::Tree;
pub use types::{Constraint, Constraints, Hit, NodeFlags, NodeId, Paint, QueryFilter};

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_resource::{
        DecodedImage, InlineExecutor, TextureBackend, TextureCache, TextureId, TextureState,
    };

    #[derive(Default)]
    struct Gpu {
        next: u64,
        deleted: Vec<TextureId>,
    }

    impl TextureBackend for Gpu {
        fn upload(&mut self, _image: &DecodedImage) -> TextureId {
            self.next += 1;
            TextureId(self.next)
        }

        fn delete(&mut self, id: TextureId) {
            self.deleted.push(id);
        }
    }

    #[test]
    fn disposing_a_node_releases_its_texture() {
        let mut gpu = Gpu::default();
        let cache = TextureCache::builder()
            .executor(InlineExecutor)
            .build(&mut gpu);
        let tex = cache.load_or_get("swatch", DecodedImage::solid(2, 2, [255, 0, 0, 255]));
        cache.maintain(&mut gpu);
        let TextureState::Ready(id) = tex.resolve() else {
            panic!("inline load should be ready after maintain");
        };

        let mut tree = Tree::new();
        let root = tree.create_node(100.0, 100.0);
        let card = tree.insert(Some(root), 10.0, 10.0);
        tree.set_paint(card, Paint::textured(tex));
        assert_eq!(cache.use_count(&"swatch".into()), 1);

        tree.dispose(root);
        assert_eq!(cache.use_count(&"swatch".into()), 0);
        cache.maintain(&mut gpu);
        assert_eq!(gpu.deleted, [id]);
    }

    #[test]
    fn replacing_paint_drops_the_old_reference() {
        let mut gpu = Gpu::default();
        let cache = TextureCache::builder()
            .executor(InlineExecutor)
            .build(&mut gpu);
        let mut tree = Tree::new();
        let n = tree.create_node(10.0, 10.0);
        let tex = cache.load_or_get("a", DecodedImage::solid(1, 1, [0, 0, 0, 255]));
        assert!(tree.set_paint(n, Paint::textured(tex.clone())));
        assert_eq!(cache.use_count(&"a".into()), 2);
        drop(tex);
        assert!(tree.set_paint(n, Paint::solid([0.0, 0.0, 1.0, 1.0])));
        assert_eq!(cache.use_count(&"a".into()), 0);
    }
}
