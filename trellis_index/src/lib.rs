// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Index: a generic 2D AABB index.
//!
//! - Insert, update, and remove axis-aligned bounding boxes (AABBs) with user payloads.
//! - Query by point or intersecting rectangle. Queries observe every mutation
//!   immediately.
//! - Bulk [`load`](IndexGeneric::load) a whole set in one pass.
//! - Drain batched damage with [`IndexGeneric::commit`] (added/removed/moved boxes).
//!
//! It is generic over the scalar type `T` and does not depend on any geometry crate.
//! The scene layer keeps one index per container, keyed by each child's bounds in
//! the container's local space.
//!
//! Backends are pluggable via the [`Backend`] trait. [`FlatVec`] is a linear scan
//! that works for any scalar. [`Quadtree`] is a loose quadtree over `f64` and is
//! what [`Index::with_quadtree`] builds.
//!
//! # Example
//!
//! ```rust
//! use trellis_index::{Aabb2D, Index, QuadtreeConfig};
//!
//! let mut idx = Index::<f64, u32>::with_quadtree(QuadtreeConfig::default());
//! let k1 = idx.insert(Aabb2D::from_xywh(0.0, 0.0, 10.0, 10.0), 1);
//! let _k2 = idx.insert(Aabb2D::from_xywh(5.0, 5.0, 10.0, 10.0), 2);
//! let _ = idx.commit();
//!
//! // Move the first box; the query sees it right away.
//! idx.update(k1, Aabb2D::from_xywh(20.0, 0.0, 10.0, 10.0));
//! let hits: Vec<_> = idx.query_point(6.0, 6.0).collect();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].1, 2);
//!
//! // The damage covers the old and new position.
//! let damage = idx.commit();
//! assert_eq!(damage.union(), Some(Aabb2D::from_xywh(0.0, 0.0, 30.0, 10.0)));
//! ```
//!
//! ### Float semantics
//!
//! NaN or infinite boxes are accepted but never partitioned; the quadtree keeps
//! them in an overflow bucket that every query scans.

#![no_std]

extern crate alloc;

pub mod backend;
pub mod backends;
pub mod damage;
pub mod index;
pub mod types;

pub use backend::Backend;
pub use backends::flatvec::FlatVec;
pub use backends::quadtree::{Quadtree, QuadtreeConfig};
pub use damage::Damage;
pub use index::{Index, IndexGeneric, Key, QuadIndex};
pub use types::Aabb2D;
