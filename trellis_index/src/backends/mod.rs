// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for different spatial strategies.
//!
//! - `flatvec`: flat vector with linear scans. Works for any scalar and serves
//!   as the reference the other backends are checked against.
//! - `quadtree`: loose quadtree over `f64`, with bulk loading and an
//!   in-place update fast path. Sublinear point and rect queries.

pub mod flatvec;
pub mod quadtree;

pub use flatvec::FlatVec;
pub use quadtree::{Quadtree, QuadtreeConfig};
