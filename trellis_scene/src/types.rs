// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene tree: node identifiers, flags, paint, and constraints.

use kurbo::Rect;
use trellis_resource::TextureRef;

/// Identifier for a node in the tree.
///
/// This is a small, copyable handle that stays stable across updates but becomes
/// invalid when the underlying slot is reused.
/// It consists of a slot index and a generation counter.
///
/// - On insert, a fresh slot is allocated with generation `1`.
/// - On dispose, the slot is freed; any existing `NodeId` that pointed to that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `NodeId`.
///
/// Use [`Tree::is_alive`](crate::Tree::is_alive) to check whether a `NodeId` still refers to a live node.
/// Stale `NodeId`s never alias a different live node because the generation must match.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Per-node state bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Node can be the target of a hit test.
        const INTERACTIVE       = 0b0000_0001;
        /// Pointer is over the node.
        const HOVERED           = 0b0000_0010;
        /// Node is part of the selection.
        const SELECTED          = 0b0000_0100;
        /// Node and its subtree refuse editing and picking.
        const LOCKED            = 0b0000_1000;
        /// Node and its subtree are drawn.
        const VISIBLE           = 0b0001_0000;
        /// Cached world matrix may be stale. Always set on every descendant of
        /// a node that has it.
        const SPATIAL_DIRTY     = 0b0010_0000;
        /// The child index no longer matches the children and must be rebuilt
        /// before it is queried.
        const CHILD_INDEX_STALE = 0b0100_0000;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::INTERACTIVE
    }
}

/// How a node fills its rectangle.
///
/// A node with a transparent color and no texture draws nothing; containers
/// usually look like that.
#[derive(Clone, Debug, PartialEq)]
pub struct Paint {
    /// Straight-alpha RGBA. Multiplies the texture when one is set.
    pub color: [f32; 4],
    /// Image drawn over the node's rectangle.
    pub texture: Option<TextureRef>,
    /// Normalized sub-rectangle of the texture to sample, e.g. an atlas cell.
    pub uv: Rect,
}

impl Paint {
    /// Full unit UV rectangle.
    pub const FULL_UV: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);

    /// A solid color fill.
    pub fn solid(color: [f32; 4]) -> Self {
        Self {
            color,
            texture: None,
            uv: Self::FULL_UV,
        }
    }

    /// An untinted texture.
    pub fn textured(texture: TextureRef) -> Self {
        Self {
            color: [1.0; 4],
            texture: Some(texture),
            uv: Self::FULL_UV,
        }
    }

    /// Sample only `uv` of the texture.
    pub fn with_uv(mut self, uv: Rect) -> Self {
        self.uv = uv;
        self
    }

    /// Whether drawing this paint produces any pixels.
    pub fn is_visible(&self) -> bool {
        self.texture.is_some() || self.color[3] > 0.0
    }
}

impl Default for Paint {
    fn default() -> Self {
        Self::solid([0.0; 4])
    }
}

/// How a child follows its parent along one axis when the parent is resized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// Keep the distance to the parent's start edge.
    #[default]
    Min,
    /// Keep the distance to the parent's end edge.
    Max,
    /// Keep the offset from the parent's center.
    Center,
    /// Scale position and size with the parent.
    Scale,
    /// Keep both margins; the child grows or shrinks.
    Stretch,
}

impl Constraint {
    /// New `(position, size)` along an axis when the parent's extent goes
    /// from `old` to `new`.
    pub fn resolve(self, pos: f64, size: f64, old: f64, new: f64) -> (f64, f64) {
        let delta = new - old;
        match self {
            Self::Min => (pos, size),
            Self::Max => (pos + delta, size),
            Self::Center => (pos + 0.5 * delta, size),
            Self::Scale if old > 0.0 => {
                let f = new / old;
                (pos * f, size * f)
            }
            Self::Scale => (pos, size),
            Self::Stretch => (pos, (size + delta).max(0.0)),
        }
    }
}

/// Horizontal and vertical resize behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Constraints {
    /// Behavior along x.
    pub horizontal: Constraint,
    /// Behavior along y.
    pub vertical: Constraint,
}

impl Constraints {
    /// Pin to the top-left corner; the default.
    pub const PINNED: Self = Self {
        horizontal: Constraint::Min,
        vertical: Constraint::Min,
    };

    /// Same behavior on both axes.
    pub const fn both(c: Constraint) -> Self {
        Self {
            horizontal: c,
            vertical: c,
        }
    }
}

/// Filters applied during hit testing and rectangle queries.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryFilter {
    /// Skip nodes (and their subtrees) without [`NodeFlags::VISIBLE`].
    pub visible_only: bool,
    /// Only report nodes with [`NodeFlags::INTERACTIVE`]. Their children are
    /// still searched.
    pub interactive_only: bool,
    /// Skip nodes (and their subtrees) with [`NodeFlags::LOCKED`].
    pub unlocked_only: bool,
}

impl QueryFilter {
    /// What pointer picking uses: visible, interactive, unlocked.
    pub const PICKING: Self = Self {
        visible_only: true,
        interactive_only: true,
        unlocked_only: true,
    };
}

/// Results of a hit test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hit {
    /// The matched node.
    pub node: NodeId,
    /// Path from the queried root to node (inclusive).
    pub path: Vec<NodeId>,
}
