// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batched damage returned by [`IndexGeneric::commit`](crate::IndexGeneric::commit).

use alloc::vec::Vec;

use crate::types::{Aabb2D, union_aabb};

/// Boxes touched since the previous commit.
///
/// Callers typically feed [`Damage::union`] to their invalidation path: the
/// union covers both where entries used to be and where they are now.
#[derive(Clone, Debug)]
pub struct Damage<T> {
    /// Newly added AABBs since last commit.
    pub added: Vec<Aabb2D<T>>,
    /// Removed AABBs since last commit.
    pub removed: Vec<Aabb2D<T>>,
    /// Moved AABBs since last commit: (old, new).
    pub moved: Vec<(Aabb2D<T>, Aabb2D<T>)>,
}

impl<T> Default for Damage<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            moved: Vec::new(),
        }
    }
}

impl<T: Copy + PartialOrd> Damage<T> {
    /// True if no damage entries recorded.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved.is_empty()
    }

    /// Number of boxes recorded, counting a move as two.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + 2 * self.moved.len()
    }

    /// Union of all AABBs affected. Returns `None` if empty.
    pub fn union(&self) -> Option<Aabb2D<T>> {
        let mut it = self
            .added
            .iter()
            .copied()
            .chain(self.removed.iter().copied())
            .chain(self.moved.iter().flat_map(|(a, b)| [*a, *b]));
        let first = it.next()?;
        Some(it.fold(first, union_aabb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_spans_old_and_new_positions() {
        let dmg = Damage {
            added: Vec::new(),
            removed: Vec::new(),
            moved: alloc::vec![(Aabb2D::new(0, 0, 10, 10), Aabb2D::new(50, 50, 60, 60))],
        };
        assert_eq!(dmg.len(), 2);
        assert_eq!(dmg.union(), Some(Aabb2D::new(0, 0, 60, 60)));
        assert_eq!(Damage::<i64>::default().union(), None);
    }
}
