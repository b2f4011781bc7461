// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `Index` API and generic implementation over a pluggable backend.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::backends::flatvec::FlatVec;
use crate::backends::quadtree::{Quadtree, QuadtreeConfig};
use crate::damage::Damage;
use crate::types::Aabb2D;

/// Generational handle for entries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(u32, u32);

impl Key {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Index keys are intentionally 32-bit; higher bits are truncated by design."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    Added,
    Updated,
    Removed,
    /// Added and removed within one batch; already on the free list.
    Discarded,
}

#[derive(Clone, Debug)]
struct Entry<T, P> {
    generation: u32,
    aabb: Aabb2D<T>,
    payload: P,
    mark: Option<Mark>,
    prev_aabb: Option<Aabb2D<T>>, // for moved damage
}

impl<T, P> Entry<T, P> {
    fn is_live(&self) -> bool {
        !matches!(self.mark, Some(Mark::Removed | Mark::Discarded))
    }
}

/// A generic AABB index parameterized by a spatial backend.
///
/// Mutations reach the backend immediately, so queries always observe the
/// latest boxes. [`commit`](Self::commit) only drains the damage accumulated
/// since the previous commit.
#[derive(Debug)]
pub struct IndexGeneric<T: Copy + PartialOrd + Debug, P: Copy + Debug, B: Backend<T>> {
    entries: Vec<Option<Entry<T, P>>>,
    free_list: Vec<usize>,
    changed: Vec<usize>,
    live: usize,
    backend: B,
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T> + Default,
{
    /// Create an empty index using the backend's default constructor.
    pub fn new() -> Self {
        Self::with_backend(B::default())
    }
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T>,
{
    /// Create an empty index around an already configured backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            changed: Vec::new(),
            live: 0,
            backend,
        }
    }

    /// Reserve space for at least `n` entries.
    pub fn reserve(&mut self, n: usize) {
        self.entries.reserve(n);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the index holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Borrow the spatial backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Insert a new AABB with payload. Returns a stable handle `Key`.
    pub fn insert(&mut self, aabb: Aabb2D<T>, payload: P) -> Key {
        let entry = |generation| Entry {
            generation,
            aabb,
            payload,
            mark: Some(Mark::Added),
            prev_aabb: None,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.entries[idx]
                .as_ref()
                .map(|e| e.generation)
                .unwrap_or(0)
                .wrapping_add(1);
            self.entries[idx] = Some(entry(generation));
            (idx, generation)
        } else {
            self.entries.push(Some(entry(1)));
            (self.entries.len() - 1, 1)
        };
        self.backend.insert(idx, aabb);
        self.changed.push(idx);
        self.live += 1;
        Key::new(idx, generation)
    }

    /// Update an existing AABB. Unknown or removed keys are ignored.
    pub fn update(&mut self, key: Key, aabb: Aabb2D<T>) {
        let Some(e) = self.entry_mut(key) else {
            return;
        };
        let was_clean = e.mark.is_none();
        if was_clean {
            e.prev_aabb = Some(e.aabb);
        }
        e.aabb = aabb;
        e.mark = Some(match e.mark {
            Some(Mark::Added) => Mark::Added,
            _ => Mark::Updated,
        });
        self.backend.update(key.idx(), aabb);
        if was_clean {
            self.changed.push(key.idx());
        }
    }

    /// Replace the payload of an existing entry without touching its bounds.
    pub fn set_payload(&mut self, key: Key, payload: P) {
        if let Some(e) = self.entry_mut(key) {
            e.payload = payload;
        }
    }

    /// Remove an existing AABB. Unknown or already removed keys are ignored.
    ///
    /// The entry disappears from queries immediately; its bounds are reported
    /// in the next [`commit`](Self::commit) unless it was added in this batch.
    pub fn remove(&mut self, key: Key) {
        let idx = key.idx();
        let Some(e) = self.entry_mut(key) else {
            return;
        };
        let mark = e.mark;
        match mark {
            Some(Mark::Added) => {
                // The slot keeps its generation so `key` stays stale after reuse.
                e.mark = Some(Mark::Discarded);
                self.free_list.push(idx);
            }
            _ => {
                e.mark = Some(Mark::Removed);
                if mark.is_none() {
                    self.changed.push(idx);
                }
            }
        }
        self.backend.remove(idx);
        self.live -= 1;
    }

    /// Look up the current bounds and payload for `key`.
    pub fn get(&self, key: Key) -> Option<(Aabb2D<T>, P)> {
        let e = self.entries.get(key.idx())?.as_ref()?;
        (e.generation == key.1 && e.is_live()).then_some((e.aabb, e.payload))
    }

    /// Clear the index (without reporting damage).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.free_list.clear();
        self.changed.clear();
        self.live = 0;
        self.backend.clear();
    }

    /// Replace the whole contents with `items`, letting the backend build its
    /// structure in one pass. Produces no damage.
    ///
    /// Returned keys are in the same order as `items`.
    pub fn load(&mut self, items: &[(Aabb2D<T>, P)]) -> Vec<Key> {
        self.clear();
        self.entries.reserve(items.len());
        let mut pairs = Vec::with_capacity(items.len());
        let mut keys = Vec::with_capacity(items.len());
        for (i, &(aabb, payload)) in items.iter().enumerate() {
            self.entries.push(Some(Entry {
                generation: 1,
                aabb,
                payload,
                mark: None,
                prev_aabb: None,
            }));
            pairs.push((i, aabb));
            keys.push(Key::new(i, 1));
        }
        self.backend.load(&pairs);
        self.live = items.len();
        keys
    }

    /// Drain batched damage accumulated since the last commit.
    ///
    /// Cost is proportional to the number of entries touched in the batch.
    pub fn commit(&mut self) -> Damage<T> {
        let mut dmg = Damage::default();
        for i in core::mem::take(&mut self.changed) {
            let Some(entry) = self.entries.get_mut(i).and_then(Option::as_mut) else {
                continue;
            };
            match entry.mark.take() {
                Some(Mark::Added) => dmg.added.push(entry.aabb),
                Some(Mark::Removed) => {
                    if let Some(prev) = entry.prev_aabb.take()
                        && prev != entry.aabb
                    {
                        dmg.removed.push(prev);
                    }
                    dmg.removed.push(entry.aabb);
                    // Keep the entry (and its generation) as a dead slot.
                    entry.mark = Some(Mark::Removed);
                    self.free_list.push(i);
                }
                Some(Mark::Updated) => {
                    if let Some(prev) = entry.prev_aabb.take()
                        && prev != entry.aabb
                    {
                        dmg.moved.push((prev, entry.aabb));
                    }
                }
                Some(Mark::Discarded) => entry.mark = Some(Mark::Discarded),
                None => {}
            }
        }
        dmg
    }

    /// Entries whose AABB contains the point, in no particular order.
    pub fn query_point(&self, x: T, y: T) -> impl Iterator<Item = (Key, P)> + '_ {
        let mut slots = Vec::new();
        self.backend.visit_point(x, y, &mut |s| slots.push(s));
        self.resolve(slots)
    }

    /// Entries whose AABB intersects `rect`, in no particular order.
    pub fn query_rect(&self, rect: Aabb2D<T>) -> impl Iterator<Item = (Key, P)> + '_ {
        let mut slots = Vec::new();
        self.backend.visit_rect(rect, &mut |s| slots.push(s));
        self.resolve(slots)
    }

    /// Iterate over every live entry in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Key, Aabb2D<T>, P)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            let e = e.as_ref()?;
            e.is_live()
                .then_some((Key::new(i, e.generation), e.aabb, e.payload))
        })
    }

    fn resolve(&self, slots: Vec<usize>) -> impl Iterator<Item = (Key, P)> + '_ {
        slots.into_iter().filter_map(|i| {
            let e = self.entries.get(i)?.as_ref()?;
            e.is_live()
                .then_some((Key::new(i, e.generation), e.payload))
        })
    }

    fn entry_mut(&mut self, key: Key) -> Option<&mut Entry<T, P>> {
        let e = self.entries.get_mut(key.idx())?.as_mut()?;
        if e.generation != key.1 || !e.is_live() {
            return None;
        }
        Some(e)
    }
}

/// Default index using a flat vector backend.
pub type Index<T, P> = IndexGeneric<T, P, FlatVec<T>>;

/// Index backed by the loose [`Quadtree`].
pub type QuadIndex<P> = IndexGeneric<f64, P, Quadtree>;

impl<T: Copy + PartialOrd + Debug, P: Copy + Debug> Default for Index<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy + Debug> Index<f64, P> {
    /// Create a quadtree-backed index with the given tuning.
    pub fn with_quadtree(config: QuadtreeConfig) -> QuadIndex<P> {
        IndexGeneric::with_backend(Quadtree::new(config))
    }
}
