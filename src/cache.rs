//! Position cache for accelerating indexed lookup.
//!
//! The queue remembers the last node a positional lookup landed on as a
//! `(key, forward-index)` pair. A later lookup starts walking from whichever
//! of head, tail, or the cached node is nearest to the target index. The
//! cache is purely a search-start hint: a lookup returns the same result
//! whether the cache is warm, cold, or invalidated.
//!
//! Every mutation that changes node count or shifts positions reports itself
//! here as a [`Mutation`], and the shift/invalidate rules live in one place
//! instead of being duplicated at each call site.

/// Sentinel key meaning "no node".
///
/// `slab::Slab` never hands out `usize::MAX` as a key, so it is reserved as
/// the null link, the same discipline as a sentinel index type.
pub(crate) const NONE: usize = usize::MAX;

/// How a mutation affected node positions, as seen by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mutation {
    /// A node was inserted at this forward index.
    Inserted { at: usize },
    /// The node at this forward index was removed.
    Removed { at: usize },
    /// Nodes were relinked in a new order.
    Reordered,
    /// All nodes were removed.
    Cleared,
}

/// Last-accessed `(key, forward-index)` hint.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PosCache {
    key: usize,
    index: usize,
}

impl PosCache {
    /// Creates an empty cache (no hint available).
    pub(crate) const fn new() -> Self {
        Self {
            key: NONE,
            index: 0,
        }
    }

    /// Returns the cached `(key, forward-index)` pair, if any.
    #[inline]
    pub(crate) fn hint(&self) -> Option<(usize, usize)> {
        if self.key == NONE {
            None
        } else {
            Some((self.key, self.index))
        }
    }

    /// Records the node a lookup landed on.
    #[inline]
    pub(crate) fn record(&mut self, key: usize, index: usize) {
        self.key = key;
        self.index = index;
    }

    /// Drops the hint.
    #[inline]
    pub(crate) fn invalidate(&mut self) {
        self.key = NONE;
    }

    /// Applies a mutation's effect on the cached position.
    ///
    /// Insertion at or before the cached index shifts it right; removal
    /// before it shifts it left; removal of the cached node itself, a
    /// reorder, or a clear drops the hint.
    pub(crate) fn apply(&mut self, mutation: Mutation) {
        if self.key == NONE {
            return;
        }

        match mutation {
            Mutation::Inserted { at } => {
                if at <= self.index {
                    self.index += 1;
                }
            }
            Mutation::Removed { at } => {
                if at == self.index {
                    self.invalidate();
                } else if at < self.index {
                    self.index -= 1;
                }
            }
            Mutation::Reordered | Mutation::Cleared => self.invalidate(),
        }
    }
}
