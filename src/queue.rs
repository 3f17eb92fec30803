//! Ordered queue of variable-length byte buffers.
//!
//! Nodes live in a `slab::Slab` and are linked into a doubly-linked list by
//! stable slab keys, with `usize::MAX` reserved as the null link. The queue
//! tracks head, tail, and length; the slab owns the nodes. No raw pointers,
//! no manual deallocation.
//!
//! # Example
//!
//! ```
//! use bufqueue::BufQueue;
//!
//! let mut queue = BufQueue::new();
//!
//! queue.push_back(b"first").unwrap();
//! queue.push_back(b"second").unwrap();
//! queue.push_front(b"zeroth").unwrap();
//!
//! assert_eq!(queue.len(), 3);
//! assert_eq!(queue.get(0).unwrap(), b"zeroth");
//! assert_eq!(queue.get(-1).unwrap(), b"second");
//!
//! let front = queue.pop_front().unwrap();
//! assert_eq!(&front[..], b"zeroth");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops::ControlFlow;

use log::trace;
use slab::Slab;

use crate::cache::{Mutation, PosCache, NONE};
use crate::config::{Config, OptionKey, ReleaseHook};
use crate::error::Error;

/// A node in the queue: one owned buffer plus its list links.
#[derive(Debug)]
struct Node {
    buf: Box<[u8]>,
    prev: usize,
    next: usize,
}

/// Snapshot of queue occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    /// Number of buffers in the queue.
    pub len: usize,
    /// Size of the head buffer in bytes, `0` if empty.
    pub front_len: usize,
    /// Size of the tail buffer in bytes, `0` if empty.
    pub back_len: usize,
}

/// Sort direction for [`BufQueue::sort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first, per the comparator.
    Ascending,
    /// Largest first, per the comparator.
    Descending,
}

/// Traversal direction for [`BufQueue::for_each`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Head to tail, indices `0..len`.
    Forward,
    /// Tail to head, indices `len-1..=0`.
    Backward,
}

/// An ordered queue of variable-length byte buffers.
///
/// Supports queue and deque operations at both ends, insertion and removal
/// at arbitrary positions, signed random-access lookup, comparator-driven
/// sorting, and bidirectional traversal with early stop.
///
/// Buffers are opaque byte blobs sized per element. Insertion is bounded by
/// the configured element-count and buffer-size limits (`0` = unbounded);
/// see [`Config`].
///
/// # Example
///
/// ```
/// use bufqueue::{BufQueue, SortOrder};
///
/// let mut queue = BufQueue::new();
/// for word in [&b"pear"[..], b"apple", b"orange"] {
///     queue.push_back(word).unwrap();
/// }
///
/// queue.sort(SortOrder::Ascending, |a, b| a.cmp(b)).unwrap();
///
/// let sorted: Vec<_> = queue.iter().collect();
/// assert_eq!(sorted, [&b"apple"[..], b"orange", b"pear"]);
/// ```
pub struct BufQueue {
    nodes: Slab<Node>,
    head: usize,
    tail: usize,
    len: usize,
    config: Config,
    release: Option<ReleaseHook>,
    cache: PosCache,
}

impl BufQueue {
    /// Creates an empty queue with the default limits (1024 buffers of at
    /// most 1024 bytes each, no release hook).
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty queue with the given limits.
    pub fn with_config(config: Config) -> Self {
        Self {
            nodes: Slab::new(),
            head: NONE,
            tail: NONE,
            len: 0,
            config,
            release: None,
            cache: PosCache::new(),
        }
    }

    /// Returns the number of buffers in the queue.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the queue holds no buffers.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the current count together with the head and tail buffer
    /// sizes.
    pub fn status(&self) -> Status {
        Status {
            len: self.len,
            front_len: self.front().map_or(0, <[u8]>::len),
            back_len: self.back().map_or(0, <[u8]>::len),
        }
    }

    /// Returns the head buffer without removing it, or `None` if empty.
    #[inline]
    pub fn front(&self) -> Option<&[u8]> {
        if self.head == NONE {
            None
        } else {
            Some(&self.nodes[self.head].buf)
        }
    }

    /// Returns the tail buffer without removing it, or `None` if empty.
    #[inline]
    pub fn back(&self) -> Option<&[u8]> {
        if self.tail == NONE {
            None
        } else {
            Some(&self.nodes[self.tail].buf)
        }
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Copies `data` into a new buffer at the tail of the queue.
    ///
    /// # Errors
    ///
    /// - [`Error::FullQueue`] if the element-count limit would be exceeded.
    /// - [`Error::BadSize`] if `data` is empty or exceeds the buffer-size
    ///   limit.
    /// - [`Error::NoMemory`] if buffer allocation fails.
    #[inline]
    pub fn push_back(&mut self, data: &[u8]) -> Result<(), Error> {
        self.insert_node(self.len, Some(data), data.len())?;
        Ok(())
    }

    /// Copies `data` into a new buffer at the head of the queue.
    ///
    /// # Errors
    ///
    /// Same as [`push_back`](Self::push_back).
    #[inline]
    pub fn push_front(&mut self, data: &[u8]) -> Result<(), Error> {
        self.insert_node(0, Some(data), data.len())?;
        Ok(())
    }

    /// Copies `data` into a new buffer at forward index `index`.
    ///
    /// `index == 0` behaves as [`push_front`](Self::push_front) and
    /// `index == len` as [`push_back`](Self::push_back); anything in between
    /// splices the new buffer before the element currently at `index`.
    ///
    /// # Errors
    ///
    /// As [`push_back`](Self::push_back), plus [`Error::BadOffset`] if
    /// `index > len`.
    #[inline]
    pub fn insert(&mut self, index: usize, data: &[u8]) -> Result<(), Error> {
        self.insert_node(index, Some(data), data.len())?;
        Ok(())
    }

    /// Appends a `len`-byte buffer without copying anything into it and
    /// returns it for the caller to fill.
    ///
    /// The contents start zeroed; reading before writing is defined but
    /// carries no meaning until the caller fills the buffer.
    ///
    /// # Errors
    ///
    /// Same as [`push_back`](Self::push_back).
    pub fn reserve_back(&mut self, len: usize) -> Result<&mut [u8], Error> {
        let key = self.insert_node(self.len, None, len)?;
        Ok(&mut self.nodes[key].buf[..])
    }

    /// Prepends a `len`-byte buffer without copying anything into it and
    /// returns it for the caller to fill.
    ///
    /// # Errors
    ///
    /// Same as [`push_back`](Self::push_back).
    pub fn reserve_front(&mut self, len: usize) -> Result<&mut [u8], Error> {
        let key = self.insert_node(0, None, len)?;
        Ok(&mut self.nodes[key].buf[..])
    }

    /// Inserts a `len`-byte buffer at forward index `index` without copying
    /// anything into it and returns it for the caller to fill.
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert).
    pub fn reserve_at(&mut self, index: usize, len: usize) -> Result<&mut [u8], Error> {
        let key = self.insert_node(index, None, len)?;
        Ok(&mut self.nodes[key].buf[..])
    }

    /// Validates, allocates, and links one new node at forward index `at`.
    ///
    /// All checks run before any allocation, and allocation runs before any
    /// linkage, so a failure never leaves a partially inserted node.
    fn insert_node(&mut self, at: usize, src: Option<&[u8]>, len: usize) -> Result<usize, Error> {
        let max_count = self.config.max_count;
        if max_count != 0 && self.len + 1 > max_count {
            return Err(Error::FullQueue);
        }

        let max_size = self.config.max_buffer_size;
        if len == 0 || (max_size != 0 && len > max_size) {
            return Err(Error::BadSize);
        }

        if at > self.len {
            return Err(Error::BadOffset);
        }

        // Locate the splice point before allocating; the walk is read-only.
        let before = if at > 0 && at < self.len {
            Some(self.node_at(at))
        } else {
            None
        };

        let buf = alloc_buffer(src, len)?;
        let key = self.nodes.insert(Node {
            buf,
            prev: NONE,
            next: NONE,
        });

        match before {
            Some(before) => self.link_before(before, key),
            None if at == 0 => self.link_front(key),
            None => self.link_back(key),
        }

        self.cache.apply(Mutation::Inserted { at });
        Ok(key)
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Detaches and returns the head buffer.
    ///
    /// The release hook, if configured, runs on the buffer before it is
    /// returned.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyQueue`] if the queue is empty.
    pub fn pop_front(&mut self) -> Result<Box<[u8]>, Error> {
        if self.len == 0 {
            return Err(Error::EmptyQueue);
        }
        let key = self.head;
        Ok(self.remove_node(key, 0))
    }

    /// Detaches and returns the tail buffer.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyQueue`] if the queue is empty.
    pub fn pop_back(&mut self) -> Result<Box<[u8]>, Error> {
        if self.len == 0 {
            return Err(Error::EmptyQueue);
        }
        let key = self.tail;
        Ok(self.remove_node(key, self.len - 1))
    }

    /// Detaches and returns the buffer at forward index `index`.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyQueue`] if the queue is empty, [`Error::BadIndex`] if
    /// `index >= len`.
    pub fn remove(&mut self, index: usize) -> Result<Box<[u8]>, Error> {
        if self.len == 0 {
            return Err(Error::EmptyQueue);
        }
        if index >= self.len {
            return Err(Error::BadIndex);
        }
        let key = self.node_at(index);
        Ok(self.remove_node(key, index))
    }

    /// Removes every buffer, head to tail, running the release hook per
    /// buffer, and resets the queue to the empty state.
    ///
    /// A no-op on an already-empty queue.
    pub fn clear(&mut self) {
        if self.len == 0 {
            return;
        }
        trace!("clearing {} buffers", self.len);

        let mut key = self.head;
        while key != NONE {
            let next = self.nodes[key].next;
            let mut node = self.nodes.remove(key);
            if let Some(hook) = self.release.as_mut() {
                hook(&mut node.buf);
            }
            key = next;
        }

        self.head = NONE;
        self.tail = NONE;
        self.len = 0;
        self.cache.apply(Mutation::Cleared);
    }

    /// Unlinks `key` (known to sit at forward index `at`), runs the release
    /// hook, and returns the buffer.
    fn remove_node(&mut self, key: usize, at: usize) -> Box<[u8]> {
        self.unlink(key);
        let mut node = self.nodes.remove(key);
        if let Some(hook) = self.release.as_mut() {
            hook(&mut node.buf);
        }
        self.cache.apply(Mutation::Removed { at });
        node.buf
    }

    // ========================================================================
    // Peeking and indexed access
    // ========================================================================

    /// Borrows `len` bytes starting at `offset` of the head buffer without
    /// removing it.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyQueue`] if the queue is empty, [`Error::BadOffset`] if
    /// `offset` exceeds the head buffer's size, [`Error::BadSize`] if
    /// `offset + len` does.
    pub fn peek_front(&self, offset: usize, len: usize) -> Result<&[u8], Error> {
        if self.len == 0 {
            return Err(Error::EmptyQueue);
        }
        let buf = &self.nodes[self.head].buf;
        if offset > buf.len() {
            return Err(Error::BadOffset);
        }
        let end = offset.checked_add(len).ok_or(Error::BadSize)?;
        if end > buf.len() {
            return Err(Error::BadSize);
        }
        Ok(&buf[offset..end])
    }

    /// Borrows the buffer at a signed index.
    ///
    /// Non-negative indices count forward from the head (`0` = head);
    /// negative indices count backward from the tail (`-1` = tail, `-len` =
    /// head). The borrow ends at the next mutating call, enforced by the
    /// compiler.
    ///
    /// Lookup starts from whichever of head, tail, or the last-accessed node
    /// is nearest to the target; the hint never changes the result.
    ///
    /// # Errors
    ///
    /// [`Error::BadIndex`] if the index resolves outside `[0, len - 1]`.
    pub fn get(&mut self, index: isize) -> Result<&[u8], Error> {
        let fwd = self.resolve_index(index)?;
        let key = self.node_at(fwd);
        Ok(&self.nodes[key].buf)
    }

    /// Mutably borrows the buffer at a signed index.
    ///
    /// # Errors
    ///
    /// [`Error::BadIndex`] if the index resolves outside `[0, len - 1]`.
    pub fn get_mut(&mut self, index: isize) -> Result<&mut [u8], Error> {
        let fwd = self.resolve_index(index)?;
        let key = self.node_at(fwd);
        Ok(&mut self.nodes[key].buf)
    }

    /// Resolves a signed index to a forward index in `[0, len - 1]`.
    fn resolve_index(&self, index: isize) -> Result<usize, Error> {
        if index >= 0 {
            let fwd = index as usize;
            if fwd >= self.len {
                return Err(Error::BadIndex);
            }
            Ok(fwd)
        } else {
            let back = index.unsigned_abs();
            if back > self.len {
                return Err(Error::BadIndex);
            }
            Ok(self.len - back)
        }
    }

    /// Returns the key of the node at forward index `target`, walking from
    /// the nearest of head, tail, and the cached last-accessed node, and
    /// records the result in the cache.
    ///
    /// `target` must be in range.
    fn node_at(&mut self, target: usize) -> usize {
        debug_assert!(target < self.len);

        let mut start_key = self.head;
        let mut start_idx = 0;
        let mut best = target;

        let from_tail = self.len - 1 - target;
        if from_tail < best {
            best = from_tail;
            start_key = self.tail;
            start_idx = self.len - 1;
        }

        if let Some((key, index)) = self.cache.hint() {
            if index.abs_diff(target) < best {
                start_key = key;
                start_idx = index;
            }
        }

        let mut key = start_key;
        let mut idx = start_idx;
        while idx < target {
            key = self.nodes[key].next;
            idx += 1;
        }
        while idx > target {
            key = self.nodes[key].prev;
            idx -= 1;
        }

        self.cache.record(key, target);
        key
    }

    // ========================================================================
    // Sorting
    // ========================================================================

    /// Sorts the queue with a caller-supplied comparator.
    ///
    /// Node keys are snapshotted in list order, ordered by adjacent-exchange
    /// sort, and relinked. Ascending order swaps a pair when the comparator
    /// reports [`Ordering::Greater`] for (left, right); descending swaps on
    /// [`Ordering::Less`]. Equal elements never swap, so their relative
    /// order is preserved.
    ///
    /// Sorting invalidates the position-cache hint.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyQueue`] if the queue is empty. A single-element queue
    /// sorts trivially with `Ok(())`.
    ///
    /// # Example
    ///
    /// ```
    /// use bufqueue::{BufQueue, SortOrder};
    ///
    /// let mut queue = BufQueue::new();
    /// for n in [3u8, 1, 2] {
    ///     queue.push_back(&[n]).unwrap();
    /// }
    ///
    /// queue.sort(SortOrder::Descending, |a, b| a.cmp(b)).unwrap();
    /// assert_eq!(queue.get(0).unwrap(), &[3]);
    /// assert_eq!(queue.get(-1).unwrap(), &[1]);
    /// ```
    pub fn sort<F>(&mut self, order: SortOrder, mut cmp: F) -> Result<(), Error>
    where
        F: FnMut(&[u8], &[u8]) -> Ordering,
    {
        if self.len == 0 {
            return Err(Error::EmptyQueue);
        }
        if self.len == 1 {
            return Ok(());
        }

        // Snapshot keys in list order.
        let mut keys = Vec::with_capacity(self.len);
        let mut key = self.head;
        while key != NONE {
            keys.push(key);
            key = self.nodes[key].next;
        }

        let swap_on = match order {
            SortOrder::Ascending => Ordering::Greater,
            SortOrder::Descending => Ordering::Less,
        };

        for pass in 0..keys.len() - 1 {
            for j in 0..keys.len() - 1 - pass {
                let verdict = cmp(&self.nodes[keys[j]].buf, &self.nodes[keys[j + 1]].buf);
                if verdict == swap_on {
                    keys.swap(j, j + 1);
                }
            }
        }

        // Relink in array order.
        for i in 0..keys.len() {
            let prev = if i == 0 { NONE } else { keys[i - 1] };
            let next = if i + 1 == keys.len() { NONE } else { keys[i + 1] };
            let node = &mut self.nodes[keys[i]];
            node.prev = prev;
            node.next = next;
        }
        self.head = keys[0];
        self.tail = keys[keys.len() - 1];

        self.cache.apply(Mutation::Reordered);
        trace!("sorted {} buffers ({:?})", self.len, order);
        Ok(())
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Invokes `f` for each buffer in the given direction.
    ///
    /// The callback receives the element's forward index, the total count,
    /// and the buffer. Returning [`ControlFlow::Break`] halts the traversal
    /// immediately, and the break is returned as this call's outcome; it is
    /// a caller-requested early exit, not a failure. An empty queue returns
    /// [`ControlFlow::Continue`] without invoking `f`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::ops::ControlFlow;
    /// use bufqueue::{BufQueue, Direction};
    ///
    /// let mut queue = BufQueue::new();
    /// queue.push_back(b"a").unwrap();
    /// queue.push_back(b"b").unwrap();
    /// queue.push_back(b"c").unwrap();
    ///
    /// let mut seen = Vec::new();
    /// let outcome = queue.for_each(Direction::Backward, |idx, _total, buf| {
    ///     seen.push((idx, buf[0]));
    ///     ControlFlow::Continue(())
    /// });
    /// assert_eq!(outcome, ControlFlow::Continue(()));
    /// assert_eq!(seen, [(2, b'c'), (1, b'b'), (0, b'a')]);
    /// ```
    pub fn for_each<F>(&self, direction: Direction, mut f: F) -> ControlFlow<()>
    where
        F: FnMut(usize, usize, &[u8]) -> ControlFlow<()>,
    {
        let total = self.len;
        match direction {
            Direction::Forward => {
                let mut key = self.head;
                let mut idx = 0;
                while key != NONE {
                    let node = &self.nodes[key];
                    if let ControlFlow::Break(()) = f(idx, total, &node.buf) {
                        return ControlFlow::Break(());
                    }
                    key = node.next;
                    idx += 1;
                }
            }
            Direction::Backward => {
                let mut key = self.tail;
                let mut idx = total;
                while key != NONE {
                    idx -= 1;
                    let node = &self.nodes[key];
                    if let ControlFlow::Break(()) = f(idx, total, &node.buf) {
                        return ControlFlow::Break(());
                    }
                    key = node.prev;
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Returns a double-ended iterator over the buffers, front to back.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            nodes: &self.nodes,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }

    // ========================================================================
    // Options
    // ========================================================================

    /// Returns the current limits as a [`Config`].
    #[inline]
    pub fn config(&self) -> Config {
        self.config
    }

    /// Reads the limit selected by `key`.
    #[inline]
    pub fn opt(&self, key: OptionKey) -> usize {
        match key {
            OptionKey::MaxCount => self.config.max_count,
            OptionKey::MaxBufferSize => self.config.max_buffer_size,
        }
    }

    /// Sets the limit selected by `key`; `0` means unbounded.
    ///
    /// Limits apply to subsequent insertions only. Tightening a limit never
    /// evicts buffers already in the queue.
    pub fn set_opt(&mut self, key: OptionKey, value: usize) {
        trace!("set option {key:?} = {value}");
        match key {
            OptionKey::MaxCount => self.config.max_count = value,
            OptionKey::MaxBufferSize => self.config.max_buffer_size = value,
        }
    }

    /// Registers a hook invoked on every buffer just before its node is
    /// discarded, on all removal paths including [`clear`](Self::clear).
    ///
    /// Replaces any previously registered hook.
    pub fn set_release_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&mut [u8]) + Send + 'static,
    {
        trace!("release hook registered");
        self.release = Some(Box::new(hook));
    }

    /// Removes the release hook, if any.
    pub fn clear_release_hook(&mut self) {
        self.release = None;
    }

    // ========================================================================
    // Linkage
    // ========================================================================

    /// Links a fresh node as the new tail.
    fn link_back(&mut self, key: usize) {
        let tail = self.tail;
        {
            let node = &mut self.nodes[key];
            node.prev = tail;
            node.next = NONE;
        }
        if tail != NONE {
            self.nodes[tail].next = key;
        } else {
            self.head = key;
        }
        self.tail = key;
        self.len += 1;
    }

    /// Links a fresh node as the new head.
    fn link_front(&mut self, key: usize) {
        let head = self.head;
        {
            let node = &mut self.nodes[key];
            node.next = head;
            node.prev = NONE;
        }
        if head != NONE {
            self.nodes[head].prev = key;
        } else {
            self.tail = key;
        }
        self.head = key;
        self.len += 1;
    }

    /// Links a fresh node before `before`, which must be a live list member.
    fn link_before(&mut self, before: usize, key: usize) {
        let prev = self.nodes[before].prev;
        {
            let node = &mut self.nodes[key];
            node.next = before;
            node.prev = prev;
        }
        self.nodes[before].prev = key;
        if prev != NONE {
            self.nodes[prev].next = key;
        } else {
            self.head = key;
        }
        self.len += 1;
    }

    /// Detaches a live list member from the chain without deallocating it.
    fn unlink(&mut self, key: usize) {
        let (prev, next) = {
            let node = &self.nodes[key];
            (node.prev, node.next)
        };

        if prev != NONE {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }

        if next != NONE {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }

        self.len -= 1;
    }
}

impl Default for BufQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufQueue")
            .field("len", &self.len)
            .field("max_count", &self.config.max_count)
            .field("max_buffer_size", &self.config.max_buffer_size)
            .field("release_hook", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

/// Allocates one buffer, copying from `src` when given, zero-filling
/// otherwise.
///
/// Goes through `try_reserve_exact` so an allocation failure surfaces as
/// [`Error::NoMemory`] instead of aborting.
fn alloc_buffer(src: Option<&[u8]>, len: usize) -> Result<Box<[u8]>, Error> {
    debug_assert!(len > 0);
    debug_assert!(src.is_none_or(|s| s.len() == len));

    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::NoMemory)?;
    match src {
        Some(src) => buf.extend_from_slice(src),
        None => buf.resize(len, 0),
    }
    Ok(buf.into_boxed_slice())
}

// =============================================================================
// Iterator
// =============================================================================

/// Double-ended iterator over the buffers of a [`BufQueue`].
///
/// Created by [`BufQueue::iter`]. Yields front to back; use `rev()` for
/// backward traversal.
#[derive(Debug)]
pub struct Iter<'a> {
    nodes: &'a Slab<Node>,
    front: usize,
    back: usize,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.nodes[self.front];
        self.front = node.next;
        self.remaining -= 1;
        Some(&node.buf)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a> DoubleEndedIterator for Iter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.nodes[self.back];
        self.back = node.prev;
        self.remaining -= 1;
        Some(&node.buf)
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a BufQueue {
    type Item = &'a [u8];
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
impl BufQueue {
    /// Walks the list both ways and checks every structural invariant.
    fn assert_invariants(&self) {
        if self.len == 0 {
            assert_eq!(self.head, NONE);
            assert_eq!(self.tail, NONE);
            assert_eq!(self.cache.hint(), None);
            return;
        }

        assert_eq!(self.nodes[self.head].prev, NONE);
        assert_eq!(self.nodes[self.tail].next, NONE);

        // Forward walk visits exactly `len` nodes, back-links agreeing.
        let mut key = self.head;
        let mut last = NONE;
        let mut count = 0;
        while key != NONE {
            let node = &self.nodes[key];
            assert_eq!(node.prev, last);
            assert!(!node.buf.is_empty());
            if self.config.max_buffer_size != 0 {
                assert!(node.buf.len() <= self.config.max_buffer_size);
            }
            last = key;
            key = node.next;
            count += 1;
        }
        assert_eq!(count, self.len);
        assert_eq!(last, self.tail);

        if self.config.max_count != 0 {
            assert!(self.len <= self.config.max_count);
        }

        // Cached node, when present, is live and its stored index matches
        // its actual position.
        if let Some((cached_key, cached_idx)) = self.cache.hint() {
            let mut key = self.head;
            let mut idx = 0;
            while key != cached_key {
                assert_ne!(key, NONE, "cached node not in list");
                key = self.nodes[key].next;
                idx += 1;
            }
            assert_eq!(idx, cached_idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(items: &[&[u8]]) -> BufQueue {
        let mut queue = BufQueue::new();
        for item in items {
            queue.push_back(item).unwrap();
        }
        queue
    }

    #[test]
    fn new_is_empty() {
        let queue = BufQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.front(), None);
        assert_eq!(queue.back(), None);
        queue.assert_invariants();
    }

    #[test]
    fn push_back_links_in_order() {
        let queue = filled(&[b"a", b"b", b"c"]);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front(), Some(&b"a"[..]));
        assert_eq!(queue.back(), Some(&b"c"[..]));
        queue.assert_invariants();
    }

    #[test]
    fn push_front_links_in_reverse() {
        let mut queue = BufQueue::new();
        queue.push_front(b"a").unwrap();
        queue.push_front(b"b").unwrap();
        queue.push_front(b"c").unwrap();

        let order: Vec<_> = queue.iter().collect();
        assert_eq!(order, [&b"c"[..], b"b", b"a"]);
        queue.assert_invariants();
    }

    #[test]
    fn insert_middle_splices() {
        let mut queue = filled(&[b"a", b"c"]);
        queue.insert(1, b"b").unwrap();

        let order: Vec<_> = queue.iter().collect();
        assert_eq!(order, [&b"a"[..], b"b", b"c"]);
        queue.assert_invariants();
    }

    #[test]
    fn insert_bounds() {
        let mut queue = filled(&[b"a"]);
        assert_eq!(queue.insert(2, b"x"), Err(Error::BadOffset));
        assert_eq!(queue.len(), 1);
        queue.assert_invariants();
    }

    #[test]
    fn empty_buffer_rejected() {
        let mut queue = BufQueue::new();
        assert_eq!(queue.push_back(b""), Err(Error::BadSize));
        assert_eq!(queue.reserve_back(0), Err(Error::BadSize));
        queue.assert_invariants();
    }

    #[test]
    fn oversized_buffer_rejected() {
        let mut queue = BufQueue::with_config(Config {
            max_count: 0,
            max_buffer_size: 4,
        });
        assert_eq!(queue.push_back(b"12345"), Err(Error::BadSize));
        queue.push_back(b"1234").unwrap();
        queue.assert_invariants();
    }

    #[test]
    fn full_queue_rejected_before_size_check() {
        let mut queue = BufQueue::with_config(Config {
            max_count: 1,
            max_buffer_size: 4,
        });
        queue.push_back(b"a").unwrap();

        // Both limits violated; count check wins.
        assert_eq!(queue.push_back(b"12345"), Err(Error::FullQueue));
        queue.assert_invariants();
    }

    #[test]
    fn reserve_is_zeroed_and_writable() {
        let mut queue = BufQueue::new();
        {
            let buf = queue.reserve_back(4).unwrap();
            assert_eq!(buf, [0, 0, 0, 0]);
            buf.copy_from_slice(b"fill");
        }
        assert_eq!(queue.get(0).unwrap(), b"fill");
        queue.assert_invariants();
    }

    #[test]
    fn reserve_at_splices() {
        let mut queue = filled(&[b"a", b"c"]);
        queue.reserve_at(1, 1).unwrap()[0] = b'b';

        let order: Vec<_> = queue.iter().collect();
        assert_eq!(order, [&b"a"[..], b"b", b"c"]);
        queue.assert_invariants();
    }

    #[test]
    fn pop_front_is_fifo() {
        let mut queue = filled(&[b"a", b"b", b"c"]);
        assert_eq!(&queue.pop_front().unwrap()[..], b"a");
        assert_eq!(&queue.pop_front().unwrap()[..], b"b");
        assert_eq!(&queue.pop_front().unwrap()[..], b"c");
        assert_eq!(queue.pop_front(), Err(Error::EmptyQueue));
        queue.assert_invariants();
    }

    #[test]
    fn pop_back_is_lifo() {
        let mut queue = filled(&[b"a", b"b", b"c"]);
        assert_eq!(&queue.pop_back().unwrap()[..], b"c");
        assert_eq!(&queue.pop_back().unwrap()[..], b"b");
        assert_eq!(&queue.pop_back().unwrap()[..], b"a");
        assert_eq!(queue.pop_back(), Err(Error::EmptyQueue));
        queue.assert_invariants();
    }

    #[test]
    fn remove_middle_relinks() {
        let mut queue = filled(&[b"a", b"b", b"c"]);
        assert_eq!(&queue.remove(1).unwrap()[..], b"b");

        let order: Vec<_> = queue.iter().collect();
        assert_eq!(order, [&b"a"[..], b"c"]);
        queue.assert_invariants();
    }

    #[test]
    fn remove_bounds() {
        let mut queue = filled(&[b"a"]);
        assert_eq!(queue.remove(1), Err(Error::BadIndex));

        queue.clear();
        assert_eq!(queue.remove(0), Err(Error::EmptyQueue));
        queue.assert_invariants();
    }

    #[test]
    fn peek_front_window() {
        let queue = filled(&[b"abcdef"]);
        assert_eq!(queue.peek_front(0, 6).unwrap(), b"abcdef");
        assert_eq!(queue.peek_front(2, 3).unwrap(), b"cde");
        assert_eq!(queue.peek_front(6, 0).unwrap(), b"");
        assert_eq!(queue.peek_front(7, 0), Err(Error::BadOffset));
        assert_eq!(queue.peek_front(4, 3), Err(Error::BadSize));
        assert_eq!(queue.peek_front(0, usize::MAX), Err(Error::BadSize));
    }

    #[test]
    fn peek_front_empty() {
        let queue = BufQueue::new();
        assert_eq!(queue.peek_front(0, 0), Err(Error::EmptyQueue));
    }

    #[test]
    fn signed_index_laws() {
        let mut queue = filled(&[b"a", b"b", b"c"]);
        let len = queue.len() as isize;

        assert_eq!(queue.get(0).unwrap(), b"a");
        assert_eq!(queue.get(2).unwrap(), b"c");
        assert_eq!(queue.get(-1).unwrap(), b"c");
        assert_eq!(queue.get(-len).unwrap(), b"a");
        assert_eq!(queue.get(len), Err(Error::BadIndex));
        assert_eq!(queue.get(-(len + 1)), Err(Error::BadIndex));
        queue.assert_invariants();
    }

    #[test]
    fn get_mut_writes_through() {
        let mut queue = filled(&[b"a", b"b"]);
        queue.get_mut(-1).unwrap()[0] = b'z';
        assert_eq!(queue.get(1).unwrap(), b"z");
        queue.assert_invariants();
    }

    #[test]
    fn lookup_result_independent_of_cache_state() {
        let items: Vec<Vec<u8>> = (0u8..16).map(|n| vec![n]).collect();
        let refs: Vec<&[u8]> = items.iter().map(|v| &v[..]).collect();

        for target in 0..16isize {
            // Cold cache.
            let mut cold = filled(&refs);
            let expected = cold.get(target).unwrap().to_vec();

            // Warmed at every other position first.
            for warm_at in 0..16isize {
                let mut warm = filled(&refs);
                warm.get(warm_at).unwrap();
                assert_eq!(warm.get(target).unwrap(), &expected[..]);
                warm.assert_invariants();
            }
        }
    }

    #[test]
    fn cache_survives_unrelated_mutations() {
        let mut queue = filled(&[b"a", b"b", b"c", b"d"]);
        queue.get(2).unwrap();

        // Insert before the cached node, remove elsewhere; the policy keeps
        // the hint consistent with the shifted positions.
        queue.insert(0, b"x").unwrap();
        queue.assert_invariants();
        queue.remove(4).unwrap();
        queue.assert_invariants();
        assert_eq!(queue.get(3).unwrap(), b"c");
    }

    #[test]
    fn invariants_across_mixed_mutations() {
        let mut queue = BufQueue::new();
        for n in 0u8..8 {
            queue.push_back(&[n]).unwrap();
            queue.assert_invariants();
        }
        queue.push_front(&[100]).unwrap();
        queue.assert_invariants();
        queue.insert(4, &[101]).unwrap();
        queue.assert_invariants();
        queue.get(5).unwrap();
        queue.assert_invariants();
        queue.remove(5).unwrap();
        queue.assert_invariants();
        queue.pop_front().unwrap();
        queue.assert_invariants();
        queue.pop_back().unwrap();
        queue.assert_invariants();
        queue.sort(SortOrder::Ascending, |a, b| a.cmp(b)).unwrap();
        queue.assert_invariants();
        queue.clear();
        queue.assert_invariants();
    }

    #[test]
    fn sort_ascending_and_descending() {
        let mut queue = filled(&[&[3u8][..], &[1], &[2]]);
        queue.sort(SortOrder::Ascending, |a, b| a.cmp(b)).unwrap();
        let order: Vec<_> = queue.iter().map(|b| b[0]).collect();
        assert_eq!(order, [1, 2, 3]);
        queue.assert_invariants();

        queue.sort(SortOrder::Descending, |a, b| a.cmp(b)).unwrap();
        let order: Vec<_> = queue.iter().map(|b| b[0]).collect();
        assert_eq!(order, [3, 2, 1]);
        queue.assert_invariants();
    }

    #[test]
    fn sort_trivial_cases() {
        let mut queue = BufQueue::new();
        assert_eq!(
            queue.sort(SortOrder::Ascending, |a, b| a.cmp(b)),
            Err(Error::EmptyQueue)
        );

        queue.push_back(b"only").unwrap();
        queue.sort(SortOrder::Ascending, |a, b| a.cmp(b)).unwrap();
        assert_eq!(queue.get(0).unwrap(), b"only");
        queue.assert_invariants();
    }

    #[test]
    fn sort_is_stable_on_equal_keys() {
        // Compare by the first byte only; the second byte tags insertion
        // order among equals.
        let mut queue = filled(&[&[2, b'x'][..], &[1, b'a'], &[2, b'y'], &[1, b'b'], &[2, b'z']]);
        queue
            .sort(SortOrder::Ascending, |a, b| a[0].cmp(&b[0]))
            .unwrap();

        let order: Vec<_> = queue.iter().map(|b| (b[0], b[1])).collect();
        assert_eq!(
            order,
            [(1, b'a'), (1, b'b'), (2, b'x'), (2, b'y'), (2, b'z')]
        );
        queue.assert_invariants();
    }

    #[test]
    fn for_each_forward_and_backward() {
        let queue = filled(&[b"a", b"b", b"c"]);

        let mut forward = Vec::new();
        let outcome = queue.for_each(Direction::Forward, |idx, total, buf| {
            forward.push((idx, total, buf[0]));
            ControlFlow::Continue(())
        });
        assert_eq!(outcome, ControlFlow::Continue(()));
        assert_eq!(forward, [(0, 3, b'a'), (1, 3, b'b'), (2, 3, b'c')]);

        let mut backward = Vec::new();
        queue.for_each(Direction::Backward, |idx, total, buf| {
            backward.push((idx, total, buf[0]));
            ControlFlow::Continue(())
        });
        assert_eq!(backward, [(2, 3, b'c'), (1, 3, b'b'), (0, 3, b'a')]);
    }

    #[test]
    fn for_each_early_stop() {
        let queue = filled(&[b"a", b"b", b"c"]);

        let mut calls = 0;
        let outcome = queue.for_each(Direction::Forward, |idx, _, _| {
            calls += 1;
            if idx == 1 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(outcome, ControlFlow::Break(()));
        assert_eq!(calls, 2);
    }

    #[test]
    fn for_each_empty_never_calls() {
        let queue = BufQueue::new();
        let outcome = queue.for_each(Direction::Forward, |_, _, _| {
            panic!("callback on empty queue")
        });
        assert_eq!(outcome, ControlFlow::Continue(()));
    }

    #[test]
    fn iter_is_double_ended() {
        let queue = filled(&[b"a", b"b", b"c"]);

        let forward: Vec<_> = queue.iter().collect();
        assert_eq!(forward, [&b"a"[..], b"b", b"c"]);

        let backward: Vec<_> = queue.iter().rev().collect();
        assert_eq!(backward, [&b"c"[..], b"b", b"a"]);

        let mut iter = queue.iter();
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.next(), Some(&b"a"[..]));
        assert_eq!(iter.next_back(), Some(&b"c"[..]));
        assert_eq!(iter.next(), Some(&b"b"[..]));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);
    }

    #[test]
    fn capacity_limit_enforced() {
        let mut queue = BufQueue::with_config(Config {
            max_count: 2,
            max_buffer_size: 0,
        });
        queue.push_back(b"a").unwrap();
        queue.push_back(b"b").unwrap();
        assert_eq!(queue.push_back(b"c"), Err(Error::FullQueue));
        assert_eq!(queue.len(), 2);
        queue.assert_invariants();
    }

    #[test]
    fn clear_is_idempotent() {
        let mut queue = filled(&[b"a", b"b"]);
        queue.clear();
        assert!(queue.is_empty());
        queue.assert_invariants();

        queue.clear();
        assert!(queue.is_empty());
        queue.assert_invariants();

        // Reusable after clearing.
        queue.push_back(b"again").unwrap();
        assert_eq!(queue.len(), 1);
        queue.assert_invariants();
    }

    #[test]
    fn status_reports_end_sizes() {
        let mut queue = BufQueue::new();
        assert_eq!(queue.status(), Status::default());

        queue.push_back(b"ab").unwrap();
        queue.push_back(b"cdef").unwrap();
        assert_eq!(
            queue.status(),
            Status {
                len: 2,
                front_len: 2,
                back_len: 4,
            }
        );
    }

    #[test]
    fn options_round_trip() {
        let mut queue = BufQueue::new();
        assert_eq!(queue.opt(OptionKey::MaxCount), 1024);
        assert_eq!(queue.opt(OptionKey::MaxBufferSize), 1024);

        queue.set_opt(OptionKey::MaxCount, 0);
        queue.set_opt(OptionKey::MaxBufferSize, 8);
        assert_eq!(queue.opt(OptionKey::MaxCount), 0);
        assert_eq!(queue.opt(OptionKey::MaxBufferSize), 8);
        assert_eq!(
            queue.config(),
            Config {
                max_count: 0,
                max_buffer_size: 8,
            }
        );
    }

    #[test]
    fn tightening_limits_never_evicts() {
        let mut queue = filled(&[b"abc", b"defg"]);
        queue.set_opt(OptionKey::MaxCount, 1);
        queue.set_opt(OptionKey::MaxBufferSize, 1);

        // Existing elements untouched, new insertions constrained.
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.push_back(b"x"), Err(Error::FullQueue));
        queue.assert_invariants();
    }

    #[test]
    fn release_hook_runs_on_every_removal_path() {
        use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
        use std::sync::Arc;

        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);

        let mut queue = filled(&[b"a", b"b", b"c", b"d", b"e"]);
        queue.set_release_hook(move |_| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        });

        queue.pop_front().unwrap();
        queue.pop_back().unwrap();
        queue.remove(1).unwrap();
        assert_eq!(released.load(AtomicOrdering::SeqCst), 3);

        queue.clear();
        assert_eq!(released.load(AtomicOrdering::SeqCst), 5);
    }

    #[test]
    fn release_hook_sees_buffer_contents() {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        let mut queue = filled(&[b"a", b"b", b"c"]);
        queue.set_release_hook(move |buf| {
            tx.send(buf.to_vec()).unwrap();
        });

        queue.clear();
        let order: Vec<Vec<u8>> = rx.try_iter().collect();
        assert_eq!(order, [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn clear_release_hook_stops_callbacks() {
        use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
        use std::sync::Arc;

        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);

        let mut queue = filled(&[b"a", b"b"]);
        queue.set_release_hook(move |_| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        });
        queue.pop_front().unwrap();
        queue.clear_release_hook();
        queue.pop_front().unwrap();

        assert_eq!(released.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn node_at_walks_from_nearest_end() {
        // Behavioral check only: every position resolves correctly on a
        // queue long enough that head, tail, and cached starts all get used.
        let items: Vec<Vec<u8>> = (0u8..32).map(|n| vec![n]).collect();
        let refs: Vec<&[u8]> = items.iter().map(|v| &v[..]).collect();
        let mut queue = filled(&refs);

        queue.get(16).unwrap(); // warm the hint mid-list
        for i in 0..32isize {
            assert_eq!(queue.get(i).unwrap(), &[i as u8]);
        }
        for i in 1..=32isize {
            assert_eq!(queue.get(-i).unwrap(), &[(32 - i) as u8]);
        }
        queue.assert_invariants();
    }

    #[test]
    fn debug_format_is_stable() {
        let queue = filled(&[b"a"]);
        let rendered = format!("{queue:?}");
        assert!(rendered.contains("len: 1"));
        assert!(rendered.contains("release_hook: false"));
    }
}
