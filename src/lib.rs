//! Ordered queue of variable-length byte buffers.
//!
//! [`BufQueue`] stores opaque byte blobs of per-element size and exposes
//! queue, deque, random-access, sort, and iteration operations over them.
//! It is a building block for producer/consumer pipelines, command/message
//! queuing, and sortable work lists.
//!
//! Nodes live in a slab and are chained by stable keys rather than pointers,
//! so every mutation is safe code and an operation either fully succeeds or
//! fails leaving the queue untouched.
//!
//! # Quick start
//!
//! ```
//! use bufqueue::{BufQueue, SortOrder};
//!
//! let mut queue = BufQueue::new();
//!
//! queue.push_back(b"banana").unwrap();
//! queue.push_back(b"apple").unwrap();
//! queue.push_front(b"cherry").unwrap();
//!
//! // Signed random access: 0 = head, -1 = tail.
//! assert_eq!(queue.get(0).unwrap(), b"cherry");
//! assert_eq!(queue.get(-1).unwrap(), b"apple");
//!
//! queue.sort(SortOrder::Ascending, |a, b| a.cmp(b)).unwrap();
//! let sorted: Vec<_> = queue.iter().collect();
//! assert_eq!(sorted, [&b"apple"[..], b"banana", b"cherry"]);
//!
//! assert_eq!(&queue.pop_front().unwrap()[..], b"apple");
//! ```
//!
//! # Limits
//!
//! Each queue carries an element-count limit and a per-buffer size limit
//! (`0` = unbounded, both default to 1024); violations surface as
//! [`Error::FullQueue`] and [`Error::BadSize`] at insertion time. Limits can
//! be read and adjusted at runtime through the [`OptionKey`] interface.
//!
//! # Reserve-then-fill
//!
//! Insertion has a no-copy variant for the "reserve space, fill later" use
//! case: [`BufQueue::reserve_back`] and friends allocate a zeroed buffer in
//! place and hand back `&mut [u8]` for the caller to fill.
//!
//! # Release hook
//!
//! For buffers whose bytes reference external resources, a
//! [`ReleaseHook`] registered via [`BufQueue::set_release_hook`] runs on
//! every buffer just before its node is discarded, on all removal paths
//! including [`BufQueue::clear`].
//!
//! # Concurrency
//!
//! The engine is single-threaded and synchronous. `&mut self` receivers
//! give it the exclusive access it needs; wrap the queue in a lock to share
//! it across threads.

#![warn(missing_docs)]

mod cache;
pub mod config;
pub mod error;
pub mod queue;

pub use config::{Config, OptionKey, ReleaseHook, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_MAX_COUNT};
pub use error::Error;
pub use queue::{BufQueue, Direction, Iter, SortOrder, Status};
