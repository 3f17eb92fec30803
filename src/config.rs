//! Runtime limits and the release hook.
//!
//! A [`Config`] holds the two insertion-time limits. A limit of `0` means
//! unbounded. Limits are consulted only when a buffer is inserted; tightening
//! a limit on a live queue never evicts existing elements.

/// Default maximum number of buffers in a queue.
pub const DEFAULT_MAX_COUNT: usize = 1024;

/// Default maximum size of a single buffer, in bytes.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024;

/// Hook invoked on a buffer just before its node is discarded.
///
/// Intended for buffers whose bytes reference external resources (handles,
/// offsets into other tables) that must be released alongside the buffer.
/// The hook runs on every removal path: pops, indexed removal, and
/// [`clear`](crate::BufQueue::clear).
pub type ReleaseHook = Box<dyn FnMut(&mut [u8]) + Send>;

/// Runtime limits for a queue.
///
/// # Example
///
/// ```
/// use bufqueue::Config;
///
/// // Unbounded element count, 64-byte buffers at most.
/// let config = Config {
///     max_count: 0,
///     max_buffer_size: 64,
/// };
/// assert_ne!(config, Config::default());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of buffers, `0` = unbounded.
    pub max_count: usize,
    /// Maximum size of a single buffer in bytes, `0` = unbounded.
    pub max_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_COUNT,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

/// Selector for the runtime-limit option interface.
///
/// See [`BufQueue::opt`](crate::BufQueue::opt) and
/// [`BufQueue::set_opt`](crate::BufQueue::set_opt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    /// The element-count limit (`0` = unbounded).
    MaxCount,
    /// The per-buffer size limit in bytes (`0` = unbounded).
    MaxBufferSize,
}
