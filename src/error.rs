//! Error type returned by queue operations.

use thiserror::Error;

/// Error returned by fallible queue operations.
///
/// Every public operation validates all of its preconditions before touching
/// the queue, so an `Err` return always leaves the queue exactly as it was.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Buffer allocation failed.
    #[error("buffer allocation failed")]
    NoMemory,

    /// An offset or insertion index is out of range.
    #[error("offset out of range")]
    BadOffset,

    /// A buffer size is zero, exceeds the configured maximum, or a peek
    /// window extends past the end of the buffer.
    #[error("invalid buffer size")]
    BadSize,

    /// Inserting would exceed the configured element limit.
    #[error("queue is full")]
    FullQueue,

    /// The operation requires at least one element.
    #[error("queue is empty")]
    EmptyQueue,

    /// A positional lookup or removal index is out of range.
    #[error("index out of range")]
    BadIndex,
}
