use crate::id::Snowflake;

/// Represents the result of polling a generator for a new ID.
///
/// - [`IdGenStatus::Ready`] indicates a new ID was generated.
/// - [`IdGenStatus::Pending`] means the sequence for the current millisecond
///   is exhausted and the caller should wait for the clock to advance.
///
/// This allows non-blocking generation loops and clean backoff strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus {
    /// A unique ID was generated and is ready to use.
    Ready {
        /// The generated Snowflake ID.
        id: Snowflake,
    },
    /// No ID could be generated because the sequence has been exhausted for
    /// the current millisecond.
    Pending {
        /// Milliseconds to wait before polling again.
        yield_for: u64,
    },
}
