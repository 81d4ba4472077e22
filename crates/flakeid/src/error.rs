use core::fmt;

/// A result type that defaults to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `flakeid` can emit.
///
/// Construction-time variants are reported as soon as a [`Layout`] or
/// [`SnowflakeGenerator`] is built and are never deferred to the first
/// generation call. [`Error::ClockRegression`] is the only runtime failure of
/// the generation algorithm itself.
///
/// [`Layout`]: crate::Layout
/// [`SnowflakeGenerator`]: crate::SnowflakeGenerator
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Error {
    /// A field width was zero, or the four widths did not add up to 64.
    InvalidLayout {
        timestamp_bits: u8,
        worker_bits: u8,
        process_bits: u8,
        increment_bits: u8,
    },

    /// A [`LayoutBuilder`] was finalized without an epoch.
    ///
    /// [`LayoutBuilder`]: crate::LayoutBuilder
    MissingEpoch,

    /// The worker ID does not fit in `[0, max_workers)`.
    InvalidWorkerId { worker_id: u64, max_workers: u64 },

    /// The process ID does not fit in `[0, max_processes)`.
    InvalidProcessId { process_id: u64, max_processes: u64 },

    /// The initial sequence does not fit in `[0, max_increments)`.
    InvalidSequence { sequence: u64, max_increments: u64 },

    /// The clock reported a time earlier than the last timestamp handed out.
    ///
    /// Generator state is left untouched, so the call may be retried once
    /// the clock has caught up again.
    ClockRegression { now: i64, previous: i64 },

    /// A textual identifier could not be parsed as a signed 64-bit integer.
    MalformedIdentifier { input: String },

    /// The operation failed because the generator lock was **poisoned**.
    ///
    /// This occurs when a thread panics while holding the lock. When the
    /// `parking-lot` feature is enabled, mutexes do **not** poison, so this
    /// variant is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    LockPoisoned,
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidLayout {
                timestamp_bits,
                worker_bits,
                process_bits,
                increment_bits,
            } => write!(
                fmt,
                "invalid layout {timestamp_bits}/{worker_bits}/{process_bits}/{increment_bits}: \
                 every width must be positive and the widths must add up to 64"
            ),
            Self::MissingEpoch => write!(fmt, "layout epoch was never set"),
            Self::InvalidWorkerId {
                worker_id,
                max_workers,
            } => write!(fmt, "worker id {worker_id} is outside [0, {max_workers})"),
            Self::InvalidProcessId {
                process_id,
                max_processes,
            } => write!(fmt, "process id {process_id} is outside [0, {max_processes})"),
            Self::InvalidSequence {
                sequence,
                max_increments,
            } => write!(fmt, "sequence {sequence} is outside [0, {max_increments})"),
            Self::ClockRegression { now, previous } => write!(
                fmt,
                "clock moved backwards: now {now}ms is earlier than previous {previous}ms"
            ),
            Self::MalformedIdentifier { input } => {
                write!(fmt, "malformed snowflake: {input:?} is not a 64-bit integer")
            }
            #[cfg(not(feature = "parking-lot"))]
            Self::LockPoisoned => write!(fmt, "generator lock poisoned"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(not(feature = "parking-lot"))]
use crate::generator::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}
