use std::sync::Arc;

use crate::{error::Result, generator::IdGenStatus, id::Snowflake};

/// A minimal interface for generating Snowflake IDs.
///
/// Implementors only provide the non-blocking [`IdGenerator::try_poll_id`];
/// the blocking loop here and the async extensions in the `futures` module
/// are built on top of it, so every request shape shares the same state and
/// the same monotonicity guarantee.
pub trait IdGenerator {
    /// Attempts to generate the next ID without waiting.
    ///
    /// The returned [`IdGenStatus`] contains either:
    /// - the newly generated ID, or
    /// - a duration to yield/sleep if the sequence is exhausted for the
    ///   current millisecond.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockRegression`] if the clock moved backwards
    /// - `Error::LockPoisoned` if the generator lock is poisoned (std
    ///   mutex only)
    ///
    /// [`Error::ClockRegression`]: crate::Error::ClockRegression
    fn try_poll_id(&self) -> Result<IdGenStatus>;

    /// Generates the next ID, blocking the current thread through a sequence
    /// rollover.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`IdGenerator::try_poll_id`].
    fn try_next_id(&self) -> Result<Snowflake> {
        loop {
            match self.try_poll_id()? {
                IdGenStatus::Ready { id } => return Ok(id),
                IdGenStatus::Pending { yield_for } => {
                    std::thread::sleep(core::time::Duration::from_millis(yield_for));
                }
            }
        }
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for &G {
    fn try_poll_id(&self) -> Result<IdGenStatus> {
        (**self).try_poll_id()
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for Arc<G> {
    fn try_poll_id(&self) -> Result<IdGenStatus> {
        (**self).try_poll_id()
    }
}
