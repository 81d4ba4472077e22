use core::cmp::Ordering;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    error::{Error, Result},
    generator::{IdGenStatus, IdGenerator, Mutex},
    id::Snowflake,
    layout::Layout,
    time::{SystemClock, TimeSource},
};

/// Mutable generator state, guarded by a single lock.
#[derive(Debug)]
pub(crate) struct State {
    /// Last timestamp handed out; `None` until the first ID unless seeded.
    pub(crate) previous: Option<i64>,
    pub(crate) sequence: u64,
}

/// A lock-based Snowflake generator bound to one [`Layout`] and one
/// (worker, process) pair.
///
/// The previous timestamp and sequence counter live behind an
/// [`Arc<Mutex<_>>`], so a generator can be shared across threads and tasks,
/// and clones share the same state. IDs returned by one generator are
/// strictly increasing in lock-acquisition order. The lock is only held for
/// the read-modify-write of the state; encoding happens after it is released.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Any layout, chosen at runtime
/// - ✅ Blocking, polling, and async request shapes over one state
///
/// # Example
///
/// ```
/// use flakeid::{Layout, SnowflakeGenerator};
///
/// let generator = SnowflakeGenerator::new(Layout::DISCORD, 12, 7).unwrap();
/// let a = generator.try_next_id().unwrap();
/// let b = generator.try_next_id().unwrap();
/// assert!(a < b);
/// assert_eq!(Layout::DISCORD.worker_id(b), 12);
/// ```
pub struct SnowflakeGenerator<T = SystemClock>
where
    T: TimeSource,
{
    layout: Layout,
    worker_id: u64,
    process_id: u64,
    #[cfg(feature = "cache-padded")]
    pub(crate) state: Arc<crossbeam_utils::CachePadded<Mutex<State>>>,
    #[cfg(not(feature = "cache-padded"))]
    pub(crate) state: Arc<Mutex<State>>,
    pub(crate) time: T,
}

impl SnowflakeGenerator<SystemClock> {
    /// Creates a generator that reads the system real-time clock.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidWorkerId`] if `worker_id >= layout.max_workers()`
    /// - [`Error::InvalidProcessId`] if `process_id >= layout.max_processes()`
    pub fn new(layout: Layout, worker_id: u64, process_id: u64) -> Result<Self> {
        Self::with_time(layout, worker_id, process_id, SystemClock)
    }
}

impl<T> SnowflakeGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator that reads timestamps from `time`.
    ///
    /// # Errors
    ///
    /// Same as [`SnowflakeGenerator::new`].
    pub fn with_time(layout: Layout, worker_id: u64, process_id: u64, time: T) -> Result<Self> {
        Self::from_components(layout, worker_id, process_id, 0, None, time)
    }

    /// Creates a generator from explicit state.
    ///
    /// `sequence` is the counter the next same-millisecond ID increments
    /// from, and `previous` seeds the last-used timestamp (milliseconds since
    /// the UNIX epoch). An unseeded generator skips the clock regression
    /// check on its first call.
    ///
    /// # ⚠️ Note
    /// In typical use cases, you should prefer [`SnowflakeGenerator::new`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidWorkerId`] if `worker_id >= layout.max_workers()`
    /// - [`Error::InvalidProcessId`] if `process_id >= layout.max_processes()`
    /// - [`Error::InvalidSequence`] if `sequence >= layout.max_increments()`
    pub fn from_components(
        layout: Layout,
        worker_id: u64,
        process_id: u64,
        sequence: u64,
        previous: Option<i64>,
        time: T,
    ) -> Result<Self> {
        if worker_id >= layout.max_workers() {
            return Err(Error::InvalidWorkerId {
                worker_id,
                max_workers: layout.max_workers(),
            });
        }
        if process_id >= layout.max_processes() {
            return Err(Error::InvalidProcessId {
                process_id,
                max_processes: layout.max_processes(),
            });
        }
        if sequence >= layout.max_increments() {
            return Err(Error::InvalidSequence {
                sequence,
                max_increments: layout.max_increments(),
            });
        }

        let state = Mutex::new(State { previous, sequence });
        Ok(Self {
            layout,
            worker_id,
            process_id,
            #[cfg(feature = "cache-padded")]
            state: Arc::new(crossbeam_utils::CachePadded::new(state)),
            #[cfg(not(feature = "cache-padded"))]
            state: Arc::new(state),
            time,
        })
    }

    /// The layout every ID is encoded with.
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Worker ID embedded in every ID.
    pub const fn worker_id(&self) -> u64 {
        self.worker_id
    }

    /// Process ID embedded in every ID.
    pub const fn process_id(&self) -> u64 {
        self.process_id
    }

    /// Attempts to generate the next ID without waiting.
    ///
    /// Returns [`IdGenStatus::Pending`] when the sequence for the current
    /// millisecond is used up. The state is left as is in that case, so the
    /// first poll after the clock ticks gets sequence 0 at a strictly later
    /// timestamp.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockRegression`] if the clock reads earlier than the last
    ///   timestamp handed out; the state is not modified
    /// - `Error::LockPoisoned` if the lock is poisoned (std mutex only)
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<IdGenStatus> {
        let (now, sequence) = {
            #[cfg(feature = "parking-lot")]
            let mut state = self.state.lock();
            #[cfg(not(feature = "parking-lot"))]
            let mut state = self.state.lock()?;

            // Read under the lock so concurrent callers observe time in
            // acquisition order.
            let now = self.time.current_millis();

            let sequence = match state.previous {
                None => 0,
                Some(previous) => match now.cmp(&previous) {
                    Ordering::Greater => 0,
                    Ordering::Equal => {
                        let next = state.sequence + 1;
                        if next >= self.layout.max_increments() {
                            return Ok(Self::cold_rollover(now));
                        }
                        next
                    }
                    Ordering::Less => return Err(Self::cold_clock_behind(now, previous)),
                },
            };

            state.previous = Some(now);
            state.sequence = sequence;
            (now, sequence)
        };

        Ok(IdGenStatus::Ready {
            id: self
                .layout
                .encode(now, self.worker_id, self.process_id, sequence),
        })
    }

    /// Generates the next ID, sleeping the current thread through a sequence
    /// rollover.
    ///
    /// # Errors
    ///
    /// Same as [`SnowflakeGenerator::try_poll_id`].
    pub fn try_next_id(&self) -> Result<Snowflake> {
        <Self as IdGenerator>::try_next_id(self)
    }

    #[cold]
    #[inline(never)]
    fn cold_rollover(_now: i64) -> IdGenStatus {
        #[cfg(feature = "tracing")]
        tracing::trace!(now = _now, "sequence exhausted, waiting for next millisecond");
        IdGenStatus::Pending { yield_for: 1 }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: i64, previous: i64) -> Error {
        #[cfg(feature = "tracing")]
        tracing::warn!(now, previous, "clock moved backwards");
        Error::ClockRegression { now, previous }
    }
}

impl<T> IdGenerator for SnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn try_poll_id(&self) -> Result<IdGenStatus> {
        self.try_poll_id()
    }
}

impl<T> Clone for SnowflakeGenerator<T>
where
    T: TimeSource + Clone,
{
    /// Clones share the same state, so they still hand out strictly
    /// increasing IDs between them.
    fn clone(&self) -> Self {
        Self {
            layout: self.layout,
            worker_id: self.worker_id,
            process_id: self.process_id,
            state: Arc::clone(&self.state),
            time: self.time.clone(),
        }
    }
}

impl<T> core::fmt::Debug for SnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SnowflakeGenerator")
            .field("layout", &self.layout)
            .field("worker_id", &self.worker_id)
            .field("process_id", &self.process_id)
            .finish_non_exhaustive()
    }
}
