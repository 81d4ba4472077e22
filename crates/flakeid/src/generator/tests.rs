use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicUsize, Ordering},
    },
    thread::scope,
    vec::Vec,
};

use crate::{
    Error, IdGenStatus, IdGenerator, Layout, Parts, Snowflake, SnowflakeGenerator, SystemClock,
    TimeSource, time::DISCORD_EPOCH,
};

struct MockTime {
    millis: i64,
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> i64 {
        self.millis
    }
}

/// A clock that can be moved by the test while a generator holds it.
#[derive(Clone, Default)]
struct SharedMockTime {
    millis: Arc<AtomicI64>,
}

impl SharedMockTime {
    fn at(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for SharedMockTime {
    fn current_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Replays `values`, then sticks to the last one.
struct MockStepTime {
    values: Vec<i64>,
    index: AtomicUsize,
}

impl MockStepTime {
    fn new(values: Vec<i64>) -> Self {
        Self {
            values,
            index: AtomicUsize::new(0),
        }
    }
}

impl TimeSource for MockStepTime {
    fn current_millis(&self) -> i64 {
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        self.values[i.min(self.values.len() - 1)]
    }
}

trait IdGenStatusExt {
    fn unwrap_ready(self) -> Snowflake;
    fn unwrap_pending(self) -> u64;
}

impl IdGenStatusExt for IdGenStatus {
    fn unwrap_ready(self) -> Snowflake {
        match self {
            Self::Ready { id } => id,
            Self::Pending { yield_for } => {
                panic!("unexpected pending (yield for: {yield_for})")
            }
        }
    }

    fn unwrap_pending(self) -> u64 {
        match self {
            Self::Ready { id } => panic!("unexpected ready ({id})"),
            Self::Pending { yield_for } => yield_for,
        }
    }
}

fn discord_generator<T: TimeSource>(time: T) -> SnowflakeGenerator<T> {
    SnowflakeGenerator::with_time(Layout::DISCORD, 12, 7, time).unwrap()
}

#[test]
fn same_millisecond_increments_sequence() {
    let time = MockTime {
        millis: DISCORD_EPOCH + 1000,
    };
    let generator = discord_generator(time);

    let first = generator.try_next_id().unwrap();
    let second = generator.try_next_id().unwrap();

    assert_eq!(
        first.decompose(&Layout::DISCORD),
        Parts {
            timestamp: DISCORD_EPOCH + 1000,
            worker_id: 12,
            process_id: 7,
            increment: 0,
        }
    );
    assert_eq!(
        second.decompose(&Layout::DISCORD),
        Parts {
            timestamp: DISCORD_EPOCH + 1000,
            worker_id: 12,
            process_id: 7,
            increment: 1,
        }
    );
    assert!(first < second);
}

#[test]
fn encodes_with_layout_shifts() {
    let generator = discord_generator(MockTime {
        millis: DISCORD_EPOCH + 1000,
    });
    let id = generator.try_next_id().unwrap();
    assert_eq!(id.to_raw(), (1000 << 22) | (12 << 17) | (7 << 12));
}

#[test]
fn new_millisecond_resets_sequence() {
    let time = SharedMockTime::at(DISCORD_EPOCH + 5);
    let generator = discord_generator(time.clone());

    for expected in 0..3 {
        let id = generator.try_poll_id().unwrap().unwrap_ready();
        assert_eq!(Layout::DISCORD.increment(id), expected);
    }

    time.set(DISCORD_EPOCH + 6);
    let id = generator.try_poll_id().unwrap().unwrap_ready();
    assert_eq!(Layout::DISCORD.increment(id), 0);
    assert_eq!(Layout::DISCORD.timestamp(id), DISCORD_EPOCH + 6);
}

#[test]
fn pending_when_sequence_exhausted() {
    let now = DISCORD_EPOCH + 42;
    let generator = SnowflakeGenerator::from_components(
        Layout::DISCORD,
        0,
        0,
        Layout::DISCORD.max_increments() - 1,
        Some(now),
        MockTime { millis: now },
    )
    .unwrap();

    assert_eq!(generator.try_poll_id().unwrap().unwrap_pending(), 1);
    // Still pending, and the state was left untouched.
    assert_eq!(generator.try_poll_id().unwrap().unwrap_pending(), 1);
    let state = generator.state.lock();
    #[cfg(not(feature = "parking-lot"))]
    let state = state.unwrap();
    assert_eq!(state.previous, Some(now));
    assert_eq!(state.sequence, Layout::DISCORD.max_increments() - 1);
}

#[test]
fn full_sequence_then_rollover() {
    let time = SharedMockTime::at(DISCORD_EPOCH + 42);
    let generator = discord_generator(time.clone());

    for i in 0..Layout::DISCORD.max_increments() {
        let id = generator.try_poll_id().unwrap().unwrap_ready();
        assert_eq!(Layout::DISCORD.increment(id), i);
        assert_eq!(Layout::DISCORD.timestamp(id), DISCORD_EPOCH + 42);
    }
    generator.try_poll_id().unwrap().unwrap_pending();

    time.set(DISCORD_EPOCH + 43);
    let id = generator.try_poll_id().unwrap().unwrap_ready();
    assert_eq!(Layout::DISCORD.increment(id), 0);
    assert_eq!(Layout::DISCORD.timestamp(id), DISCORD_EPOCH + 43);
}

#[test]
fn blocking_call_waits_out_rollover() {
    let now = DISCORD_EPOCH + 42;
    // The clock ticks after a few reads.
    let time = MockStepTime::new(vec![now, now, now + 1]);
    let generator = SnowflakeGenerator::from_components(
        Layout::DISCORD,
        1,
        2,
        Layout::DISCORD.max_increments() - 1,
        Some(now),
        time,
    )
    .unwrap();

    let id = generator.try_next_id().unwrap();
    assert_eq!(Layout::DISCORD.increment(id), 0);
    assert_eq!(Layout::DISCORD.timestamp(id), now + 1);
}

#[test]
fn rollover_advances_past_real_clock() {
    let now = SystemClock.current_millis();
    let generator = SnowflakeGenerator::from_components(
        Layout::DISCORD,
        12,
        7,
        Layout::DISCORD.max_increments() - 1,
        Some(now),
        SystemClock,
    )
    .unwrap();

    let id = generator.try_next_id().unwrap();
    assert_eq!(Layout::DISCORD.increment(id), 0);
    assert!(Layout::DISCORD.timestamp(id) > now);
}

#[test]
fn clock_regression_is_fatal_and_leaves_state() {
    let time = SharedMockTime::at(DISCORD_EPOCH + 100);
    let generator = discord_generator(time.clone());
    let before = generator.try_next_id().unwrap();

    time.set(DISCORD_EPOCH + 50);
    assert_eq!(
        generator.try_next_id(),
        Err(Error::ClockRegression {
            now: DISCORD_EPOCH + 50,
            previous: DISCORD_EPOCH + 100,
        })
    );

    // Once the clock is back, generation resumes from the old state.
    time.set(DISCORD_EPOCH + 100);
    let after = generator.try_next_id().unwrap();
    assert_eq!(Layout::DISCORD.increment(after), 1);
    assert!(after > before);
}

#[test]
fn seeded_timestamp_is_checked_on_first_call() {
    let generator = SnowflakeGenerator::from_components(
        Layout::DISCORD,
        0,
        0,
        0,
        Some(DISCORD_EPOCH + 10),
        MockTime {
            millis: DISCORD_EPOCH + 9,
        },
    )
    .unwrap();
    assert!(matches!(
        generator.try_poll_id(),
        Err(Error::ClockRegression { .. })
    ));
}

#[test]
fn unseeded_first_call_is_exempt() {
    // An initial sequence only matters once a timestamp repeats.
    let generator = SnowflakeGenerator::from_components(
        Layout::DISCORD,
        0,
        0,
        100,
        None,
        MockTime {
            millis: DISCORD_EPOCH,
        },
    )
    .unwrap();
    let first = generator.try_next_id().unwrap();
    assert_eq!(Layout::DISCORD.increment(first), 0);
    let second = generator.try_next_id().unwrap();
    assert_eq!(Layout::DISCORD.increment(second), 1);
}

#[test]
fn seeded_sequence_continues_within_seeded_millisecond() {
    let generator = SnowflakeGenerator::from_components(
        Layout::DISCORD,
        0,
        0,
        100,
        Some(DISCORD_EPOCH),
        MockTime {
            millis: DISCORD_EPOCH,
        },
    )
    .unwrap();
    let id = generator.try_next_id().unwrap();
    assert_eq!(Layout::DISCORD.increment(id), 101);
}

#[test]
fn rejects_out_of_range_components() {
    let layout = Layout::DISCORD;
    assert_eq!(
        SnowflakeGenerator::new(layout, 32, 0).unwrap_err(),
        Error::InvalidWorkerId {
            worker_id: 32,
            max_workers: 32,
        }
    );
    assert_eq!(
        SnowflakeGenerator::new(layout, 0, 32).unwrap_err(),
        Error::InvalidProcessId {
            process_id: 32,
            max_processes: 32,
        }
    );
    assert_eq!(
        SnowflakeGenerator::from_components(layout, 0, 0, 4096, None, SystemClock).unwrap_err(),
        Error::InvalidSequence {
            sequence: 4096,
            max_increments: 4096,
        }
    );
    assert!(SnowflakeGenerator::new(layout, 31, 31).is_ok());
    assert!(SnowflakeGenerator::from_components(layout, 31, 31, 4095, None, SystemClock).is_ok());
}

#[test]
fn respects_custom_layout_widths() {
    let layout = Layout::new(DISCORD_EPOCH, 50, 2, 2, 10).unwrap();
    assert!(SnowflakeGenerator::new(layout, 4, 0).is_err());
    let generator = SnowflakeGenerator::with_time(
        layout,
        3,
        1,
        MockTime {
            millis: DISCORD_EPOCH + 7,
        },
    )
    .unwrap();
    let id = generator.try_next_id().unwrap();
    assert_eq!(
        id.decompose(&layout),
        Parts {
            timestamp: DISCORD_EPOCH + 7,
            worker_id: 3,
            process_id: 1,
            increment: 0,
        }
    );
}

#[test]
fn sequential_ids_strictly_increase() {
    let generator = SnowflakeGenerator::new(Layout::TWITTER, 1, 1).unwrap();
    let mut last = generator.try_next_id().unwrap();
    // Enough IDs to cross several sequence rollovers.
    for _ in 0..(Layout::TWITTER.max_increments() * 8) {
        let next = generator.try_next_id().unwrap();
        assert!(next > last, "{next:?} <= {last:?}");
        last = next;
    }
}

#[test]
fn clones_share_state() {
    let time = SharedMockTime::at(DISCORD_EPOCH);
    let a = discord_generator(time);
    let b = a.clone();
    let first = a.try_next_id().unwrap();
    let second = b.try_next_id().unwrap();
    assert_eq!(Layout::DISCORD.increment(second), 1);
    assert!(second > first);
}

#[test]
fn shared_generator_is_unique_and_ordered_across_threads() {
    const THREADS: usize = 8;
    const IDS_PER_THREAD: usize = 4096;

    let generator = SnowflakeGenerator::new(Layout::DISCORD, 3, 4).unwrap();
    let per_thread: Vec<Vec<Snowflake>> = scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    (0..IDS_PER_THREAD)
                        .map(|_| generator.try_next_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut seen = HashSet::with_capacity(THREADS * IDS_PER_THREAD);
    for ids in &per_thread {
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        for id in ids {
            assert!(seen.insert(*id), "Duplicate ID found: {id:?}");
        }
    }
    assert_eq!(seen.len(), THREADS * IDS_PER_THREAD);
}

#[test]
fn generator_through_trait_object_and_arc() {
    let generator = Arc::new(discord_generator(MockTime {
        millis: DISCORD_EPOCH,
    }));
    let dynamic: &dyn IdGenerator = &generator;
    let a = dynamic.try_next_id().unwrap();
    let b = IdGenerator::try_next_id(&generator).unwrap();
    assert!(a < b);
}
