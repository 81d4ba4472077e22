use core::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use pin_project_lite::pin_project;
use smol::Timer;

use crate::{
    futures::{GeneratorFuture, SleepProvider, SnowflakeGeneratorAsyncExt, SnowflakeStream},
    generator::IdGenerator,
};

/// An implementation of [`SleepProvider`] using Smol's timer.
///
/// This is the default provider for use in async applications built on Smol.
pub struct SmolSleep;
impl SleepProvider for SmolSleep {
    type Sleep = SmolSleepFuture;

    fn sleep_for(dur: Duration) -> Self::Sleep {
        SmolSleepFuture {
            timer: Timer::after(dur),
        }
    }
}

/// An implementation of [`SleepProvider`] using Smol's yield.
///
/// The task goes back to the executor and polls the generator again on its
/// next turn instead of waiting on a timer. Rollover latency drops, but a
/// contended generator spins harder; prefer [`SmolSleep`] when many tasks
/// share one generator.
pub struct SmolYield;
impl SleepProvider for SmolYield {
    type Sleep = smol::future::YieldNow;

    fn sleep_for(_dur: Duration) -> Self::Sleep {
        smol::future::yield_now()
    }
}

pin_project! {
    /// Future returned by [`SmolSleep::sleep_for`].
    ///
    /// Wraps a [`smol::Timer`] and drops the `Instant` it resolves to.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct SmolSleepFuture {
        #[pin]
        timer: Timer,
    }
}

impl Future for SmolSleepFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.project().timer.poll(cx).map(|_| ())
    }
}

/// Extension trait for generating Snowflake IDs on the
/// [`smol`](https://docs.rs/smol) runtime.
///
/// Same as [`SnowflakeGeneratorAsyncExt`] with [`SmolSleep`] filled in.
pub trait SnowflakeGeneratorAsyncSmolExt: IdGenerator + Sized {
    /// Returns a future that resolves to the next available Snowflake ID.
    ///
    /// # Errors
    ///
    /// The future resolves to an error if the generator returns one.
    fn try_next_id_async(&self) -> GeneratorFuture<'_, Self, SmolSleep>;

    /// Returns an unbounded stream of IDs drawn from this generator.
    fn stream(&self) -> SnowflakeStream<&Self, SmolSleep>;
}

impl<G> SnowflakeGeneratorAsyncSmolExt for G
where
    G: IdGenerator,
{
    fn try_next_id_async(&self) -> GeneratorFuture<'_, Self, SmolSleep> {
        <Self as SnowflakeGeneratorAsyncExt>::try_next_id_async::<SmolSleep>(self)
    }

    fn stream(&self) -> SnowflakeStream<&Self, SmolSleep> {
        <Self as SnowflakeGeneratorAsyncExt>::stream::<SmolSleep>(self)
    }
}
