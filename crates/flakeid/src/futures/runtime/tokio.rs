use core::{future::Future, pin::Pin, time::Duration};

use crate::{
    futures::{GeneratorFuture, SleepProvider, SnowflakeGeneratorAsyncExt, SnowflakeStream},
    generator::IdGenerator,
};

/// An implementation of [`SleepProvider`] using Tokio's timer.
///
/// This is the default provider for use in async applications built on Tokio.
pub struct TokioSleep;
impl SleepProvider for TokioSleep {
    type Sleep = tokio::time::Sleep;

    fn sleep_for(dur: Duration) -> Self::Sleep {
        tokio::time::sleep(dur)
    }
}

/// An implementation of [`SleepProvider`] using Tokio's yield.
///
/// Instead of waiting out the rollover on a timer, the task goes back to the
/// scheduler and polls the generator again on its next turn. Latency per
/// rollover drops, but a contended generator spins harder; prefer
/// [`TokioSleep`] when many tasks share one generator.
pub struct TokioYield;
impl SleepProvider for TokioYield {
    /// `yield_now()` returns an unnameable future, so it is boxed.
    type Sleep = Pin<Box<dyn Future<Output = ()> + Send>>;

    fn sleep_for(_dur: Duration) -> Self::Sleep {
        Box::pin(tokio::task::yield_now())
    }
}

/// Extension trait for generating Snowflake IDs on the
/// [`tokio`](https://docs.rs/tokio) runtime.
///
/// Same as [`SnowflakeGeneratorAsyncExt`] with [`TokioSleep`] filled in.
pub trait SnowflakeGeneratorAsyncTokioExt: IdGenerator + Sized {
    /// Returns a future that resolves to the next available Snowflake ID.
    ///
    /// # Errors
    ///
    /// The future resolves to an error if the generator returns one.
    fn try_next_id_async(&self) -> GeneratorFuture<'_, Self, TokioSleep>;

    /// Returns an unbounded stream of IDs drawn from this generator.
    fn stream(&self) -> SnowflakeStream<&Self, TokioSleep>;
}

impl<G> SnowflakeGeneratorAsyncTokioExt for G
where
    G: IdGenerator,
{
    fn try_next_id_async(&self) -> GeneratorFuture<'_, Self, TokioSleep> {
        <Self as SnowflakeGeneratorAsyncExt>::try_next_id_async::<TokioSleep>(self)
    }

    fn stream(&self) -> SnowflakeStream<&Self, TokioSleep> {
        <Self as SnowflakeGeneratorAsyncExt>::stream::<TokioSleep>(self)
    }
}
