use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, ready},
    time::Duration,
};

use pin_project_lite::pin_project;

use super::{SleepProvider, SnowflakeStream};
use crate::{
    error::Result,
    generator::{IdGenStatus, IdGenerator},
    id::Snowflake,
};

/// Extension trait for asynchronously generating Snowflake IDs.
///
/// Every [`IdGenerator`] gets these methods. They drive the same
/// [`IdGenerator::try_poll_id`] core as the blocking call, but suspend the
/// task through a rollover instead of parking the thread. The sleep strategy
/// is picked by the [`SleepProvider`] type parameter; the runtime-specific
/// extension traits fill it in for you.
pub trait SnowflakeGeneratorAsyncExt: IdGenerator + Sized {
    /// Returns a future that resolves to the next available Snowflake ID.
    ///
    /// If the generator is not ready to issue a new ID immediately, the future
    /// will sleep for the amount of time indicated by the generator and retry.
    ///
    /// # Errors
    ///
    /// The future resolves to an error if the generator returns one.
    fn try_next_id_async<S>(&self) -> GeneratorFuture<'_, Self, S>
    where
        S: SleepProvider;

    /// Returns an unbounded stream of IDs drawn from this generator.
    ///
    /// See [`SnowflakeStream`].
    fn stream<S>(&self) -> SnowflakeStream<&Self, S>
    where
        S: SleepProvider;
}

impl<G> SnowflakeGeneratorAsyncExt for G
where
    G: IdGenerator,
{
    fn try_next_id_async<S>(&self) -> GeneratorFuture<'_, Self, S>
    where
        S: SleepProvider,
    {
        GeneratorFuture::new(self)
    }

    fn stream<S>(&self) -> SnowflakeStream<&Self, S>
    where
        S: SleepProvider,
    {
        SnowflakeStream::new(self)
    }
}

pin_project! {
    /// A future that polls an [`IdGenerator`] until it produces an ID.
    ///
    /// `Pending` answers from the generator are turned into a sleep from the
    /// [`SleepProvider`]; the generator is polled again once it elapses.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct GeneratorFuture<'a, G, S>
    where
        G: IdGenerator,
        S: SleepProvider,
    {
        generator: &'a G,
        #[pin]
        sleep: Option<S::Sleep>,
    }
}

impl<'a, G, S> GeneratorFuture<'a, G, S>
where
    G: IdGenerator,
    S: SleepProvider,
{
    /// Nothing is generated until the future is first polled.
    pub fn new(generator: &'a G) -> Self {
        Self {
            generator,
            sleep: None,
        }
    }
}

impl<G, S> Future for GeneratorFuture<'_, G, S>
where
    G: IdGenerator,
    S: SleepProvider,
{
    type Output = Result<Snowflake>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        loop {
            if let Some(sleep) = this.sleep.as_mut().as_pin_mut() {
                ready!(sleep.poll(cx));
                this.sleep.set(None);
            }
            match this.generator.try_poll_id()? {
                IdGenStatus::Ready { id } => return Poll::Ready(Ok(id)),
                IdGenStatus::Pending { yield_for } => {
                    this.sleep
                        .set(Some(S::sleep_for(Duration::from_millis(yield_for))));
                }
            }
        }
    }
}
