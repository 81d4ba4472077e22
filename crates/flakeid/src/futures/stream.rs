use core::{
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll, ready},
    time::Duration,
};

use futures::{Stream, stream::FusedStream};
use pin_project_lite::pin_project;

use super::SleepProvider;
use crate::{
    error::Result,
    generator::{IdGenStatus, IdGenerator},
    id::Snowflake,
};

pin_project! {
    /// An unbounded stream of IDs pulled from an [`IdGenerator`].
    ///
    /// The stream is lazy: an ID is only generated when the consumer polls
    /// for the next item, and nothing is produced ahead. Dropping the stream
    /// cancels it and leaves the generator usable. If the generator fails,
    /// the error is yielded once and the stream then ends.
    ///
    /// # Example
    ///
    /// ```
    /// # #[cfg(feature = "async-tokio")]
    /// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
    /// use flakeid::{Layout, SnowflakeGenerator, SnowflakeStream, TokioSleep};
    /// use futures::{StreamExt, TryStreamExt};
    ///
    /// let generator = SnowflakeGenerator::new(Layout::TWITTER, 1, 1).unwrap();
    /// let ids: Vec<_> = SnowflakeStream::<_, TokioSleep>::new(&generator)
    ///     .take(3)
    ///     .try_collect()
    ///     .await
    ///     .unwrap();
    /// assert!(ids[0] < ids[1] && ids[1] < ids[2]);
    /// # });
    /// ```
    #[must_use = "streams do nothing unless polled"]
    pub struct SnowflakeStream<G, S>
    where
        G: IdGenerator,
        S: SleepProvider,
    {
        generator: G,
        #[pin]
        sleep: Option<S::Sleep>,
        done: bool,
        _provider: PhantomData<fn() -> S>,
    }
}

impl<G, S> SnowflakeStream<G, S>
where
    G: IdGenerator,
    S: SleepProvider,
{
    /// Wraps `generator`. Nothing is generated until the stream is polled.
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            sleep: None,
            done: false,
            _provider: PhantomData,
        }
    }

    /// Stops the stream and hands the generator back.
    pub fn into_inner(self) -> G {
        self.generator
    }
}

impl<G, S> Stream for SnowflakeStream<G, S>
where
    G: IdGenerator,
    S: SleepProvider,
{
    type Item = Result<Snowflake>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        loop {
            if let Some(sleep) = this.sleep.as_mut().as_pin_mut() {
                ready!(sleep.poll(cx));
                this.sleep.set(None);
            }
            match this.generator.try_poll_id() {
                Ok(IdGenStatus::Ready { id }) => return Poll::Ready(Some(Ok(id))),
                Ok(IdGenStatus::Pending { yield_for }) => {
                    this.sleep
                        .set(Some(S::sleep_for(Duration::from_millis(yield_for))));
                }
                Err(err) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (usize::MAX, None)
        }
    }
}

impl<G, S> FusedStream for SnowflakeStream<G, S>
where
    G: IdGenerator,
    S: SleepProvider,
{
    fn is_terminated(&self) -> bool {
        self.done
    }
}

impl<G, S> core::fmt::Debug for SnowflakeStream<G, S>
where
    G: IdGenerator + core::fmt::Debug,
    S: SleepProvider,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SnowflakeStream")
            .field("generator", &self.generator)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
