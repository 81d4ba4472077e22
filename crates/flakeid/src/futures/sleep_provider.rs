use core::{future::Future, time::Duration};

/// How an async caller waits out a sequence rollover.
///
/// Generators only report how long to back off; the provider decides how to
/// suspend the task for that long, which keeps the generator itself free of
/// any runtime dependency.
pub trait SleepProvider {
    /// Must be `Send` so the generation future can move between worker
    /// threads.
    type Sleep: Future<Output = ()> + Send;

    fn sleep_for(dur: Duration) -> Self::Sleep;
}
