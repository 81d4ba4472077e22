use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Twitter epoch: Thursday, November 4, 2010 1:42:54.657 UTC
pub const TWITTER_EPOCH: i64 = 1_288_834_974_657;

/// Discord epoch: Thursday, January 1, 2015 00:00:00 UTC
pub const DISCORD_EPOCH: i64 = 1_420_070_400_000;

/// A trait for time sources that return a wall-clock timestamp.
///
/// This abstraction allows you to plug in the real system clock or a mocked
/// time source in tests.
///
/// The unit is **milliseconds** since the UNIX epoch. Layout epochs are
/// subtracted by the generator at encode time, not by the clock.
///
/// # Example
///
/// ```
/// use flakeid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> i64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the UNIX epoch.
    fn current_millis(&self) -> i64;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_millis(&self) -> i64 {
        (**self).current_millis()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_millis(&self) -> i64 {
        (**self).current_millis()
    }
}

/// The system real-time clock.
///
/// This clock follows wall-clock adjustments (NTP steps, manual changes), so
/// it can move backwards. Generators surface such a jump as
/// [`Error::ClockRegression`] rather than hiding it.
///
/// [`Error::ClockRegression`]: crate::Error::ClockRegression
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
            // Clocks set before 1970 are still totally ordered.
            Err(err) => i64::try_from(err.duration().as_millis()).map_or(i64::MIN, |ms| -ms),
        }
    }
}
