use crate::error::ClockError;

use std::fmt;
use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point in time or duration, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Millisecond(pub u64);

impl Add for Millisecond {
    type Output = Millisecond;

    fn add(self, rhs: Millisecond) -> Millisecond {
        Millisecond(self.0.saturating_add(rhs.0))
    }
}

impl From<Duration> for Millisecond {
    fn from(duration: Duration) -> Self {
        Millisecond(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<u64> for Millisecond {
    fn from(millis: u64) -> Self {
        Millisecond(millis)
    }
}

impl fmt::Display for Millisecond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Monotonic time since an arbitrary origin.
    fn get_time(&self) -> Result<Millisecond, ClockError>;
}

/// Monotonic clock counting from its creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn get_time(&self) -> Result<Millisecond, ClockError> {
        Ok(self.origin.elapsed().into())
    }
}

/// Clock that only moves when told to.
///
/// # Examples
///
/// ```rust,ignore
/// let clock = ManualClock::new();
/// clock.advance(Duration::from_millis(10));
/// assert_eq!(clock.get_time()?, Millisecond(10));
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: impl Into<Millisecond>) {
        self.now.fetch_add(by.into().0, Ordering::AcqRel);
    }

    pub fn set(&self, now: impl Into<Millisecond>) {
        self.now.store(now.into().0, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn get_time(&self) -> Result<Millisecond, ClockError> {
        Ok(Millisecond(self.now.load(Ordering::Acquire)))
    }
}
