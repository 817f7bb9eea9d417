//! Clock collaborators consumed for timestamp values.

use async_trait::async_trait;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Monotonic reading in nanoseconds.
pub type Instant = u64;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Wall-clock time as seconds plus nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime {
    pub seconds: u64,
    pub nanoseconds: u32,
}

impl DateTime {
    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            seconds: nanos / NANOS_PER_SEC,
            nanoseconds: (nanos % NANOS_PER_SEC) as u32,
        }
    }

    /// Total nanoseconds, saturating at `u64::MAX`.
    pub fn as_nanos(self) -> u64 {
        self.seconds
            .saturating_mul(NANOS_PER_SEC)
            .saturating_add(u64::from(self.nanoseconds))
    }
}

impl From<Duration> for DateTime {
    fn from(value: Duration) -> Self {
        Self {
            seconds: value.as_secs(),
            nanoseconds: value.subsec_nanos(),
        }
    }
}

pub trait WallClock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime;
    fn resolution(&self) -> DateTime;
}

pub trait MonotonicClock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
    fn resolution(&self) -> Instant;
    /// Timer counting down from `initial` nanoseconds.
    fn new_timer(&self, initial: Instant) -> Box<dyn MonotonicTimer>;
}

#[async_trait]
pub trait MonotonicTimer: Send + Sync {
    /// Time left before the timer reaches zero.
    fn current(&self) -> Instant;
    async fn expiration(&self);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> DateTime {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(DateTime::from)
            .unwrap_or_default()
    }

    fn resolution(&self) -> DateTime {
        DateTime {
            seconds: 0,
            nanoseconds: 1,
        }
    }
}

/// Monotonic clock backed by `tokio::time`, so paused test runtimes apply.
#[derive(Clone, Copy, Debug)]
pub struct SystemMonotonicClock {
    origin: tokio::time::Instant,
}

impl SystemMonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemMonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemMonotonicClock {
    fn now(&self) -> Instant {
        duration_nanos(self.origin.elapsed())
    }

    fn resolution(&self) -> Instant {
        1
    }

    fn new_timer(&self, initial: Instant) -> Box<dyn MonotonicTimer> {
        let now = tokio::time::Instant::now();
        let deadline = now
            .checked_add(Duration::from_nanos(initial))
            .unwrap_or(now + Duration::from_secs(u32::MAX as u64));
        Box::new(SystemTimer { deadline })
    }
}

struct SystemTimer {
    deadline: tokio::time::Instant,
}

#[async_trait]
impl MonotonicTimer for SystemTimer {
    fn current(&self) -> Instant {
        duration_nanos(
            self.deadline
                .saturating_duration_since(tokio::time::Instant::now()),
        )
    }

    async fn expiration(&self) {
        tokio::time::sleep_until(self.deadline).await;
    }
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_time_nanos() {
        let dt = DateTime::from_nanos(3_000_000_007);
        assert_eq!(
            dt,
            DateTime {
                seconds: 3,
                nanoseconds: 7
            }
        );
        assert_eq!(dt.as_nanos(), 3_000_000_007);
        assert_eq!(
            DateTime {
                seconds: u64::MAX,
                nanoseconds: 1
            }
            .as_nanos(),
            u64::MAX
        );
    }

    #[test]
    fn wall_clock_is_after_epoch() {
        let now = SystemWallClock.now();
        assert!(now.seconds > 0);
        assert!(now.nanoseconds < 1_000_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_counts_down_and_expires() {
        let clock = SystemMonotonicClock::new();
        let timer = clock.new_timer(5_000_000_000);
        assert_eq!(timer.current(), 5_000_000_000);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(timer.current(), 3_000_000_000);
        assert!(clock.now() >= 2_000_000_000);

        timer.expiration().await;
        assert_eq!(timer.current(), 0);
    }
}
