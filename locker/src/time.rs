//! Clocks and absolute deadlines.
//!
//! A bounded wait on a [`ConditionVariable`] is expressed as an absolute
//! [`Deadline`] rather than a relative timeout: a thread that is woken
//! spuriously and waits again keeps the same deadline instead of restarting
//! the clock. A deadline is measured on a [`Clock`]. The condition variable
//! is bound to one clock at construction time, and deadlines taken on another
//! clock are rebased onto it before waiting.
//!
//! [`ConditionVariable`]: crate::sync::ConditionVariable

use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// A clock that deadlines are measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Clock {
    /// Wall-clock time (`CLOCK_REALTIME`). Jumps when the system time is set.
    ///
    /// This is what a condition variable uses unless configured otherwise.
    #[default]
    Realtime,
    /// Time since an unspecified starting point (`CLOCK_MONOTONIC`). Never
    /// jumps.
    Monotonic,
}

impl Clock {
    pub(crate) fn id(self) -> libc::clockid_t {
        match self {
            Clock::Realtime => libc::CLOCK_REALTIME,
            Clock::Monotonic => libc::CLOCK_MONOTONIC,
        }
    }

    /// Reads the current time of this clock.
    pub fn now(self) -> Deadline {
        // SAFETY: `timespec` is plain old data.
        let mut t: libc::timespec = unsafe { core::mem::zeroed() };
        // SAFETY: `t` is a valid `timespec` to write into, and both clock ids
        // exist on every supported target, so the call cannot fail.
        let ret = unsafe { libc::clock_gettime(self.id(), &mut t) };
        debug_assert_eq!(ret, 0, "clock_gettime({self:?}) failed");
        Deadline::from_nanos(
            self,
            i128::from(t.tv_sec) * NANOS_PER_SEC + i128::from(t.tv_nsec),
        )
    }
}

/// An absolute point in time on a [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Deadline {
    clock: Clock,
    secs: i64,
    nanos: u32,
}

impl Deadline {
    /// Returns the deadline `timeout` from now on `clock`.
    ///
    /// Saturates at the far end of the clock instead of overflowing.
    pub fn after(clock: Clock, timeout: Duration) -> Self {
        clock.now().saturating_add(timeout)
    }

    /// Converts a wall-clock [`SystemTime`] into a [`Clock::Realtime`]
    /// deadline.
    pub fn from_system_time(time: SystemTime) -> Self {
        let nanos = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_nanos() as i128,
            Err(e) => -(e.duration().as_nanos() as i128),
        };
        Deadline::from_nanos(Clock::Realtime, nanos)
    }

    /// Clock this deadline is measured on.
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Time left until the deadline, or zero if it has passed.
    pub fn remaining(&self) -> Duration {
        let left = self.as_nanos() - self.clock.now().as_nanos();
        if left <= 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(u64::try_from(left).unwrap_or(u64::MAX))
        }
    }

    /// Whether the deadline has passed.
    pub fn has_elapsed(&self) -> bool {
        self.as_nanos() <= self.clock.now().as_nanos()
    }

    /// Moves the deadline onto `clock`, keeping the time left until it.
    pub(crate) fn rebase(self, clock: Clock) -> Self {
        if self.clock == clock {
            self
        } else {
            Deadline::after(clock, self.remaining())
        }
    }

    pub(crate) fn as_timespec(&self) -> libc::timespec {
        // SAFETY: `timespec` is plain old data.
        let mut t: libc::timespec = unsafe { core::mem::zeroed() };
        t.tv_sec = libc::time_t::try_from(self.secs).unwrap_or(if self.secs < 0 {
            libc::time_t::MIN
        } else {
            libc::time_t::MAX
        });
        // Always below one billion, so it fits every `c_long`.
        t.tv_nsec = self.nanos as _;
        t
    }

    fn saturating_add(self, d: Duration) -> Self {
        Deadline::from_nanos(
            self.clock,
            self.as_nanos().saturating_add(d.as_nanos() as i128),
        )
    }

    fn as_nanos(&self) -> i128 {
        i128::from(self.secs) * NANOS_PER_SEC + i128::from(self.nanos)
    }

    fn from_nanos(clock: Clock, nanos: i128) -> Self {
        let secs = nanos.div_euclid(NANOS_PER_SEC);
        let (secs, nanos) = if secs > i128::from(i64::MAX) {
            (i64::MAX, 999_999_999)
        } else if secs < i128::from(i64::MIN) {
            (i64::MIN, 0)
        } else {
            (secs as i64, nanos.rem_euclid(NANOS_PER_SEC) as u32)
        };
        Deadline { clock, secs, nanos }
    }
}
