//! # Condition Variable.
//!
//! A **Condition Variable** allows a thread to efficiently block until a
//! certain condition is met, without consuming CPU cycles. It is always used
//! in conjunction with a [`Mutex`] that guards access to shared data. It is
//! generally used when a thread needs to *wait for a specific state*
//! in shared data, and another thread will *notify* it when that state changes.
//!
//! ## `ConditionVariable` in locker
//!
//! [`ConditionVariable`] wraps the operating system's `pthread_cond_t`. It is
//! not tied to any particular mutex. Instead, every wait takes the
//! [`MutexGuard`] of the mutex to release: holding the guard proves that the
//! calling thread owns the lock, and borrowing it mutably keeps the protected
//! data out of reach while the lock is released.
//!
//! The first wait binds the condition variable to the mutex it was given.
//! Waiting with any other mutex afterwards fails with
//! [`SyncError::Operation`] carrying [`Errno::InvalidArgument`]. The
//! operating system leaves mixing mutexes on one condition variable
//! undefined.
//!
//! A waiting thread goes through the following states:
//!
//! ```text
//! RUNNING --wait--> BLOCKED --signal/broadcast/deadline/spurious--> REACQUIRING_LOCK --> RUNNING
//! ```
//!
//! The lock is released atomically with entering `BLOCKED`, and held again
//! before any wait returns, whatever its result.
//!
//! Wakeups can be **spurious**: a wait may return although nobody signaled.
//! Always re-check the condition in a loop, or let
//! [`ConditionVariable::wait_while`] do it:
//!
//! ```rust
//! use locker::sync::{ConditionVariable, Mutex};
//!
//! let mutex = Mutex::new(vec![1])?;
//! let condvar = ConditionVariable::new()?;
//! let guard = condvar.wait_while(&mutex, |queue| queue.is_empty())?;
//! assert_eq!(*guard, vec![1]);
//! # Ok::<(), locker::error::SyncError>(())
//! ```
//!
//! There are two signaling methods:
//! - [`ConditionVariable::signal`] wakes **at most one** waiting thread and
//! - [`ConditionVariable::broadcast`] wakes **all** waiting threads.
//!
//! Bounded waits take an absolute [`Deadline`]; see [`crate::time`].

use super::mutex::{Mutex, MutexGuard};
use crate::{
    error::{Errno, SyncError, pthread_result},
    time::{Clock, Deadline},
};
use core::{
    cell::UnsafeCell,
    fmt,
    mem::MaybeUninit,
    ptr,
    sync::atomic::{AtomicPtr, Ordering},
    time::Duration,
};

const NAME: &str = "condition variable";

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum WaitOutcome {
    /// The thread was woken up before the deadline, by a signal, a broadcast,
    /// or spuriously.
    Woken,
    /// The deadline passed.
    TimedOut,
}

impl WaitOutcome {
    /// Whether the wait ended because the deadline passed.
    pub fn timed_out(self) -> bool {
        self == WaitOutcome::TimedOut
    }
}

/// A Condition Variable
///
/// Condition variables represent the ability to block a thread such that it
/// consumes no CPU time while waiting for an event to occur. Condition
/// variables are typically associated with a boolean predicate (a condition)
/// and a mutex. The predicate is always verified inside of the mutex before
/// determining that a thread must block.
pub struct ConditionVariable {
    // Boxed so the `pthread_cond_t` never moves after initialization.
    raw: Box<UnsafeCell<MaybeUninit<libc::pthread_cond_t>>>,
    clock: Clock,
    // Mutex of the first wait, null until then.
    mutex: AtomicPtr<libc::pthread_mutex_t>,
}

unsafe impl Send for ConditionVariable {}
unsafe impl Sync for ConditionVariable {}

impl ConditionVariable {
    /// Creates a new condition variable which is ready to be waited on and
    /// signaled. Deadlines are measured on [`Clock::Realtime`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Initialization`] if the operating system cannot
    /// create the condition variable.
    pub fn new() -> Result<Self, SyncError> {
        Self::builder().build()
    }

    /// Returns a builder to configure the condition variable before creating
    /// it.
    pub fn builder() -> ConditionVariableBuilder {
        ConditionVariableBuilder::default()
    }

    fn with_clock(clock: Clock) -> Result<Self, SyncError> {
        let raw = Box::new(UnsafeCell::new(MaybeUninit::<libc::pthread_cond_t>::uninit()));
        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
        pthread_result(unsafe { libc::pthread_condattr_init(attr.as_mut_ptr()) })
            .map_err(|errno| SyncError::initialization(NAME, errno))?;
        let ret = set_clock(attr.as_mut_ptr(), clock).and_then(|_| {
            pthread_result(unsafe { libc::pthread_cond_init(raw.get().cast(), attr.as_ptr()) })
        });
        unsafe { libc::pthread_condattr_destroy(attr.as_mut_ptr()) };
        ret.map_err(|errno| SyncError::initialization(NAME, errno))?;
        log::debug!("{NAME}: initialized on {clock:?} clock");
        Ok(ConditionVariable {
            raw,
            clock,
            mutex: AtomicPtr::new(ptr::null_mut()),
        })
    }

    fn as_ptr(&self) -> *mut libc::pthread_cond_t {
        self.raw.get().cast()
    }

    /// Binds this condition variable to `mutex` on first use, and rejects any
    /// other mutex afterwards.
    fn check_mutex(
        &self,
        mutex: *mut libc::pthread_mutex_t,
        operation: &'static str,
    ) -> Result<(), SyncError> {
        match self
            .mutex
            .compare_exchange(ptr::null_mut(), mutex, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => Ok(()),
            Err(bound) if bound == mutex => Ok(()),
            Err(_) => Err(SyncError::operation(NAME, operation, Errno::InvalidArgument)),
        }
    }

    /// Clock that deadlines of this condition variable are measured on.
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Blocks the current thread until this condition variable receives a
    /// notification.
    ///
    /// This function atomically unlocks the mutex held by `guard` and blocks
    /// the current thread. Any call to [`signal`] or [`broadcast`] after the
    /// mutex is unlocked can wake this thread up. The lock is reacquired
    /// before this function returns, including on error.
    ///
    /// The return value does not tell whether the awaited condition holds.
    /// Wakeups may be spurious, so callers re-check the condition in a loop.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Operation`] if the underlying call fails, or if
    /// `guard` belongs to another mutex than earlier waits used. In the latter
    /// case the lock is never released.
    ///
    /// [`signal`]: ConditionVariable::signal
    /// [`broadcast`]: ConditionVariable::broadcast
    pub fn wait<T: ?Sized>(&self, guard: &mut MutexGuard<'_, T>) -> Result<(), SyncError> {
        self.check_mutex(guard.raw(), "wait")?;
        pthread_result(unsafe { libc::pthread_cond_wait(self.as_ptr(), guard.raw()) })
            .map_err(|errno| SyncError::operation(NAME, "wait", errno))
    }

    /// Same as [`wait`], but also returns once `deadline` has passed.
    ///
    /// A deadline measured on another clock than [`clock`] is moved onto it,
    /// keeping the time left until the deadline.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Operation`] if the underlying call fails or
    /// `guard` belongs to another mutex, as for [`wait`]. Running out of time is not an error; it is reported as
    /// [`WaitOutcome::TimedOut`].
    ///
    /// [`wait`]: ConditionVariable::wait
    /// [`clock`]: ConditionVariable::clock
    pub fn timewait<T: ?Sized>(
        &self,
        guard: &mut MutexGuard<'_, T>,
        deadline: Deadline,
    ) -> Result<WaitOutcome, SyncError> {
        self.check_mutex(guard.raw(), "timewait")?;
        let abstime = deadline.rebase(self.clock).as_timespec();
        match unsafe { libc::pthread_cond_timedwait(self.as_ptr(), guard.raw(), &abstime) } {
            0 => Ok(WaitOutcome::Woken),
            libc::ETIMEDOUT => Ok(WaitOutcome::TimedOut),
            ret => Err(SyncError::operation(NAME, "timewait", Errno::from(ret))),
        }
    }

    /// Same as [`timewait`], with the deadline `timeout` from now.
    ///
    /// [`timewait`]: ConditionVariable::timewait
    pub fn wait_timeout<T: ?Sized>(
        &self,
        guard: &mut MutexGuard<'_, T>,
        timeout: Duration,
    ) -> Result<WaitOutcome, SyncError> {
        self.timewait(guard, Deadline::after(self.clock, timeout))
    }

    /// Blocks the current thread while `predicate` returns `true`.
    ///
    /// This function locks `mutex` and checks the predicate. If it returns
    /// `true`, the thread is blocked and the mutex is temporarily released.
    /// When the thread is woken up, it reacquires the mutex and re-evaluates
    /// the predicate. This loop continues until the predicate returns
    /// `false`, and the guard is handed back with the lock held.
    ///
    /// # Example
    /// ```rust
    /// # use locker::sync::{ConditionVariable, Mutex};
    /// # let mutex = Mutex::new(1usize)?;
    /// # let condvar = ConditionVariable::new()?;
    /// let guard = condvar.wait_while(&mutex, |count| *count == 0)?;
    /// # Ok::<(), locker::error::SyncError>(())
    /// ```
    ///
    /// There is **no need to check the predicate before calling**
    /// `wait_while`. It performs the entire check-and-sleep logic internally.
    pub fn wait_while<'a, T: ?Sized>(
        &self,
        mutex: &'a Mutex<T>,
        mut predicate: impl FnMut(&mut T) -> bool,
    ) -> Result<MutexGuard<'a, T>, SyncError> {
        let mut guard = mutex.lock()?;
        while predicate(&mut guard) {
            self.wait(&mut guard)?;
        }
        Ok(guard)
    }

    /// Wakes up one blocked thread on this condvar.
    ///
    /// If there is a blocked thread on this condition variable, then it will
    /// be woken up from its call to [`wait`] or [`timewait`]. Calls to
    /// `signal` are not buffered in any way.
    ///
    /// To wake up all threads, see [`broadcast`].
    ///
    /// [`broadcast`]: ConditionVariable::broadcast
    /// [`wait`]: ConditionVariable::wait
    /// [`timewait`]: ConditionVariable::timewait
    pub fn signal(&self) -> Result<(), SyncError> {
        pthread_result(unsafe { libc::pthread_cond_signal(self.as_ptr()) })
            .map_err(|errno| SyncError::operation(NAME, "signal", errno))
    }

    /// Wakes up all blocked threads on this condvar.
    ///
    /// This method will ensure that any current waiters on the condition
    /// variable are awoken. Calls to `broadcast()` are not buffered in any
    /// way.
    ///
    /// To wake up only one thread, see [`signal`].
    ///
    /// [`signal`]: ConditionVariable::signal
    pub fn broadcast(&self) -> Result<(), SyncError> {
        pthread_result(unsafe { libc::pthread_cond_broadcast(self.as_ptr()) })
            .map_err(|errno| SyncError::operation(NAME, "broadcast", errno))
    }
}

#[cfg(not(target_vendor = "apple"))]
fn set_clock(attr: *mut libc::pthread_condattr_t, clock: Clock) -> Result<(), Errno> {
    pthread_result(unsafe { libc::pthread_condattr_setclock(attr, clock.id()) })
}

// Only the wall clock is available for condition variables here.
#[cfg(target_vendor = "apple")]
fn set_clock(_: *mut libc::pthread_condattr_t, clock: Clock) -> Result<(), Errno> {
    match clock {
        Clock::Realtime => Ok(()),
        Clock::Monotonic => Err(Errno::InvalidArgument),
    }
}

impl Drop for ConditionVariable {
    fn drop(&mut self) {
        if let Err(errno) = pthread_result(unsafe { libc::pthread_cond_destroy(self.as_ptr()) }) {
            log::warn!("{NAME}: failed to destroy: {errno}");
        }
    }
}

impl fmt::Debug for ConditionVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionVariable")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Configures a [`ConditionVariable`] before creating it.
///
/// ```rust
/// use locker::{sync::ConditionVariable, time::Clock};
///
/// let condvar = ConditionVariable::builder().clock(Clock::Monotonic).build()?;
/// assert_eq!(condvar.clock(), Clock::Monotonic);
/// # Ok::<(), locker::error::SyncError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionVariableBuilder {
    clock: Clock,
}

impl ConditionVariableBuilder {
    /// Sets the clock deadlines are measured on. Defaults to
    /// [`Clock::Realtime`].
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Creates the condition variable.
    pub fn build(self) -> Result<ConditionVariable, SyncError> {
        ConditionVariable::with_clock(self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_without_waiters_is_not_buffered() {
        let mutex = Mutex::new(()).unwrap();
        let condvar = ConditionVariable::new().unwrap();
        condvar.signal().unwrap();
        condvar.broadcast().unwrap();

        let mut guard = mutex.lock().unwrap();
        let outcome = condvar
            .wait_timeout(&mut guard, Duration::from_millis(20))
            .unwrap();
        assert!(outcome.timed_out());
        // Still held after the wait.
        assert_eq!(mutex.try_lock().unwrap_err(), SyncError::WouldBlock);
        guard.unlock().unwrap();
    }

    #[test]
    fn elapsed_deadline_on_other_clock_times_out() {
        let mutex = Mutex::new(0).unwrap();
        let condvar = ConditionVariable::builder()
            .clock(Clock::Realtime)
            .build()
            .unwrap();
        let mut guard = mutex.lock().unwrap();
        let past = Clock::Monotonic.now();
        assert_eq!(
            condvar.timewait(&mut guard, past).unwrap(),
            WaitOutcome::TimedOut
        );
        *guard += 1;
        guard.unlock().unwrap();
        assert_eq!(mutex.into_inner(), 1);
    }

    #[test]
    fn waiting_with_another_mutex_is_rejected() {
        let first = Mutex::new(()).unwrap();
        let second = Mutex::new(()).unwrap();
        let condvar = ConditionVariable::new().unwrap();

        let mut guard = first.lock().unwrap();
        assert!(
            condvar
                .wait_timeout(&mut guard, Duration::from_millis(1))
                .unwrap()
                .timed_out()
        );
        guard.unlock().unwrap();

        let mut guard = second.lock().unwrap();
        assert_eq!(
            condvar.wait_timeout(&mut guard, Duration::from_millis(1)),
            Err(SyncError::Operation {
                primitive: NAME,
                operation: "timewait",
                errno: Errno::InvalidArgument,
            })
        );
        assert_eq!(
            condvar.wait(&mut guard).unwrap_err().errno(),
            Some(Errno::InvalidArgument)
        );
        // Rejected before releasing the lock.
        assert_eq!(second.try_lock().unwrap_err(), SyncError::WouldBlock);
        guard.unlock().unwrap();

        let mut guard = first.lock().unwrap();
        assert!(
            condvar
                .wait_timeout(&mut guard, Duration::from_millis(1))
                .unwrap()
                .timed_out()
        );
        guard.unlock().unwrap();
    }

    #[test]
    fn wait_while_returns_immediately_on_false_predicate() {
        let mutex = Mutex::new(3).unwrap();
        let condvar = ConditionVariable::new().unwrap();
        let mut calls = 0;
        let guard = condvar
            .wait_while(&mutex, |v| {
                calls += 1;
                *v == 0
            })
            .unwrap();
        assert_eq!(*guard, 3);
        guard.unlock().unwrap();
        assert_eq!(calls, 1);
    }
}
