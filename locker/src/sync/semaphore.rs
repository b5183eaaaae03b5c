//! # Semaphore.
//!
//! A **semaphore** regulates concurrent access to a finite set of resources.
//! It maintains an internal count representing the number of available
//! "permits". Each permit grants a thread the right to access a shared
//! resource.
//!
//! A semaphore initialized with zero permits serves as an **event signal**:
//! one thread waits on it, and another thread posts it when the event has
//! occurred. A semaphore initialized with `N` permits lets up to `N` threads
//! into a region at once.
//!
//! ## `Semaphore` in locker
//!
//! [`Semaphore`] wraps the operating system's unnamed counting semaphore
//! (`sem_t`). The count is owned entirely by the operating system; this type
//! only manages its lifetime and reports failures.
//!
//! - [`Semaphore::wait()`]: Decrements the count if it is positive. If it is
//!   zero, the calling thread blocks until another thread posts.
//! - [`Semaphore::post()`]: Increments the count and wakes one blocked thread,
//!   if any. Which waiter is woken is up to the operating system.
//! - [`Semaphore::acquire()`]: Like `wait`, but returns a [`SemaphorePermit`]
//!   that posts the permit back when dropped.
//!
//! Neither `wait` nor `post` retries on failure. In particular, a `wait`
//! interrupted by a signal handler returns
//! [`SyncError::Operation`] with [`Errno::Interrupted`].
//!
//! #### Usage Example
//!
//! ```rust
//! use locker::sync::Semaphore;
//!
//! let sema = Semaphore::new(3)?; // Allows up to 3 concurrent threads.
//!
//! // Acquire a permit (blocks if unavailable).
//! let permit = sema.acquire()?;
//!
//! // Critical section (up to 3 threads can enter concurrently).
//!
//! // The permit is released when `permit` goes out of scope, or explicitly:
//! permit.release()?;
//! # Ok::<(), locker::error::SyncError>(())
//! ```
//!
//! [`Errno::Interrupted`]: crate::error::Errno::Interrupted

use crate::error::{Errno, SyncError, posix_result};
use core::{cell::UnsafeCell, ffi::c_int, fmt, mem::MaybeUninit};

const NAME: &str = "semaphore";

/// Counting semaphore.
///
/// A semaphore maintains a set of permits. A semaphore differs from a mutex
/// in that it can allow more than one concurrent caller into a region at a
/// time.
pub struct Semaphore {
    // Boxed so the `sem_t` never moves after `sem_init`.
    raw: Box<UnsafeCell<MaybeUninit<libc::sem_t>>>,
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// Creates a new semaphore initialized with `permits` available permits.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Initialization`] if the operating system cannot
    /// create the semaphore, for example when `permits` exceeds the
    /// platform's `SEM_VALUE_MAX`.
    pub fn new(permits: u32) -> Result<Self, SyncError> {
        let raw = Box::new(UnsafeCell::new(MaybeUninit::<libc::sem_t>::uninit()));
        // Not shared between processes.
        posix_result(unsafe { libc::sem_init(raw.get().cast(), 0, permits) })
            .map_err(|errno| SyncError::initialization(NAME, errno))?;
        log::debug!("{NAME}: initialized with {permits} permits");
        Ok(Semaphore { raw })
    }

    /// Returns a builder that creates a semaphore with zero permits unless
    /// told otherwise.
    pub fn builder() -> SemaphoreBuilder {
        SemaphoreBuilder::default()
    }

    fn as_ptr(&self) -> *mut libc::sem_t {
        self.raw.get().cast()
    }

    /// Waits until a permit becomes available and then takes it.
    ///
    /// If no permits are available, this function blocks the current thread
    /// until another thread calls [`post`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Operation`] if the underlying call fails,
    /// including when it is interrupted by a signal handler. No permit is
    /// taken in that case.
    ///
    /// [`post`]: Semaphore::post
    pub fn wait(&self) -> Result<(), SyncError> {
        posix_result(unsafe { libc::sem_wait(self.as_ptr()) })
            .map_err(|errno| SyncError::operation(NAME, "wait", errno))
    }

    /// Takes a permit if one is available, without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WouldBlock`] if no permit is available, and
    /// [`SyncError::Operation`] if the underlying call fails otherwise.
    pub fn try_wait(&self) -> Result<(), SyncError> {
        posix_result(unsafe { libc::sem_trywait(self.as_ptr()) }).map_err(|errno| {
            if errno == Errno::TryAgain {
                SyncError::WouldBlock
            } else {
                SyncError::operation(NAME, "try_wait", errno)
            }
        })
    }

    /// Releases a permit back to the semaphore.
    ///
    /// This increases the number of available permits by one, and if any
    /// threads are blocked in [`wait`], one of them is woken up to take the
    /// newly released permit.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Operation`] if the underlying call fails, for
    /// example when the count would exceed `SEM_VALUE_MAX`.
    ///
    /// [`wait`]: Semaphore::wait
    pub fn post(&self) -> Result<(), SyncError> {
        posix_result(unsafe { libc::sem_post(self.as_ptr()) })
            .map_err(|errno| SyncError::operation(NAME, "post", errno))
    }

    /// Waits for a permit and returns it as a [`SemaphorePermit`].
    ///
    /// The permit is posted back when the guard is dropped.
    pub fn acquire(&self) -> Result<SemaphorePermit<'_>, SyncError> {
        self.wait()?;
        Ok(SemaphorePermit { sema: self })
    }

    /// Returns the number of available permits.
    ///
    /// The value may be stale by the time it is returned; use it for
    /// diagnostics only.
    pub fn value(&self) -> Result<u32, SyncError> {
        let mut value: c_int = 0;
        posix_result(unsafe { libc::sem_getvalue(self.as_ptr(), &mut value) })
            .map_err(|errno| SyncError::operation(NAME, "get_value", errno))?;
        // Some platforms report the number of waiters as a negative count.
        Ok(value.max(0) as u32)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        if let Err(errno) = posix_result(unsafe { libc::sem_destroy(self.as_ptr()) }) {
            log::warn!("{NAME}: failed to destroy: {errno}");
        }
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Semaphore");
        match self.value() {
            Ok(value) => d.field("value", &value),
            Err(_) => d.field("value", &format_args!("<unknown>")),
        };
        d.finish()
    }
}

/// Configures a [`Semaphore`] before creating it.
///
/// ```rust
/// use locker::sync::Semaphore;
///
/// let sema = Semaphore::builder().permits(2).build()?;
/// assert_eq!(sema.value()?, 2);
/// # Ok::<(), locker::error::SyncError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SemaphoreBuilder {
    permits: u32,
}

impl SemaphoreBuilder {
    /// Sets the number of permits the semaphore starts with. Defaults to 0.
    pub fn permits(mut self, permits: u32) -> Self {
        self.permits = permits;
        self
    }

    /// Creates the semaphore.
    pub fn build(self) -> Result<Semaphore, SyncError> {
        Semaphore::new(self.permits)
    }
}

/// An RAII implementation of a "scoped semaphore". When this structure
/// is dropped (falls out of scope), the semaphore will be posted.
///
/// This structure is created by the [`acquire`] method on [`Semaphore`].
///
/// [`acquire`]: Semaphore::acquire
#[must_use = "if unused the permit is released immediately"]
pub struct SemaphorePermit<'a> {
    sema: &'a Semaphore,
}

impl SemaphorePermit<'_> {
    /// Posts the permit back, reporting whether the post succeeded.
    pub fn release(self) -> Result<(), SyncError> {
        let sema = self.sema;
        core::mem::forget(self);
        sema.post()
    }

    /// Keeps the permit taken for good.
    pub fn forget(self) {
        core::mem::forget(self);
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.sema.post() {
            log::warn!("{NAME}: dropped permit was not returned: {e}");
        }
    }
}

impl fmt::Debug for SemaphorePermit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemaphorePermit").finish_non_exhaustive()
    }
}
