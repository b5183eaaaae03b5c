//! # Mutex.
//!
//! Mutex is a synchronization primitive that allows **only one thread at a
//! time** to access a critical section of code, protecting shared resources
//! such as memory, files, or device state from concurrent modification.
//! A thread trying to acquire a mutex that another thread holds is put to
//! sleep by the operating system until the holder releases it.
//!
//! [`Mutex`] wraps the operating system's `pthread_mutex_t` in its default
//! kind: it is **not reentrant**. A thread that locks a mutex it already
//! holds deadlocks; this is neither detected nor reported.
//!
//! Ownership of the lock is represented by a [`MutexGuard`]. The guard is
//! the only way to reach the protected data, it cannot leave the thread that
//! locked the mutex, and it is the handle a [`ConditionVariable`] needs to
//! release and reacquire the lock while waiting.
//!
//! The lock is released either with [`MutexGuard::unlock`], which reports the
//! operating system's result, or when the guard is dropped.
//!
//! [`ConditionVariable`]: crate::sync::ConditionVariable

use crate::error::{Errno, SyncError, pthread_result};
use core::{
    cell::UnsafeCell,
    fmt,
    marker::PhantomData,
    mem::MaybeUninit,
    ops::{Deref, DerefMut},
};

const NAME: &str = "mutex";

/// Owner of the operating system's mutex object.
struct RawMutex {
    // Boxed so the `pthread_mutex_t` never moves after initialization.
    inner: Box<UnsafeCell<MaybeUninit<libc::pthread_mutex_t>>>,
}

unsafe impl Send for RawMutex {}
unsafe impl Sync for RawMutex {}

impl RawMutex {
    fn new() -> Result<Self, SyncError> {
        let inner = Box::new(UnsafeCell::new(MaybeUninit::<libc::pthread_mutex_t>::uninit()));
        pthread_result(unsafe { libc::pthread_mutex_init(inner.get().cast(), core::ptr::null()) })
            .map_err(|errno| SyncError::initialization(NAME, errno))?;
        Ok(RawMutex { inner })
    }

    fn as_ptr(&self) -> *mut libc::pthread_mutex_t {
        self.inner.get().cast()
    }

    fn lock(&self) -> Result<(), SyncError> {
        pthread_result(unsafe { libc::pthread_mutex_lock(self.as_ptr()) })
            .map_err(|errno| SyncError::operation(NAME, "lock", errno))
    }

    fn try_lock(&self) -> Result<(), SyncError> {
        pthread_result(unsafe { libc::pthread_mutex_trylock(self.as_ptr()) }).map_err(|errno| {
            if errno == Errno::Busy {
                SyncError::WouldBlock
            } else {
                SyncError::operation(NAME, "try_lock", errno)
            }
        })
    }

    fn unlock(&self) -> Result<(), SyncError> {
        pthread_result(unsafe { libc::pthread_mutex_unlock(self.as_ptr()) })
            .map_err(|errno| SyncError::operation(NAME, "unlock", errno))
    }
}

impl Drop for RawMutex {
    fn drop(&mut self) {
        if let Err(errno) = pthread_result(unsafe { libc::pthread_mutex_destroy(self.as_ptr()) }) {
            log::warn!("{NAME}: failed to destroy: {errno}");
        }
    }
}

/// A mutual exclusion primitive useful for protecting shared data
///
/// This mutex will block threads waiting for the lock to become available.
/// The mutex can be created via a [`new`] constructor. Each mutex has a type
/// parameter which represents the data that it is protecting. The data can
/// only be accessed through the guards returned from [`lock`] and
/// [`try_lock`], which guarantees that the data is only ever accessed when the
/// mutex is locked. Use `Mutex<()>` for a bare lock.
///
/// [`new`]: Self::new
/// [`lock`]: Self::lock
/// [`try_lock`]: Self::try_lock
///
/// # Examples
///
/// ```
/// use locker::sync::Mutex;
/// use std::{sync::Arc, thread};
///
/// const N: usize = 10;
///
/// // Spawn a few threads to increment a shared variable (non-atomically).
/// //
/// // Here we're using an Arc to share memory among threads, and the data inside
/// // the Arc is protected with a mutex.
/// let data = Arc::new(Mutex::new(0)?);
///
/// let handles: Vec<_> = (0..N)
///     .map(|_| {
///         let data = Arc::clone(&data);
///         thread::spawn(move || {
///             // The shared state can only be accessed once the lock is held.
///             let mut data = data.lock().unwrap();
///             *data += 1;
///             data.unlock().unwrap();
///         })
///     })
///     .collect();
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// assert_eq!(*data.lock()?, N);
/// # Ok::<(), locker::error::SyncError>(())
/// ```
pub struct Mutex<T: ?Sized> {
    raw: RawMutex,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates a new mutex in an unlocked state ready for use.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Initialization`] if the operating system cannot
    /// create the mutex.
    ///
    /// # Examples
    ///
    /// ```
    /// use locker::sync::Mutex;
    ///
    /// let mutex = Mutex::new(0)?;
    /// # Ok::<(), locker::error::SyncError>(())
    /// ```
    pub fn new(t: T) -> Result<Mutex<T>, SyncError> {
        let raw = RawMutex::new()?;
        log::debug!("{NAME}: initialized");
        Ok(Mutex {
            raw,
            data: UnsafeCell::new(t),
        })
    }

    /// Consumes this mutex, returning the underlying data.
    ///
    /// # Examples
    ///
    /// ```
    /// use locker::sync::Mutex;
    ///
    /// let mutex = Mutex::new(0)?;
    /// assert_eq!(mutex.into_inner(), 0);
    /// # Ok::<(), locker::error::SyncError>(())
    /// ```
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires a mutex, blocking the current thread until it is able to do
    /// so.
    ///
    /// This function will block the local thread until it is available to
    /// acquire the mutex. Upon returning, the thread is the only thread
    /// with the lock held. A guard is returned to allow scoped unlock
    /// of the lock.
    ///
    /// Locking a mutex in the thread which already holds the lock deadlocks.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Operation`] if the underlying call fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use locker::sync::Mutex;
    /// use std::{sync::Arc, thread};
    ///
    /// let mutex = Arc::new(Mutex::new(0)?);
    /// let c_mutex = Arc::clone(&mutex);
    ///
    /// thread::spawn(move || {
    ///     *c_mutex.lock().unwrap() = 10;
    /// }).join().expect("thread::spawn failed");
    /// assert_eq!(*mutex.lock()?, 10);
    /// # Ok::<(), locker::error::SyncError>(())
    /// ```
    pub fn lock(&self) -> Result<MutexGuard<'_, T>, SyncError> {
        self.raw.lock()?;
        Ok(MutexGuard::new(self))
    }

    /// Attempts to acquire this lock.
    ///
    /// This function does not block.
    ///
    /// # Errors
    ///
    /// If the mutex could not be acquired because it is already locked, then
    /// this call will return the [`SyncError::WouldBlock`] error.
    ///
    /// # Examples
    ///
    /// ```
    /// use locker::{error::SyncError, sync::Mutex};
    ///
    /// let mutex = Mutex::new(0)?;
    /// let guard = mutex.lock()?;
    /// assert!(matches!(mutex.try_lock(), Err(SyncError::WouldBlock)));
    /// guard.unlock()?;
    /// assert!(mutex.try_lock().is_ok());
    /// # Ok::<(), SyncError>(())
    /// ```
    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, SyncError> {
        self.raw.try_lock()?;
        Ok(MutexGuard::new(self))
    }

    /// Returns a mutable reference to the underlying data.
    ///
    /// Since this call borrows the mutex mutably, no actual locking needs to
    /// take place.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Returns the operating system's mutex object.
    ///
    /// The pointer is valid for as long as the mutex lives. Locking or
    /// unlocking through it bypasses [`MutexGuard`], and the caller is
    /// responsible for the ownership rules the guard otherwise enforces.
    pub fn as_raw(&self) -> *mut libc::pthread_mutex_t {
        self.raw.as_ptr()
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Ok(guard) => {
                d.field("data", &&*guard);
            }
            Err(_) => {
                d.field("data", &format_args!("<locked>"));
            }
        }
        d.finish_non_exhaustive()
    }
}

/// An implementation of a "scoped lock" of a mutex. When this structure
/// is dropped (falls out of scope), the lock is released.
///
/// The data protected by the mutex can be accessed through this guard via its
/// [`Deref`] and [`DerefMut`] implementations.
///
/// This structure is created by the [`lock`] and [`try_lock`] methods on
/// [`Mutex`].
///
/// [`lock`]: Mutex::lock
/// [`try_lock`]: Mutex::try_lock
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized + 'a> {
    lock: &'a Mutex<T>,
    // The operating system requires the locking thread to unlock.
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for MutexGuard<'_, T> {}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    fn new(lock: &'a Mutex<T>) -> Self {
        MutexGuard {
            lock,
            _not_send: PhantomData,
        }
    }

    /// Releases the underlying [`Mutex`], reporting whether the operating
    /// system accepted the unlock.
    ///
    /// # Example
    /// ```
    /// use locker::sync::Mutex;
    ///
    /// let lock = Mutex::new(123)?;
    /// let guard = lock.lock()?;
    ///
    /// // Work with the locked data...
    ///
    /// // Explicitly release the lock.
    /// guard.unlock()?;
    /// # Ok::<(), locker::error::SyncError>(())
    /// ```
    pub fn unlock(self) -> Result<(), SyncError> {
        let lock = self.lock;
        core::mem::forget(self);
        lock.raw.unlock()
    }

    pub(crate) fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.lock.raw.as_ptr()
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.raw.unlock() {
            log::warn!("{NAME}: unlock on drop failed: {e}");
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_gives_exclusive_access() {
        let mutex = Mutex::new(vec![1, 2]).unwrap();
        let mut guard = mutex.lock().unwrap();
        guard.push(3);
        assert_eq!(mutex.try_lock().unwrap_err(), SyncError::WouldBlock);
        guard.unlock().unwrap();
        assert_eq!(mutex.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn dropping_guard_releases_lock() {
        let mut mutex = Mutex::new(0).unwrap();
        {
            let mut guard = mutex.lock().unwrap();
            *guard += 1;
        }
        *mutex.try_lock().unwrap() += 1;
        assert_eq!(*mutex.get_mut(), 2);
    }

    #[test]
    fn debug_shows_data_unless_locked() {
        let mutex = Mutex::new(7).unwrap();
        assert!(format!("{mutex:?}").contains('7'));
        let guard = mutex.lock().unwrap();
        assert!(format!("{mutex:?}").contains("<locked>"));
        drop(guard);
    }
}
