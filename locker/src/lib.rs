//! # locker
//!
//! Blocking synchronization primitives for multi-threaded programs: a
//! counting [`Semaphore`], a [`Mutex`], and a [`ConditionVariable`]. Each
//! one owns a single object provided by the operating system (`sem_t`,
//! `pthread_mutex_t`, `pthread_cond_t`) for its whole lifetime, and adds
//! safe construction and destruction plus uniform error reporting on top.
//!
//! The crate deliberately stops there. There are no thread pools, barriers,
//! or latches; callers compose those from the three primitives.
//!
//! ## Modules
//!
//! - [`sync`]: the primitives.
//! - [`error`]: [`SyncError`] and the typed OS error number [`Errno`].
//! - [`time`]: clocks and absolute deadlines for bounded waits.
//!
//! ## Example
//!
//! A producer hands a value to a consumer through a mutex and a condition
//! variable:
//!
//! ```rust
//! use locker::sync::{ConditionVariable, Mutex};
//! use std::{sync::Arc, thread};
//!
//! let shared = Arc::new((Mutex::new(None)?, ConditionVariable::new()?));
//!
//! let consumer = {
//!     let shared = Arc::clone(&shared);
//!     thread::spawn(move || {
//!         let (slot, ready) = &*shared;
//!         let mut guard = slot.lock().unwrap();
//!         while guard.is_none() {
//!             ready.wait(&mut guard).unwrap();
//!         }
//!         guard.take().unwrap()
//!     })
//! };
//!
//! let (slot, ready) = &*shared;
//! let mut guard = slot.lock()?;
//! *guard = Some(42);
//! ready.signal()?;
//! guard.unlock()?;
//!
//! assert_eq!(consumer.join().unwrap(), 42);
//! # Ok::<(), locker::error::SyncError>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade. Creation of primitives and
//! failed operations are logged at `debug` level; failures that cannot be
//! reported to the caller, such as a failed destroy in `Drop`, at `warn`.
//!
//! [`Semaphore`]: sync::Semaphore
//! [`Mutex`]: sync::Mutex
//! [`ConditionVariable`]: sync::ConditionVariable
//! [`SyncError`]: error::SyncError
//! [`Errno`]: error::Errno

#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

#[cfg(not(unix))]
compile_error!("locker wraps POSIX threading primitives and requires a unix target");

pub mod error;
pub mod sync;
pub mod time;
