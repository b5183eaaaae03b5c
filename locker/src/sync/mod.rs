//! # Synchronization Primitives.
//!
//! Threads sharing memory must coordinate access to it. This module provides
//! three blocking primitives, each a thin owner of the object the operating
//! system provides for the purpose:
//!
//! - [`Mutex`]: A mutual exclusion primitive that ensures only one thread can
//!   access a critical section at a time. A thread that finds the mutex locked
//!   is put to sleep instead of busy-waiting.
//!
//! - [`ConditionVariable`]: A coordination mechanism that allows threads to
//!   sleep until a particular condition becomes true. It is used in
//!   conjunction with a mutex.
//!
//! - [`Semaphore`]: A counting synchronization primitive that controls access
//!   to a shared resource by maintaining a counter. It allows a fixed number of
//!   threads to access the resource concurrently and can also be used to
//!   signal events between threads.
//!
//! The three types are independent of each other. Only caller code combines
//! them, typically a [`Mutex`] with a [`ConditionVariable`] to wait for a
//! predicate over the data the mutex protects.
//!
//! | Primitive             | Blocks Thread? | Fair?      | Typical Use Case                        |
//! |-----------------------|----------------|------------|-----------------------------------------|
//! | [`Mutex`]             | Yes            | OS-defined | Exclusive access to shared data         |
//! | [`ConditionVariable`] | Yes            | OS-defined | Waiting for a condition to become true  |
//! | [`Semaphore`]         | Yes            | OS-defined | Limiting access to a bounded resource   |
//!
//! ## Lifecycle
//!
//! Every primitive is created by a fallible constructor. If the operating
//! system refuses to create the underlying object, the constructor returns
//! [`SyncError::Initialization`] and no value exists to misuse. Dropping a
//! primitive destroys the underlying object; a failure to do so is logged
//! and otherwise ignored.
//!
//! Operations on live primitives return [`SyncError::Operation`] when the
//! operating system reports a failure. They are never retried internally.
//!
//! None of the primitives support cancellation: a blocked thread resumes only
//! through a matching post, unlock, signal, broadcast, or deadline.
//!
//! [`SyncError::Initialization`]: crate::error::SyncError::Initialization
//! [`SyncError::Operation`]: crate::error::SyncError::Operation

pub mod condition_variable;
pub mod mutex;
pub mod semaphore;

pub use condition_variable::*;
pub use mutex::*;
pub use semaphore::*;
