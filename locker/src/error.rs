//! Errors reported by the synchronization primitives.
//!
//! Every primitive in [`sync`] reports failures through a single enum,
//! [`SyncError`]. The taxonomy is deliberately small:
//!
//! - [`SyncError::Initialization`]: the operating system refused to create the
//!   underlying object. The primitive is never handed out.
//! - [`SyncError::Operation`]: an operation on a live primitive failed inside
//!   the operating system. The caller decides whether to retry, log, or give
//!   up; nothing is retried internally.
//! - [`SyncError::WouldBlock`]: a non-blocking attempt found the primitive
//!   unavailable.
//!
//! The operating system's error number travels along as an [`Errno`].
//!
//! [`sync`]: crate::sync

use core::ffi::c_int;
use core::fmt;
use num_enum::FromPrimitive;
use thiserror::Error;

/// Error number reported by the host operating system.
///
/// Only the error numbers the POSIX threading calls are documented to return
/// get a named variant. Everything else is preserved in [`Errno::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(i32)]
pub enum Errno {
    /// Operation is not permitted. (EPERM)
    OperationNotPermitted = libc::EPERM,
    /// Interrupted by a signal handler. (EINTR)
    Interrupted = libc::EINTR,
    /// Resource temporarily unavailable. (EAGAIN)
    TryAgain = libc::EAGAIN,
    /// Out of memory. (ENOMEM)
    NoMemory = libc::ENOMEM,
    /// Device or resource busy. (EBUSY)
    Busy = libc::EBUSY,
    /// Invalid argument. (EINVAL)
    InvalidArgument = libc::EINVAL,
    /// Resource deadlock would occur. (EDEADLK)
    Deadlock = libc::EDEADLK,
    /// Function not implemented. (ENOSYS)
    NotImplemented = libc::ENOSYS,
    /// Value too large for defined data type. (EOVERFLOW)
    Overflow = libc::EOVERFLOW,
    /// Timed out. (ETIMEDOUT)
    TimedOut = libc::ETIMEDOUT,
    /// Any other error number.
    #[num_enum(catch_all)]
    Other(i32),
}

impl Errno {
    /// Reads the calling thread's `errno`.
    pub fn last() -> Self {
        std::io::Error::last_os_error()
            .raw_os_error()
            .map_or(Errno::Other(0), Errno::from)
    }

    /// Converts the [`Errno`] back into the raw error number.
    pub fn into_raw(self) -> i32 {
        match self {
            Errno::OperationNotPermitted => libc::EPERM,
            Errno::Interrupted => libc::EINTR,
            Errno::TryAgain => libc::EAGAIN,
            Errno::NoMemory => libc::ENOMEM,
            Errno::Busy => libc::EBUSY,
            Errno::InvalidArgument => libc::EINVAL,
            Errno::Deadlock => libc::EDEADLK,
            Errno::NotImplemented => libc::ENOSYS,
            Errno::Overflow => libc::EOVERFLOW,
            Errno::TimedOut => libc::ETIMEDOUT,
            Errno::Other(e) => e,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", std::io::Error::from_raw_os_error(self.into_raw()))
    }
}

/// Interprets the return value of a `pthread_*` call, which reports the error
/// number directly.
pub(crate) fn pthread_result(ret: c_int) -> Result<(), Errno> {
    match ret {
        0 => Ok(()),
        e => Err(Errno::from(e)),
    }
}

/// Interprets the return value of a call that returns `-1` and sets `errno`,
/// such as the `sem_*` family.
pub(crate) fn posix_result(ret: c_int) -> Result<(), Errno> {
    match ret {
        0 => Ok(()),
        _ => Err(Errno::last()),
    }
}

/// Enum representing errors that can occur during a synchronization
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The operating system could not create the underlying object.
    #[error("failed to initialize {primitive}: {errno}")]
    Initialization {
        /// Name of the primitive being created.
        primitive: &'static str,
        /// Error number reported by the operating system.
        errno: Errno,
    },
    /// An operation on a live primitive failed inside the operating system.
    #[error("{primitive} {operation} failed: {errno}")]
    Operation {
        /// Name of the primitive the operation ran on.
        primitive: &'static str,
        /// Name of the failed operation.
        operation: &'static str,
        /// Error number reported by the operating system.
        errno: Errno,
    },
    /// The primitive is unavailable and the operation was asked not to block.
    #[error("operation would block")]
    WouldBlock,
}

impl SyncError {
    pub(crate) fn initialization(primitive: &'static str, errno: Errno) -> Self {
        log::debug!("{primitive}: initialization failed: {errno}");
        SyncError::Initialization { primitive, errno }
    }

    pub(crate) fn operation(primitive: &'static str, operation: &'static str, errno: Errno) -> Self {
        log::debug!("{primitive}: {operation} failed: {errno}");
        SyncError::Operation {
            primitive,
            operation,
            errno,
        }
    }

    /// Returns the operating system error number carried by this error, if
    /// any.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            SyncError::Initialization { errno, .. } | SyncError::Operation { errno, .. } => {
                Some(*errno)
            }
            SyncError::WouldBlock => None,
        }
    }
}

impl From<SyncError> for std::io::Error {
    fn from(e: SyncError) -> Self {
        match e.errno() {
            Some(errno) => std::io::Error::from_raw_os_error(errno.into_raw()),
            None => std::io::Error::from(std::io::ErrorKind::WouldBlock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_errno_maps_to_named_variant() {
        assert_eq!(Errno::from(libc::EINVAL), Errno::InvalidArgument);
        assert_eq!(Errno::from(libc::ETIMEDOUT), Errno::TimedOut);
        assert_eq!(Errno::Busy.into_raw(), libc::EBUSY);
    }

    #[test]
    fn unknown_errno_is_preserved() {
        let errno = Errno::from(libc::ENOTDIR);
        assert_eq!(errno, Errno::Other(libc::ENOTDIR));
        assert_eq!(errno.into_raw(), libc::ENOTDIR);
    }

    #[test]
    fn pthread_result_passes_error_number_through() {
        assert_eq!(pthread_result(0), Ok(()));
        assert_eq!(pthread_result(libc::EBUSY), Err(Errno::Busy));
    }

    #[test]
    fn error_message_names_primitive_and_operation() {
        let e = SyncError::Operation {
            primitive: "semaphore",
            operation: "wait",
            errno: Errno::Interrupted,
        };
        let msg = e.to_string();
        assert!(msg.starts_with("semaphore wait failed: "), "{msg}");
        assert_eq!(e.errno(), Some(Errno::Interrupted));
        assert_eq!(SyncError::WouldBlock.errno(), None);
    }

    #[test]
    fn converts_into_io_error() {
        let io: std::io::Error = SyncError::Initialization {
            primitive: "mutex",
            errno: Errno::NoMemory,
        }
        .into();
        assert_eq!(io.raw_os_error(), Some(libc::ENOMEM));

        let io: std::io::Error = SyncError::WouldBlock.into();
        assert_eq!(io.kind(), std::io::ErrorKind::WouldBlock);
    }
}
