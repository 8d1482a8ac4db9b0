//! Error taxonomy for the runtime.
//!
//! Four tiers, matching the kernel-errno / state-rejection / deadline /
//! fatal split: kernel errno is surfaced as [`ErrnoKind`], state-machine
//! rejections and deadline expiry get their own variants, and fatal
//! conditions are represented but never expected to be caught — the
//! [`crate::config::ErrorPolicy::ReturnCodes`] path never constructs an
//! `AioError` at all; it stays at the `(rc, errno)` level.

use std::fmt;

pub type Result<T> = std::result::Result<T, AioError>;

/// Closed enum over the errno values this runtime gives distinct meaning to.
/// Anything else keeps its raw errno in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrnoKind {
    BadFd,
    Invalid,
    Again,
    Interrupted,
    Io,
    TimedOut,
    ConnReset,
    BrokenPipe,
    AddrInUse,
    NotFound,
    PermissionDenied,
    Other(i32),
}

impl ErrnoKind {
    pub fn raw(self) -> i32 {
        match self {
            ErrnoKind::BadFd => libc::EBADF,
            ErrnoKind::Invalid => libc::EINVAL,
            ErrnoKind::Again => libc::EAGAIN,
            ErrnoKind::Interrupted => libc::EINTR,
            ErrnoKind::Io => libc::EIO,
            ErrnoKind::TimedOut => libc::ETIMEDOUT,
            ErrnoKind::ConnReset => libc::ECONNRESET,
            ErrnoKind::BrokenPipe => libc::EPIPE,
            ErrnoKind::AddrInUse => libc::EADDRINUSE,
            ErrnoKind::NotFound => libc::ENOENT,
            ErrnoKind::PermissionDenied => libc::EACCES,
            ErrnoKind::Other(e) => e,
        }
    }
}

impl From<i32> for ErrnoKind {
    fn from(errno: i32) -> Self {
        match errno {
            e if e == libc::EBADF => ErrnoKind::BadFd,
            e if e == libc::EINVAL => ErrnoKind::Invalid,
            e if e == libc::EAGAIN => ErrnoKind::Again,
            e if e == libc::EINTR => ErrnoKind::Interrupted,
            e if e == libc::EIO => ErrnoKind::Io,
            e if e == libc::ETIMEDOUT => ErrnoKind::TimedOut,
            e if e == libc::ECONNRESET => ErrnoKind::ConnReset,
            e if e == libc::EPIPE => ErrnoKind::BrokenPipe,
            e if e == libc::EADDRINUSE => ErrnoKind::AddrInUse,
            e if e == libc::ENOENT => ErrnoKind::NotFound,
            e if e == libc::EACCES => ErrnoKind::PermissionDenied,
            other => ErrnoKind::Other(other),
        }
    }
}

impl fmt::Display for ErrnoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrnoKind::BadFd => "EBADF",
            ErrnoKind::Invalid => "EINVAL",
            ErrnoKind::Again => "EAGAIN",
            ErrnoKind::Interrupted => "EINTR",
            ErrnoKind::Io => "EIO",
            ErrnoKind::TimedOut => "ETIMEDOUT",
            ErrnoKind::ConnReset => "ECONNRESET",
            ErrnoKind::BrokenPipe => "EPIPE",
            ErrnoKind::AddrInUse => "EADDRINUSE",
            ErrnoKind::NotFound => "ENOENT",
            ErrnoKind::PermissionDenied => "EACCES",
            ErrnoKind::Other(_) => "errno",
        };
        write!(f, "{name}({})", self.raw())
    }
}

/// Typed error delivered when [`crate::config::ErrorPolicy::Exceptions`] is active.
#[derive(Debug, Clone)]
pub enum AioError {
    /// A kernel syscall failed; `op` names the attempted operation.
    Errno { op: &'static str, kind: ErrnoKind },
    /// The operation is illegal for the descriptor's current state.
    InvalidState { op: &'static str, errno: ErrnoKind },
    /// The caller-supplied deadline elapsed before completion.
    TimedOut { op: &'static str },
    /// Unrecoverable runtime condition; the process should not continue.
    Fatal(String),
}

impl fmt::Display for AioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AioError::Errno { op, kind } => write!(f, "{op}: {kind}"),
            AioError::InvalidState { op, errno } => {
                write!(f, "{op}: illegal in current state ({errno})")
            }
            AioError::TimedOut { op } => write!(f, "{op}: timed out"),
            AioError::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl std::error::Error for AioError {}

impl AioError {
    pub fn errno(op: &'static str, raw: i32) -> Self {
        AioError::Errno { op, kind: ErrnoKind::from(raw) }
    }

    pub fn invalid_state(op: &'static str, errno: i32) -> Self {
        AioError::InvalidState { op, errno: ErrnoKind::from(errno) }
    }

    /// The raw `(rc, errno)` this error would have produced under the
    /// return-codes policy. `Fatal` has no sensible errno and returns `EIO`.
    pub fn as_rc_errno(&self) -> (i64, i32) {
        match self {
            AioError::Errno { kind, .. } => (-1, kind.raw()),
            AioError::InvalidState { errno, .. } => (-1, errno.raw()),
            AioError::TimedOut { .. } => (-1, libc::ETIMEDOUT),
            AioError::Fatal(_) => (-1, libc::EIO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_known_errno() {
        assert_eq!(ErrnoKind::from(libc::EAGAIN), ErrnoKind::Again);
        assert_eq!(ErrnoKind::Again.raw(), libc::EAGAIN);
    }

    #[test]
    fn unknown_errno_preserved() {
        let kind = ErrnoKind::from(9999);
        assert_eq!(kind.raw(), 9999);
    }

    #[test]
    fn as_rc_errno_shapes() {
        let e = AioError::errno("read", libc::EBADF);
        assert_eq!(e.as_rc_errno(), (-1, libc::EBADF));
        let t = AioError::TimedOut { op: "recv" };
        assert_eq!(t.as_rc_errno(), (-1, libc::ETIMEDOUT));
    }

    #[test]
    fn display_is_readable() {
        let e = AioError::invalid_state("write", libc::EBADF);
        assert!(format!("{e}").contains("EBADF"));
    }
}
