//! Dispatches a completed Request's `kind` to the actual non-blocking
//! syscall, per §4.C ("perform the actual non-blocking syscall, write
//! result to the Request"). Called by the Poller once the kernel has
//! signaled readiness, and directly by the Scheduler for kinds that
//! never need a kqueue registration in the first place (open/bind/
//! listen/close/getaddrinfo — see `perform_sync`).

use crate::platform;
use aio_core::request::{Outcome, Request, RequestKind};
use std::os::unix::io::RawFd;

/// For READ/WRITE-direction kinds, reached only after the Poller saw
/// readiness on `req.fd`.
pub fn perform(req: &Request) -> Outcome {
    let fd = req.fd as RawFd;
    let buf = req.params.buf_ptr as *mut u8;
    let len = req.params.buf_len;

    let (rc, errno) = match req.kind {
        RequestKind::Read => unsafe { platform::read(fd, buf, len) },
        RequestKind::Pread => unsafe { platform::pread(fd, buf, len, req.params.offset) },
        RequestKind::Write => unsafe { platform::write(fd, buf as *const u8, len) },
        RequestKind::Pwrite => unsafe { platform::pwrite(fd, buf as *const u8, len, req.params.offset) },
        RequestKind::Recv => unsafe { platform::recv(fd, buf, len, req.params.flags) },
        RequestKind::Send => unsafe { platform::send(fd, buf as *const u8, len, req.params.flags) },
        RequestKind::SendMsg => match &req.params.addr {
            Some(addr) => unsafe { platform::sendto(fd, buf as *const u8, len, req.params.flags, addr) },
            None => unsafe { platform::send(fd, buf as *const u8, len, req.params.flags) },
        },
        RequestKind::Accept => {
            let (rc, errno, accepted_fd, peer) = platform::accept4(fd);
            if rc >= 0 {
                if let Some(addr) = peer {
                    req.set_peer_addr(addr);
                }
                let _ = platform::set_nonblocking(accepted_fd);
                (accepted_fd as i64, 0)
            } else {
                (rc, errno)
            }
        }
        RequestKind::Connect => resolve_connect(fd),
        other => panic!("aio: syscall::perform called for synchronous kind {other:?}"),
    };

    Outcome { rc, errno }
}

/// A non-blocking `connect()` reports completion via writability; the
/// actual result comes from `SO_ERROR` (§3 Socket State Connecting).
fn resolve_connect(fd: RawFd) -> (i64, i32) {
    match platform::so_error(fd) {
        Ok(0) => (0, 0),
        Ok(err) => (-1, err),
        Err(e) => (-1, e.raw_os_error().unwrap_or(libc::EIO)),
    }
}

/// Kinds whose syscalls never reach `EAGAIN` in a way the Poller needs
/// to wait on: open/close/bind/listen/getaddrinfo run synchronously in
/// the calling task's own thread rather than suspending on the Poller.
pub fn is_synchronous(kind: RequestKind) -> bool {
    matches!(
        kind,
        RequestKind::Open | RequestKind::Close | RequestKind::Bind | RequestKind::Listen | RequestKind::GetAddrInfo
    )
}

pub fn perform_sync(req: &Request) -> Outcome {
    let (rc, errno) = match req.kind {
        RequestKind::Close => platform::close(req.fd as RawFd),
        RequestKind::Bind => match &req.params.addr {
            Some(addr) => platform::bind(req.fd as RawFd, addr),
            None => (-1, libc::EINVAL),
        },
        RequestKind::Listen => platform::listen(req.fd as RawFd, req.params.backlog),
        RequestKind::Open => {
            let path_bytes = unsafe {
                std::slice::from_raw_parts(req.params.buf_ptr as *const u8, req.params.buf_len)
            };
            let path = match std::str::from_utf8(path_bytes) {
                Ok(p) => p,
                Err(_) => return Outcome::err(libc::EINVAL),
            };
            platform::open(path, req.params.flags, req.params.offset as u32)
        }
        RequestKind::GetAddrInfo => {
            let host_bytes = unsafe {
                std::slice::from_raw_parts(req.params.buf_ptr as *const u8, req.params.buf_len)
            };
            let host = match std::str::from_utf8(host_bytes) {
                Ok(h) => h,
                Err(_) => return Outcome::err(libc::EINVAL),
            };
            match platform::getaddrinfo(host, req.params.offset as u16) {
                Ok(addrs) => {
                    req.set_addrinfo_results(addrs);
                    (0, 0)
                }
                Err(errno) => (-1, errno),
            }
        }
        other => panic!("aio: perform_sync called for async kind {other:?}"),
    };
    Outcome { rc, errno }
}

/// READ/ACCEPT use `EVFILT_READ`; WRITE/CONNECT use `EVFILT_WRITE`.
pub fn is_write_direction(kind: RequestKind) -> bool {
    matches!(kind, RequestKind::Write | RequestKind::Pwrite | RequestKind::Send | RequestKind::SendMsg | RequestKind::Connect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aio_core::id::TaskId;
    use aio_core::request::RequestParams;

    #[test]
    fn write_direction_classification() {
        assert!(is_write_direction(RequestKind::Write));
        assert!(is_write_direction(RequestKind::Connect));
        assert!(!is_write_direction(RequestKind::Read));
        assert!(!is_write_direction(RequestKind::Accept));
    }

    #[test]
    fn pread_pwrite_roundtrip_through_perform() {
        let path = std::env::temp_dir().join("aio_syscall_test_file");
        let (fd, errno) = platform::open(
            path.to_str().unwrap(),
            libc::O_CREAT | libc::O_RDWR | libc::O_TRUNC,
            0o600,
        );
        assert_eq!(errno, 0, "open failed");
        let fd = fd as RawFd;

        let data = b"hello".to_vec();
        let write_req = Request::new(
            RequestKind::Pwrite,
            fd as i32,
            RequestParams { buf_ptr: data.as_ptr() as usize, buf_len: data.len(), offset: 0, ..Default::default() },
            TaskId::next(),
            None,
        );
        let out = perform(&write_req);
        assert_eq!(out, Outcome::ok(5));

        let mut read_buf = vec![0u8; 5];
        let read_req = Request::new(
            RequestKind::Pread,
            fd as i32,
            RequestParams { buf_ptr: read_buf.as_mut_ptr() as usize, buf_len: 5, offset: 0, ..Default::default() },
            TaskId::next(),
            None,
        );
        let out = perform(&read_req);
        assert_eq!(out, Outcome::ok(5));
        assert_eq!(&read_buf, b"hello");

        platform::close(fd);
        let _ = std::fs::remove_file(&path);
    }
}
