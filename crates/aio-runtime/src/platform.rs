//! Thin typed wrapper over the POSIX calls the Backend and Poller need.
//!
//! Pure translation layer: every function here is a direct `libc` call
//! plus errno capture, nothing more. No state-machine logic, no
//! retries — that belongs to [`crate::poller`] and `aio-io`.

use std::ffi::{CStr, CString};
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;

fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

fn cvt_ssize(rc: isize) -> (i64, i32) {
    if rc < 0 {
        // `nix::errno::Errno::last()` rather than `libc::__errno_location`
        // (glibc-only): this shim targets kqueue platforms (macOS/BSD),
        // where the errno accessor differs.
        (-1, nix::errno::Errno::last() as i32)
    } else {
        (rc as i64, 0)
    }
}

/// Set `O_NONBLOCK` on an fd. Every fd the shim creates is nonblocking;
/// the Scheduler relies on `EAGAIN` rather than ever calling a syscall
/// that can actually block the scheduler's thread.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = cvt(libc::fcntl(fd, libc::F_GETFL))?;
        cvt(libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK))?;
    }
    Ok(())
}

pub fn close(fd: RawFd) -> (i64, i32) {
    cvt_ssize(unsafe { libc::close(fd) } as isize)
}

pub fn open(path: &str, flags: i32, mode: u32) -> (i64, i32) {
    let c_path = match CString::new(path) {
        Ok(p) => p,
        Err(_) => return (-1, libc::EINVAL),
    };
    let rc = unsafe { libc::open(c_path.as_ptr(), flags, mode as libc::c_uint) };
    cvt_ssize(rc as isize)
}

/// Safety: `buf` must point to at least `len` writable bytes, valid for
/// the duration of this call (guaranteed by the Backend, see
/// `RequestParams::buf_ptr`).
pub unsafe fn pread(fd: RawFd, buf: *mut u8, len: usize, offset: i64) -> (i64, i32) {
    let rc = libc::pread(fd, buf as *mut libc::c_void, len, offset as libc::off_t);
    cvt_ssize(rc)
}

/// Safety: `buf` must point to at least `len` readable bytes, valid for
/// the duration of this call.
pub unsafe fn pwrite(fd: RawFd, buf: *const u8, len: usize, offset: i64) -> (i64, i32) {
    let rc = libc::pwrite(fd, buf as *const libc::c_void, len, offset as libc::off_t);
    cvt_ssize(rc)
}

/// Safety: see [`pread`].
pub unsafe fn read(fd: RawFd, buf: *mut u8, len: usize) -> (i64, i32) {
    let rc = libc::read(fd, buf as *mut libc::c_void, len);
    cvt_ssize(rc)
}

/// Safety: see [`pwrite`].
pub unsafe fn write(fd: RawFd, buf: *const u8, len: usize) -> (i64, i32) {
    let rc = libc::write(fd, buf as *const libc::c_void, len);
    cvt_ssize(rc)
}

pub fn socket(domain: libc::c_int, ty: libc::c_int) -> (i64, i32) {
    let rc = unsafe { libc::socket(domain, ty, 0) };
    cvt_ssize(rc as isize)
}

pub fn pipe() -> (i64, i32, RawFd, RawFd) {
    let mut fds = [0 as RawFd; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    let (rc64, errno) = cvt_ssize(rc as isize);
    (rc64, errno, fds[0], fds[1])
}

/// Host-to-network byte order, 16 bits. A real `htons(3)` call rather
/// than a hand-inlined `.to_be()`: the pair with [`ntohs`] is part of
/// the shim's raw POSIX surface, not just an internal convenience.
pub fn htons(hostshort: u16) -> u16 {
    unsafe { libc::htons(hostshort) }
}

/// Network-to-host byte order, 16 bits.
pub fn ntohs(netshort: u16) -> u16 {
    unsafe { libc::ntohs(netshort) }
}

/// `inet_ntop(3)`: renders a raw `AF_INET`/`AF_INET6` address into its
/// text form. Used by [`decode_sockaddr`] instead of going straight
/// from octets to `std::net::Ipv4Addr`/`Ipv6Addr`, so the actual kernel
/// text-rendering path is exercised rather than bypassed.
pub fn inet_ntop(af: libc::c_int, src: &[u8]) -> Option<String> {
    let mut buf = [0 as libc::c_char; libc::INET6_ADDRSTRLEN];
    let ret = unsafe {
        libc::inet_ntop(af, src.as_ptr() as *const libc::c_void, buf.as_mut_ptr(), buf.len() as libc::socklen_t)
    };
    if ret.is_null() {
        return None;
    }
    let cstr = unsafe { CStr::from_ptr(ret) };
    cstr.to_str().ok().map(str::to_owned)
}

/// Fills `storage` from `addr` and returns its length. Caller passes
/// the resulting `(ptr, len)` to `bind`/`connect`/`sendto`.
pub fn encode_sockaddr(addr: &aio_core::Address, storage: &mut libc::sockaddr_storage) -> libc::socklen_t {
    unsafe {
        match addr {
            aio_core::Address::V4 { addr, port } => {
                let sin = storage as *mut _ as *mut libc::sockaddr_in;
                (*sin).sin_family = libc::AF_INET as libc::sa_family_t;
                (*sin).sin_port = htons(*port);
                (*sin).sin_addr = libc::in_addr { s_addr: u32::from_ne_bytes(addr.octets()) };
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t
            }
            aio_core::Address::V6 { addr, port, flowinfo, scope } => {
                let sin6 = storage as *mut _ as *mut libc::sockaddr_in6;
                (*sin6).sin6_family = libc::AF_INET6 as libc::sa_family_t;
                (*sin6).sin6_port = htons(*port);
                (*sin6).sin6_flowinfo = *flowinfo;
                (*sin6).sin6_addr = libc::in6_addr { s6_addr: addr.octets() };
                (*sin6).sin6_scope_id = *scope;
                std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t
            }
        }
    }
}

/// Normalizes an accepted/received `sockaddr_storage` back into an
/// `Address`, inspecting `ss_family` per §4.F. Addresses are rendered
/// through `inet_ntop` and reparsed rather than assembled straight from
/// octets, falling back to the raw octets if the platform ever returns
/// something `std::net` can't parse (it shouldn't, but `inet_ntop`'s
/// text form is the point of truth here, not a convenience).
pub fn decode_sockaddr(storage: &libc::sockaddr_storage) -> Option<aio_core::Address> {
    unsafe {
        match storage.ss_family as libc::c_int {
            libc::AF_INET => {
                let sin = storage as *const _ as *const libc::sockaddr_in;
                let octets = (*sin).sin_addr.s_addr.to_ne_bytes();
                let addr = inet_ntop(libc::AF_INET, &octets)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| std::net::Ipv4Addr::from(octets));
                Some(aio_core::Address::v4(addr, ntohs((*sin).sin_port)))
            }
            libc::AF_INET6 => {
                let sin6 = storage as *const _ as *const libc::sockaddr_in6;
                let octets = (*sin6).sin6_addr.s6_addr;
                let addr = inet_ntop(libc::AF_INET6, &octets)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| std::net::Ipv6Addr::from(octets));
                Some(aio_core::Address::v6(addr, ntohs((*sin6).sin6_port), (*sin6).sin6_flowinfo, (*sin6).sin6_scope_id))
            }
            _ => None,
        }
    }
}

/// `getaddrinfo(3)`/`freeaddrinfo(3)`: resolves `host` for `port` into
/// every address the resolver returns, restricted to `SOCK_STREAM`
/// (matching the one socket type this runtime opens). `freeaddrinfo`
/// runs on every exit path, including the error path, since the kernel
/// allocates the `addrinfo` chain regardless of what we do with it.
pub fn getaddrinfo(host: &str, port: u16) -> Result<Vec<aio_core::Address>, i32> {
    let c_host = CString::new(host).map_err(|_| libc::EINVAL)?;
    let c_port = CString::new(port.to_string()).map_err(|_| libc::EINVAL)?;

    let mut hints: libc::addrinfo = unsafe { MaybeUninit::zeroed().assume_init() };
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = libc::SOCK_STREAM;

    let mut res: *mut libc::addrinfo = std::ptr::null_mut();
    let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), c_port.as_ptr(), &hints, &mut res) };
    if rc != 0 {
        return Err(libc::EIO);
    }

    let mut addrs = Vec::new();
    let mut cur = res;
    while !cur.is_null() {
        let info = unsafe { &*cur };
        if !info.ai_addr.is_null() {
            let mut storage: libc::sockaddr_storage = unsafe { MaybeUninit::zeroed().assume_init() };
            let len = (info.ai_addrlen as usize).min(std::mem::size_of::<libc::sockaddr_storage>());
            unsafe {
                std::ptr::copy_nonoverlapping(info.ai_addr as *const u8, &mut storage as *mut _ as *mut u8, len);
            }
            if let Some(addr) = decode_sockaddr(&storage) {
                addrs.push(addr);
            }
        }
        cur = info.ai_next;
    }
    unsafe { libc::freeaddrinfo(res) };
    Ok(addrs)
}

pub fn bind(fd: RawFd, addr: &aio_core::Address) -> (i64, i32) {
    let mut storage: libc::sockaddr_storage = unsafe { MaybeUninit::zeroed().assume_init() };
    let len = encode_sockaddr(addr, &mut storage);
    let rc = unsafe { libc::bind(fd, &storage as *const _ as *const libc::sockaddr, len) };
    cvt_ssize(rc as isize)
}

pub fn listen(fd: RawFd, backlog: i32) -> (i64, i32) {
    cvt_ssize(unsafe { libc::listen(fd, backlog) } as isize)
}

/// Non-blocking connect. Returns `EINPROGRESS` immediately; the caller
/// registers for writability and resolves via `so_error`.
pub fn connect(fd: RawFd, addr: &aio_core::Address) -> (i64, i32) {
    let mut storage: libc::sockaddr_storage = unsafe { MaybeUninit::zeroed().assume_init() };
    let len = encode_sockaddr(addr, &mut storage);
    let rc = unsafe { libc::connect(fd, &storage as *const _ as *const libc::sockaddr, len) };
    cvt_ssize(rc as isize)
}

/// The local address a bound socket ended up with, e.g. to recover the
/// kernel-assigned port after binding to port 0. Not part of §4.A's
/// enumerated syscall set but a thin wrapper over `getsockname` in the
/// same style.
pub fn local_addr(fd: RawFd) -> io::Result<aio_core::Address> {
    let mut storage: libc::sockaddr_storage = unsafe { MaybeUninit::zeroed().assume_init() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let rc = unsafe { libc::getsockname(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut len) };
    cvt(rc)?;
    decode_sockaddr(&storage).ok_or_else(|| io::Error::new(io::ErrorKind::Other, "unknown address family"))
}

pub fn local_port(fd: RawFd) -> io::Result<u16> {
    local_addr(fd).map(|addr| addr.port())
}

pub fn so_error(fd: RawFd) -> io::Result<i32> {
    let mut err: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut err as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };
    cvt(rc)?;
    Ok(err)
}

/// Returns `(rc, errno, accepted_fd, peer_addr)`.
///
/// Plain `accept(2)` rather than `accept4`: this shim targets kqueue
/// platforms (macOS/BSD), where `accept4` either doesn't exist (Darwin)
/// or varies by OS, and the caller (`syscall::perform`) already calls
/// `set_nonblocking` on the returned fd before handing it back.
pub fn accept4(fd: RawFd) -> (i64, i32, RawFd, Option<aio_core::Address>) {
    let mut storage: libc::sockaddr_storage = unsafe { MaybeUninit::zeroed().assume_init() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let rc = unsafe { libc::accept(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut len) };
    let (rc64, errno) = cvt_ssize(rc as isize);
    if rc64 < 0 {
        (rc64, errno, -1, None)
    } else {
        (rc64, errno, rc as RawFd, decode_sockaddr(&storage))
    }
}

/// Safety: see [`pread`].
pub unsafe fn recv(fd: RawFd, buf: *mut u8, len: usize, flags: i32) -> (i64, i32) {
    let rc = libc::recv(fd, buf as *mut libc::c_void, len, flags);
    cvt_ssize(rc)
}

/// Safety: see [`pwrite`].
pub unsafe fn send(fd: RawFd, buf: *const u8, len: usize, flags: i32) -> (i64, i32) {
    let rc = libc::send(fd, buf as *const libc::c_void, len, flags);
    cvt_ssize(rc)
}

/// Safety: see [`pwrite`].
pub unsafe fn sendto(fd: RawFd, buf: *const u8, len: usize, flags: i32, addr: &aio_core::Address) -> (i64, i32) {
    let mut storage: libc::sockaddr_storage = MaybeUninit::zeroed().assume_init();
    let alen = encode_sockaddr(addr, &mut storage);
    let rc = libc::sendto(
        fd,
        buf as *const libc::c_void,
        len,
        flags,
        &storage as *const _ as *const libc::sockaddr,
        alen,
    );
    cvt_ssize(rc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_roundtrip() {
        let (rc, errno, r, w) = pipe();
        assert_eq!(rc, 0, "errno={errno}");
        set_nonblocking(r).unwrap();
        set_nonblocking(w).unwrap();
        let data = b"hello";
        let (wrc, werrno) = unsafe { write(w, data.as_ptr(), data.len()) };
        assert_eq!((wrc, werrno), (5, 0));
        let mut buf = [0u8; 16];
        let (rrc, rerrno) = unsafe { read(r, buf.as_mut_ptr(), buf.len()) };
        assert_eq!((rrc, rerrno), (5, 0));
        assert_eq!(&buf[..5], data);
        close(r);
        close(w);
    }

    #[test]
    fn sockaddr_v4_roundtrip() {
        let addr = aio_core::Address::v4(std::net::Ipv4Addr::new(127, 0, 0, 1), 9999);
        let mut storage: libc::sockaddr_storage = unsafe { MaybeUninit::zeroed().assume_init() };
        encode_sockaddr(&addr, &mut storage);
        let back = decode_sockaddr(&storage).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn open_nonexistent_reports_enoent() {
        let (rc, errno) = open("/nonexistent/definitely/not/here", libc::O_RDONLY, 0);
        assert_eq!(rc, -1);
        assert_eq!(errno, libc::ENOENT);
    }

    #[test]
    fn htons_ntohs_roundtrip() {
        let host = 9292u16;
        assert_eq!(ntohs(htons(host)), host);
    }

    #[test]
    fn inet_ntop_renders_loopback() {
        let octets = std::net::Ipv4Addr::LOCALHOST.octets();
        assert_eq!(inet_ntop(libc::AF_INET, &octets).as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn getaddrinfo_resolves_loopback() {
        let addrs = getaddrinfo("127.0.0.1", 9292).unwrap();
        assert!(addrs.iter().any(|a| a.port() == 9292));
    }
}
