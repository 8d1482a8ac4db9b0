//! Socket descriptor state machine (§3, §4.F): bind/connect/listen/
//! accept/recv/send gated on the `SocketState` automaton, dispatched
//! through the Backend. One type instead of a listener/stream split,
//! since both sides here share a single state tag.

use crate::backend::{self, translate, translate_strict};
use crate::guard::TaskGuard;
use aio_core::request::RequestParams;
use aio_core::{Address, AioError, Outcome, RequestKind, SocketState};

/// A socket in one of `{Closed, Bound, Connecting, Connected, Listening}`.
/// Every method that reaches the kernel suspends the calling task; state
/// rejections return immediately without touching it (§3 invariant).
/// Every method also accepts a `timeout_ms` (§6): `None` waits
/// indefinitely; `Some(ms)` races a one-shot deadline timer against the
/// kernel event exactly as §4.D describes, surfacing `ETIMEDOUT` if the
/// deadline wins.
#[derive(Debug)]
pub struct Socket {
    fd: i32,
    state: SocketState,
    guard: TaskGuard,
}

impl Socket {
    /// Opens a fresh nonblocking `SOCK_STREAM` socket in `Closed`.
    pub fn stream(v6: bool) -> Result<Self, AioError> {
        Self::raw(if v6 { libc::AF_INET6 } else { libc::AF_INET }, libc::SOCK_STREAM)
    }

    /// Opens a fresh nonblocking `SOCK_DGRAM` socket in `Closed`.
    pub fn dgram(v6: bool) -> Result<Self, AioError> {
        Self::raw(if v6 { libc::AF_INET6 } else { libc::AF_INET }, libc::SOCK_DGRAM)
    }

    fn raw(domain: i32, ty: i32) -> Result<Self, AioError> {
        let (rc, errno) = aio_runtime::platform::socket(domain, ty);
        if rc < 0 {
            return Err(AioError::errno("socket", errno));
        }
        let fd = rc as i32;
        let _ = aio_runtime::platform::set_nonblocking(fd);
        Ok(Self { fd, state: SocketState::Closed, guard: TaskGuard::new() })
    }

    /// Wraps an fd already accepted/connected by the platform shim
    /// (used by [`Self::accept`] for the returned peer socket). The
    /// guard starts unbound (see [`TaskGuard`]) so handing the result
    /// off to a freshly spawned task, the canonical per-connection
    /// pattern, binds ownership there on first use instead of tripping
    /// a false cross-owner warning against the listener's task.
    fn from_accepted(fd: i32) -> Self {
        Self { fd, state: SocketState::Connected, guard: TaskGuard::new() }
    }

    pub fn fd(&self) -> i32 {
        self.fd
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn bind(&mut self, addr: Address, timeout_ms: Option<u64>) -> Result<(), AioError> {
        self.guard.check("Socket::bind");
        if !self.state.can_bind() {
            return Err(AioError::invalid_state("bind", libc::EINVAL));
        }
        let params = RequestParams { addr: Some(addr), ..Default::default() };
        let (outcome, _req) = backend::submit(RequestKind::Bind, self.fd, params, timeout_ms);
        if outcome.is_ok() {
            self.state = self.state.on_bind_ok();
        }
        translate_strict("bind", outcome).map(|_| ())
    }

    pub fn listen(&mut self, backlog: i32, timeout_ms: Option<u64>) -> Result<(), AioError> {
        self.guard.check("Socket::listen");
        if !self.state.can_listen() {
            return Err(AioError::invalid_state("listen", libc::EINVAL));
        }
        let params = RequestParams { backlog, ..Default::default() };
        let (outcome, _req) = backend::submit(RequestKind::Listen, self.fd, params, timeout_ms);
        if outcome.is_ok() {
            self.state = self.state.on_listen_ok();
        }
        translate_strict("listen", outcome).map(|_| ())
    }

    /// Non-blocking connect (§3 Socket State Connecting). The actual
    /// `connect(2)` is issued synchronously (it never blocks on a
    /// nonblocking socket); a `CONNECT` Request then suspends the
    /// caller until the fd is writable, at which point `SO_ERROR`
    /// resolves the outcome.
    pub fn connect(&mut self, addr: Address, timeout_ms: Option<u64>) -> Result<(), AioError> {
        self.guard.check("Socket::connect");
        if !self.state.can_connect() {
            return Err(AioError::invalid_state("connect", libc::EINVAL));
        }
        self.state = self.state.on_connect_started();

        let (rc, errno) = aio_runtime::platform::connect(self.fd, &addr);
        if rc == 0 {
            self.state = self.state.on_connect_resolved(0);
            return Ok(());
        }
        if errno != libc::EINPROGRESS {
            self.state = self.state.on_connect_resolved(errno);
            return Err(AioError::errno("connect", errno));
        }

        let params = RequestParams { addr: Some(addr), ..Default::default() };
        let (outcome, _req) = backend::submit(RequestKind::Connect, self.fd, params, timeout_ms);
        self.state = self.state.on_connect_resolved(if outcome.is_ok() { 0 } else { outcome.errno });
        translate_strict("connect", outcome).map(|_| ())
    }

    /// Accepts the next pending connection. Only legal from `Listening`;
    /// the parent socket remains `Listening`, the returned socket is
    /// already `Connected` (§3).
    pub fn accept(&mut self, timeout_ms: Option<u64>) -> Result<(Socket, Option<Address>), AioError> {
        self.guard.check("Socket::accept");
        if !self.state.can_accept() {
            return Err(AioError::invalid_state("accept", libc::EINVAL));
        }
        let (outcome, req) = backend::submit(RequestKind::Accept, self.fd, RequestParams::default(), timeout_ms);
        let fd = translate_strict("accept", outcome)? as i32;
        let peer = req.take_peer_addr();
        Ok((Socket::from_accepted(fd), peer))
    }

    pub fn recv(&mut self, buf: &mut [u8], flags: i32, timeout_ms: Option<u64>) -> Result<Outcome, AioError> {
        self.guard.check("Socket::recv");
        if !self.state.can_send_recv() {
            return Err(AioError::invalid_state("recv", libc::EBADF));
        }
        let params = RequestParams { buf_ptr: buf.as_mut_ptr() as usize, buf_len: buf.len(), flags, ..Default::default() };
        let (outcome, _req) = backend::submit(RequestKind::Recv, self.fd, params, timeout_ms);
        translate("recv", outcome)
    }

    /// `send` -> `sendto(addr=None)` -> `sendmsg` cascade (§4.F): all
    /// three public methods bottom out here.
    pub fn send(&mut self, buf: &[u8], flags: i32, timeout_ms: Option<u64>) -> Result<Outcome, AioError> {
        self.sendmsg(buf, flags, None, timeout_ms)
    }

    pub fn sendto(&mut self, buf: &[u8], flags: i32, addr: Address, timeout_ms: Option<u64>) -> Result<Outcome, AioError> {
        self.sendmsg(buf, flags, Some(addr), timeout_ms)
    }

    pub fn sendmsg(&mut self, buf: &[u8], flags: i32, addr: Option<Address>, timeout_ms: Option<u64>) -> Result<Outcome, AioError> {
        self.guard.check("Socket::sendmsg");
        if !self.state.can_send_recv() {
            return Err(AioError::invalid_state("sendmsg", libc::EBADF));
        }
        let kind = if addr.is_some() { RequestKind::SendMsg } else { RequestKind::Send };
        let params = RequestParams { buf_ptr: buf.as_ptr() as usize, buf_len: buf.len(), flags, addr, ..Default::default() };
        let (outcome, _req) = backend::submit(kind, self.fd, params, timeout_ms);
        translate("send", outcome)
    }

    /// `Closed` rejects every op including a second `close`, with
    /// `EBADF` (§3, §8) — `Drop` checks state first so this never fires
    /// on an already-closed handle going out of scope.
    pub fn close(&mut self, timeout_ms: Option<u64>) -> Result<(), AioError> {
        self.guard.check("Socket::close");
        if self.state == SocketState::Closed {
            return Err(AioError::invalid_state("close", libc::EBADF));
        }
        let (outcome, _req) = backend::submit(RequestKind::Close, self.fd, RequestParams::default(), timeout_ms);
        self.state = SocketState::Closed;
        translate_strict("close", outcome).map(|_| ())
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if self.state != SocketState::Closed {
            let _ = self.close(None);
        }
    }
}

/// Resolves `host:port` to a list of normalized [`Address`]es via the
/// platform shim's `getaddrinfo` path (§4.A, `RequestKind::GetAddrInfo`).
/// Runs synchronously on the calling task's own thread, same as `open`.
pub fn resolve(host: &str, port: u16) -> Result<Vec<Address>, AioError> {
    let host_bytes = host.as_bytes().to_vec();
    let params = RequestParams {
        buf_ptr: host_bytes.as_ptr() as usize,
        buf_len: host_bytes.len(),
        offset: port as i64,
        ..Default::default()
    };
    let (outcome, req) = backend::submit(RequestKind::GetAddrInfo, -1, params, None);
    drop(host_bytes);
    translate_strict("getaddrinfo", outcome)?;
    Ok(req.take_addrinfo_results())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn with_runtime<F: FnOnce() + Send + 'static>(f: F) {
        with_runtime_config(aio_core::RuntimeConfig::new(), f);
    }

    fn with_runtime_config<F: FnOnce() + Send + 'static>(config: aio_core::RuntimeConfig, f: F) {
        let sched = aio_runtime::Scheduler::new(config).unwrap();
        let done = Arc::new(AtomicBool::new(false));
        let done2 = done.clone();
        sched.spawn(move || {
            f();
            done2.store(true, Ordering::SeqCst);
        });
        sched.run_until(|| done.load(Ordering::SeqCst));
        sched.shutdown();
    }

    #[test]
    fn second_close_is_ebadf() {
        with_runtime(|| {
            let mut sock = Socket::stream(false).unwrap();
            sock.close(None).unwrap();
            assert!(matches!(sock.close(None), Err(AioError::InvalidState { .. })));
        });
    }

    #[test]
    fn bind_twice_rejected_without_touching_kernel() {
        with_runtime(|| {
            let mut sock = Socket::stream(false).unwrap();
            sock.bind(Address::v4(Ipv4Addr::new(127, 0, 0, 1), 0), None).unwrap();
            let err = sock.bind(Address::v4(Ipv4Addr::LOCALHOST, 0), None).unwrap_err();
            assert!(matches!(err, AioError::InvalidState { .. }));
            assert_eq!(sock.state(), SocketState::Bound);
        });
    }

    #[test]
    fn recv_on_unconnected_socket_is_ebadf() {
        with_runtime(|| {
            let mut sock = Socket::stream(false).unwrap();
            let mut buf = [0u8; 8];
            let err = sock.recv(&mut buf, 0, None).unwrap_err();
            assert!(matches!(err, AioError::InvalidState { .. }));
        });
    }

    #[test]
    fn listen_accept_connect_round_trip() {
        with_runtime(|| {
            let mut listener = Socket::stream(false).unwrap();
            listener.bind(Address::v4(Ipv4Addr::LOCALHOST, 0), None).unwrap();
            let local_port = aio_runtime::platform::local_port(listener.fd()).unwrap();
            listener.listen(16, None).unwrap();
            assert_eq!(listener.state(), SocketState::Listening);

            let mut client = Socket::stream(false).unwrap();
            client.connect(Address::v4(Ipv4Addr::LOCALHOST, local_port), None).unwrap();
            assert_eq!(client.state(), SocketState::Connected);

            let (mut server_side, peer) = listener.accept(None).unwrap();
            assert_eq!(server_side.state(), SocketState::Connected);
            assert!(peer.is_some());

            client.send(b"hi", 0, None).unwrap();
            let mut buf = [0u8; 8];
            let n = server_side.recv(&mut buf, 0, None).unwrap().rc;
            assert_eq!(&buf[..n as usize], b"hi");

            // Listener itself is unaffected by the accepted connection.
            assert_eq!(listener.state(), SocketState::Listening);
        });
    }

    /// §8 scenario 4: recv on an empty, connected socket with a short
    /// deadline returns `ETIMEDOUT` rather than blocking forever. Under
    /// the default `ErrorPolicy::ReturnCodes` this is an `Ok(Outcome)`
    /// carrying `rc=-1, errno=ETIMEDOUT`, not an `Err` — §6's output
    /// contract holds for the default policy too.
    #[test]
    fn recv_with_deadline_times_out() {
        with_runtime(|| {
            let mut listener = Socket::stream(false).unwrap();
            listener.bind(Address::v4(Ipv4Addr::LOCALHOST, 0), None).unwrap();
            let local_port = aio_runtime::platform::local_port(listener.fd()).unwrap();
            listener.listen(16, None).unwrap();

            let mut client = Socket::stream(false).unwrap();
            client.connect(Address::v4(Ipv4Addr::LOCALHOST, local_port), None).unwrap();
            let (mut server_side, _peer) = listener.accept(None).unwrap();

            let start = Instant::now();
            let mut buf = [0u8; 8];
            let outcome = server_side.recv(&mut buf, 0, Some(30)).unwrap();
            assert!(start.elapsed().as_millis() >= 30);
            assert_eq!(outcome.rc, -1);
            assert_eq!(outcome.errno, libc::ETIMEDOUT);

            client.send(b"hi", 0, None).unwrap();
            let n = server_side.recv(&mut buf, 0, None).unwrap().rc;
            assert_eq!(&buf[..n as usize], b"hi");
        });
    }

    /// Same scenario under `ErrorPolicy::Exceptions`: the timeout now
    /// surfaces as `Err(AioError::Errno{kind: TimedOut, ..})` instead of
    /// being folded into `Ok`.
    #[test]
    fn recv_with_deadline_times_out_under_exceptions_policy() {
        let config = aio_core::RuntimeConfig::new().with_error_policy(aio_core::ErrorPolicy::Exceptions);
        with_runtime_config(config, || {
            let mut listener = Socket::stream(false).unwrap();
            listener.bind(Address::v4(Ipv4Addr::LOCALHOST, 0), None).unwrap();
            let local_port = aio_runtime::platform::local_port(listener.fd()).unwrap();
            listener.listen(16, None).unwrap();

            let mut client = Socket::stream(false).unwrap();
            client.connect(Address::v4(Ipv4Addr::LOCALHOST, local_port), None).unwrap();
            let (mut server_side, _peer) = listener.accept(None).unwrap();

            let mut buf = [0u8; 8];
            let err = server_side.recv(&mut buf, 0, Some(30)).unwrap_err();
            match err {
                AioError::Errno { kind, .. } => assert_eq!(kind, aio_core::ErrnoKind::TimedOut),
                other => panic!("expected a timeout error, got {other:?}"),
            }
        });
    }

    /// §8 scenario 3: the listener task accepts a connection and hands
    /// it to a freshly spawned task, a different OS thread under the
    /// one-thread-per-task scheduler. That task's first `recv`/`send`
    /// must not trip the cross-owner guard, even under
    /// `MultithreadPolicy::Fatal`, the strictest setting.
    #[test]
    fn accepted_socket_handed_to_new_task_is_not_flagged() {
        let config = aio_core::RuntimeConfig::new().with_multithread_policy(aio_core::MultithreadPolicy::Fatal);
        with_runtime_config(config, || {
            let mut listener = Socket::stream(false).unwrap();
            listener.bind(Address::v4(Ipv4Addr::LOCALHOST, 0), None).unwrap();
            let local_port = aio_runtime::platform::local_port(listener.fd()).unwrap();
            listener.listen(16, None).unwrap();

            let mut client = Socket::stream(false).unwrap();
            client.connect(Address::v4(Ipv4Addr::LOCALHOST, local_port), None).unwrap();
            let (conn, _peer) = listener.accept(None).unwrap();

            let done = Arc::new(AtomicBool::new(false));
            let done2 = done.clone();
            aio_runtime::current_scheduler().unwrap().spawn(move || {
                let mut conn = conn;
                let mut buf = [0u8; 8];
                // First use of `conn` happens on this new task, not the
                // listener's: this must bind the guard here, not panic.
                let _ = conn.recv(&mut buf, 0, Some(5));
                let _ = conn.send(b"ok", 0, None);
                done2.store(true, Ordering::SeqCst);
            });

            client.send(b"hi", 0, None).unwrap();
            while !done.load(Ordering::SeqCst) {
                std::thread::yield_now();
            }
        });
    }
}
