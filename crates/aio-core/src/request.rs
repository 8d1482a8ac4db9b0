//! The Request record: one pending syscall plus its continuation.
//!
//! A `Request` is created by a Backend, handed to the Scheduler for the
//! lifetime of the suspension, and completed exactly once by whichever
//! of (kernel readiness, deadline timer) fires first. The result slot
//! enforces that "exactly once" at the type level: [`Request::complete`]
//! only ever accepts the first write.

use crate::address::Address;
use crate::id::{RequestId, TaskId};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Open,
    Close,
    Read,
    Pread,
    Write,
    Pwrite,
    Recv,
    Send,
    SendMsg,
    Accept,
    Connect,
    Bind,
    Listen,
    Timer,
    GetAddrInfo,
}

impl RequestKind {
    /// OPEN/TIMER/GETADDRINFO are not tied to an existing fd (§3).
    pub fn has_target_fd(self) -> bool {
        !matches!(self, RequestKind::Open | RequestKind::Timer | RequestKind::GetAddrInfo)
    }
}

/// Parameter block. Not every field is meaningful for every `kind`;
/// this mirrors the source's single loosely-typed parameter bag rather
/// than one struct per op, since the Backend (§4.E) is the only reader.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    /// Address of the caller's buffer, as a plain integer so the
    /// Request stays `Send`/`Sync` without an `unsafe impl`. The
    /// Backend guarantees the buffer stays valid and exclusively
    /// borrowed until the Request completes (§4.B).
    pub buf_ptr: usize,
    pub buf_len: usize,
    pub offset: i64,
    pub flags: i32,
    pub addr: Option<Address>,
    pub backlog: i32,
    pub duration_ms: u64,
}

/// The `(rc, errno)` outcome of a completed Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub rc: i64,
    pub errno: i32,
}

impl Outcome {
    pub fn ok(rc: i64) -> Self {
        Self { rc, errno: 0 }
    }

    pub fn err(errno: i32) -> Self {
        Self { rc: -1, errno }
    }

    pub fn is_ok(self) -> bool {
        self.rc >= 0
    }
}

/// Side-channel results a plain `(rc, errno)` can't carry: the peer
/// address from `accept`, or the resolved addresses from `getaddrinfo`.
#[derive(Debug, Clone, Default)]
pub struct RequestExtra {
    pub peer_addr: Option<Address>,
    pub addrinfo_results: Vec<Address>,
}

pub struct Request {
    pub id: RequestId,
    pub kind: RequestKind,
    /// -1 for OPEN/TIMER/GETADDRINFO.
    pub fd: i32,
    pub params: RequestParams,
    /// The task suspended waiting for this Request's outcome.
    pub owner: TaskId,
    /// Optional timeout, as a duration in milliseconds from submission.
    /// Implemented by racing a second, one-shot TIMER registration
    /// against the I/O registration (§4.D); `None` means no timeout.
    pub deadline_ms: Option<u64>,
    slot: Mutex<Option<Outcome>>,
    extra: Mutex<RequestExtra>,
}

impl Request {
    pub fn new(kind: RequestKind, fd: i32, params: RequestParams, owner: TaskId, deadline_ms: Option<u64>) -> Self {
        Self {
            id: RequestId::next(),
            kind,
            fd,
            params,
            owner,
            deadline_ms,
            slot: Mutex::new(None),
            extra: Mutex::new(RequestExtra::default()),
        }
    }

    pub fn set_peer_addr(&self, addr: Address) {
        self.extra.lock().unwrap().peer_addr = Some(addr);
    }

    pub fn take_peer_addr(&self) -> Option<Address> {
        self.extra.lock().unwrap().peer_addr.take()
    }

    pub fn set_addrinfo_results(&self, addrs: Vec<Address>) {
        self.extra.lock().unwrap().addrinfo_results = addrs;
    }

    pub fn take_addrinfo_results(&self) -> Vec<Address> {
        std::mem::take(&mut self.extra.lock().unwrap().addrinfo_results)
    }

    /// Write the outcome. Returns `true` if this call performed the
    /// write (first writer wins); a `false` return means the Request
    /// was already completed by a racing timer or kernel event and the
    /// caller's outcome was discarded, per §4.D.
    pub fn complete(&self, outcome: Outcome) -> bool {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    pub fn take_result(&self) -> Option<Outcome> {
        *self.slot.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> Request {
        Request::new(RequestKind::Read, 3, RequestParams::default(), TaskId::next(), None)
    }

    #[test]
    fn first_write_wins() {
        let r = req();
        assert!(r.complete(Outcome::ok(5)));
        assert!(!r.complete(Outcome::err(110))); // timer racing in after kernel data
        assert_eq!(r.take_result(), Some(Outcome::ok(5)));
    }

    #[test]
    fn open_timer_getaddrinfo_have_no_target_fd() {
        assert!(!RequestKind::Open.has_target_fd());
        assert!(!RequestKind::Timer.has_target_fd());
        assert!(!RequestKind::GetAddrInfo.has_target_fd());
        assert!(RequestKind::Read.has_target_fd());
    }

    #[test]
    fn uncompleted_request_has_no_result() {
        let r = req();
        assert!(!r.is_complete());
        assert_eq!(r.take_result(), None);
    }
}
