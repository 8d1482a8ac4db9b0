//! The kqueue-style event poller (§4.C).
//!
//! Owns the kernel event queue and the bounded change list. Single
//! writer: only the scheduler's I/O task ever calls [`Poller::poll`].
//! `register_*` calls may come from any task thread (they only push
//! onto the change list and a callback table, both behind a mutex) but
//! `poll()` itself must only ever run on the I/O task.

use aio_core::request::{Outcome, Request, RequestKind};
use aio_core::MAX_EVENTS;
use nix::sys::event::{kevent_ts, kqueue, EventFilter, FilterFlag, KEvent};
use nix::sys::time::TimeSpec;
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::syscall;

struct ChangeList {
    pending: Vec<KEvent>,
}

impl ChangeList {
    fn new(capacity: usize) -> Self {
        Self { pending: Vec::with_capacity(capacity) }
    }

    fn push(&mut self, ev: KEvent) {
        self.pending.push(ev);
    }

    fn len(&self) -> usize {
        self.pending.len()
    }

    fn drain(&mut self) -> Vec<KEvent> {
        std::mem::take(&mut self.pending)
    }
}

struct Callbacks {
    read: HashMap<RawFd, Arc<Request>>,
    write: HashMap<RawFd, Arc<Request>>,
    timer: HashMap<u64, Arc<Request>>,
}

impl Callbacks {
    fn new() -> Self {
        Self { read: HashMap::new(), write: HashMap::new(), timer: HashMap::new() }
    }
}

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

pub struct Poller {
    kq: RawFd,
    changes: Mutex<ChangeList>,
    callbacks: Mutex<Callbacks>,
    short_timeout_ms: u64,
    /// From `RuntimeConfig::max_events` (§3 `ChangeList` capacity, §4.C
    /// `max_allowed`); defaults to [`aio_core::MAX_EVENTS`] but is a
    /// per-runtime, not a compile-time, constant.
    max_events: usize,
}

/// Called by the Scheduler after a Request completes, so the owning
/// task's condvar can be signaled. Kept as a trait object to avoid a
/// dependency cycle between `poller` and `scheduler`.
pub trait Waker: Send + Sync {
    fn wake(&self, task: aio_core::TaskId);
}

impl Poller {
    pub fn new(short_timeout_ms: u64) -> std::io::Result<Self> {
        Self::with_max_events(short_timeout_ms, MAX_EVENTS)
    }

    pub fn with_max_events(short_timeout_ms: u64, max_events: usize) -> std::io::Result<Self> {
        let kq = kqueue().map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
        Ok(Self {
            kq,
            changes: Mutex::new(ChangeList::new(max_events)),
            callbacks: Mutex::new(Callbacks::new()),
            short_timeout_ms,
            max_events,
        })
    }

    fn change_count(&self) -> usize {
        self.changes.lock().unwrap().len()
    }

    /// Back-pressure: if the change list is already at capacity, the
    /// caller must poll before registering more (§4.C `max_allowed`).
    pub fn at_capacity(&self) -> bool {
        self.change_count() >= self.max_events
    }

    pub fn register_read(&self, fd: RawFd, request: Arc<Request>) {
        let ev = KEvent::new(
            fd as usize,
            EventFilter::EVFILT_READ,
            nix::sys::event::EventFlag::EV_ADD | nix::sys::event::EventFlag::EV_ENABLE | nix::sys::event::EventFlag::EV_ONESHOT,
            FilterFlag::empty(),
            0,
            0,
        );
        self.callbacks.lock().unwrap().read.insert(fd, request);
        self.changes.lock().unwrap().push(ev);
    }

    pub fn register_write(&self, fd: RawFd, request: Arc<Request>) {
        let ev = KEvent::new(
            fd as usize,
            EventFilter::EVFILT_WRITE,
            nix::sys::event::EventFlag::EV_ADD | nix::sys::event::EventFlag::EV_ENABLE | nix::sys::event::EventFlag::EV_ONESHOT,
            FilterFlag::empty(),
            0,
            0,
        );
        self.callbacks.lock().unwrap().write.insert(fd, request);
        self.changes.lock().unwrap().push(ev);
    }

    /// `duration_ms` already resolved per §9 (`s*1000 + ms + ns/1_000_000`).
    pub fn register_timer(&self, duration_ms: u64, request: Arc<Request>) -> u64 {
        let timer_id = NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed);
        let ev = KEvent::new(
            timer_id as usize,
            EventFilter::EVFILT_TIMER,
            nix::sys::event::EventFlag::EV_ADD | nix::sys::event::EventFlag::EV_ENABLE | nix::sys::event::EventFlag::EV_ONESHOT,
            FilterFlag::empty(),
            duration_ms as isize,
            0,
        );
        self.callbacks.lock().unwrap().timer.insert(timer_id, request);
        self.changes.lock().unwrap().push(ev);
        timer_id
    }

    /// Flush the change list and wait for events, up to `short_timeout_ms`.
    /// Dispatches each event to its Request, performing the actual
    /// non-blocking syscall for READ/WRITE filters. Re-registers on
    /// `EAGAIN` rather than surfacing it (§4.F retry policy).
    pub fn poll(&self, waker: &dyn Waker) {
        let changes = self.changes.lock().unwrap().drain();
        let mut events = vec![
            KEvent::new(0, EventFilter::EVFILT_READ, nix::sys::event::EventFlag::empty(), FilterFlag::empty(), 0, 0);
            self.max_events
        ];
        let timeout = TimeSpec::from_duration(Duration::from_millis(self.short_timeout_ms));

        let n = match kevent_ts(self.kq, &changes, &mut events, Some(timeout)) {
            Ok(n) => n,
            Err(e) if e == nix::errno::Errno::EINTR => 0,
            Err(_) => {
                // Fatal per §7 tier 4: kqueue allocation failure or similar.
                panic!("aio: kevent() failed fatally");
            }
        };

        for ev in events.iter().take(n) {
            self.dispatch(ev, waker);
        }
    }

    fn dispatch(&self, ev: &KEvent, waker: &dyn Waker) {
        match ev.filter() {
            Ok(EventFilter::EVFILT_READ) => self.complete_io(ev.ident() as RawFd, true, waker),
            Ok(EventFilter::EVFILT_WRITE) => self.complete_io(ev.ident() as RawFd, false, waker),
            Ok(EventFilter::EVFILT_TIMER) => self.complete_timer(ev.ident() as u64, waker),
            other => panic!("aio: unknown kevent filter {other:?}"),
        }
    }

    /// A fired `EVFILT_TIMER` means one of two distinct things depending
    /// on what it was registered for (§4.D): a genuine `RequestKind::Timer`
    /// (`Timer::sleep`) resolves successfully when its duration elapses.
    /// A timer racing a deadline against an I/O registration means the
    /// deadline won the race, so the request surfaces `ETIMEDOUT` rather
    /// than a fabricated success — the I/O registration itself is left
    /// in place and is simply ignored (first-write-wins) if it fires later.
    fn complete_timer(&self, timer_id: u64, waker: &dyn Waker) {
        let req = self.callbacks.lock().unwrap().timer.remove(&timer_id);
        if let Some(req) = req {
            let outcome = if req.kind == RequestKind::Timer { Outcome::ok(0) } else { Outcome::err(libc::ETIMEDOUT) };
            if req.complete(outcome) {
                waker.wake(req.owner);
            }
        }
    }

    fn complete_io(&self, fd: RawFd, is_read: bool, waker: &dyn Waker) {
        let req = {
            let mut cb = self.callbacks.lock().unwrap();
            if is_read { cb.read.remove(&fd) } else { cb.write.remove(&fd) }
        };
        let Some(req) = req else { return };
        if req.is_complete() {
            // A racing deadline timer already finished this Request.
            return;
        }

        let outcome = syscall::perform(&req);
        if outcome.rc == -1 && outcome.errno == libc::EAGAIN {
            // Re-register and leave the task suspended (§4.F).
            if is_read {
                self.register_read(fd, req);
            } else {
                self.register_write(fd, req);
            }
            return;
        }

        if req.complete(outcome) {
            waker.wake(req.owner);
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        unsafe { libc::close(self.kq) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct NullWaker(AtomicBool);
    impl Waker for NullWaker {
        fn wake(&self, _task: aio_core::TaskId) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn back_pressure_reports_capacity() {
        let poller = Poller::new(50).unwrap();
        assert!(!poller.at_capacity());
    }
}
