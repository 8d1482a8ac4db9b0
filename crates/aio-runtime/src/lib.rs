//! Scheduler, kqueue-style poller, platform shim, and timer for the
//! aio runtime. This crate knows how to run tasks and talk to the
//! kernel; it does not know what a File or a Socket is — that's
//! `aio-io`, layered on top.

pub mod platform;
pub mod poller;
pub mod scheduler;
pub mod syscall;
pub mod timer;
pub mod tls;

pub use poller::{Poller, Waker};
pub use scheduler::Scheduler;
pub use timer::{duration_ms, sleep, sleep_ms};

use aio_core::RuntimeConfig;
use std::sync::Arc;

/// Build a Scheduler and park the calling thread's TLS on it, so
/// top-level code (not itself a spawned task) can still call
/// `spawn`/`submit` before any task exists. Mirrors "a dedicated I/O
/// task is spawned at construction" (§3 Scheduler singleton).
pub fn bootstrap(config: RuntimeConfig) -> std::io::Result<Arc<Scheduler>> {
    let sched = Scheduler::new(config)?;
    tls::set_current_scheduler(sched.clone());
    Ok(sched)
}

pub fn current_scheduler() -> Option<Arc<Scheduler>> {
    tls::current_scheduler()
}

pub fn yield_now() {
    if let Some(sched) = tls::current_scheduler() {
        sched.yield_now();
    } else {
        std::thread::yield_now();
    }
}

pub fn current_task_id() -> aio_core::TaskId {
    tls::current_task()
}

pub fn is_in_task() -> bool {
    tls::is_in_task()
}
