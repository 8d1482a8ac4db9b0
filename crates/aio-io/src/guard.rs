//! Cross-task usage check shared by `File` and `Socket` (§5: "every
//! runtime object remembers the task that owns it; the configured
//! `multithread_policy` is consulted on every method entry").
//!
//! Keyed on [`aio_core::TaskId`], not the OS `ThreadId` a handle
//! happened to be *constructed* on. Under the one-OS-thread-per-task
//! scheduler (`aio_runtime::Scheduler::spawn`), the canonical accept
//! loop constructs the accepted socket on the listener task's thread
//! and then hands it to a freshly spawned task to own — a legitimate
//! single-owner transfer, not concurrent access, but still a different
//! real `ThreadId`. Binding ownership lazily, on the first real
//! operation rather than at construction, lets that handoff complete
//! before the guard commits to an owner.

use aio_core::{aio_warn, MultithreadPolicy, TaskId};
use std::sync::Mutex;

#[derive(Debug)]
pub struct TaskGuard {
    owner: Mutex<Option<TaskId>>,
}

impl TaskGuard {
    pub fn new() -> Self {
        Self { owner: Mutex::new(None) }
    }

    /// Called at the top of every `File`/`Socket` method. The first
    /// call binds the handle to the calling task; every later call
    /// from a different task is checked against the configured policy.
    /// Silent does nothing; Warn logs and proceeds; Fatal panics,
    /// matching §7 tier 4 (unrecoverable runtime condition).
    pub fn check(&self, op: &'static str) {
        let current = aio_runtime::current_task_id();
        let mut owner = self.owner.lock().unwrap();
        match *owner {
            None => *owner = Some(current),
            Some(bound) if bound == current => {}
            Some(_) => {
                drop(owner);
                let policy = crate::backend::error_policy_config().multithread_policy;
                match policy {
                    MultithreadPolicy::Silent => {}
                    MultithreadPolicy::Warn => {
                        aio_warn!("{op} called from a task other than the one that first used this handle");
                    }
                    MultithreadPolicy::Fatal => {
                        panic!("aio: {op} called from a task other than the one that first used this handle");
                    }
                }
            }
        }
    }
}

impl Default for TaskGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_task_check_is_a_no_op() {
        let guard = TaskGuard::new();
        guard.check("test-op");
        guard.check("test-op");
    }

    #[test]
    fn unbound_guard_binds_on_first_check() {
        let guard = TaskGuard::new();
        assert!(guard.owner.lock().unwrap().is_none());
        guard.check("first-use");
        assert!(guard.owner.lock().unwrap().is_some());
    }
}
