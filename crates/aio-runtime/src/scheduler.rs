//! The Scheduler (§4.D): multiplexes user tasks, owns the Poller, runs
//! a dedicated I/O task that polls when there's nothing else to do.
//!
//! **Implementation note**: tasks are OS threads parked on a condition
//! variable rather than true stackful coroutines — the house
//! simplification §9 explicitly sanctions ("OS threads parked on
//! condition variables: simplest, acceptable for modest concurrency").
//! The public shape (`spawn`, `submit`, `yield_now`, task states, FIFO
//! completion delivery per fd) is unchanged; only the suspension
//! mechanism differs from a true fiber swap.

use crate::poller::{Poller, Waker};
use crate::syscall;
use crate::tls;
use aio_core::request::{Outcome, Request, RequestKind};
use aio_core::{RuntimeConfig, TaskId, TaskState};
use aio_core::{aio_debug, aio_info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

struct TaskHandle {
    state: Mutex<TaskState>,
    cv: Condvar,
}

pub struct Scheduler {
    poller: Arc<Poller>,
    tasks: Mutex<HashMap<TaskId, Arc<TaskHandle>>>,
    config: RuntimeConfig,
    shutdown: AtomicBool,
    io_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Waker for Scheduler {
    fn wake(&self, task: TaskId) {
        let handle = self.tasks.lock().unwrap().get(&task).cloned();
        if let Some(handle) = handle {
            *handle.state.lock().unwrap() = TaskState::Runnable;
            handle.cv.notify_all();
        }
    }
}

impl Scheduler {
    pub fn new(config: RuntimeConfig) -> std::io::Result<Arc<Self>> {
        config.validate().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
        let poller = Arc::new(Poller::with_max_events(config.short_timeout_ms, config.max_events)?);
        let sched = Arc::new(Self {
            poller,
            tasks: Mutex::new(HashMap::new()),
            config,
            shutdown: AtomicBool::new(false),
            io_thread: Mutex::new(None),
        });

        let io_sched = sched.clone();
        let handle = std::thread::Builder::new()
            .name("aio-io-task".into())
            .spawn(move || io_task_loop(io_sched))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        *sched.io_thread.lock().unwrap() = Some(handle);

        Ok(sched)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn task_handle(&self, id: TaskId) -> Arc<TaskHandle> {
        self.tasks
            .lock()
            .unwrap()
            .entry(id)
            .or_insert_with(|| Arc::new(TaskHandle { state: Mutex::new(TaskState::Running), cv: Condvar::new() }))
            .clone()
    }

    /// Spawn a new task. `f` runs on its own OS thread; this thread's
    /// first act is to register itself in thread-local storage so
    /// `current_task()`/`current_scheduler()` work from inside `f`.
    pub fn spawn<F>(self: &Arc<Self>, f: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = TaskId::next();
        self.tasks.lock().unwrap().insert(
            id,
            Arc::new(TaskHandle { state: Mutex::new(TaskState::Running), cv: Condvar::new() }),
        );
        let sched = self.clone();
        std::thread::Builder::new()
            .name(format!("aio-task-{id}"))
            .spawn(move || {
                tls::set_current_scheduler(sched.clone());
                tls::set_current_task(id);
                aio_core::logging::set_current_task(id.as_u64());
                aio_debug!("task {id} starting");
                f();
                aio_debug!("task {id} finished");
                aio_core::logging::clear_current_task();
                sched.mark_dead(id);
            })
            .expect("failed to spawn aio task thread");
        id
    }

    fn mark_dead(&self, id: TaskId) {
        if let Some(handle) = self.tasks.lock().unwrap().remove(&id) {
            *handle.state.lock().unwrap() = TaskState::Dead;
        }
    }

    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.lock().unwrap().get(&id).map(|h| *h.state.lock().unwrap())
    }

    /// Submit a Request from the calling task's context and block the
    /// calling (task) thread until it completes. Synchronous kinds
    /// (open/close/bind/listen/getaddrinfo) never reach the Poller.
    ///
    /// Takes an `Arc<Request>` rather than an owned `Request` so a
    /// caller that needs side-channel data (`Accept`'s peer address,
    /// `GetAddrInfo`'s resolved list) can keep its own clone and read
    /// it back after this returns.
    pub fn submit(self: &Arc<Self>, request: Arc<Request>) -> Outcome {
        if syscall::is_synchronous(request.kind) {
            let outcome = syscall::perform_sync(&request);
            request.complete(outcome);
            return outcome;
        }

        let owner = request.owner;
        let handle = self.task_handle(owner);
        *handle.state.lock().unwrap() = TaskState::Suspended;

        if self.poller.at_capacity() {
            // Back-pressure (§4.C `max_allowed`): the I/O task is the
            // only thread allowed to call `poll()`, so a submitter
            // that finds the change list full just logs and proceeds —
            // the I/O task drains it on its very next cycle.
            aio_debug!("change list at capacity, relying on the I/O task's next cycle");
        }

        match request.kind {
            RequestKind::Timer => {
                self.poller.register_timer(request.params.duration_ms, request.clone());
            }
            kind if syscall::is_write_direction(kind) => {
                self.poller.register_write(request.fd, request.clone());
            }
            _ => {
                self.poller.register_read(request.fd, request.clone());
            }
        }

        // A deadline races the I/O registration; first write wins (§4.D).
        if let Some(deadline) = request.deadline_ms {
            if request.kind != RequestKind::Timer {
                self.poller.register_timer(deadline, request.clone());
            }
        }

        let mut state = handle.state.lock().unwrap();
        while !request.is_complete() {
            state = handle.cv.wait(state).unwrap();
        }
        *state = TaskState::Running;
        drop(state);

        request.take_result().expect("Request completed without a result")
    }

    /// Voluntary yield: give the OS scheduler a chance to run another
    /// task thread before this one continues.
    pub fn yield_now(&self) {
        std::thread::yield_now();
    }

    /// Pump until `predicate` holds, sleeping briefly between checks.
    /// Used at startup/teardown, never on a task's hot path.
    pub fn run_until<F: Fn() -> bool>(&self, predicate: F) {
        while !predicate() {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.io_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn io_task_loop(sched: Arc<Scheduler>) {
    aio_info!("aio I/O task started");
    while !sched.is_shutdown() {
        sched.poller.poll(sched.as_ref());
    }
    aio_info!("aio I/O task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use aio_core::request::RequestParams;
    use aio_core::RuntimeConfig;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn spawn_runs_closure_and_marks_dead() {
        let sched = Scheduler::new(RuntimeConfig::new()).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        let id = sched.spawn(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        });
        sched.run_until(|| ran.load(Ordering::SeqCst) == 1);
        sched.run_until(|| sched.task_state(id).is_none());
        sched.shutdown();
    }

    #[test]
    fn synchronous_kinds_never_touch_poller() {
        let sched = Scheduler::new(RuntimeConfig::new()).unwrap();
        let path = std::env::temp_dir().join("aio_sched_sync_test");
        let path_bytes = path.to_str().unwrap().as_bytes().to_vec();
        let owner = TaskId::next();
        let req = Arc::new(Request::new(
            RequestKind::Open,
            -1,
            RequestParams {
                buf_ptr: path_bytes.as_ptr() as usize,
                buf_len: path_bytes.len(),
                offset: 0o600,
                flags: libc::O_CREAT | libc::O_RDWR | libc::O_TRUNC,
                ..Default::default()
            },
            owner,
            None,
        ));
        let outcome = sched.submit(req);
        assert!(outcome.is_ok(), "open failed: {outcome:?}");
        syscall::perform_sync(&Request::new(
            RequestKind::Close,
            outcome.rc as i32,
            RequestParams::default(),
            owner,
            None,
        ));
        let _ = std::fs::remove_file(&path);
        sched.shutdown();
    }
}
