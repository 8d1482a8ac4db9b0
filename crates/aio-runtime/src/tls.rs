//! Thread-local context: the scheduler a task thread belongs to, and
//! that task's own identity.
//!
//! Per §9's Design Notes, the scheduler itself is never a process-wide
//! global — it is handed explicitly to every task thread the Scheduler
//! spawns (copied into this thread-local at the top of the task's entry
//! point), so two independent `Runtime`s on two unrelated thread groups
//! never see each other.

use crate::scheduler::Scheduler;
use aio_core::TaskId;
use std::cell::{Cell, RefCell};
use std::sync::Arc;

thread_local! {
    static CURRENT_SCHEDULER: RefCell<Option<Arc<Scheduler>>> = const { RefCell::new(None) };
    static CURRENT_TASK: Cell<TaskId> = Cell::new(TaskId::NONE);
}

pub fn set_current_scheduler(sched: Arc<Scheduler>) {
    CURRENT_SCHEDULER.with(|s| *s.borrow_mut() = Some(sched));
}

pub fn current_scheduler() -> Option<Arc<Scheduler>> {
    CURRENT_SCHEDULER.with(|s| s.borrow().clone())
}

pub fn set_current_task(id: TaskId) {
    CURRENT_TASK.with(|t| t.set(id));
}

pub fn current_task() -> TaskId {
    CURRENT_TASK.with(|t| t.get())
}

pub fn is_in_task() -> bool {
    !current_task().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no_task() {
        std::thread::spawn(|| {
            assert_eq!(current_task(), TaskId::NONE);
            assert!(!is_in_task());
        })
        .join()
        .unwrap();
    }
}
