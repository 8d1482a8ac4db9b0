//! `Timer.sleep` as a named type (§6 API surface table), thin sugar
//! over [`aio_runtime::timer`].

pub struct Timer;

impl Timer {
    /// Suspends the calling task for `seconds*1000 + millis + nanos/1_000_000`
    /// milliseconds (§9's resolved unit ambiguity).
    pub fn sleep(seconds: u64, millis: u64, nanos: u64) {
        aio_runtime::sleep(seconds, millis, nanos);
    }

    pub fn sleep_ms(duration_ms: u64) {
        aio_runtime::sleep_ms(duration_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn sleep_blocks_at_least_the_requested_duration() {
        let sched = aio_runtime::Scheduler::new(aio_core::RuntimeConfig::new()).unwrap();
        let done = Arc::new(AtomicBool::new(false));
        let done2 = done.clone();
        let start = Instant::now();
        sched.spawn(move || {
            Timer::sleep_ms(20);
            done2.store(true, Ordering::SeqCst);
        });
        sched.run_until(|| done.load(Ordering::SeqCst));
        assert!(start.elapsed().as_millis() >= 20);
        sched.shutdown();
    }
}
