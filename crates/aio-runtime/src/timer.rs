//! `Timer.sleep` (§6 API surface). A TIMER Request with no target fd;
//! the Poller resolves it via `EVFILT_TIMER` exactly like a deadline,
//! just without a racing I/O registration.

use crate::tls;
use aio_core::request::{Request, RequestParams};
use aio_core::RequestKind;

/// Resolves `(seconds, millis, nanos)` to milliseconds.
///
/// §9 flags the sample's `nanos/1000` as almost certainly a unit bug
/// (it would treat nanoseconds as microseconds); this crate uses
/// `nanos/1_000_000`, matching kqueue's millisecond `EVFILT_TIMER`
/// resolution.
pub fn duration_ms(seconds: u64, millis: u64, nanos: u64) -> u64 {
    seconds * 1000 + millis + nanos / 1_000_000
}

/// Suspend the current task for at least `duration_ms` milliseconds.
/// Must be called from inside a task spawned on an aio `Scheduler`.
pub fn sleep_ms(duration_ms: u64) {
    let sched = tls::current_scheduler().expect("aio::sleep called outside a task");
    let owner = tls::current_task();
    let req = std::sync::Arc::new(Request::new(
        RequestKind::Timer,
        -1,
        RequestParams { duration_ms, ..Default::default() },
        owner,
        None,
    ));
    let _ = sched.submit(req);
}

pub fn sleep(seconds: u64, millis: u64, nanos: u64) {
    sleep_ms(duration_ms(seconds, millis, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_conversion_uses_millisecond_nanos() {
        assert_eq!(duration_ms(1, 500, 0), 1500);
        assert_eq!(duration_ms(0, 0, 2_000_000), 2);
        assert_eq!(duration_ms(0, 0, 999_999), 0);
    }
}
