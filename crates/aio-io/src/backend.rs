//! Thin glue between `File`/`Socket` operations and the Scheduler's
//! Request/Outcome protocol (§4.E). Every call here must run inside a
//! task spawned on an aio runtime; there is no fallback for top-level
//! callers since a Request has nowhere to suspend without one.

use aio_core::request::{Request, RequestParams};
use aio_core::{AioError, ErrorPolicy, Outcome, RequestKind, RuntimeConfig};
use std::sync::Arc;

/// Build and submit a Request, blocking the calling task until it
/// completes. Returns the `Arc<Request>` alongside the Outcome so
/// callers that need side-channel data (`Accept`'s peer address,
/// `GetAddrInfo`'s resolved list) can read it back afterward.
pub fn submit(kind: RequestKind, fd: i32, params: RequestParams, timeout_ms: Option<u64>) -> (Outcome, Arc<Request>) {
    let sched = aio_runtime::current_scheduler().expect("aio-io operation called outside a task");
    let owner = aio_runtime::current_task_id();
    let req = Arc::new(Request::new(kind, fd, params, owner, timeout_ms));
    let outcome = sched.submit(req.clone());
    (outcome, req)
}

pub fn error_policy() -> ErrorPolicy {
    aio_runtime::current_scheduler().map(|s| s.config().error_policy).unwrap_or(ErrorPolicy::ReturnCodes)
}

/// The active runtime's full configuration, for checks (like
/// [`crate::guard::TaskGuard`]) that need more than `error_policy`.
/// Falls back to plain defaults outside a task, which only matters for
/// unit tests that exercise a `File`/`Socket` without a runtime.
pub fn error_policy_config() -> RuntimeConfig {
    aio_runtime::current_scheduler().map(|s| s.config().clone()).unwrap_or_default()
}

/// Translate a completed Outcome per the active `ErrorPolicy` (§4.G,
/// §6, §7). `ReturnCodes` callers always get `Ok(outcome)` — the full
/// `(rc, errno)` pair, on success or failure alike, so a failed op
/// still reports why it failed instead of losing the errno. Only
/// `Exceptions` callers get `Err` on failure.
pub fn translate(op: &'static str, outcome: Outcome) -> Result<Outcome, AioError> {
    if outcome.is_ok() {
        return Ok(outcome);
    }
    match error_policy() {
        ErrorPolicy::ReturnCodes => Ok(outcome),
        ErrorPolicy::Exceptions => Err(AioError::errno(op, outcome.errno)),
    }
}

/// Same as [`translate`] but always raises regardless of policy, for
/// operations (state-machine rejections) that have no meaningful
/// negative-rc-as-success reading.
pub fn translate_strict(op: &'static str, outcome: Outcome) -> Result<i64, AioError> {
    if outcome.is_ok() {
        Ok(outcome.rc)
    } else {
        Err(AioError::errno(op, outcome.errno))
    }
}
