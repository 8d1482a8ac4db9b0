//! # aio
//!
//! A cooperative, single-threaded-per-scheduler POSIX I/O runtime.
//! Applications write synchronous-looking code — open a file, read it,
//! connect a socket, accept a connection — and every blocking call is
//! transparently suspended, registered with the kernel's kqueue-style
//! event facility, and resumed on readiness or timeout.
//!
//! ```ignore
//! use aio::{bootstrap, File, RuntimeConfig};
//!
//! let rt = bootstrap(RuntimeConfig::new()).unwrap();
//! rt.spawn(|| {
//!     let mut f = File::open("/tmp/x", libc::O_CREAT | libc::O_RDWR, 0o600, None).unwrap();
//!     f.write(b"hello", None).unwrap();
//! });
//! rt.run_until(|| false); // drive the scheduler from the top level
//! ```
//!
//! See the crate's `demos/` binaries for complete, runnable examples.

pub use aio_core::{
    Address, AioError, ConfigError, ErrnoKind, ErrorPolicy, FileState, MultithreadPolicy, Outcome, Result,
    RuntimeConfig, SocketState, MAX_EVENTS,
};
pub use aio_io::{resolve, File, LruReadCache, ReadCache, Socket, Timer};
pub use aio_runtime::{bootstrap, current_scheduler, current_task_id, is_in_task, yield_now, Scheduler};

/// Logging macros and the level type, re-exported so applications can
/// log through the same house facility the runtime itself uses,
/// without a direct `aio-core` dependency.
pub use aio_core::logging;
pub use aio_core::{aio_debug, aio_error, aio_info, aio_trace, aio_warn};
