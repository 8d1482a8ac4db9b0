//! Core types for the aio runtime: platform-agnostic data model shared
//! by the scheduler, poller, and state machines. No syscalls live here.

pub mod address;
pub mod config;
pub mod env;
pub mod error;
pub mod id;
pub mod logging;
pub mod request;
pub mod state;

pub use address::Address;
pub use config::{ConfigError, ErrorPolicy, MultithreadPolicy, RuntimeConfig};
pub use error::{AioError, ErrnoKind, Result};
pub use id::{RequestId, TaskId};
pub use logging::LogLevel;
pub use request::{Outcome, Request, RequestKind, RequestParams};
pub use state::{FileState, SocketState, TaskState};

/// Back-pressure signal shared by the ChangeList and the Poller (§3/§4.C).
/// If more than this many registrations are pending, `poll()` must run
/// before any further `register_*` call is accepted.
pub const MAX_EVENTS: usize = 10;
