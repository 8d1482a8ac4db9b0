//! File and Socket state machines (§4.F), the Backend adapter (§4.E),
//! the error policy translation (§4.G), the thread-ownership guard
//! (§5), and the pluggable read cache (§4.J). This crate knows what a
//! File or a Socket *is*; `aio-runtime` below it only knows how to run
//! tasks and talk to the kernel.

pub mod backend;
pub mod cache;
pub mod file;
pub mod guard;
pub mod socket;
pub mod timer;

pub use cache::{LruReadCache, ReadCache};
pub use file::File;
pub use socket::{resolve, Socket};
pub use timer::Timer;
