//! Printk-style diagnostic logging.
//!
//! Thread-safe, level-gated output to stderr. Each line carries the
//! logging task's id so interleaved suspension/resumption is readable:
//!
//! ```text
//! [INFO]  [t3] accepted fd=9 from 127.0.0.1:54213
//! ```
//!
//! # Environment variables
//!
//! - `AIO_LOG_LEVEL` - `off|error|warn|info|debug|trace` or `0..5` (default `info`)
//! - `AIO_LOG_TIME=1` - prefix each line with nanoseconds since first use
//! - `AIO_LOG_FLUSH=1` - flush stderr after every line

use crate::env::env_get_bool;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static TIME_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);
static START_TIME: OnceLock<Instant> = OnceLock::new();

thread_local! {
    static TASK_ID: std::cell::Cell<Option<u64>> = const { std::cell::Cell::new(None) };
}

/// Initialize from environment. Called automatically on first log line;
/// exposed for deterministic setup (e.g. at the top of `main`).
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    START_TIME.get_or_init(Instant::now);
    FLUSH_ENABLED.store(env_get_bool("AIO_LOG_FLUSH", false), Ordering::Relaxed);
    TIME_ENABLED.store(env_get_bool("AIO_LOG_TIME", false), Ordering::Relaxed);
    if let Ok(val) = std::env::var("AIO_LOG_LEVEL") {
        let level = match val.to_lowercase().as_str() {
            "off" | "0" => LogLevel::Off,
            "error" | "1" => LogLevel::Error,
            "warn" | "2" => LogLevel::Warn,
            "info" | "3" => LogLevel::Info,
            "debug" | "4" => LogLevel::Debug,
            "trace" | "5" => LogLevel::Trace,
            _ => LogLevel::Info,
        };
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

#[inline]
fn ensure_init() {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
}

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn log_level() -> LogLevel {
    ensure_init();
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

#[inline]
fn level_enabled(level: LogLevel) -> bool {
    level as u8 <= log_level() as u8
}

#[inline]
fn flush_enabled() -> bool {
    ensure_init();
    FLUSH_ENABLED.load(Ordering::Relaxed)
}

#[inline]
fn time_enabled() -> bool {
    ensure_init();
    TIME_ENABLED.load(Ordering::Relaxed)
}

fn elapsed_ns() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

/// Associate the calling OS thread with a task id, for log context.
/// Called by the scheduler when a task starts running.
pub fn set_current_task(id: u64) {
    TASK_ID.with(|t| t.set(Some(id)));
}

pub fn clear_current_task() {
    TASK_ID.with(|t| t.set(None));
}

fn format_context() -> String {
    match TASK_ID.with(|t| t.get()) {
        Some(id) => format!("[t{id}]"),
        None => "[t-]".to_string(),
    }
}

#[doc(hidden)]
pub fn _log_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write!(handle, "{} ", level.prefix());
    if time_enabled() {
        let _ = write!(handle, "[{}] ", elapsed_ns());
    }
    let _ = write!(handle, "{} ", format_context());
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if flush_enabled() {
        let _ = handle.flush();
    }
}

/// Error-level log line.
#[macro_export]
macro_rules! aio_error {
    ($($arg:tt)*) => {
        $crate::logging::_log_impl($crate::logging::LogLevel::Error, format_args!($($arg)*))
    };
}

/// Warn-level log line.
#[macro_export]
macro_rules! aio_warn {
    ($($arg:tt)*) => {
        $crate::logging::_log_impl($crate::logging::LogLevel::Warn, format_args!($($arg)*))
    };
}

/// Info-level log line.
#[macro_export]
macro_rules! aio_info {
    ($($arg:tt)*) => {
        $crate::logging::_log_impl($crate::logging::LogLevel::Info, format_args!($($arg)*))
    };
}

/// Debug-level log line.
#[macro_export]
macro_rules! aio_debug {
    ($($arg:tt)*) => {
        $crate::logging::_log_impl($crate::logging::LogLevel::Debug, format_args!($($arg)*))
    };
}

/// Trace-level log line.
#[macro_export]
macro_rules! aio_trace {
    ($($arg:tt)*) => {
        $crate::logging::_log_impl($crate::logging::LogLevel::Trace, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn task_context_roundtrip() {
        assert_eq!(TASK_ID.with(|t| t.get()), None);
        set_current_task(9);
        assert_eq!(TASK_ID.with(|t| t.get()), Some(9));
        clear_current_task();
        assert_eq!(TASK_ID.with(|t| t.get()), None);
    }

    #[test]
    fn macros_compile_and_respect_level() {
        set_log_level(LogLevel::Off);
        aio_error!("suppressed {}", 1);
        aio_warn!("suppressed");
        aio_info!("suppressed");
        aio_debug!("suppressed");
        aio_trace!("suppressed");
    }
}
