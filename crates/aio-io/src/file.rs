//! File descriptor state machine (§3, §4.F): open/close/read/write
//! gated on access mode, dispatched through the Backend.

use crate::backend::{self, translate, translate_strict};
use crate::cache::{LruReadCache, ReadCache};
use crate::guard::TaskGuard;
use aio_core::request::RequestParams;
use aio_core::{AioError, FileState, Outcome, RequestKind};

/// An open file, opened for reading, writing, or both. Every method
/// suspends the calling task until its Request completes; call only
/// from inside a task spawned on an aio runtime.
#[derive(Debug)]
pub struct File {
    fd: i32,
    state: FileState,
    guard: TaskGuard,
    /// `None` when `read_cache_size == 0` (§4.J): `pread` then always
    /// goes straight to the Backend.
    cache: Option<LruReadCache>,
}

impl File {
    /// Opens `path` with raw `flags`/`mode` (caller supplies the
    /// platform's `O_*` bits directly, matching §4.B's generic
    /// parameter bag). `OPEN` runs synchronously on the calling task's
    /// own thread (§4.E); there is no fd to register with the poller
    /// until after it returns, so `timeout_ms` has nothing to race
    /// against and is accepted for API-surface symmetry with the rest
    /// of §6 but otherwise ignored.
    pub fn open(path: &str, flags: i32, mode: u32, timeout_ms: Option<u64>) -> Result<Self, AioError> {
        let path_bytes = path.as_bytes().to_vec();
        let params = RequestParams {
            buf_ptr: path_bytes.as_ptr() as usize,
            buf_len: path_bytes.len(),
            offset: mode as i64,
            flags,
            ..Default::default()
        };
        let (outcome, _req) = backend::submit(RequestKind::Open, -1, params, timeout_ms);
        drop(path_bytes);
        let fd = translate_strict("open", outcome)? as i32;
        let cache_size = backend::error_policy_config().read_cache_size;
        let cache = (cache_size > 0).then(|| LruReadCache::new(fd, cache_size));
        Ok(Self { fd, state: access_mode(flags), guard: TaskGuard::new(), cache })
    }

    pub fn is_closed(&self) -> bool {
        self.state == FileState::Closed
    }

    pub fn fd(&self) -> i32 {
        self.fd
    }

    /// Reads up to `buf.len()` bytes at the file's current offset.
    pub fn read(&mut self, buf: &mut [u8], timeout_ms: Option<u64>) -> Result<Outcome, AioError> {
        self.guard.check("File::read");
        if !self.state.can_read() {
            return Err(AioError::invalid_state("read", libc::EBADF));
        }
        let params = RequestParams { buf_ptr: buf.as_mut_ptr() as usize, buf_len: buf.len(), ..Default::default() };
        let (outcome, _req) = backend::submit(RequestKind::Read, self.fd, params, timeout_ms);
        translate("read", outcome)
    }

    /// Reads at a given offset without disturbing the file's shared
    /// position (§3 `PREAD`). Consults the read cache first when one is
    /// configured (§4.J); either path preserves pread's positional
    /// semantics. `timeout_ms` only races the uncached path — a cache
    /// hit never reaches the Backend, so there is nothing to time out.
    pub fn pread(&mut self, buf: &mut [u8], offset: i64, timeout_ms: Option<u64>) -> Result<Outcome, AioError> {
        self.guard.check("File::pread");
        if !self.state.can_read() {
            return Err(AioError::invalid_state("pread", libc::EBADF));
        }
        let fd = self.fd;
        let Some(cache) = &mut self.cache else {
            return Self::pread_uncached(fd, buf, offset, timeout_ms);
        };
        let (rc, errno, bytes) = cache.pread(buf.len(), offset, &mut |block_buf, block_offset| {
            match Self::pread_uncached(fd, block_buf, block_offset, timeout_ms) {
                Ok(outcome) => (outcome.rc, outcome.errno),
                Err(e) => e.as_rc_errno(),
            }
        });
        if rc >= 0 {
            buf[..bytes.len()].copy_from_slice(&bytes);
        }
        translate("pread", Outcome { rc, errno })
    }

    fn pread_uncached(fd: i32, buf: &mut [u8], offset: i64, timeout_ms: Option<u64>) -> Result<Outcome, AioError> {
        let params = RequestParams { buf_ptr: buf.as_mut_ptr() as usize, buf_len: buf.len(), offset, ..Default::default() };
        let (outcome, _req) = backend::submit(RequestKind::Pread, fd, params, timeout_ms);
        translate("pread", outcome)
    }

    pub fn write(&mut self, buf: &[u8], timeout_ms: Option<u64>) -> Result<Outcome, AioError> {
        self.guard.check("File::write");
        if !self.state.can_write() {
            return Err(AioError::invalid_state("write", libc::EBADF));
        }
        let params = RequestParams { buf_ptr: buf.as_ptr() as usize, buf_len: buf.len(), ..Default::default() };
        let (outcome, _req) = backend::submit(RequestKind::Write, self.fd, params, timeout_ms);
        translate("write", outcome)
    }

    pub fn pwrite(&mut self, buf: &[u8], offset: i64, timeout_ms: Option<u64>) -> Result<Outcome, AioError> {
        self.guard.check("File::pwrite");
        if !self.state.can_write() {
            return Err(AioError::invalid_state("pwrite", libc::EBADF));
        }
        let params = RequestParams { buf_ptr: buf.as_ptr() as usize, buf_len: buf.len(), offset, ..Default::default() };
        let (outcome, _req) = backend::submit(RequestKind::Pwrite, self.fd, params, timeout_ms);
        translate("pwrite", outcome)
    }

    /// Closes the descriptor. `Closed` rejects every op including a
    /// second `close`, with `EBADF` (§3, §8 "after close, subsequent
    /// operations return EBADF") — `Drop` checks state first so this
    /// never fires on an already-closed handle going out of scope.
    pub fn close(&mut self, timeout_ms: Option<u64>) -> Result<(), AioError> {
        self.guard.check("File::close");
        if self.state == FileState::Closed {
            return Err(AioError::invalid_state("close", libc::EBADF));
        }
        let (outcome, _req) = backend::submit(RequestKind::Close, self.fd, RequestParams::default(), timeout_ms);
        self.state = self.state.on_close();
        translate_strict("close", outcome).map(|_| ())
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if self.state != FileState::Closed {
            let _ = self.close(None);
        }
    }
}

fn access_mode(flags: i32) -> FileState {
    match flags & libc::O_ACCMODE {
        libc::O_RDONLY => FileState::ReadOnly,
        libc::O_WRONLY => FileState::WriteOnly,
        libc::O_RDWR => FileState::ReadWrite,
        _ => FileState::ReadOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn with_runtime<F: FnOnce() + Send + 'static>(f: F) {
        let sched = aio_runtime::Scheduler::new(aio_core::RuntimeConfig::new()).unwrap();
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let done2 = done.clone();
        sched.spawn(move || {
            f();
            done2.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        sched.run_until(|| done.load(std::sync::atomic::Ordering::SeqCst));
        sched.shutdown();
    }

    #[test]
    fn open_write_read_round_trip() {
        let path = std::env::temp_dir().join("aio_file_test_round_trip");
        let path_str = path.to_str().unwrap().to_string();
        with_runtime(move || {
            let mut f = File::open(&path_str, libc::O_CREAT | libc::O_RDWR | libc::O_TRUNC, 0o600, None).unwrap();
            assert_eq!(f.write(b"hello", None).unwrap().rc, 5);
            let mut buf = [0u8; 5];
            assert_eq!(f.pread(&mut buf, 0, None).unwrap().rc, 5);
            assert_eq!(&buf, b"hello");
            f.close(None).unwrap();
            std::fs::remove_file(&path_str).unwrap();
        });
    }

    #[test]
    fn write_only_file_rejects_read() {
        let path = std::env::temp_dir().join("aio_file_test_write_only");
        let path_str = path.to_str().unwrap().to_string();
        with_runtime(move || {
            let mut f = File::open(&path_str, libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC, 0o600, None).unwrap();
            let mut buf = [0u8; 4];
            assert!(matches!(f.read(&mut buf, None), Err(AioError::InvalidState { .. })));
            f.close(None).unwrap();
            std::fs::remove_file(&path_str).unwrap();
        });
    }

    #[test]
    fn second_close_is_ebadf() {
        let path = std::env::temp_dir().join("aio_file_test_close_twice");
        let path_str = path.to_str().unwrap().to_string();
        with_runtime(move || {
            let mut f = File::open(&path_str, libc::O_CREAT | libc::O_RDWR | libc::O_TRUNC, 0o600, None).unwrap();
            f.close(None).unwrap();
            assert!(matches!(f.close(None), Err(AioError::InvalidState { .. })));
            std::fs::remove_file(&path_str).unwrap();
        });
    }
}
