//! File round-trip demo (§8 end-to-end scenario 1).
//!
//! Opens a temp file, pwrites, prads it back, and closes it, all from
//! inside a task on an `aio` scheduler.

use aio::{bootstrap, File, RuntimeConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() {
    aio::logging::init();
    let rt = bootstrap(RuntimeConfig::from_env()).expect("failed to start aio runtime");

    let done = Arc::new(AtomicBool::new(false));
    let done2 = done.clone();

    rt.spawn(move || {
        let path = std::env::temp_dir().join("aio_demo_file_roundtrip");
        let path_str = path.to_string_lossy().into_owned();

        let mut f = File::open(&path_str, libc::O_CREAT | libc::O_RDWR | libc::O_TRUNC, 0o600, None)
            .expect("open failed");

        let written = f.pwrite(b"hello", 0, None).expect("pwrite failed");
        println!("pwrote {} bytes at offset 0", written.rc);

        let mut buf = [0u8; 5];
        let read = f.pread(&mut buf, 0, None).expect("pread failed");
        println!("pread {} bytes: {:?}", read.rc, std::str::from_utf8(&buf).unwrap());
        assert_eq!(&buf, b"hello");

        f.close(None).expect("close failed");
        let _ = std::fs::remove_file(&path);

        done2.store(true, Ordering::SeqCst);
    });

    rt.run_until(|| done.load(Ordering::SeqCst));
    rt.shutdown();
}
