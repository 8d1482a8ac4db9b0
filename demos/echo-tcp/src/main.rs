//! TCP echo server demo (§8 end-to-end scenario 3: accept loop).
//!
//! Binds 127.0.0.1:0, accepts connections in a loop, and spawns one
//! task per connection that echoes back whatever it reads until the
//! peer closes.

use aio::{bootstrap, Address, RuntimeConfig, Socket};
use std::net::Ipv4Addr;

fn main() {
    aio::logging::init();
    let rt = bootstrap(RuntimeConfig::from_env()).expect("failed to start aio runtime");

    rt.spawn(move || {
        let mut listener = Socket::stream(false).expect("socket failed");
        listener.bind(Address::v4(Ipv4Addr::LOCALHOST, 9292), None).expect("bind failed");
        listener.listen(128, None).expect("listen failed");
        println!("echo-tcp listening on 127.0.0.1:9292");

        loop {
            let (mut conn, peer) = match listener.accept(None) {
                Ok(pair) => pair,
                Err(e) => {
                    eprintln!("accept failed: {e}");
                    continue;
                }
            };
            println!("accepted connection from {peer:?}");

            aio::current_scheduler().expect("inside a task").spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    let n = match conn.recv(&mut buf, 0, None) {
                        Ok(outcome) if outcome.rc > 0 => outcome.rc as usize,
                        _ => break,
                    };
                    match conn.send(&buf[..n], 0, None) {
                        Ok(outcome) if outcome.rc >= 0 => {}
                        _ => break,
                    }
                }
                let _ = conn.close(None);
            });
        }
    });

    rt.run_until(|| false);
}
