//! End-to-end scenarios exercising the full accept → worker → reap path
//! across both transports (spec.md §8).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use jayc::log::Logger;
use jayc::{Callbacks, CloseReason, Server as _, Supervisor, Transport};
use jayc::client::SharedClient;

#[derive(Default)]
struct PingAck {
    creates: AtomicUsize,
    closes: AtomicUsize,
    close_reasons: Mutex<Vec<CloseReason>>,
}

impl Callbacks for PingAck {
    fn on_create(&self, _ref_string: &str) {
        self.creates.fetch_add(1, Ordering::SeqCst);
    }
    fn on_data(&self, client: &SharedClient) {
        let mut buf = [0u8; 64];
        let n = client.recv(&mut buf);
        if n > 0 {
            client.send(b"ACK");
        }
    }
    fn on_close(&self, reason: CloseReason, _ref_string: &str) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.close_reasons.lock().unwrap().push(reason);
    }
}

#[test]
fn many_connections_in_parallel() {
    let server = jayc::server::bind(
        Transport::Tcp { host: "127.0.0.1".into(), port: 0 },
        jayc::server::DEFAULT_BACKLOG,
        Logger::noop(),
    )
    .unwrap();
    let addr = server.ref_string().trim_start_matches("TCP:").to_owned();

    let callbacks = Arc::new(PingAck::default());
    let mut supervisor = Supervisor::new(server, callbacks.clone(), Duration::from_millis(5), Logger::noop());
    supervisor.start().unwrap();

    const N: usize = 50;
    let handles: Vec<_> = (0..N)
        .map(|_| {
            let addr = addr.clone();
            std::thread::spawn(move || {
                let mut stream = TcpStream::connect(&addr).unwrap();
                stream.write_all(b"ping").unwrap();
                let mut buf = [0u8; 3];
                stream.read_exact(&mut buf).unwrap();
                assert_eq!(&buf, b"ACK");
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for _ in 0..400 {
        if callbacks.closes.load(Ordering::SeqCst) == N {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(callbacks.creates.load(Ordering::SeqCst), N);
    assert_eq!(callbacks.closes.load(Ordering::SeqCst), N);
    assert!(callbacks.close_reasons.lock().unwrap().iter().all(|r| *r == CloseReason::Disconnect));

    supervisor.stop();
}

#[test]
fn uds_variant_removes_socket_file_on_close() {
    let path = std::env::temp_dir().join(format!("jayc-test-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let server = jayc::server::bind(
        Transport::Uds { path: path.clone() },
        jayc::server::DEFAULT_BACKLOG,
        Logger::noop(),
    )
    .unwrap();
    assert!(path.exists());

    let callbacks = Arc::new(PingAck::default());
    let mut supervisor = Supervisor::new(server, callbacks.clone(), Duration::from_millis(5), Logger::noop());
    supervisor.start().unwrap();

    let mut stream = UnixStream::connect(&path).unwrap();
    stream.write_all(b"hello").unwrap();
    let mut buf = [0u8; 3];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"ACK");
    drop(stream);

    supervisor.stop();
    assert!(!path.exists(), "UDS socket file should be removed once the server closes");
}
