//! Control supervisor: the accept loop plus the set of per-connection
//! workers, with a single mutex coordinating membership (spec.md §4.E).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::SharedClient;
use crate::error::Result;
use crate::log::{Level, Logger};
use crate::server::BoxServer;
use crate::task::{StepOutcome, Task};
pub use crate::worker::{Callbacks, CloseReason};
use crate::worker::Worker;

/// Default inter-iteration sleep for the control loop and every worker loop
/// it spawns, per spec.md §5.
pub const DEFAULT_LOOP_SLEEP: Duration = Duration::from_millis(100);

struct ConnectionRecord {
    client: SharedClient,
    worker: Worker,
}

/// State mutated only while holding [`Supervisor`]'s shared mutex: the
/// listener and the connection list (spec.md §3's `connections` invariant).
struct State {
    server: BoxServer,
    connections: Vec<ConnectionRecord>,
}

/// The accept-loop owner and worker registry.
///
/// Exactly one mutex guards `server` and `connections`; every worker this
/// supervisor spawns locks the *same* mutex around its own per-iteration
/// body (spec.md §5's "exactly ONE mutex per supervisor" discipline). The
/// control loop never invokes `data_cb` itself — only `create_cb` (on
/// accept, via [`Worker::spawn`]) — `close_cb` is emitted by the worker
/// itself, either on a natural disconnect, on a failed spawn (`InitFail`),
/// or by the supervisor during reap/drain (`Extern`, deduplicated by
/// [`Worker::free`]'s `closed` flag so it is never fired twice for the same
/// connection).
pub struct Supervisor {
    state: Arc<Mutex<State>>,
    control: Task,
    loop_sleep: Duration,
    callbacks: Arc<dyn Callbacks>,
    logger: Logger,
}

impl Supervisor {
    /// Build a supervisor around an already-bound `server`. The control
    /// loop does not start until [`Supervisor::start`] is called.
    pub fn new(
        server: BoxServer,
        callbacks: Arc<dyn Callbacks>,
        loop_sleep: Duration,
        logger: Logger,
    ) -> Supervisor {
        Supervisor {
            state: Arc::new(Mutex::new(State { server, connections: Vec::new() })),
            control: Task::new(loop_sleep, logger.clone()),
            loop_sleep,
            callbacks,
            logger,
        }
    }

    /// Spin up the control task and return immediately.
    ///
    /// The control step runs under `self.state`'s own lock (`Task::start`
    /// locks it and hands the step the guard directly), and every worker
    /// spawned from within that step is handed a clone of the exact same
    /// `Arc<Mutex<State>>` — so the control loop and every worker genuinely
    /// contend on one mutex, per spec.md §3.
    pub fn start(&mut self) -> Result<()> {
        let state_for_workers = self.state.clone();
        let callbacks = self.callbacks.clone();
        let logger = self.logger.clone();
        let loop_sleep = self.loop_sleep;

        self.control.start(self.state.clone(), move |state: &mut State| {
            if !state.server.is_open() {
                if let Err(err) = state.server.reset() {
                    logger.log(Level::Error, format!("server reset failed: {err}"));
                }
            }

            reap(&mut state.connections, &logger);

            if state.server.new_connection() {
                match state.server.accept_connection() {
                    Ok(client) => {
                        let client: SharedClient = Arc::from(client);
                        match Worker::spawn(
                            client.clone(),
                            state_for_workers.clone(),
                            loop_sleep,
                            callbacks.clone(),
                            logger.clone(),
                        ) {
                            Ok(worker) => state.connections.push(ConnectionRecord { client, worker }),
                            Err(err) => {
                                // Worker::spawn already fired
                                // `close_cb(InitFail, ..)` before returning
                                // this error; there is no connection record
                                // to reap, so just log and close the client.
                                logger.log(Level::Warn, format!("worker spawn failed: {err}"));
                                client.close();
                            }
                        }
                    }
                    Err(err) => logger.log(Level::Warn, format!("accept failed: {err}")),
                }
            }

            StepOutcome::Continue
        })
    }

    /// Stop the control task, then drain every connection: free each
    /// worker (joining its thread; firing `close_cb(Extern, ..)` unless it
    /// already fired), then close each client. `free` for the supervisor
    /// itself is just `stop` followed by dropping its state.
    ///
    /// Connections are taken out of `state` under the lock and freed
    /// *after* releasing it — freeing a worker joins its thread, and that
    /// thread may be parked waiting on this very mutex for its next step,
    /// so joining while still holding the lock would deadlock.
    pub fn stop(&mut self) {
        self.control.stop();
        let connections = {
            let mut guard = self.state.lock();
            guard.server.close();
            std::mem::take(&mut guard.connections)
        };
        for mut record in connections {
            record.worker.free(CloseReason::Extern);
            record.client.close();
        }
    }

    /// Number of connections currently tracked. Mainly useful for tests
    /// exercising spec.md §8's "reap completeness" property.
    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// The listener's reference string.
    pub fn ref_string(&self) -> String {
        self.state.lock().server.ref_string()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reap every connection whose worker has stopped running: free it (a
/// no-op join since the thread already exited) and close its client.
fn reap(connections: &mut Vec<ConnectionRecord>, logger: &Logger) {
    let mut i = 0;
    while i < connections.len() {
        if connections[i].worker.is_running() {
            i += 1;
            continue;
        }
        let mut record = connections.remove(i);
        logger.log(Level::Debug, format!("reaping {}", record.worker.ref_string()));
        record.worker.free(CloseReason::Disconnect);
        record.client.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SharedClient as Shared;
    use crate::endpoint::Transport;
    use crate::server;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct EchoAck {
        creates: AtomicUsize,
        closes: StdMutex<Vec<CloseReason>>,
    }

    impl Callbacks for EchoAck {
        fn on_create(&self, _ref_string: &str) {
            self.creates.fetch_add(1, Ordering::SeqCst);
        }
        fn on_data(&self, client: &Shared) {
            let mut buf = [0u8; 256];
            let n = client.recv(&mut buf);
            if n > 0 {
                client.send(b"ACK");
            }
        }
        fn on_close(&self, reason: CloseReason, _ref_string: &str) {
            self.closes.lock().unwrap().push(reason);
        }
    }

    #[test]
    fn echo_with_ack_then_disconnect() {
        let server = server::bind(
            Transport::Tcp { host: "127.0.0.1".into(), port: 0 },
            server::DEFAULT_BACKLOG,
            Logger::noop(),
        )
        .unwrap();
        let addr = server.ref_string().trim_start_matches("TCP:").to_owned();

        let callbacks = Arc::new(EchoAck::default());
        let mut supervisor = Supervisor::new(
            server,
            callbacks.clone(),
            Duration::from_millis(10),
            Logger::noop(),
        );
        supervisor.start().unwrap();

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"hello").unwrap();
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ACK");
        drop(stream);

        // Give the worker a few ticks to observe the disconnect and the
        // control loop a few ticks to reap it.
        for _ in 0..200 {
            if supervisor.connection_count() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(supervisor.connection_count(), 0);
        assert_eq!(callbacks.creates.load(Ordering::SeqCst), 1);
        assert_eq!(callbacks.closes.lock().unwrap().as_slice(), [CloseReason::Disconnect]);

        supervisor.stop();
    }

    #[test]
    fn free_drains_remaining_connections() {
        let server = server::bind(
            Transport::Tcp { host: "127.0.0.1".into(), port: 0 },
            server::DEFAULT_BACKLOG,
            Logger::noop(),
        )
        .unwrap();
        let addr = server.ref_string().trim_start_matches("TCP:").to_owned();

        let callbacks = Arc::new(EchoAck::default());
        let mut supervisor = Supervisor::new(
            server,
            callbacks.clone(),
            Duration::from_millis(10),
            Logger::noop(),
        );
        supervisor.start().unwrap();

        let _stream = TcpStream::connect(addr).unwrap();
        for _ in 0..200 {
            if supervisor.connection_count() == 1 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(supervisor.connection_count(), 1);

        supervisor.stop();
        assert_eq!(supervisor.connection_count(), 0);
        assert_eq!(callbacks.closes.lock().unwrap().as_slice(), [CloseReason::Extern]);
    }
}
