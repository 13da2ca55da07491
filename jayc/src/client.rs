//! Client handle: a polymorphic connected-peer capability hiding the
//! underlying transport (spec.md §4.B).
//!
//! A [`Client`] is pure dispatch over an [`Endpoint`](crate::endpoint::Endpoint):
//! every operation forwards straight through, prefixing the endpoint's bare
//! reference string with the transport label (`"TCP:"`/`"UDS:"`, spec.md
//! §6). There is no hidden state here beyond the endpoint itself — the
//! trait exists so [`crate::worker::Worker`] and
//! [`crate::supervisor::Supervisor`] can hold either transport behind one
//! type.

use std::sync::Arc;

use crate::endpoint::{Endpoint, PollOutcome, Transport};
use crate::error::Result;
use crate::log::Logger;

/// A connected peer, reachable over TCP or a Unix-domain socket.
///
/// Implementations must be safe to call from any thread: the engine
/// serialises all calls through its supervisor mutex (spec.md §5), but
/// nothing here assumes single-threaded access on its own.
pub trait Client: Send + Sync {
    /// `"TCP"` or `"UDS"`.
    fn transport(&self) -> &'static str;

    /// The stable, prefixed reference string (spec.md §6).
    fn ref_string(&self) -> String;

    /// `false` once the peer has disconnected or the connection errored;
    /// a client for which this returns `false` must not be sent to or
    /// received from.
    fn is_connected(&self) -> bool;

    /// Equivalent to `poll_for_input(0)` returning readable.
    fn new_data(&self) -> bool;

    /// Receive up to `buf.len()` bytes; see [`Endpoint::recv`] for the
    /// zero-means-peer-closed contract.
    fn recv(&self, buf: &mut [u8]) -> usize;

    /// Send `buf`; see [`Endpoint::send`] for the partial-write contract.
    fn send(&self, buf: &[u8]) -> usize;

    /// Close then re-establish the connection. On success this client
    /// transitions from disconnected back to connected.
    fn reset(&self) -> Result<()>;

    /// Idempotently close the connection.
    fn close(&self);
}

/// A boxed, dynamically dispatched client, independent of the server (or
/// test harness) that created it.
pub type BoxClient = Box<dyn Client>;

/// The one [`Client`] implementation: an [`Endpoint`] plus the [`Transport`]
/// needed to re-`connect` it from [`Client::reset`].
struct EndpointClient {
    endpoint: Endpoint,
    transport: Transport,
}

impl Client for EndpointClient {
    fn transport(&self) -> &'static str {
        self.transport.label()
    }

    fn ref_string(&self) -> String {
        format!("{}:{}", self.transport(), self.endpoint.ref_string())
    }

    fn is_connected(&self) -> bool {
        self.endpoint.is_connected()
    }

    fn new_data(&self) -> bool {
        matches!(self.endpoint.poll_for_input(0), Ok(PollOutcome::Readable))
    }

    fn recv(&self, buf: &mut [u8]) -> usize {
        self.endpoint.recv(buf)
    }

    fn send(&self, buf: &[u8]) -> usize {
        self.endpoint.send(buf)
    }

    fn reset(&self) -> Result<()> {
        self.endpoint.close();
        self.endpoint.connect()
    }

    fn close(&self) {
        self.endpoint.close()
    }
}

/// Adopt an already-connected [`Endpoint`] (typically returned by
/// [`crate::server::Server::accept_connection`]) as a [`Client`].
pub fn from_endpoint(endpoint: Endpoint) -> BoxClient {
    let transport = endpoint.transport().clone();
    Box::new(EndpointClient { endpoint, transport })
}

/// Fresh-connect a new client for `transport`.
pub fn connect(transport: Transport, logger: Logger) -> Result<BoxClient> {
    let endpoint = Endpoint::new(transport.clone(), logger);
    endpoint.connect()?;
    Ok(Box::new(EndpointClient { endpoint, transport }))
}

/// An `Arc`-shared client, for the case of a connection whose worker and
/// connection record both need a handle to the same client without either
/// being its sole owner — see spec.md §9's ownership-graph note: the
/// supervisor exclusively owns the client, the worker only holds a
/// reference to it. `Arc` is that reference; the supervisor drops its own
/// `Arc` (and calls `close`) once the worker is reaped.
pub type SharedClient = Arc<dyn Client>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Logger;
    use std::io::{Read, Write};
    use std::net::TcpListener as StdTcpListener;

    #[test]
    fn tcp_client_round_trip() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_thread = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(b"ACK").unwrap();
        });

        let transport = Transport::Tcp { host: addr.ip().to_string(), port: addr.port() };
        let client = connect(transport, Logger::noop()).unwrap();
        assert_eq!(client.transport(), "TCP");
        assert!(client.ref_string().starts_with("TCP:"));
        assert_eq!(client.send(b"hello"), 5);

        server_thread.join().unwrap();
        let mut buf = [0u8; 3];
        // `new_data` should observe the reply is ready fairly quickly.
        for _ in 0..100 {
            if client.new_data() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let n = client.recv(&mut buf);
        assert_eq!(&buf[..n], b"ACK");
    }
}
