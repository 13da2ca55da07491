//! Server handle: a polymorphic listener capability mirroring
//! [`crate::client::Client`] for the listening role (spec.md §4.C).

use crate::client::{self, BoxClient};
use crate::endpoint::{Endpoint, PollOutcome, Transport};
use crate::error::Result;
use crate::log::Logger;

/// Default `listen(2)` backlog when none is specified, matching spec.md
/// §4.A's "backlog >= 5" requirement with headroom for the "many
/// connections" scenario in spec.md §8.
pub const DEFAULT_BACKLOG: i32 = 1024;

/// A listening socket, reachable over TCP or a Unix-domain socket.
pub trait Server: Send + Sync {
    /// Re-bind after a failed or not-yet-attempted bind. Used by the
    /// supervisor's accept loop when [`Server::is_open`] is false
    /// (spec.md §4.E).
    fn reset(&self) -> Result<()>;

    /// Idempotently stop listening. For UDS this also removes the socket
    /// file.
    fn close(&self);

    /// Whether the listener currently holds an open fd.
    fn is_open(&self) -> bool;

    /// Equivalent to `poll_for_input(0)` returning readable on the
    /// listening fd: a connection is waiting to be accepted.
    fn new_connection(&self) -> bool;

    /// Accept one pending connection, returning a [`BoxClient`] whose
    /// lifetime is independent of this server.
    fn accept_connection(&self) -> Result<BoxClient>;

    /// The listener's own reference string, e.g. for logging the bound
    /// address at startup.
    fn ref_string(&self) -> String;
}

/// A boxed, dynamically dispatched server.
pub type BoxServer = Box<dyn Server>;

struct EndpointServer {
    endpoint: Endpoint,
    backlog: i32,
}

impl Server for EndpointServer {
    fn reset(&self) -> Result<()> {
        self.endpoint.close();
        self.endpoint.bind(self.backlog)
    }

    fn close(&self) {
        self.endpoint.close()
    }

    fn is_open(&self) -> bool {
        self.endpoint.is_open()
    }

    fn new_connection(&self) -> bool {
        matches!(self.endpoint.poll_for_input(0), Ok(PollOutcome::Readable))
    }

    fn accept_connection(&self) -> Result<BoxClient> {
        let accepted = self.endpoint.accept()?;
        Ok(client::from_endpoint(accepted))
    }

    fn ref_string(&self) -> String {
        format!("{}:{}", self.endpoint.transport().label(), self.endpoint.ref_string())
    }
}

/// Bind a new listener for `transport` with the given backlog.
pub fn bind(transport: Transport, backlog: i32, logger: Logger) -> Result<BoxServer> {
    let endpoint = Endpoint::new(transport, logger);
    endpoint.bind(backlog)?;
    Ok(Box::new(EndpointServer { endpoint, backlog }))
}
