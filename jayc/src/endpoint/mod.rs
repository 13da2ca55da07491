//! Socket endpoint: a role-tagged stream-socket wrapper over TCP (IPv4) and
//! Unix-domain sockets (spec.md §4.A).
//!
//! An [`Endpoint`] starts in [`Role::Unset`], moves to [`Role::Client`] via
//! [`Endpoint::connect`] or [`Role::Server`] via [`Endpoint::bind`], and
//! returns to `Unset` via [`Endpoint::close`]. Only a `Server`-role endpoint
//! may [`Endpoint::accept`]; only a `Client`-role endpoint may
//! [`Endpoint::recv`]/[`Endpoint::send`].

mod tcp;
mod uds;

use std::os::unix::io::RawFd;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::log::{Level, Logger};

/// The role an endpoint currently plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unset,
    Client,
    Server,
}

/// Which transport an endpoint wraps, and the parameters needed to
/// (re)create its socket.
#[derive(Debug, Clone)]
pub enum Transport {
    Tcp { host: String, port: u16 },
    Uds { path: PathBuf },
}

impl Transport {
    /// Short label used as the reference-string and client/server transport
    /// prefix (spec.md §6): `"TCP"` or `"UDS"`.
    pub fn label(&self) -> &'static str {
        match self {
            Transport::Tcp { .. } => "TCP",
            Transport::Uds { .. } => "UDS",
        }
    }
}

/// Outcome of [`Endpoint::poll_for_input`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Timeout,
    Readable,
}

/// Mutable state behind the endpoint's lock: the fd (`0` means closed or
/// unbound), the current role, and the cached reference string.
struct State {
    fd: RawFd,
    role: Role,
    ref_string: String,
}

/// A polymorphic stream-socket endpoint.
///
/// All mutable state is behind an internal lock so that `&self` methods can
/// be called from worker and supervisor threads alike; callers relying on
/// the engine's single shared supervisor mutex (spec.md §5) will never
/// actually contend on it, but the type must still be sound if used without
/// that external discipline.
pub struct Endpoint {
    transport: Transport,
    state: Mutex<State>,
    logger: Logger,
}

impl Endpoint {
    /// Create an endpoint in [`Role::Unset`] for the given transport.
    pub fn new(transport: Transport, logger: Logger) -> Endpoint {
        Endpoint {
            transport,
            state: Mutex::new(State { fd: 0, role: Role::Unset, ref_string: String::new() }),
            logger,
        }
    }

    /// Construct an already-connected client endpoint around a raw fd, used
    /// by [`Endpoint::accept`] and by the client/server layer when adopting
    /// an accepted socket.
    fn from_accepted(transport: Transport, fd: RawFd, ref_string: String, logger: Logger) -> Endpoint {
        Endpoint {
            transport,
            state: Mutex::new(State { fd, role: Role::Client, ref_string }),
            logger,
        }
    }

    /// The endpoint's current role.
    pub fn role(&self) -> Role {
        self.state.lock().role
    }

    /// The transport this endpoint wraps. For an endpoint returned by
    /// [`Endpoint::accept`], this describes the accepted peer (its own
    /// host/port or the listening UDS path), not the listener.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The endpoint's reference string (spec.md §6): `"<ip>:<port>"` for
    /// TCP, `"<path>"` for UDS. Empty before the first `connect`/`bind`/
    /// `accept`.
    pub fn ref_string(&self) -> String {
        self.state.lock().ref_string.clone()
    }

    /// Whether the underlying fd is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().fd > 0
    }

    /// `true` iff this endpoint is a connected client.
    pub fn is_connected(&self) -> bool {
        let state = self.state.lock();
        state.role == Role::Client && state.fd > 0
    }

    /// Connect to the configured remote (TCP) or path (UDS).
    ///
    /// Requires [`Role::Unset`]. On success the role becomes
    /// [`Role::Client`] and the reference string is regenerated.
    pub fn connect(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.role != Role::Unset {
            self.logger.log(Level::Error, "connect: endpoint not in Unset role");
            return Err(Error::InvalidRole);
        }
        let (fd, ref_string) = match &self.transport {
            Transport::Tcp { host, port } => tcp::connect(host, *port)?,
            Transport::Uds { path } => uds::connect(path)?,
        };
        state.fd = fd;
        state.role = Role::Client;
        state.ref_string = ref_string;
        Ok(())
    }

    /// Bind and start listening.
    ///
    /// Requires [`Role::Unset`]. On success the role becomes
    /// [`Role::Server`].
    pub fn bind(&self, backlog: i32) -> Result<()> {
        let mut state = self.state.lock();
        if state.role != Role::Unset {
            self.logger.log(Level::Error, "bind: endpoint not in Unset role");
            return Err(Error::InvalidRole);
        }
        let (fd, ref_string) = match &self.transport {
            Transport::Tcp { host, port } => tcp::bind(host, *port, backlog)?,
            Transport::Uds { path } => uds::bind(path, backlog)?,
        };
        state.fd = fd;
        state.role = Role::Server;
        state.ref_string = ref_string;
        Ok(())
    }

    /// Idempotently close the endpoint, returning it to [`Role::Unset`].
    ///
    /// For a UDS endpoint in the `Server` role, also removes the socket
    /// file from the filesystem.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.fd <= 0 {
            state.role = Role::Unset;
            return;
        }
        if state.role == Role::Server {
            if let Transport::Uds { path } = &self.transport {
                uds::remove_path(path);
            }
        }
        // SAFETY: fd is a valid, open descriptor owned by this endpoint.
        let ret = unsafe { libc::close(state.fd) };
        if ret < 0 {
            self.logger.log(Level::Error, format!("close({}) failed: {}", state.fd, std::io::Error::last_os_error()));
        }
        state.fd = 0;
        state.role = Role::Unset;
    }

    /// `poll(2)` the fd for `POLLIN` with the given timeout.
    ///
    /// `POLLERR`/`POLLHUP` are logged and close the session; `POLLNVAL` is
    /// reported as an error without auto-closing (spec.md §4.A).
    pub fn poll_for_input(&self, timeout_ms: i32) -> Result<PollOutcome> {
        let fd = {
            let state = self.state.lock();
            if state.fd <= 0 {
                return Err(Error::InvalidRole);
            }
            state.fd
        };

        let mut pfd = libc::pollfd { fd, events: libc::POLLIN, revents: 0 };
        // SAFETY: pfd is a single, correctly sized pollfd.
        let ret = unsafe { libc::poll(&mut pfd as *mut libc::pollfd, 1, timeout_ms) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(PollOutcome::Timeout);
            }
            self.logger.log(Level::Error, format!("poll failed: {err}"));
            return Err(Error::Io(err));
        }
        if ret == 0 {
            return Ok(PollOutcome::Timeout);
        }
        if pfd.revents & libc::POLLNVAL != 0 {
            self.logger.log(Level::Error, "poll: POLLNVAL");
            return Err(Error::InvalidRole);
        }
        if pfd.revents & (libc::POLLERR | libc::POLLHUP) != 0 {
            self.logger.log(Level::Debug, "poll: peer hung up or errored, closing");
            self.close();
            return Ok(PollOutcome::Timeout);
        }
        Ok(PollOutcome::Readable)
    }

    /// Accept one connection. Requires [`Role::Server`]; returns a new
    /// [`Endpoint`] in [`Role::Client`] that owns the accepted fd.
    pub fn accept(&self) -> Result<Endpoint> {
        let fd = {
            let state = self.state.lock();
            if state.role != Role::Server {
                self.logger.log(Level::Error, "accept: endpoint not in Server role");
                return Err(Error::InvalidRole);
            }
            state.fd
        };
        let (accepted_fd, ref_string, transport) = match &self.transport {
            Transport::Tcp { .. } => tcp::accept(fd)?,
            Transport::Uds { path } => uds::accept(fd, path)?,
        };
        Ok(Endpoint::from_accepted(transport, accepted_fd, ref_string, self.logger.clone()))
    }

    /// Receive up to `buf.len()` bytes. Requires [`Role::Client`].
    ///
    /// A return of `0` means the peer closed the connection; the endpoint
    /// auto-closes in that case. A `None` `buf` slot is not representable in
    /// Rust — pass a scratch buffer to discard bytes instead.
    pub fn recv(&self, buf: &mut [u8]) -> usize {
        let fd = {
            let state = self.state.lock();
            if state.role != Role::Client || state.fd <= 0 {
                return 0;
            }
            state.fd
        };
        // SAFETY: buf is a valid, correctly sized byte slice; fd is open.
        let n = unsafe { libc::recv(fd, buf.as_mut_ptr().cast(), buf.len(), 0) };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            self.logger.log(Level::Debug, format!("recv error: {err}"));
            return 0;
        }
        if n == 0 {
            self.logger.log(Level::Debug, "recv: peer closed");
            self.close();
            return 0;
        }
        // Guard against a kernel returning more than requested; impossible
        // in practice but spec.md §4.A asks for the truncation anyway.
        (n as usize).min(buf.len())
    }

    /// Send `buf`. Requires [`Role::Client`].
    ///
    /// Returns the number of bytes written, which may be less than
    /// `buf.len()` on a partial write — the caller must loop. On
    /// `ECONNRESET`/`EPIPE` the endpoint auto-closes and this returns `0`;
    /// other errors return `0` without closing. A zero-length `buf` returns
    /// `0` without making a syscall.
    pub fn send(&self, buf: &[u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let fd = {
            let state = self.state.lock();
            if state.role != Role::Client || state.fd <= 0 {
                return 0;
            }
            state.fd
        };
        // SAFETY: buf is a valid, correctly sized byte slice; fd is open.
        let n = unsafe {
            libc::send(fd, buf.as_ptr().cast(), buf.len(), libc::MSG_NOSIGNAL)
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ECONNRESET) | Some(libc::EPIPE) => {
                    self.logger.log(Level::Debug, format!("send: {err}, closing"));
                    self.close();
                }
                _ => self.logger.log(Level::Debug, format!("send error: {err}")),
            }
            return 0;
        }
        n as usize
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Logger;
    use std::io::{Read, Write};
    use std::net::TcpListener as StdTcpListener;

    #[test]
    fn role_discipline_recv_send() {
        let ep = Endpoint::new(Transport::Tcp { host: "127.0.0.1".into(), port: 0 }, Logger::noop());
        let mut buf = [0u8; 16];
        assert_eq!(ep.recv(&mut buf), 0);
        assert_eq!(ep.send(b"hi"), 0);
    }

    #[test]
    fn role_discipline_accept_requires_server() {
        let ep = Endpoint::new(Transport::Tcp { host: "127.0.0.1".into(), port: 0 }, Logger::noop());
        assert!(ep.accept().is_err());
    }

    #[test]
    fn connect_then_recv_peer_close() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_thread = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"hi").unwrap();
            // Dropping `stream` here closes it, so the client observes 0.
        });

        let ep = Endpoint::new(
            Transport::Tcp { host: addr.ip().to_string(), port: addr.port() },
            Logger::noop(),
        );
        ep.connect().unwrap();

        let mut buf = [0u8; 16];
        // Give the acceptor a moment to write before we read.
        accept_thread.join().unwrap();
        let n = ep.recv(&mut buf);
        assert_eq!(&buf[..n], b"hi");

        // Next recv observes peer closed.
        let n = ep.recv(&mut buf);
        assert_eq!(n, 0);
        assert!(!ep.is_connected());
        assert_eq!(ep.send(b"x"), 0);
    }

    #[test]
    fn oversized_recv_request_is_safe() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_thread = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(&[7u8; 10]).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(50));
        });

        let ep = Endpoint::new(
            Transport::Tcp { host: addr.ip().to_string(), port: addr.port() },
            Logger::noop(),
        );
        ep.connect().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        let mut buf = [0u8; 4096];
        let n = ep.recv(&mut buf);
        assert_eq!(n, 10);
        assert!(buf[10..].iter().all(|&b| b == 0));
        accept_thread.join().unwrap();
    }
}
