//! Building blocks for small Unix network services.
//!
//! The hard core of this crate is the connection-management engine: a
//! multi-threaded TCP/UDS server that accepts inbound stream connections,
//! spawns a per-connection worker, dispatches received bytes to a user
//! callback, detects peer closure, and tears everything down cleanly on
//! shutdown.
//!
//! Three supporting layers sit underneath the engine:
//!
//! * [`endpoint`] — a role-tagged stream-socket wrapper (TCP or UDS).
//! * [`client`] and [`server`] — polymorphic capability handles built on top
//!   of an endpoint, one for the connected-peer side and one for the
//!   listener side.
//! * [`task`] — a generic thread-backed periodic loop, used both by
//!   [`worker`] (one per connection) and [`supervisor`] (the single accept
//!   loop).
//!
//! [`log`], [`signal`], [`exit`] and [`config`] are the ambient glue every
//! process built on this engine needs: a level-filtered log sink, a
//! process-wide signal table, a single exit hook, and a flat key/value
//! config-file reader/writer.
//!
//! Non-goals: TLS, UDP, HTTP or any application-level framing, IPv6,
//! admission control, backpressure beyond socket buffers, cross-host
//! clustering, persistence.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod exit;
pub mod log;
pub mod server;
pub mod signal;
pub mod supervisor;
pub mod task;
pub mod worker;

pub use client::Client;
pub use endpoint::{Endpoint, Role, Transport};
pub use error::Error;
pub use server::Server;
pub use supervisor::{Callbacks, CloseReason, Supervisor};
pub use worker::Worker;
