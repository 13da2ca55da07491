//! Crate-wide error type.
//!
//! Replaces the C core's "boolean success plus a log line" idiom (spec.md
//! §7) with an idiomatic `Result`. Call sites still log at the severity the
//! error taxonomy assigns; the `Result` makes the failure visible to the
//! caller as well.

use std::io;

/// Errors produced by the socket, client/server, worker and supervisor
/// layers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation was attempted while the endpoint was in the wrong role,
    /// e.g. `recv` on a server-role endpoint.
    #[error("invalid role for this operation")]
    InvalidRole,

    /// A syscall failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Host name resolution failed during `connect`.
    #[error("failed to resolve host: {0}")]
    Resolve(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
