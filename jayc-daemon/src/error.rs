//! `jsys_test`'s own error type, wrapping the engine's [`jayc::Error`] plus
//! the daemon-level failures the engine doesn't know about (bad `--hash`
//! value, syslog connection failure).

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] jayc::Error),

    #[error("invalid --hash value {0}, expected 0-3")]
    InvalidHash(u8),

    #[cfg(feature = "syslog-sink")]
    #[error("failed to open syslog: {0}")]
    Syslog(#[from] syslog::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
