//! `jsys_test`: a hash-echo daemon built on the `jayc` connection engine
//! (spec.md §6).
//!
//! On receipt of any bytes, hashes them per `--hash` and writes back the
//! hex digest (or echoes the payload unchanged for `--hash 0`). SIGINT
//! stops the supervisor cleanly; every live connection's `close_cb` fires
//! before the process exits.

mod error;
mod hash;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use jayc::client::SharedClient;
use jayc::log::{Level, Logger};
use jayc::{Callbacks, CloseReason, Server as _, Supervisor, Transport};

use error::{Error, Result};
use hash::Algorithm;

/// `jsys_test`: TCP/UDS hash-echo daemon.
#[derive(Parser, Debug)]
#[command(name = "jsys_test", version, about)]
struct Cli {
    /// Address to bind for TCP mode.
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    /// Port to bind for TCP mode.
    #[arg(long, default_value_t = 1234)]
    port: u16,

    /// Bind a Unix-domain socket at this path instead of TCP.
    #[arg(long, conflicts_with_all = ["ip", "port"])]
    uds: Option<PathBuf>,

    /// Hash algorithm applied to each received buffer: 0=none, 1=md5,
    /// 2=sha256, 3=sha512.
    #[arg(long, default_value_t = 1)]
    hash: u8,

    /// Log to syslog under the given facility instead of stdio.
    #[arg(long, value_enum)]
    syslog: Option<SyslogFacility>,

    /// Minimum log severity emitted.
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Inter-iteration sleep for the accept loop and every worker, in
    /// milliseconds.
    #[arg(long, default_value_t = 100)]
    loop_sleep_ms: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SyslogFacility {
    User,
    Daemon,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Level {
        match level {
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warn => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }
}

struct HashEcho {
    algorithm: Algorithm,
    logger: Logger,
}

impl Callbacks for HashEcho {
    fn on_create(&self, ref_string: &str) {
        self.logger.log(Level::Info, format!("connected: {ref_string}"));
    }

    fn on_data(&self, client: &SharedClient) {
        let mut buf = [0u8; 4096];
        let n = client.recv(&mut buf);
        if n == 0 {
            return;
        }
        match self.algorithm {
            Algorithm::None => {
                client.send(&buf[..n]);
            }
            algorithm => {
                let digest = hash::digest_hex(algorithm, &buf[..n]);
                client.send(digest.as_bytes());
            }
        }
    }

    fn on_close(&self, reason: CloseReason, ref_string: &str) {
        self.logger.log(Level::Info, format!("disconnected ({reason:?}): {ref_string}"));
    }
}

fn build_logger(cli: &Cli) -> Result<Logger> {
    let threshold = Level::from(cli.log_level);
    let sink: Arc<dyn jayc::log::Sink> = match cli.syslog {
        #[cfg(feature = "syslog-sink")]
        Some(facility) => {
            let facility = match facility {
                SyslogFacility::User => syslog::Facility::LOG_USER,
                SyslogFacility::Daemon => syslog::Facility::LOG_DAEMON,
            };
            Arc::new(jayc::log::SyslogSink::new("jsys_test", facility)?)
        }
        #[cfg(not(feature = "syslog-sink"))]
        Some(_) => {
            eprintln!("jsys_test: built without the syslog-sink feature, falling back to stdio");
            Arc::new(jayc::log::StdioSink)
        }
        None => Arc::new(jayc::log::StdioSink),
    };
    Ok(Logger::new(sink, threshold))
}

fn run(cli: Cli) -> Result<()> {
    env_logger::init();
    log::debug!("parsed CLI: {cli:?}");
    let logger = build_logger(&cli)?;

    let algorithm = Algorithm::from_cli(cli.hash).ok_or(Error::InvalidHash(cli.hash))?;

    let transport = match &cli.uds {
        Some(path) => Transport::Uds { path: path.clone() },
        None => Transport::Tcp { host: cli.ip.clone(), port: cli.port },
    };

    let loop_sleep = Duration::from_millis(cli.loop_sleep_ms);
    let server = jayc::server::bind(transport, jayc::server::DEFAULT_BACKLOG, logger.clone())?;
    logger.log(Level::Info, format!("listening on {}", server.ref_string()));

    let callbacks: Arc<dyn Callbacks> = Arc::new(HashEcho { algorithm, logger: logger.clone() });
    let mut supervisor = Supervisor::new(server, callbacks, loop_sleep, logger.clone());
    supervisor.start()?;

    let stop = Arc::new(AtomicBool::new(false));
    jayc::signal::table_mut().notify_on_sigint(stop.clone())?;

    while !stop.load(Ordering::SeqCst) {
        jayc::signal::table_mut().dispatch_pending();
        std::thread::sleep(loop_sleep);
    }

    logger.log(Level::Info, "SIGINT received, shutting down");
    supervisor.stop();
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("jsys_test: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["jsys_test"]);
        assert_eq!(cli.ip, "127.0.0.1");
        assert_eq!(cli.port, 1234);
        assert_eq!(cli.hash, 1);
        assert!(cli.uds.is_none());
    }

    #[test]
    fn cli_rejects_uds_with_ip() {
        let result = Cli::try_parse_from(["jsys_test", "--uds", "/tmp/x.sock", "--ip", "0.0.0.0"]);
        assert!(result.is_err());
    }
}
