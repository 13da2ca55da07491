//! Built-in [`Sink`](super::Sink) implementations.

use super::{Level, Sink};

/// A sink that discards every message.
#[derive(Debug, Default)]
pub struct NoopSink;

impl Sink for NoopSink {
    fn msg(&self, _level: Level, _text: &str) {}
}

/// Writes `DEBUG`/`INFO` to stdout and `WARN`/`ERROR`/`CRITICAL`/`FATAL` to
/// stderr, per spec.md §4.G.
#[derive(Debug, Default)]
pub struct StdioSink;

impl Sink for StdioSink {
    fn msg(&self, level: Level, text: &str) {
        use std::io::Write;
        match level {
            Level::Debug | Level::Info => {
                println!("[{level}] {text}");
                let _ = std::io::stdout().flush();
            }
            Level::Warn | Level::Error | Level::Critical | Level::Fatal => {
                eprintln!("[{level}] {text}");
                let _ = std::io::stderr().flush();
            }
        }
    }
}

/// Same split as [`StdioSink`], colouring the level tag with `ansi_term`.
#[cfg(feature = "ansi")]
#[derive(Debug, Default)]
pub struct AnsiStdioSink;

#[cfg(feature = "ansi")]
impl Sink for AnsiStdioSink {
    fn msg(&self, level: Level, text: &str) {
        use ansi_term::Colour;

        let tag = match level {
            Level::Debug => Colour::Fixed(8).paint("DEBUG"),
            Level::Info => Colour::Cyan.paint("INFO"),
            Level::Warn => Colour::Yellow.paint("WARN"),
            Level::Error => Colour::Red.paint("ERROR"),
            Level::Critical => Colour::Red.bold().paint("CRITICAL"),
            Level::Fatal => Colour::Purple.bold().paint("FATAL"),
        };
        match level {
            Level::Debug | Level::Info => println!("[{tag}] {text}"),
            Level::Warn | Level::Error | Level::Critical | Level::Fatal => {
                eprintln!("[{tag}] {text}")
            }
        }
    }
}

/// Forwards messages to the system syslog via the `syslog` crate.
///
/// Construction opens (or reuses, if already open) the process' syslog
/// connection; per spec.md §4.G this sink is a process-wide singleton in
/// spirit, though nothing prevents constructing more than one — the
/// underlying `syslog` crate serialises writes itself.
#[cfg(feature = "syslog-sink")]
pub struct SyslogSink {
    writer: std::sync::Mutex<syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>>,
}

#[cfg(feature = "syslog-sink")]
impl SyslogSink {
    /// Open a syslog connection under the given facility (`"user"` or
    /// `"daemon"`, matching the daemon's `--syslog` flag, spec.md §6).
    pub fn new(process: &str, facility: syslog::Facility) -> Result<SyslogSink, syslog::Error> {
        let formatter = syslog::Formatter3164 {
            facility,
            hostname: None,
            process: process.to_owned(),
            pid: std::process::id(),
        };
        let writer = syslog::unix(formatter)?;
        Ok(SyslogSink { writer: std::sync::Mutex::new(writer) })
    }
}

#[cfg(feature = "syslog-sink")]
impl Sink for SyslogSink {
    fn msg(&self, level: Level, text: &str) {
        use std::io::Write;
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = match level {
            Level::Debug => writer.debug(text),
            Level::Info => writer.info(text),
            Level::Warn => writer.warning(text),
            Level::Error => writer.err(text),
            Level::Critical | Level::Fatal => writer.crit(text),
        };
        if let Err(err) = result {
            let _ = writeln!(std::io::stderr(), "syslog write failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_all_levels() {
        let sink = NoopSink;
        sink.msg(Level::Debug, "x");
        sink.msg(Level::Fatal, "y");
    }
}
