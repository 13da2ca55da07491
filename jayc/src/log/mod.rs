//! Level-filtered log sink.
//!
//! This is the library's own notion of a logger (spec.md §4.G), kept
//! distinct from the `log` crate: it is handed explicitly to every endpoint,
//! client, server, worker and supervisor so each can report connection
//! lifecycle events (`create_cb`/`close_cb` reasons, accept/reap failures,
//! malformed config lines) at a caller-chosen severity and destination,
//! independent of whatever the embedding process does with `RUST_LOG`.
//!
//! Internals of this crate *also* emit through the `log` crate's
//! `debug!`/`trace!` macros for developers who just want `RUST_LOG=jayc`
//! output without wiring up a [`Logger`]; the two are complementary, not
//! alternatives.

mod sinks;

use std::fmt;
use std::sync::Arc;

pub use sinks::{NoopSink, StdioSink};
#[cfg(feature = "ansi")]
pub use sinks::AnsiStdioSink;
#[cfg(feature = "syslog-sink")]
pub use sinks::SyslogSink;

/// Severity of a log message.
///
/// Ordered from least to most severe. [`Level::Fatal`] is documented to
/// never return: emitting it invokes the process [exit hook](crate::exit)
/// with a failure status before the call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
            Level::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// The call site of a log message, used by [`Sink::msg_with_site`].
#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub file: &'static str,
    pub func: &'static str,
    pub line: u32,
}

/// A logging destination.
///
/// Implementations decide how to render and where to write a message; the
/// [`Logger`] in front of a `Sink` is responsible for level filtering.
pub trait Sink: Send + Sync {
    /// Write a plain message at the given level.
    fn msg(&self, level: Level, text: &str);

    /// Write a message tagged with its call site. The default forwards to
    /// [`Sink::msg`] with the site folded into the text, matching sinks that
    /// have no structured-field support (e.g. plain stdio).
    fn msg_with_site(&self, level: Level, site: Site, text: &str) {
        self.msg(level, &format!("{}:{} {}: {}", site.file, site.line, site.func, text));
    }
}

/// A level-filtered front-end over a [`Sink`].
///
/// Cloning a `Logger` is cheap: the sink is reference-counted.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Sink>,
    threshold: Level,
}

impl Logger {
    /// Create a logger that drops messages below `threshold`.
    pub fn new(sink: Arc<dyn Sink>, threshold: Level) -> Logger {
        Logger { sink, threshold }
    }

    /// A logger backed by [`NoopSink`], the default when no logger is
    /// configured.
    pub fn noop() -> Logger {
        Logger::new(Arc::new(NoopSink), Level::Fatal)
    }

    /// Current filtering threshold.
    pub fn threshold(&self) -> Level {
        self.threshold
    }

    /// Emit `text` at `level` if it passes the threshold.
    ///
    /// Emitting [`Level::Fatal`] never returns: it calls
    /// [`crate::exit::exit`] with a failure status after handing the message
    /// to the sink.
    pub fn log(&self, level: Level, text: impl AsRef<str>) {
        if level < self.threshold {
            return;
        }
        self.sink.msg(level, text.as_ref());
        if level == Level::Fatal {
            crate::exit::exit(1);
        }
    }

    /// Same as [`Logger::log`] but tagged with a call site. Use the
    /// [`log_site!`] macro to fill in `file!()`/`line!()` automatically.
    pub fn log_at(&self, level: Level, site: Site, text: impl AsRef<str>) {
        if level < self.threshold {
            return;
        }
        self.sink.msg_with_site(level, site, text.as_ref());
        if level == Level::Fatal {
            crate::exit::exit(1);
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("threshold", &self.threshold).finish()
    }
}

/// Expands to the current call site as a [`Site`] value, for use with
/// [`Logger::log_at`].
#[macro_export]
macro_rules! log_site {
    () => {
        $crate::log::Site { file: file!(), func: "", line: line!() }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink(Mutex<Vec<(Level, String)>>);

    impl Sink for RecordingSink {
        fn msg(&self, level: Level, text: &str) {
            self.0.lock().unwrap().push((level, text.to_owned()));
        }
    }

    #[test]
    fn filters_below_threshold() {
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let logger = Logger::new(sink.clone(), Level::Warn);
        logger.log(Level::Debug, "ignored");
        logger.log(Level::Info, "ignored too");
        logger.log(Level::Warn, "kept");
        let recorded = sink.0.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0], (Level::Warn, "kept".to_owned()));
    }

    #[test]
    fn level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Critical);
        assert!(Level::Critical < Level::Fatal);
    }
}
