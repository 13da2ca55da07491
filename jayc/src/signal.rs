//! Process-wide signal table (spec.md §4.G).
//!
//! A `{handler, ctx}` slot per signal number (`0..32`). Registering a
//! handler installs an OS-level signal action, via [`signal_hook`], that
//! records the delivery and lets [`Table::dispatch_pending`] run the
//! registered Rust handler on a normal thread — signal handlers themselves
//! must not call back into arbitrary user code (allocation, locks, and most
//! of the standard library are unsound inside a signal handler).
//!
//! The one signal the engine itself cares about is `SIGINT` (spec.md §6):
//! [`Table::notify_on_sigint`] arranges for a [`Supervisor`](crate::supervisor::Supervisor)
//! to stop cleanly when it arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

const MAX_SIGNUM: usize = 32;

type Handler = Box<dyn Fn(i32) + Send + Sync>;

struct Slot {
    handler: Option<Handler>,
}

/// The process-wide signal table.
pub struct Table {
    slots: Mutex<Vec<Slot>>,
    pending: Vec<Arc<AtomicBool>>,
}

fn table() -> &'static Table {
    static TABLE: OnceLock<Table> = OnceLock::new();
    TABLE.get_or_init(|| Table {
        slots: Mutex::new((0..MAX_SIGNUM).map(|_| Slot { handler: None }).collect()),
        pending: (0..MAX_SIGNUM).map(|_| Arc::new(AtomicBool::new(false))).collect(),
    })
}

/// Returns the process-wide [`Table`].
pub fn table_mut() -> &'static Table {
    table()
}

impl Table {
    /// Register `handler` for `signum`, replacing any previous registration.
    ///
    /// Installs a `signal-hook` flag for the signal the first time it is
    /// registered; subsequent calls for the same `signum` only replace the
    /// Rust-side handler.
    pub fn register<F>(&'static self, signum: i32, handler: F) -> crate::error::Result<()>
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        let index = Self::index(signum)?;
        signal_hook::flag::register(signum, self.pending[index].clone())
            .map_err(crate::error::Error::Io)?;
        self.slots.lock()[index].handler = Some(Box::new(handler));
        Ok(())
    }

    /// Remove the handler registered for `signum`, if any.
    pub fn unregister(&'static self, signum: i32) -> crate::error::Result<()> {
        let index = Self::index(signum)?;
        self.slots.lock()[index].handler = None;
        Ok(())
    }

    /// Run the handler for every signal that has arrived since the last
    /// call, clearing its pending flag. Intended to be polled from a normal
    /// thread (e.g. the supervisor's control loop tick).
    pub fn dispatch_pending(&self) {
        for (index, flag) in self.pending.iter().enumerate() {
            if flag.swap(false, Ordering::AcqRel) {
                if let Some(handler) = self.slots.lock()[index].handler.as_ref() {
                    let signum = index as i32;
                    handler(signum);
                }
            }
        }
    }

    /// Convenience wiring for spec.md §6: register `SIGINT` to stop `flag`
    /// (typically a supervisor's external stop flag) when delivered.
    pub fn notify_on_sigint(&'static self, flag: Arc<AtomicBool>) -> crate::error::Result<()> {
        self.register(libc::SIGINT, move |_| flag.store(true, Ordering::SeqCst))
    }

    fn index(signum: i32) -> crate::error::Result<usize> {
        if signum < 0 || signum as usize >= MAX_SIGNUM {
            return Err(crate::error::Error::InvalidRole);
        }
        Ok(signum as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn register_and_dispatch() {
        let seen = Arc::new(AtomicBool::new(false));
        let seen2 = seen.clone();
        table_mut().register(libc::SIGUSR1, move |_| seen2.store(true, Ordering::SeqCst)).unwrap();

        // Simulate the OS delivering the signal without actually raising it,
        // to keep the test deterministic under a test harness that may not
        // appreciate stray signals.
        table_mut().pending[libc::SIGUSR1 as usize].store(true, Ordering::SeqCst);
        table_mut().dispatch_pending();
        assert!(seen.load(Ordering::SeqCst));

        table_mut().unregister(libc::SIGUSR1).unwrap();
    }

    #[test]
    fn rejects_out_of_range_signum() {
        assert!(table_mut().register(64, |_| {}).is_err());
    }
}
