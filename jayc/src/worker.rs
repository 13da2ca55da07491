//! Worker task: one cooperative loop per connected peer (spec.md §4.D).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::SharedClient;
use crate::error::Result;
use crate::log::Logger;
use crate::task::{StepOutcome, Task};

/// Why a worker's `close_cb` fired (spec.md §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The connection was accepted and its worker started successfully.
    Init,
    /// Worker creation failed before the loop could start.
    InitFail,
    /// The peer disconnected (`recv` observed 0 bytes, or the connection
    /// errored).
    Disconnect,
    /// The supervisor requested shutdown (e.g. during `stop`/`free`).
    Extern,
}

/// The user callbacks a worker (and the supervisor that spawns it) invokes.
///
/// Grouped into one `Send + Sync` bundle so a single `Arc` can be shared
/// across every worker thread.
pub trait Callbacks: Send + Sync {
    /// Called synchronously when a worker is created, before its loop
    /// starts, with [`CloseReason::Init`] on success. A create failure path
    /// does not call this — it goes straight to [`Callbacks::on_close`]
    /// with [`CloseReason::InitFail`].
    fn on_create(&self, ref_string: &str);

    /// Called once per iteration when the client has data ready. Expected
    /// to perform exactly one `recv` and any reply `send` (spec.md §4.D).
    fn on_data(&self, client: &SharedClient);

    /// Called exactly once, after the last `on_data`, when the connection
    /// ends for any reason.
    fn on_close(&self, reason: CloseReason, ref_string: &str);
}

/// One worker per accepted connection.
///
/// The worker does not own its [`SharedClient`] — the supervisor does
/// (spec.md §4.D, §9's ownership-graph note) — it only holds a clone of the
/// `Arc` for the duration of its loop.
pub struct Worker {
    ref_string: String,
    task: Task,
    closed: Arc<AtomicBool>,
    callbacks: Arc<dyn Callbacks>,
}

impl Worker {
    /// Create a worker for `client`: start its loop under `mutex` — the
    /// *same* lock the owning supervisor's control task and every other
    /// worker use (spec.md §3/§5's single-mutex discipline) — and, only once
    /// that succeeds, invoke `callbacks.on_create` synchronously. The
    /// guarded value itself is irrelevant to the worker; it only needs to be
    /// the supervisor's shared lock, which is why `spawn` is generic over
    /// it.
    ///
    /// The loop's spawned thread cannot run its first iteration until the
    /// caller releases `mutex` — `Supervisor::start` calls `spawn` from
    /// within its own locked control step — so calling `on_create` here,
    /// after the thread exists but before that lock is released, still
    /// happens-before any `on_data`.
    ///
    /// On create failure, `callbacks.on_close(InitFail, ..)` fires instead
    /// and `on_create` is never called.
    pub fn spawn<T>(
        client: SharedClient,
        mutex: Arc<Mutex<T>>,
        loop_sleep: Duration,
        callbacks: Arc<dyn Callbacks>,
        logger: Logger,
    ) -> Result<Worker>
    where
        T: Send + 'static,
    {
        let ref_string = client.ref_string();

        let closed = Arc::new(AtomicBool::new(false));
        let closed_in_loop = closed.clone();
        let ref_string_in_loop = ref_string.clone();
        let callbacks_in_loop = callbacks.clone();

        let mut task = Task::new(loop_sleep, logger);
        let started = task.start(mutex, move |_shared: &mut T| {
            if client.new_data() {
                callbacks_in_loop.on_data(&client);
            }
            if !client.is_connected() {
                if !closed_in_loop.swap(true, Ordering::AcqRel) {
                    callbacks_in_loop.on_close(CloseReason::Disconnect, &ref_string_in_loop);
                }
                return StepOutcome::Done;
            }
            StepOutcome::Continue
        });

        match started {
            Ok(()) => {
                callbacks.on_create(&ref_string);
                Ok(Worker { ref_string, task, closed, callbacks })
            }
            Err(err) => {
                callbacks.on_close(CloseReason::InitFail, &ref_string);
                Err(err)
            }
        }
    }

    /// The connection's reference string.
    pub fn ref_string(&self) -> &str {
        &self.ref_string
    }

    /// Whether the worker's loop is still running — `false` once the peer
    /// has disconnected and the loop has observed it.
    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Stop the worker's loop (joining its thread) and, if `close_cb`
    /// hasn't already fired (e.g. via a natural disconnect), fire it now
    /// with `reason`. Idempotent in the sense that calling this more than
    /// once never double-fires `close_cb`.
    pub fn free(&mut self, reason: CloseReason) {
        self.task.stop();
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.callbacks.on_close(reason, &self.ref_string);
        }
    }
}
