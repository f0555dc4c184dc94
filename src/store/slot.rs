use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::{panic_message, ExecutionError};

/// Identity of one `execute*` call.
///
/// Ordering is by sequence number; `issued_at` is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    seq: u64,
    issued_at: Instant,
}

impl RequestTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

/// How an `execute*` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The producer succeeded and its value was folded with `update`.
    Updated,
    /// The producer failed and its error was folded with `set_error`.
    Errored,
    /// A newer call arrived during the debounce window; nothing happened.
    Debounced,
    /// A newer call cancelled the producer, or arrived before its result
    /// could be folded. The result was discarded.
    Superseded,
}

/// Single-slot coordinator behind a store's async execution.
///
/// Holds the latest request ticket and the producer task of the call that
/// last got past its debounce window.
pub(crate) struct ExecutionSlot {
    sequence: AtomicU64,
    latest: Mutex<Option<RequestTicket>>,
    pending: Mutex<Option<JoinHandle<()>>>,
    // Serializes cancel-then-start so two calls never both start a producer.
    gate: tokio::sync::Mutex<()>,
}

impl ExecutionSlot {
    pub(crate) fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
            latest: Mutex::new(None),
            pending: Mutex::new(None),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Record a new request; it becomes the latest.
    pub(crate) fn stamp(&self) -> RequestTicket {
        let ticket = RequestTicket {
            seq: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            issued_at: Instant::now(),
        };
        *self.latest.lock() = Some(ticket);
        ticket
    }

    pub(crate) fn is_latest(&self, ticket: RequestTicket) -> bool {
        self.latest
            .lock()
            .is_some_and(|latest| latest.seq == ticket.seq)
    }

    pub(crate) fn last_request(&self) -> Option<RequestTicket> {
        *self.latest.lock()
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Cancel the pending producer (awaiting the cancellation), then start a
    /// new one and keep its handle.
    pub(crate) async fn replace(&self, start: impl FnOnce() -> JoinHandle<()>) {
        let _gate = self.gate.lock().await;
        self.cancel_pending().await;
        let task = start();
        *self.pending.lock() = Some(task);
    }

    /// Cancel the pending producer, if any. Returns whether one was running.
    pub(crate) async fn cancel(&self) -> bool {
        let _gate = self.gate.lock().await;
        self.cancel_pending().await
    }

    /// Make every outstanding ticket stale.
    pub(crate) fn invalidate(&self) {
        self.stamp();
    }

    async fn cancel_pending(&self) -> bool {
        let previous = self.pending.lock().take();
        let Some(previous) = previous else {
            return false;
        };
        let was_running = !previous.is_finished();
        previous.abort();
        if let Err(err) = previous.await {
            if err.is_panic() {
                tracing::warn!(
                    panic = %panic_message(&*err.into_panic()),
                    "cancelled producer task had panicked"
                );
            }
        }
        if was_running {
            tracing::debug!("cancelled in-flight producer");
        }
        was_running
    }
}

/// Handle to a spawned `execute*` call.
///
/// Dropping it detaches the call; it still runs to completion.
#[derive(Debug)]
pub struct ExecutionHandle {
    ticket: RequestTicket,
    task: JoinHandle<Result<Outcome, ExecutionError>>,
}

impl ExecutionHandle {
    pub(crate) fn new(
        ticket: RequestTicket,
        task: JoinHandle<Result<Outcome, ExecutionError>>,
    ) -> Self {
        Self { ticket, task }
    }

    pub fn ticket(&self) -> RequestTicket {
        self.ticket
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the call to finish.
    pub async fn join(self) -> Result<Outcome, ExecutionError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => Err(ExecutionError::Panicked(panic_message(
                &*err.into_panic(),
            ))),
            Err(_) => Err(ExecutionError::Aborted),
        }
    }
}
