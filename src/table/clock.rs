//! Per-table timer scheduling.
//!
//! A table has at most one pending scheduled task — the action pacing
//! delay, the active seat's countdown, a time-bank tick or an
//! end-of-round pause — so the clock is a single slot with
//! cancel-before-reschedule semantics. Expiry is delivered back into
//! the table's inbox as a [`TableCommand::TimerFired`] message; a
//! generation counter lets the actor drop any expiry that was already
//! queued behind the action that superseded it.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::messages::TableCommand;
use crate::game::engine::TimerEvent;

#[derive(Debug)]
pub struct TurnClock {
    sender: mpsc::Sender<TableCommand>,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl TurnClock {
    #[must_use]
    pub fn new(sender: mpsc::Sender<TableCommand>) -> Self {
        Self {
            sender,
            generation: 0,
            pending: None,
        }
    }

    /// Replaces any pending task with a new one firing after `delay`.
    pub fn schedule(&mut self, delay: Duration, event: TimerEvent) {
        self.cancel();
        let generation = self.generation;
        let sender = self.sender.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(TableCommand::TimerFired { generation, event }).await;
        }));
    }

    /// Cancels the pending task, if any, and invalidates every expiry
    /// already in flight.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation += 1;
    }

    /// Whether an expiry message belongs to the currently scheduled
    /// task (stale ones must be dropped).
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

impl Drop for TurnClock {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
