use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::{
    device::{IrCommand, IrSender},
    error::SendError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedCommand {
    pub due_ms: u64,
    pub command: IrCommand,
}

#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    pending: VecDeque<QueuedCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `command` `delay_ms` after the later of `now_ms` and the tail entry.
    pub fn push_after(&mut self, now_ms: u64, delay_ms: u64, command: IrCommand) -> u64 {
        let anchor = self
            .pending
            .back()
            .map(|tail| tail.due_ms.max(now_ms))
            .unwrap_or(now_ms);
        let due_ms = anchor.saturating_add(delay_ms);
        self.pending.push_back(QueuedCommand { due_ms, command });
        due_ms
    }

    pub fn push_now(&mut self, now_ms: u64, command: IrCommand) -> u64 {
        self.push_after(now_ms, 0, command)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedCommand> {
        self.pending.iter()
    }

    /// Drops everything pending and puts `command` at the head, due now.
    /// Returns how many entries were discarded.
    pub fn preempt(&mut self, now_ms: u64, command: IrCommand) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        self.pending.push_back(QueuedCommand {
            due_ms: now_ms,
            command,
        });
        discarded
    }

    /// Sends the head entry if it is due. A late send pushes the rest of the
    /// timeline back by the same amount, and a rate-limited head stays queued
    /// until the sender is ready again. Returns how many sends were attempted.
    pub fn dispatch_due<S>(&mut self, now_ms: u64, sender: &mut S) -> usize
    where
        S: IrSender + ?Sized,
    {
        let Some(head) = self.pending.front().copied() else {
            return 0;
        };
        if head.due_ms > now_ms {
            return 0;
        }

        match sender.send(head.command) {
            Ok(()) => {
                self.pending.pop_front();
                debug!(command = ?head.command, "ir command sent");
                self.delay_pending(now_ms - head.due_ms);
            }
            Err(SendError::RateLimited { wait_ms }) => {
                debug!(command = ?head.command, wait_ms, "ir command deferred");
                let retry_ms = now_ms.saturating_add(wait_ms.max(1));
                self.delay_pending(retry_ms - head.due_ms);
            }
            Err(err) => {
                self.pending.pop_front();
                warn!(command = ?head.command, "ir command failed: {err}");
            }
        }
        1
    }

    fn delay_pending(&mut self, shift_ms: u64) {
        if shift_ms == 0 {
            return;
        }
        for entry in &mut self.pending {
            entry.due_ms = entry.due_ms.saturating_add(shift_ms);
        }
    }
}
