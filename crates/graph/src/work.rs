// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue binding asynchronous backend completions to the state
//! transitions that started them.

use std::collections::VecDeque;
use weft_core::{NodeId, Seq};

struct WorkItem<F> {
    owner: NodeId,
    seq: Seq,
    callback: F,
}

/// FIFO of pending completions.
///
/// Entries may complete out of order but are always matched by exact
/// `(owner, seq)`; completion removes the first matching entry. The payload
/// type is chosen by the caller (the context queues boxed closures).
pub struct WorkQueue<F> {
    entries: VecDeque<WorkItem<F>>,
}

impl<F> Default for WorkQueue<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> WorkQueue<F> {
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    /// Queue a completion for `(owner, seq)`.
    pub fn queue(&mut self, owner: NodeId, seq: Seq, callback: F) {
        self.entries.push_back(WorkItem { owner, seq, callback });
    }

    /// Remove and return the first entry matching `(owner, seq)`.
    pub fn take(&mut self, owner: NodeId, seq: Seq) -> Option<F> {
        let index = self
            .entries
            .iter()
            .position(|item| item.owner == owner && item.seq == seq)?;
        self.entries.remove(index).map(|item| item.callback)
    }

    /// Drop every entry owned by `owner`. Returns how many were dropped.
    pub fn cancel_owner(&mut self, owner: NodeId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|item| item.owner != owner);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "work_tests.rs"]
mod tests;
