// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands, completions and realtime plumbing types.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use weft_core::activation::ActivationRecord;
use weft_core::{PortId, Seq};

/// State command sent to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Pause,
    Start,
    Suspend,
    Flush,
}

weft_core::simple_display! {
    Command {
        Pause => "pause",
        Start => "start",
        Suspend => "suspend",
        Flush => "flush",
    }
}

/// Status returned by `process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Quantum done, nothing outstanding
    Ok,
    /// Output buffer produced
    HaveBuffer,
    /// Needs an input buffer before it can continue
    NeedBuffer,
    /// The backend continues asynchronously; completion arrives on the
    /// node's wake signal
    Async,
    /// Processing failed with a backend-defined code
    Error(i32),
}

impl ProcessStatus {
    pub fn is_error(self) -> bool {
        matches!(self, ProcessStatus::Error(_))
    }

    /// Raw value stored into the activation state slot.
    pub fn as_raw(self) -> i32 {
        match self {
            ProcessStatus::Ok => 0,
            ProcessStatus::HaveBuffer => 1,
            ProcessStatus::NeedBuffer => 2,
            ProcessStatus::Async => 3,
            ProcessStatus::Error(code) => -code.abs().max(1),
        }
    }
}

/// Outcome of a control call that may complete asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Completed synchronously
    Done,
    /// In flight; a `ResultEvent::Done` with this sequence follows
    Pending(Seq),
}

impl Completion {
    pub fn pending_seq(self) -> Option<Seq> {
        match self {
            Completion::Done => None,
            Completion::Pending(seq) => Some(seq),
        }
    }
}

/// Io channel kinds a backend can be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoKind {
    /// The embedded clock fields of the activation record
    Clock,
    /// The whole position block
    Position,
}

/// A view into the shared activation memory handed to a backend via
/// `set_io`. The backend reads and writes only through atomics.
#[derive(Clone)]
pub struct IoArea {
    activation: Arc<ActivationRecord>,
}

impl IoArea {
    pub fn new(activation: Arc<ActivationRecord>) -> Self {
        Self { activation }
    }

    pub fn activation(&self) -> &ActivationRecord {
        &self.activation
    }
}

impl std::fmt::Debug for IoArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoArea").finish_non_exhaustive()
    }
}

/// Callbacks a backend raises from the realtime context.
pub struct RtCallbacks {
    /// Asynchronous processing finished; the node must be rescheduled.
    pub ready: Box<dyn FnMut(ProcessStatus) + Send>,
    /// A buffer was consumed and can be recycled on the given port.
    pub reuse_buffer: Box<dyn FnMut(PortId, u32) + Send>,
}

impl std::fmt::Debug for RtCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtCallbacks").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
