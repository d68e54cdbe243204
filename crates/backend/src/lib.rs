// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-backend: the interface the graph consumes to drive processing
//! implementations.
//!
//! A backend is attached to a node once and receives control calls on the
//! main thread; only [`Backend::process`] is invoked from the realtime
//! data loop. Asynchronous control completions come back over
//! the [`NotifySink`] captured by `add_listener`, tagged with the sequence
//! number the call returned.

pub mod format;
pub mod info;
pub mod notify;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use format::{BufferSpec, Format, MediaType, Param, ParamId};
pub use info::{change, port_change, BackendInfo, PortInfo};
pub use notify::{BackendEvent, BackendMessage, NotifySink, ResultEvent};
pub use types::{Command, Completion, IoArea, IoKind, ProcessStatus, RtCallbacks};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBackend, FakeHandle};

use weft_core::{Direction, PortId, Result, Seq};

/// A processing implementation attached to one node.
///
/// All methods run on the main thread except `process`, which runs in the
/// realtime context. Control calls that cannot complete synchronously
/// return [`Completion::Pending`] with a sequence number; the matching
/// [`ResultEvent::Done`] arrives later on the notify sink.
pub trait Backend: Send {
    /// Point an io channel at shared memory (the activation record's
    /// position/clock block).
    fn set_io(&mut self, kind: IoKind, area: Option<IoArea>) -> Result<()>;

    /// Issue a state command. The backend picks the sequence number for
    /// asynchronous completions.
    fn send_command(&mut self, command: Command) -> Result<Completion>;

    /// Install the realtime callbacks (`ready`, `reuse_buffer`).
    fn set_callbacks(&mut self, callbacks: RtCallbacks);

    /// Subscribe the node to info/port_info/result/event notifications.
    fn add_listener(&mut self, sink: NotifySink);

    /// Enumerate node-level parameters; results arrive as
    /// [`ResultEvent::Param`] carrying the caller's `seq`.
    fn enum_params(
        &mut self,
        seq: Seq,
        id: ParamId,
        start: u32,
        num: u32,
        filter: Option<&Param>,
    ) -> Result<Completion>;

    /// Set a node-level parameter; `None` unsets it.
    fn set_param(&mut self, id: ParamId, flags: u32, param: Option<Param>) -> Result<Completion>;

    /// Enumerate parameters of one port.
    fn port_enum_params(
        &mut self,
        seq: Seq,
        direction: Direction,
        port_id: PortId,
        id: ParamId,
        start: u32,
        num: u32,
        filter: Option<&Param>,
    ) -> Result<Completion>;

    /// Set a parameter on one port; `None` unsets it.
    fn port_set_param(
        &mut self,
        direction: Direction,
        port_id: PortId,
        id: ParamId,
        flags: u32,
        param: Option<Param>,
    ) -> Result<Completion>;

    /// Run one processing quantum. Realtime context only.
    fn process(&mut self) -> ProcessStatus;
}

/// A standalone realtime processor, used for port mixes.
pub trait Processor: Send {
    fn process(&mut self) -> ProcessStatus;
}
