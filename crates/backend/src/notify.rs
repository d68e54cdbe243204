// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification channel from backends to the main loop.

use crate::format::{Param, ParamId};
use crate::info::{BackendInfo, PortInfo};
use tokio::sync::mpsc;
use weft_core::{Direction, NodeId, PortId, Seq};

/// A completion or enumeration result tagged with a sequence number.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEvent {
    /// One parameter produced by an enum_params call
    Param {
        id: ParamId,
        index: u32,
        param: Param,
    },
    /// The operation with this sequence finished
    Done { result: Result<(), String> },
}

/// Out-of-band events a backend can raise.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// The backend wants a cycle scheduled (e.g. capture data arrived)
    RequestProcess,
    /// Fatal backend failure outside any pending operation
    Error { message: String },
}

/// Everything a backend can tell the main loop.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    Info(BackendInfo),
    /// `info: None` means the port disappeared.
    PortInfo {
        direction: Direction,
        port_id: PortId,
        info: Option<PortInfo>,
    },
    Result { seq: Seq, event: ResultEvent },
    Event(BackendEvent),
}

/// Sender handed to a backend at `add_listener` time. Every message is
/// tagged with the owning node so the main loop can route it.
#[derive(Clone)]
pub struct NotifySink {
    node: NodeId,
    tx: mpsc::UnboundedSender<(NodeId, BackendMessage)>,
}

impl NotifySink {
    pub fn new(node: NodeId, tx: mpsc::UnboundedSender<(NodeId, BackendMessage)>) -> Self {
        Self { node, tx }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn send(&self, message: BackendMessage) {
        if self.tx.send((self.node, message)).is_err() {
            tracing::warn!(node = %self.node, "notify sink closed, dropping backend message");
        }
    }

    pub fn info(&self, info: BackendInfo) {
        self.send(BackendMessage::Info(info));
    }

    pub fn port_info(&self, direction: Direction, port_id: PortId, info: Option<PortInfo>) {
        self.send(BackendMessage::PortInfo { direction, port_id, info });
    }

    pub fn result(&self, seq: Seq, event: ResultEvent) {
        self.send(BackendMessage::Result { seq, event });
    }

    pub fn event(&self, event: BackendEvent) {
        self.send(BackendMessage::Event(event));
    }
}

impl std::fmt::Debug for NotifySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySink").field("node", &self.node).finish()
    }
}
