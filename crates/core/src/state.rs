// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity state machines: directions, node, port and link states.

use serde::{Deserialize, Serialize};

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Port receives data
    Input,
    /// Port produces data
    Output,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Input => Direction::Output,
            Direction::Output => Direction::Input,
        }
    }
}

crate::simple_display! {
    Direction {
        Input => "input",
        Output => "output",
    }
}

/// State of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Created but not yet initialized (no backend, or not registered)
    Creating,
    /// Backend holds no buffers; ports are in configure
    Suspended,
    /// Ready to process but not currently asked to
    Idle,
    /// Actively processing cycles
    Running,
    /// Backend reported a fatal error
    Error(String),
}

impl NodeState {
    pub fn kind(&self) -> NodeStateKind {
        NodeStateKind::from(self)
    }

    /// Check if this state allows the node to participate in cycles.
    pub fn is_active(&self) -> bool {
        matches!(self, NodeState::Running)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, NodeState::Error(_))
    }
}

crate::simple_display! {
    NodeState {
        Creating => "creating",
        Suspended => "suspended",
        Idle => "idle",
        Running => "running",
        Error(..) => "error",
    }
}

/// Tag-only variant of [`NodeState`] for events and DTOs (strips associated data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStateKind {
    Creating,
    Suspended,
    Idle,
    Running,
    Error,
}

impl From<&NodeState> for NodeStateKind {
    fn from(s: &NodeState) -> Self {
        match s {
            NodeState::Creating => NodeStateKind::Creating,
            NodeState::Suspended => NodeStateKind::Suspended,
            NodeState::Idle => NodeStateKind::Idle,
            NodeState::Running => NodeStateKind::Running,
            NodeState::Error(_) => NodeStateKind::Error,
        }
    }
}

crate::simple_display! {
    NodeStateKind {
        Creating => "creating",
        Suspended => "suspended",
        Idle => "idle",
        Running => "running",
        Error => "error",
    }
}

/// State of a port.
///
/// Moves forward as format and buffers are bound, and falls back to
/// `Configure` when the format is cleared or the backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Just created, nothing negotiated
    Init,
    /// Waiting for a format
    Configure,
    /// Format set and buffer pool bound
    Ready,
    /// Driver paused the port
    Paused,
}

crate::simple_display! {
    PortState {
        Init => "init",
        Configure => "configure",
        Ready => "ready",
        Paused => "paused",
    }
}

/// State of a link between an output port and an input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// Created, endpoints validated
    Init,
    /// Intersecting formats and setting them on both ports
    Negotiating,
    /// Binding the buffer pool
    Allocating,
    /// Negotiated but not flowing
    Paused,
    /// Data flows each cycle
    Active,
    /// Negotiation or a backend call failed
    Error(String),
}

impl LinkState {
    pub fn kind(&self) -> LinkStateKind {
        LinkStateKind::from(self)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LinkState::Error(_))
    }
}

crate::simple_display! {
    LinkState {
        Init => "init",
        Negotiating => "negotiating",
        Allocating => "allocating",
        Paused => "paused",
        Active => "active",
        Error(..) => "error",
    }
}

/// Tag-only variant of [`LinkState`] for events and DTOs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStateKind {
    Init,
    Negotiating,
    Allocating,
    Paused,
    Active,
    Error,
}

impl From<&LinkState> for LinkStateKind {
    fn from(s: &LinkState) -> Self {
        match s {
            LinkState::Init => LinkStateKind::Init,
            LinkState::Negotiating => LinkStateKind::Negotiating,
            LinkState::Allocating => LinkStateKind::Allocating,
            LinkState::Paused => LinkStateKind::Paused,
            LinkState::Active => LinkStateKind::Active,
            LinkState::Error(_) => LinkStateKind::Error,
        }
    }
}

crate::simple_display! {
    LinkStateKind {
        Init => "init",
        Negotiating => "negotiating",
        Allocating => "allocating",
        Paused => "paused",
        Active => "active",
        Error => "error",
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
