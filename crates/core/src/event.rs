// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graph events emitted to listeners.

use crate::id::{LinkId, NodeId, PortId};
use crate::state::{Direction, LinkStateKind, NodeStateKind, PortState};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Events observable on the graph.
///
/// Serializes with `{"type": "entity:verb", ...fields}` format.
/// Unknown type tags deserialize to `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GraphEvent {
    // -- node --
    #[serde(rename = "node:added")]
    NodeAdded { id: NodeId, name: SmolStr },

    /// Node registered, id stable, ports visible.
    #[serde(rename = "node:initialized")]
    NodeInitialized { id: NodeId },

    #[serde(rename = "node:state-changed")]
    NodeStateChanged {
        id: NodeId,
        old: NodeStateKind,
        state: NodeStateKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "node:info-changed")]
    NodeInfoChanged { id: NodeId, change_mask: u32 },

    #[serde(rename = "node:driver-changed")]
    NodeDriverChanged { id: NodeId, driver: NodeId },

    #[serde(rename = "node:removed")]
    NodeRemoved { id: NodeId },

    // -- port --
    #[serde(rename = "port:added")]
    PortAdded {
        node: NodeId,
        direction: Direction,
        port: PortId,
    },

    #[serde(rename = "port:state-changed")]
    PortStateChanged {
        node: NodeId,
        direction: Direction,
        port: PortId,
        state: PortState,
    },

    #[serde(rename = "port:info-changed")]
    PortInfoChanged {
        node: NodeId,
        direction: Direction,
        port: PortId,
        change_mask: u32,
    },

    #[serde(rename = "port:removed")]
    PortRemoved {
        node: NodeId,
        direction: Direction,
        port: PortId,
    },

    // -- link --
    #[serde(rename = "link:added")]
    LinkAdded {
        id: LinkId,
        out_node: NodeId,
        out_port: PortId,
        in_node: NodeId,
        in_port: PortId,
    },

    #[serde(rename = "link:state-changed")]
    LinkStateChanged {
        id: LinkId,
        old: LinkStateKind,
        state: LinkStateKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "link:removed")]
    LinkRemoved { id: LinkId },

    // -- param --
    #[serde(rename = "param:changed")]
    ParamChanged {
        node: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<PortId>,
        param_id: u32,
    },

    // -- graph --
    /// Drivers re-elected and target lists migrated.
    #[serde(rename = "graph:recalculated")]
    GraphRecalculated { drivers: u32 },

    /// The previous cycle of a driver did not complete before its next wake.
    #[serde(rename = "cycle:overrun")]
    CycleOverrun { driver: NodeId },

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl GraphEvent {
    pub fn name(&self) -> &str {
        match self {
            GraphEvent::NodeAdded { .. } => "node:added",
            GraphEvent::NodeInitialized { .. } => "node:initialized",
            GraphEvent::NodeStateChanged { .. } => "node:state-changed",
            GraphEvent::NodeInfoChanged { .. } => "node:info-changed",
            GraphEvent::NodeDriverChanged { .. } => "node:driver-changed",
            GraphEvent::NodeRemoved { .. } => "node:removed",
            GraphEvent::PortAdded { .. } => "port:added",
            GraphEvent::PortStateChanged { .. } => "port:state-changed",
            GraphEvent::PortInfoChanged { .. } => "port:info-changed",
            GraphEvent::PortRemoved { .. } => "port:removed",
            GraphEvent::LinkAdded { .. } => "link:added",
            GraphEvent::LinkStateChanged { .. } => "link:state-changed",
            GraphEvent::LinkRemoved { .. } => "link:removed",
            GraphEvent::ParamChanged { .. } => "param:changed",
            GraphEvent::GraphRecalculated { .. } => "graph:recalculated",
            GraphEvent::CycleOverrun { .. } => "cycle:overrun",
            GraphEvent::Custom => "custom",
        }
    }

    /// One-line form for the activity log.
    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            GraphEvent::NodeAdded { id, name } => format!("{t} id={id} name={name}"),
            GraphEvent::NodeInitialized { id } | GraphEvent::NodeRemoved { id } => {
                format!("{t} id={id}")
            }
            GraphEvent::NodeStateChanged { id, old, state, error } => match error {
                Some(e) => format!("{t} id={id} {old} -> {state} error={e}"),
                None => format!("{t} id={id} {old} -> {state}"),
            },
            GraphEvent::NodeInfoChanged { id, change_mask } => {
                format!("{t} id={id} mask={change_mask:#x}")
            }
            GraphEvent::NodeDriverChanged { id, driver } => {
                format!("{t} id={id} driver={driver}")
            }
            GraphEvent::PortAdded { node, direction, port }
            | GraphEvent::PortRemoved { node, direction, port } => {
                format!("{t} node={node} {direction} port={port}")
            }
            GraphEvent::PortStateChanged { node, direction, port, state } => {
                format!("{t} node={node} {direction} port={port} state={state}")
            }
            GraphEvent::PortInfoChanged { node, direction, port, change_mask } => {
                format!("{t} node={node} {direction} port={port} mask={change_mask:#x}")
            }
            GraphEvent::LinkAdded { id, out_node, out_port, in_node, in_port } => {
                format!("{t} id={id} {out_node}.{out_port} -> {in_node}.{in_port}")
            }
            GraphEvent::LinkStateChanged { id, old, state, error } => match error {
                Some(e) => format!("{t} id={id} {old} -> {state} error={e}"),
                None => format!("{t} id={id} {old} -> {state}"),
            },
            GraphEvent::LinkRemoved { id } => format!("{t} id={id}"),
            GraphEvent::ParamChanged { node, port, param_id } => match port {
                Some(p) => format!("{t} node={node} port={p} param={param_id}"),
                None => format!("{t} node={node} param={param_id}"),
            },
            GraphEvent::GraphRecalculated { drivers } => format!("{t} drivers={drivers}"),
            GraphEvent::CycleOverrun { driver } => format!("{t} driver={driver}"),
            GraphEvent::Custom => t.to_string(),
        }
    }

    /// Extract the node id if this event concerns a node.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            GraphEvent::NodeAdded { id, .. }
            | GraphEvent::NodeInitialized { id }
            | GraphEvent::NodeStateChanged { id, .. }
            | GraphEvent::NodeInfoChanged { id, .. }
            | GraphEvent::NodeDriverChanged { id, .. }
            | GraphEvent::NodeRemoved { id } => Some(*id),
            GraphEvent::PortAdded { node, .. }
            | GraphEvent::PortStateChanged { node, .. }
            | GraphEvent::PortInfoChanged { node, .. }
            | GraphEvent::PortRemoved { node, .. }
            | GraphEvent::ParamChanged { node, .. } => Some(*node),
            GraphEvent::CycleOverrun { driver } => Some(*driver),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
