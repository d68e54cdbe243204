// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Nodes: processing entities owning ports and an activation record.

use crate::hooks::Hooks;
use crate::port::Port;
use crate::rt::{RtBackend, WakeSignal};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;
use weft_backend::{Param, ParamId};
use weft_core::activation::ActivationRecord;
use weft_core::{
    Direction, Error, GraphEvent, MemId, NodeId, NodeState, PortId, Properties, Result, Seq,
};

/// States a caller can request via `set_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTarget {
    Suspended,
    Idle,
    Running,
}

weft_core::simple_display! {
    StateTarget {
        Suspended => "suspended",
        Idle => "idle",
        Running => "running",
    }
}

/// Callback receiving enumerated parameters for one sequence.
pub type ParamCallback = Box<dyn FnMut(ParamId, u32, &Param) + Send>;

/// A node in the graph.
///
/// Owns its ports; everything else references it by id. The activation
/// record and wake signal are shared with the data loop and with peers
/// through the mem pool.
pub struct Node {
    pub id: NodeId,
    pub name: SmolStr,
    pub state: NodeState,
    pub props: Properties,
    pub registered: bool,
    pub active: bool,
    pub input_ports: IndexMap<PortId, Port>,
    pub output_ports: IndexMap<PortId, Port>,
    /// The node whose clock drives this node's component. Self until a
    /// driver is elected.
    pub driver: NodeId,
    /// Manual driver override honored by graph recalculation.
    pub forced_driver: Option<NodeId>,
    /// Populated on the elected driver: every other component member.
    pub followers: Vec<NodeId>,
    pub activation: Arc<ActivationRecord>,
    pub signal: WakeSignal,
    pub mem: MemId,
    pub backend: Option<RtBackend>,
    pub max_input_ports: u32,
    pub max_output_ports: u32,
    pub n_ready_input_links: u32,
    pub n_used_input_links: u32,
    pub n_ready_output_links: u32,
    pub n_used_output_links: u32,
    /// A requested transition deferred until the link readiness gate opens.
    pub pending_state: Option<StateTarget>,
    /// Sequence of the in-flight transition, if the backend answered async.
    pub state_seq: Option<Seq>,
    pub last_error: Option<String>,
    pub hooks: Hooks<GraphEvent>,
    /// Enumeration callbacks keyed by sequence.
    pub param_pending: HashMap<Seq, ParamCallback>,
    /// Whether the node has been pushed to the data loop.
    pub rt_added: bool,
}

impl Node {
    pub fn new(
        id: NodeId,
        name: impl Into<SmolStr>,
        props: Properties,
        activation: Arc<ActivationRecord>,
        signal: WakeSignal,
        mem: MemId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            state: NodeState::Creating,
            props,
            registered: false,
            active: false,
            input_ports: IndexMap::new(),
            output_ports: IndexMap::new(),
            driver: id,
            forced_driver: None,
            followers: Vec::new(),
            activation,
            signal,
            mem,
            backend: None,
            max_input_ports: 0,
            max_output_ports: 0,
            n_ready_input_links: 0,
            n_used_input_links: 0,
            n_ready_output_links: 0,
            n_used_output_links: 0,
            pending_state: None,
            state_seq: None,
            last_error: None,
            hooks: Hooks::new(),
            param_pending: HashMap::new(),
            rt_added: false,
        }
    }

    /// A master is the driver of its own component.
    pub fn is_master(&self) -> bool {
        self.driver == self.id && self.props.is_driver()
    }

    pub fn ports(&self, direction: Direction) -> &IndexMap<PortId, Port> {
        match direction {
            Direction::Input => &self.input_ports,
            Direction::Output => &self.output_ports,
        }
    }

    pub fn ports_mut(&mut self, direction: Direction) -> &mut IndexMap<PortId, Port> {
        match direction {
            Direction::Input => &mut self.input_ports,
            Direction::Output => &mut self.output_ports,
        }
    }

    pub fn port(&self, direction: Direction, id: PortId) -> Option<&Port> {
        self.ports(direction).get(&id)
    }

    pub fn port_mut(&mut self, direction: Direction, id: PortId) -> Option<&mut Port> {
        self.ports_mut(direction).get_mut(&id)
    }

    /// Insert a port. Fails with `exists` when the id collides within the
    /// direction, and with `no-memory` when the backend's announced port
    /// budget is exhausted.
    pub fn add_port(&mut self, port: Port) -> Result<()> {
        let max = match port.direction {
            Direction::Input => self.max_input_ports,
            Direction::Output => self.max_output_ports,
        };
        let ports = self.ports_mut(port.direction);
        if ports.contains_key(&port.id) {
            return Err(Error::exists(format!(
                "{} port {} on node",
                port.direction, port.id
            )));
        }
        if max != 0 && ports.len() as u32 >= max {
            return Err(Error::NoMemory(format!(
                "{} port budget ({max}) exhausted",
                port.direction
            )));
        }
        ports.insert(port.id, port);
        Ok(())
    }

    pub fn remove_port(&mut self, direction: Direction, id: PortId) -> Option<Port> {
        self.ports_mut(direction).shift_remove(&id)
    }

    /// The readiness gate for Start: every counted link on both sides must
    /// have reached its ready state.
    pub fn links_ready(&self) -> bool {
        self.n_ready_input_links == self.n_used_input_links
            && self.n_ready_output_links == self.n_used_output_links
    }

    /// Re-read on every transition into Idle, not only at property-update
    /// time.
    pub fn pause_on_idle(&self) -> bool {
        self.props.pause_on_idle()
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
