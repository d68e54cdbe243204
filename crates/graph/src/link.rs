// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Links: one output port bound to one input port.

use crate::context::{Context, DEFAULT_BUFFERS};
use std::collections::{HashSet, VecDeque};
use weft_backend::{format, BufferSpec, Format, Param, ParamId};
use weft_core::{
    Clock, Direction, Error, GraphEvent, LinkId, LinkState, NodeId, PortId, Properties, Result,
};

/// A link between two ports of two different nodes.
///
/// Links are owned by the context registry, keyed by the endpoint pair;
/// each endpoint port merely references the link by id. Both endpoints
/// must outlive the link: destroying either destroys the link first.
pub struct Link {
    pub id: LinkId,
    pub out_node: NodeId,
    pub out_port: PortId,
    pub in_node: NodeId,
    pub in_port: PortId,
    pub state: LinkState,
    pub props: Properties,
    /// Chosen during negotiation.
    pub format: Option<Format>,
    /// Bound buffer pool, once allocated.
    pub buffers: Option<BufferSpec>,
    /// Control calls still in flight for the current transition.
    pub pending: u8,
}

impl Link {
    pub fn new(
        id: LinkId,
        out_node: NodeId,
        out_port: PortId,
        in_node: NodeId,
        in_port: PortId,
        props: Properties,
    ) -> Self {
        Self {
            id,
            out_node,
            out_port,
            in_node,
            in_port,
            state: LinkState::Init,
            props,
            format: None,
            buffers: None,
            pending: 0,
        }
    }

    /// Registry key: one link per endpoint pair.
    pub fn key(&self) -> (NodeId, PortId, NodeId, PortId) {
        (self.out_node, self.out_port, self.in_node, self.in_port)
    }

    /// The other node of the link, if `node` is an endpoint.
    pub fn peer_of(&self, node: NodeId) -> Option<NodeId> {
        if node == self.out_node {
            Some(self.in_node)
        } else if node == self.in_node {
            Some(self.out_node)
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == LinkState::Active
    }
}

/// Which negotiation step a side completion belongs to.
#[derive(Debug, Clone, Copy)]
enum LinkStep {
    Format,
    Buffers,
}

impl<C: Clock + 'static> Context<C> {
    /// Create a link between an output port and an input port and start
    /// negotiation. Endpoint validation is synchronous; negotiation
    /// failures put the link into the error state without touching either
    /// endpoint.
    pub fn create_link(
        &mut self,
        out_node: NodeId,
        out_port: PortId,
        in_node: NodeId,
        in_port: PortId,
        props: Properties,
    ) -> Result<LinkId> {
        if out_node == in_node {
            return Err(Error::invalid("link endpoints belong to the same node"));
        }
        {
            let node = self.node(out_node)?;
            if node.port(Direction::Output, out_port).is_none() {
                return Err(Error::no_entity(format!(
                    "output port {out_port} on node {out_node}"
                )));
            }
        }
        {
            let node = self.node(in_node)?;
            if node.port(Direction::Input, in_port).is_none() {
                return Err(Error::no_entity(format!(
                    "input port {in_port} on node {in_node}"
                )));
            }
        }
        let key = (out_node, out_port, in_node, in_port);
        if self.links.values().any(|l| l.key() == key) {
            return Err(Error::exists(format!(
                "link {out_node}.{out_port} -> {in_node}.{in_port}"
            )));
        }
        if self.would_cycle(out_node, in_node) {
            return Err(Error::invalid(format!(
                "link {out_node}.{out_port} -> {in_node}.{in_port} would close a cycle"
            )));
        }

        let id = weft_core::LinkId::new(self.next_link_id());
        let link = Link::new(id, out_node, out_port, in_node, in_port, props);
        self.links.insert(id, link);
        if let Some(port) = self
            .nodes
            .get_mut(&out_node)
            .and_then(|n| n.port_mut(Direction::Output, out_port))
        {
            port.attach_link(id);
        }
        if let Some(port) = self
            .nodes
            .get_mut(&in_node)
            .and_then(|n| n.port_mut(Direction::Input, in_port))
        {
            port.attach_link(id);
        }
        if let Some(node) = self.nodes.get_mut(&out_node) {
            node.n_used_output_links += 1;
        }
        if let Some(node) = self.nodes.get_mut(&in_node) {
            node.n_used_input_links += 1;
        }
        self.emit_global(GraphEvent::LinkAdded { id, out_node, out_port, in_node, in_port });

        self.negotiate_link(id);
        Ok(id)
    }

    /// True when data can already flow from `to` back to `from`, meaning
    /// an edge `from -> to` would close a loop.
    fn would_cycle(&self, from: NodeId, to: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([to]);
        while let Some(current) = queue.pop_front() {
            if current == from {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            for link in self.links.values() {
                if link.out_node == current {
                    queue.push_back(link.in_node);
                }
            }
        }
        false
    }

    /// Format negotiation, main thread: intersect both ports' enumerated
    /// formats, set the choice on both sides, then bind buffers. Any
    /// asynchronous completion holds the link in its transitional state
    /// through the work queue.
    fn negotiate_link(&mut self, id: LinkId) {
        self.set_link_state(id, LinkState::Negotiating);

        let Some((out_node, out_port, in_node, in_port)) = self
            .links
            .get(&id)
            .map(|l| (l.out_node, l.out_port, l.in_node, l.in_port))
        else {
            return;
        };
        let out_formats = self
            .nodes
            .get(&out_node)
            .and_then(|n| n.port(Direction::Output, out_port))
            .map(|p| p.cached_formats())
            .unwrap_or_default();
        let in_formats = self
            .nodes
            .get(&in_node)
            .and_then(|n| n.port(Direction::Input, in_port))
            .map(|p| p.cached_formats())
            .unwrap_or_default();

        let Some(chosen) = format::intersect(&out_formats, &in_formats) else {
            self.link_error(id, "no common format");
            return;
        };
        if let Some(link) = self.links.get_mut(&id) {
            link.format = Some(chosen.clone());
        }

        // Both sides count from the start; synchronous completions
        // decrement inline through the same continuation.
        if let Some(link) = self.links.get_mut(&id) {
            link.pending = 2;
        }
        for (node, direction, port) in [
            (out_node, Direction::Output, out_port),
            (in_node, Direction::Input, in_port),
        ] {
            let result = self.port_set_param_with(
                node,
                direction,
                port,
                ParamId::Format,
                0,
                Some(Param::Format(chosen.clone())),
                Some(Box::new(move |ctx: &mut Context<C>, result: Result<()>| {
                    ctx.link_side_done(id, result, LinkStep::Format);
                })),
            );
            if let Err(error) = result {
                self.link_error(id, error.to_string());
                return;
            }
        }
    }

    /// Bind the buffer pool on both sides.
    fn allocate_buffers(&mut self, id: LinkId) {
        self.set_link_state(id, LinkState::Allocating);

        let Some((out_node, out_port, in_node, in_port)) = self
            .links
            .get(&id)
            .map(|l| (l.out_node, l.out_port, l.in_node, l.in_port))
        else {
            return;
        };
        let spec = DEFAULT_BUFFERS;

        if let Some(link) = self.links.get_mut(&id) {
            link.pending = 2;
        }
        for (node, direction, port) in [
            (out_node, Direction::Output, out_port),
            (in_node, Direction::Input, in_port),
        ] {
            let result = self.port_set_param_with(
                node,
                direction,
                port,
                ParamId::Buffers,
                0,
                Some(Param::Buffers(spec)),
                Some(Box::new(move |ctx: &mut Context<C>, result: Result<()>| {
                    ctx.link_side_done(id, result, LinkStep::Buffers);
                })),
            );
            if let Err(error) = result {
                self.link_error(id, error.to_string());
                return;
            }
        }
    }

    /// One side of the current transition completed.
    fn link_side_done(&mut self, id: LinkId, result: Result<()>, step: LinkStep) {
        match result {
            Ok(()) => {
                let ready = {
                    let Some(link) = self.links.get_mut(&id) else { return };
                    link.pending = link.pending.saturating_sub(1);
                    link.pending == 0 && !link.state.is_error()
                };
                if !ready {
                    return;
                }
                match step {
                    LinkStep::Format => self.allocate_buffers(id),
                    LinkStep::Buffers => {
                        if let Some(link) = self.links.get_mut(&id) {
                            link.buffers = Some(DEFAULT_BUFFERS);
                        }
                        self.set_link_state(id, LinkState::Paused);
                        self.maybe_activate_link(id);
                    }
                }
            }
            // The port stays where it was; only the link fails.
            Err(error) => self.link_error(id, error.to_string()),
        }
    }

    /// Activate a negotiated link once both endpoints are active nodes.
    pub(crate) fn maybe_activate_link(&mut self, id: LinkId) {
        let activatable = self
            .links
            .get(&id)
            .map(|l| {
                l.state == LinkState::Paused
                    && self.nodes.get(&l.out_node).map(|n| n.active).unwrap_or(false)
                    && self.nodes.get(&l.in_node).map(|n| n.active).unwrap_or(false)
            })
            .unwrap_or(false);
        if activatable {
            self.activate_link(id);
        }
    }

    /// Paused -> Active; bumps both endpoints' ready-link counters, which
    /// may open a deferred start gate.
    pub fn activate_link(&mut self, id: LinkId) {
        let Some((out_node, in_node, paused)) = self
            .links
            .get(&id)
            .map(|l| (l.out_node, l.in_node, l.state == LinkState::Paused))
        else {
            return;
        };
        if !paused {
            return;
        }
        self.set_link_state(id, LinkState::Active);
        if let Some(node) = self.nodes.get_mut(&out_node) {
            node.n_ready_output_links += 1;
        }
        if let Some(node) = self.nodes.get_mut(&in_node) {
            node.n_ready_input_links += 1;
        }
        self.check_deferred_start(out_node);
        self.check_deferred_start(in_node);
        self.recalc_graph();
    }

    /// Active -> Paused; the inverse of [`Context::activate_link`].
    pub fn deactivate_link(&mut self, id: LinkId) {
        let Some((out_node, in_node, active)) = self
            .links
            .get(&id)
            .map(|l| (l.out_node, l.in_node, l.is_active()))
        else {
            return;
        };
        if !active {
            return;
        }
        self.set_link_state(id, LinkState::Paused);
        if let Some(node) = self.nodes.get_mut(&out_node) {
            node.n_ready_output_links = node.n_ready_output_links.saturating_sub(1);
        }
        if let Some(node) = self.nodes.get_mut(&in_node) {
            node.n_ready_input_links = node.n_ready_input_links.saturating_sub(1);
        }
        self.recalc_graph();
    }

    /// Remove the link from both endpoints and the registry.
    pub fn destroy_link(&mut self, id: LinkId) -> Result<()> {
        if self.links.get(&id).map(|l| l.is_active()).unwrap_or(false) {
            self.deactivate_link(id);
        }
        let Some(link) = self.links.shift_remove(&id) else {
            return Err(Error::no_entity(format!("link {id}")));
        };
        if let Some(port) = self
            .nodes
            .get_mut(&link.out_node)
            .and_then(|n| n.port_mut(Direction::Output, link.out_port))
        {
            port.detach_link(id);
        }
        if let Some(port) = self
            .nodes
            .get_mut(&link.in_node)
            .and_then(|n| n.port_mut(Direction::Input, link.in_port))
        {
            port.detach_link(id);
        }
        if let Some(node) = self.nodes.get_mut(&link.out_node) {
            node.n_used_output_links = node.n_used_output_links.saturating_sub(1);
        }
        if let Some(node) = self.nodes.get_mut(&link.in_node) {
            node.n_used_input_links = node.n_used_input_links.saturating_sub(1);
        }
        self.emit_global(GraphEvent::LinkRemoved { id });
        self.recalc_graph();
        Ok(())
    }

    /// A failing link keeps both endpoints in their previous states.
    pub(crate) fn link_error(&mut self, id: LinkId, message: impl Into<String>) {
        if let Some(link) = self.links.get_mut(&id) {
            link.pending = 0;
        }
        self.set_link_state(id, LinkState::Error(message.into()));
    }

    pub(crate) fn set_link_state(&mut self, id: LinkId, state: LinkState) {
        let Some(link) = self.links.get_mut(&id) else { return };
        if link.state == state {
            return;
        }
        let old = link.state.kind();
        let error = match &state {
            LinkState::Error(message) => Some(message.clone()),
            _ => None,
        };
        link.state = state.clone();
        self.emit_global(GraphEvent::LinkStateChanged { id, old, state: state.kind(), error });
    }
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
