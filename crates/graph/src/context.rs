// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The context: the single value owning every registry and all topology
//! mutation. Main-thread only; the realtime side is reached through the
//! invoke queue.

use crate::hooks::Hooks;
use crate::link::Link;
use crate::memory::{MemPool, PeerHandle};
use crate::node::{Node, ParamCallback, StateTarget};
use crate::port::Port;
use crate::rt::{DataLoop, InvokeOp, LoopHandle, RtBackend, RtEvent};
use crate::work::WorkQueue;
use indexmap::IndexMap;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use weft_backend::info::change;
use weft_backend::notify::{BackendEvent, BackendMessage, ResultEvent};
use weft_backend::{
    Backend, BufferSpec, Command, Completion, IoArea, IoKind, NotifySink, Param, ParamId,
    RtCallbacks,
};
use weft_core::activation::ActivationRecord;
use weft_core::{
    Clock, Direction, Error, GraphEvent, IdGen, LinkId, NodeId, NodeState, PortId, PortState,
    Properties, Result, Seq,
};

/// Default buffer pool bound to a link when its properties don't say
/// otherwise.
pub const DEFAULT_BUFFERS: BufferSpec = BufferSpec { buffers: 4, size: 4096 };

/// Deferred completion payload: runs on the main thread when the matching
/// backend result arrives.
pub type WorkFn<C> = Box<dyn FnOnce(&mut Context<C>, Result<()>) + Send>;

/// Where enumerated params for an in-flight sequence are cached.
struct EnumTarget {
    node: NodeId,
    direction: Direction,
    port: PortId,
}

/// The core value. One per process; every entity is constructed through it
/// and referenced by id.
pub struct Context<C: Clock> {
    clock: C,
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) links: IndexMap<LinkId, Link>,
    mem: MemPool,
    work: WorkQueue<WorkFn<C>>,
    hooks: Hooks<GraphEvent>,
    pub(crate) loop_handle: LoopHandle,
    node_ids: IdGen,
    link_ids: IdGen,
    seqs: IdGen,
    notify_tx: mpsc::UnboundedSender<(NodeId, BackendMessage)>,
    rt_events: mpsc::UnboundedReceiver<RtEvent>,
    pending_enum: HashMap<Seq, EnumTarget>,
}

impl<C: Clock + 'static> Context<C> {
    /// Create a context and spawn its data loop. Backend notifications are
    /// delivered to `notify_tx`; the owner is responsible for feeding them
    /// back through [`Context::dispatch_notify`].
    pub fn new(clock: C, notify_tx: mpsc::UnboundedSender<(NodeId, BackendMessage)>) -> Self {
        let (rt_tx, rt_rx) = mpsc::unbounded_channel();
        let loop_handle = DataLoop::spawn(clock.clone(), Some(rt_tx));
        Self {
            clock,
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            mem: MemPool::new(),
            work: WorkQueue::new(),
            hooks: Hooks::new(),
            loop_handle,
            node_ids: IdGen::new(),
            link_ids: IdGen::new(),
            seqs: IdGen::new(),
            notify_tx,
            rt_events: rt_rx,
            pending_enum: HashMap::new(),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Global listener list.
    pub fn hooks(&self) -> &Hooks<GraphEvent> {
        &self.hooks
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| Error::no_entity(format!("node {id}")))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| Error::no_entity(format!("node {id}")))
    }

    pub fn link(&self, id: LinkId) -> Result<&Link> {
        self.links
            .get(&id)
            .ok_or_else(|| Error::no_entity(format!("link {id}")))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn next_seq(&mut self) -> Seq {
        Seq::new(self.seqs.next())
    }

    pub(crate) fn next_link_id(&mut self) -> u32 {
        self.link_ids.next()
    }

    /// Emit on the entity's own list first, then globally.
    pub(crate) fn emit_node_event(&self, id: NodeId, event: GraphEvent) {
        if let Some(node) = self.nodes.get(&id) {
            node.hooks.emit(&event);
        }
        self.hooks.emit(&event);
    }

    pub(crate) fn emit_global(&self, event: GraphEvent) {
        self.hooks.emit(&event);
    }

    // === Node lifecycle ===

    /// Create an unregistered node: allocates the activation block and the
    /// wake signal, driver = self.
    pub fn create_node(&mut self, name: impl Into<SmolStr>, props: Properties) -> NodeId {
        let id = NodeId::new(self.node_ids.next());
        let activation = Arc::new(ActivationRecord::new());
        let signal = self.loop_handle.signal();
        let mem = self.mem.alloc(Arc::clone(&activation), signal.clone());
        let node = Node::new(id, name, props, activation, signal, mem);
        let name = node.name.clone();
        self.nodes.insert(id, node);
        self.emit_global(GraphEvent::NodeAdded { id, name });
        id
    }

    /// Attach the processing implementation. Fails if one is already
    /// attached. Installs the notification listener, points the backend's
    /// io at the activation record and wires the realtime callbacks.
    pub fn set_implementation(&mut self, id: NodeId, mut backend: Box<dyn Backend>) -> Result<()> {
        let (cell, rt_added) = {
            let notify_tx = self.notify_tx.clone();
            let node = self.node_mut(id)?;
            if node.backend.is_some() {
                return Err(Error::exists(format!("backend on node {id}")));
            }
            backend.add_listener(NotifySink::new(id, notify_tx));
            backend.set_io(IoKind::Position, Some(IoArea::new(Arc::clone(&node.activation))))?;
            backend.set_io(IoKind::Clock, Some(IoArea::new(Arc::clone(&node.activation))))?;
            let signal = node.signal.clone();
            backend.set_callbacks(RtCallbacks {
                ready: Box::new(move |_status| signal.raise()),
                reuse_buffer: Box::new(|_port, _buffer| {}),
            });
            let cell: RtBackend = Arc::new(Mutex::new(backend));
            node.backend = Some(Arc::clone(&cell));
            (cell, node.rt_added)
        };
        if rt_added {
            self.loop_handle
                .invoke(InvokeOp::SetBackend { id, backend: Some(cell) });
        }
        self.maybe_initialize(id);
        Ok(())
    }

    /// Insert the node into the registry, making it and its pre-existing
    /// ports visible, and add it to the data loop.
    pub fn register_node(&mut self, id: NodeId) -> Result<()> {
        let (activation, signal, backend, port_events) = {
            let node = self.node_mut(id)?;
            if node.registered {
                return Err(Error::exists(format!("node {id} already registered")));
            }
            node.registered = true;
            node.rt_added = true;
            let mut port_events = Vec::new();
            for direction in [Direction::Input, Direction::Output] {
                for port in node.ports(direction).values() {
                    port_events.push(GraphEvent::PortAdded {
                        node: id,
                        direction,
                        port: port.id,
                    });
                }
            }
            (
                Arc::clone(&node.activation),
                node.signal.clone(),
                node.backend.clone(),
                port_events,
            )
        };
        self.loop_handle.invoke(InvokeOp::AddNode {
            id,
            activation,
            signal,
            backend,
            is_driver: false,
        });
        for event in port_events {
            self.emit_node_event(id, event);
        }
        self.maybe_initialize(id);
        Ok(())
    }

    /// Creating -> Suspended once both registration and a backend are in
    /// place; emits "initialized" first.
    fn maybe_initialize(&mut self, id: NodeId) {
        let ready = self
            .nodes
            .get(&id)
            .map(|n| n.registered && n.backend.is_some() && n.state == NodeState::Creating)
            .unwrap_or(false);
        if !ready {
            return;
        }
        self.emit_node_event(id, GraphEvent::NodeInitialized { id });
        self.change_node_state(id, NodeState::Suspended);
        // Ports leave Init once the node can negotiate.
        self.set_all_port_states(id, PortState::Configure);
    }

    /// Record a state change and notify listeners. No backend interaction.
    pub(crate) fn change_node_state(&mut self, id: NodeId, state: NodeState) {
        let Some(node) = self.nodes.get_mut(&id) else { return };
        if node.state == state {
            return;
        }
        let old = node.state.kind();
        let error = match &state {
            NodeState::Error(message) => {
                node.last_error = Some(message.clone());
                Some(message.clone())
            }
            _ => None,
        };
        node.state = state.clone();
        let new = state.kind();
        self.emit_node_event(id, GraphEvent::NodeStateChanged { id, old, state: new, error });
    }

    /// Record a backend failure: the node enters the error state, its
    /// links fail, and peers that were running fall back to idle.
    pub(crate) fn node_error(&mut self, id: NodeId, error: Error) {
        let message = error.to_string();
        self.change_node_state(id, NodeState::Error(message.clone()));
        self.emit_node_event(
            id,
            GraphEvent::NodeInfoChanged { id, change_mask: change::ERROR | change::STATE },
        );

        let attached = self.links_of(id);
        let mut peers = Vec::new();
        for link_id in attached {
            let Some(link) = self.links.get(&link_id) else { continue };
            if link.state.is_error() {
                continue;
            }
            if let Some(peer) = link.peer_of(id) {
                peers.push(peer);
            }
            if link.is_active() {
                self.deactivate_link(link_id);
            }
            self.link_error(link_id, format!("node {id} failed: {message}"));
        }
        for peer in peers {
            let running = self
                .nodes
                .get(&peer)
                .map(|n| n.state == NodeState::Running)
                .unwrap_or(false);
            if running {
                let _ = self.node_set_state(peer, StateTarget::Idle);
            }
        }
    }

    fn set_all_port_states(&mut self, id: NodeId, state: PortState) {
        let mut events = Vec::new();
        if let Some(node) = self.nodes.get_mut(&id) {
            for direction in [Direction::Input, Direction::Output] {
                for port in node.ports_mut(direction).values_mut() {
                    if state == PortState::Configure {
                        port.format = None;
                    }
                    if port.set_state(state) {
                        events.push(GraphEvent::PortStateChanged {
                            node: id,
                            direction,
                            port: port.id,
                            state,
                        });
                    }
                }
            }
        }
        for event in events {
            self.emit_node_event(id, event);
        }
    }

    // === State machine ===

    /// Drive the node toward a target state.
    ///
    /// Running is gated on link readiness: with links still negotiating the
    /// request is remembered and silently deferred until the counters
    /// match. Backend completions reported asynchronously finish the
    /// transition through the work queue; a newer request drops the
    /// superseded pending completion.
    pub fn node_set_state(&mut self, id: NodeId, target: StateTarget) -> Result<()> {
        let (cell, command, superseded) = {
            let node = self.node_mut(id)?;
            if node.backend.is_none() {
                return Err(Error::bad_state(format!("node {id} has no backend")));
            }
            if node.state == NodeState::Creating {
                return Err(Error::bad_state(format!("node {id} not initialized")));
            }
            let command = match target {
                StateTarget::Suspended => Some(Command::Suspend),
                // Re-evaluated on every transition into Idle.
                StateTarget::Idle => node.pause_on_idle().then_some(Command::Pause),
                StateTarget::Running => {
                    if !node.active || !node.links_ready() {
                        node.pending_state = Some(StateTarget::Running);
                        return Ok(());
                    }
                    Some(Command::Start)
                }
            };
            node.pending_state = None;
            let superseded = node.state_seq.take();
            (node.backend.clone(), command, superseded)
        };
        if let Some(seq) = superseded {
            let _ = self.work.take(id, seq);
        }

        let Some(command) = command else {
            // Nothing to tell the backend; apply directly.
            self.apply_state_target(id, target);
            return Ok(());
        };

        let completion = match cell.as_ref().map(|cell| cell.lock().send_command(command)) {
            Some(Ok(completion)) => completion,
            Some(Err(error)) => {
                self.node_error(id, error.clone());
                return Err(error);
            }
            None => return Err(Error::bad_state(format!("node {id} has no backend"))),
        };

        match completion {
            Completion::Done => self.apply_state_target(id, target),
            Completion::Pending(seq) => {
                if let Ok(node) = self.node_mut(id) {
                    node.state_seq = Some(seq);
                }
                self.work.queue(
                    id,
                    seq,
                    Box::new(move |ctx: &mut Context<C>, result: Result<()>| {
                        if let Ok(node) = ctx.node_mut(id) {
                            node.state_seq = None;
                        }
                        match result {
                            Ok(()) => ctx.apply_state_target(id, target),
                            Err(error) => ctx.node_error(id, error),
                        }
                    }),
                );
            }
        }
        Ok(())
    }

    fn apply_state_target(&mut self, id: NodeId, target: StateTarget) {
        match target {
            StateTarget::Suspended => {
                // Buffers are gone: negotiated links fall back and ports
                // return to configure.
                let attached = self.links_of(id);
                for link_id in attached {
                    if self.links.get(&link_id).map(|l| l.is_active()).unwrap_or(false) {
                        self.deactivate_link(link_id);
                    }
                }
                self.set_all_port_states(id, PortState::Configure);
                self.change_node_state(id, NodeState::Suspended);
            }
            StateTarget::Idle => self.change_node_state(id, NodeState::Idle),
            StateTarget::Running => self.change_node_state(id, NodeState::Running),
        }
    }

    /// Complete a deferred Running request once the gate opens.
    pub(crate) fn check_deferred_start(&mut self, id: NodeId) {
        let start = self
            .nodes
            .get(&id)
            .map(|n| {
                n.pending_state == Some(StateTarget::Running) && n.active && n.links_ready()
            })
            .unwrap_or(false);
        if start {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.pending_state = None;
            }
            let _ = self.node_set_state(id, StateTarget::Running);
        }
    }

    /// Activate or deactivate a node. Turning off forces Idle; turning on
    /// cascades activation over negotiated links and recalculates the
    /// graph.
    pub fn node_set_active(&mut self, id: NodeId, active: bool) -> Result<()> {
        {
            let node = self.node_mut(id)?;
            node.active = active;
            if !active {
                node.pending_state = None;
            }
        }
        if active {
            let attached = self.links_of(id);
            for link_id in attached {
                self.maybe_activate_link(link_id);
            }
        } else {
            let attached = self.links_of(id);
            for link_id in attached {
                if self.links.get(&link_id).map(|l| l.is_active()).unwrap_or(false) {
                    self.deactivate_link(link_id);
                }
            }
            let running = self
                .nodes
                .get(&id)
                .map(|n| n.state == NodeState::Running)
                .unwrap_or(false);
            if running {
                let _ = self.node_set_state(id, StateTarget::Idle);
            }
        }
        self.recalc_graph();
        Ok(())
    }

    /// Reassign the node's driver. Takes effect through graph
    /// recalculation, whose target migration is marshalled to the data
    /// loop; the realtime thread observes the move at a cycle boundary.
    pub fn node_set_driver(&mut self, id: NodeId, driver: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&driver) {
            return Err(Error::no_entity(format!("node {driver}")));
        }
        self.node_mut(id)?.forced_driver = Some(driver);
        self.recalc_graph();
        Ok(())
    }

    /// Tear the node down: deactivate, unlink every port, destroy ports,
    /// remove it from the data loop and free the activation block.
    pub fn destroy_node(&mut self, id: NodeId) -> Result<()> {
        {
            let node = self.node_mut(id)?;
            node.active = false;
            node.pending_state = None;
        }
        self.work.cancel_owner(id);

        // Best-effort suspend so the backend releases buffers.
        let cell = self.nodes.get(&id).and_then(|n| n.backend.clone());
        if let Some(cell) = cell {
            let _ = cell.lock().send_command(Command::Suspend);
        }

        let attached = self.links_of(id);
        for link_id in attached {
            let _ = self.destroy_link(link_id);
        }

        let (mem, rt_added, port_events) = {
            let Some(node) = self.nodes.get_mut(&id) else {
                return Err(Error::no_entity(format!("node {id}")));
            };
            let mut port_events = Vec::new();
            for direction in [Direction::Input, Direction::Output] {
                let ids: Vec<PortId> = node.ports(direction).keys().copied().collect();
                for port in ids {
                    node.remove_port(direction, port);
                    port_events.push(GraphEvent::PortRemoved { node: id, direction, port });
                }
            }
            (node.mem, node.rt_added, port_events)
        };
        for event in port_events {
            self.emit_node_event(id, event);
        }
        if rt_added {
            self.loop_handle.invoke(InvokeOp::RemoveNode { id });
        }
        self.mem.free(mem);
        self.nodes.shift_remove(&id);
        self.emit_global(GraphEvent::NodeRemoved { id });
        self.recalc_graph();
        Ok(())
    }

    // === Ports ===

    /// Add a port from backend-reported info. Fails with `exists` on a
    /// colliding id.
    pub fn add_port(&mut self, node_id: NodeId, info: weft_backend::PortInfo) -> Result<PortId> {
        let direction = info.direction;
        let port_id = info.port_id;
        let mut port = Port::new(direction, port_id, info)?;
        let registered = {
            let node = self.node_mut(node_id)?;
            if !matches!(node.state, NodeState::Creating) {
                port.set_state(PortState::Configure);
            }
            node.add_port(port)?;
            node.registered
        };
        if registered {
            self.emit_node_event(
                node_id,
                GraphEvent::PortAdded { node: node_id, direction, port: port_id },
            );
        }
        self.enum_port_formats(node_id, direction, port_id)?;
        Ok(port_id)
    }

    /// Remove a port, destroying its links first.
    pub fn remove_port(&mut self, node_id: NodeId, direction: Direction, port_id: PortId) -> Result<()> {
        let attached: Vec<LinkId> = {
            let node = self.node(node_id)?;
            let port = node
                .port(direction, port_id)
                .ok_or_else(|| Error::no_entity(format!("port {port_id} on node {node_id}")))?;
            port.links.clone()
        };
        for link_id in attached {
            let _ = self.destroy_link(link_id);
        }
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.remove_port(direction, port_id);
        }
        self.emit_node_event(
            node_id,
            GraphEvent::PortRemoved { node: node_id, direction, port: port_id },
        );
        Ok(())
    }

    /// Kick off EnumFormat caching for a port.
    fn enum_port_formats(&mut self, node_id: NodeId, direction: Direction, port_id: PortId) -> Result<()> {
        let seq = self.next_seq();
        let cell = {
            let node = self.node_mut(node_id)?;
            if let Some(port) = node.port_mut(direction, port_id) {
                port.clear_params(ParamId::Format);
            }
            node.backend.clone()
        };
        let Some(cell) = cell else { return Ok(()) };
        self.pending_enum
            .insert(seq, EnumTarget { node: node_id, direction, port: port_id });
        let result = cell
            .lock()
            .port_enum_params(seq, direction, port_id, ParamId::EnumFormat, 0, u32::MAX, None);
        if let Err(error) = result {
            self.pending_enum.remove(&seq);
            return Err(error);
        }
        Ok(())
    }

    /// Set a port parameter, forwarding to the backend.
    ///
    /// A `Pending` completion parks exactly one work-queue entry for the
    /// returned sequence; the matching result applies the parameter (or,
    /// on error, leaves the port untouched).
    pub fn port_set_param(
        &mut self,
        node_id: NodeId,
        direction: Direction,
        port_id: PortId,
        id: ParamId,
        flags: u32,
        param: Option<Param>,
    ) -> Result<Completion> {
        self.port_set_param_with(node_id, direction, port_id, id, flags, param, None)
    }

    /// As [`Context::port_set_param`], with a continuation invoked after
    /// the parameter is applied (inline for synchronous completions,
    /// through the work queue otherwise).
    pub(crate) fn port_set_param_with(
        &mut self,
        node_id: NodeId,
        direction: Direction,
        port_id: PortId,
        id: ParamId,
        flags: u32,
        param: Option<Param>,
        after: Option<WorkFn<C>>,
    ) -> Result<Completion> {
        let cell = {
            let node = self.node(node_id)?;
            if node.port(direction, port_id).is_none() {
                return Err(Error::no_entity(format!("port {port_id} on node {node_id}")));
            }
            node.backend
                .clone()
                .ok_or_else(|| Error::bad_state(format!("node {node_id} has no backend")))?
        };
        let completion = cell.lock().port_set_param(direction, port_id, id, flags, param.clone())?;
        match completion {
            Completion::Done => {
                self.apply_port_param(node_id, direction, port_id, id, param);
                if let Some(after) = after {
                    after(self, Ok(()));
                }
            }
            Completion::Pending(seq) => {
                self.queue_work(
                    node_id,
                    seq,
                    Box::new(move |ctx: &mut Context<C>, result: Result<()>| {
                        if result.is_ok() {
                            ctx.apply_port_param(node_id, direction, port_id, id, param);
                        }
                        if let Some(after) = after {
                            after(ctx, result);
                        }
                    }),
                );
            }
        }
        Ok(completion)
    }

    /// Record the effect of a successfully set port parameter and move the
    /// port's state machine.
    pub(crate) fn apply_port_param(
        &mut self,
        node_id: NodeId,
        direction: Direction,
        port_id: PortId,
        id: ParamId,
        param: Option<Param>,
    ) {
        let mut state_event = None;
        if let Some(node) = self.nodes.get_mut(&node_id) {
            if let Some(port) = node.port_mut(direction, port_id) {
                match (id, &param) {
                    (ParamId::Format, Some(Param::Format(format))) => {
                        port.format = Some(format.clone());
                        if port.set_state(PortState::Ready) {
                            state_event = Some(PortState::Ready);
                        }
                    }
                    (ParamId::Format, _) => {
                        port.format = None;
                        if port.set_state(PortState::Configure) {
                            state_event = Some(PortState::Configure);
                        }
                    }
                    _ => {}
                }
            }
        }
        if let Some(state) = state_event {
            self.emit_node_event(
                node_id,
                GraphEvent::PortStateChanged { node: node_id, direction, port: port_id, state },
            );
        }
        self.emit_node_event(
            node_id,
            GraphEvent::ParamChanged { node: node_id, port: Some(port_id), param_id: id.raw() },
        );
    }

    // === Parameters ===

    /// Enumerate node-level parameters, dispatching each result to `cb` as
    /// it arrives on the backend's result channel.
    pub fn for_each_param(
        &mut self,
        node_id: NodeId,
        id: ParamId,
        callback: ParamCallback,
    ) -> Result<Seq> {
        let seq = self.next_seq();
        let cell = {
            let node = self.node_mut(node_id)?;
            let cell = node
                .backend
                .clone()
                .ok_or_else(|| Error::bad_state(format!("node {node_id} has no backend")))?;
            node.param_pending.insert(seq, callback);
            cell
        };
        if let Err(error) = cell.lock().enum_params(seq, id, 0, u32::MAX, None) {
            if let Ok(node) = self.node_mut(node_id) {
                node.param_pending.remove(&seq);
            }
            return Err(error);
        }
        Ok(seq)
    }

    // === Work queue ===

    pub(crate) fn queue_work(&mut self, owner: NodeId, seq: Seq, callback: WorkFn<C>) {
        self.work.queue(owner, seq, callback);
    }

    /// Complete a pending work entry by exact `(owner, seq)`.
    pub fn complete_work(&mut self, owner: NodeId, seq: Seq, result: Result<()>) {
        if let Some(callback) = self.work.take(owner, seq) {
            callback(self, result);
        }
    }

    pub fn pending_work(&self) -> usize {
        self.work.len()
    }

    // === Notification dispatch ===

    /// Route one backend message. The engine's event loop feeds this; unit
    /// tests drain their notify channel into it manually.
    pub fn dispatch_notify(&mut self, node_id: NodeId, message: BackendMessage) {
        match message {
            BackendMessage::Info(info) => {
                let mask = {
                    let Some(node) = self.nodes.get_mut(&node_id) else { return };
                    node.max_input_ports = info.max_input_ports;
                    node.max_output_ports = info.max_output_ports;
                    if info.change_mask & change::PROPS != 0 {
                        node.props.merge(&info.props);
                    }
                    info.change_mask
                };
                self.emit_node_event(
                    node_id,
                    GraphEvent::NodeInfoChanged { id: node_id, change_mask: mask },
                );
            }
            BackendMessage::PortInfo { direction, port_id, info: Some(info) } => {
                let existing = self
                    .nodes
                    .get(&node_id)
                    .map(|n| n.port(direction, port_id).is_some())
                    .unwrap_or(false);
                if existing {
                    let changed = self
                        .nodes
                        .get_mut(&node_id)
                        .and_then(|n| n.port_mut(direction, port_id))
                        .map(|p| p.update_info(info))
                        .unwrap_or(0);
                    if changed != 0 {
                        self.emit_node_event(
                            node_id,
                            GraphEvent::PortInfoChanged {
                                node: node_id,
                                direction,
                                port: port_id,
                                change_mask: changed,
                            },
                        );
                    }
                } else {
                    let _ = self.add_port(node_id, info);
                }
            }
            BackendMessage::PortInfo { direction, port_id, info: None } => {
                let _ = self.remove_port(node_id, direction, port_id);
            }
            BackendMessage::Result { seq, event: ResultEvent::Param { id, index, param } } => {
                if let Some(target) = self.pending_enum.get(&seq) {
                    let (node, direction, port) = (target.node, target.direction, target.port);
                    if let Some(port) = self
                        .nodes
                        .get_mut(&node)
                        .and_then(|n| n.port_mut(direction, port))
                    {
                        port.cache_param(param.clone());
                    }
                }
                let mut callback = self
                    .nodes
                    .get_mut(&node_id)
                    .and_then(|n| n.param_pending.remove(&seq));
                if let Some(cb) = callback.as_mut() {
                    cb(id, index, &param);
                }
                if let (Some(cb), Ok(node)) = (callback, self.node_mut(node_id)) {
                    node.param_pending.insert(seq, cb);
                }
            }
            BackendMessage::Result { seq, event: ResultEvent::Done { result } } => {
                self.pending_enum.remove(&seq);
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    node.param_pending.remove(&seq);
                }
                self.complete_work(node_id, seq, result.map_err(Error::Backend));
            }
            BackendMessage::Event(BackendEvent::RequestProcess) => {
                let driver = self.nodes.get(&node_id).map(|n| n.driver);
                if let Some(driver) = driver {
                    self.trigger_driver(driver);
                }
            }
            BackendMessage::Event(BackendEvent::Error { message }) => {
                self.node_error(node_id, Error::Backend(message));
            }
        }
    }

    // === Realtime plumbing ===

    /// Start one cycle of the given driver node.
    pub fn trigger_driver(&mut self, id: NodeId) {
        self.loop_handle.invoke(InvokeOp::TriggerDriver { id });
    }

    /// Push cycle geometry to the data loop.
    pub fn configure_rt(&mut self, duration: u64, rate_num: u32, rate_den: u32, size: u32) {
        self.loop_handle
            .invoke(InvokeOp::Configure { duration, rate_num, rate_den, size });
    }

    /// Block until the data loop drained everything queued so far.
    pub fn flush_rt(&mut self) {
        self.loop_handle.flush();
    }

    /// Drain loop feedback, emitting overruns as graph events.
    pub fn drain_rt_events(&mut self) -> Vec<RtEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rt_events.try_recv() {
            if let RtEvent::CycleOverrun { driver } = event {
                self.emit_global(GraphEvent::CycleOverrun { driver });
            }
            events.push(event);
        }
        events
    }

    /// A peer's view of the node's activation block (record + wake
    /// signal), as a stand-in for mapping the shared memory segment and
    /// receiving the eventfd.
    pub fn peer_handle(&self, id: NodeId) -> Result<PeerHandle> {
        let node = self.node(id)?;
        self.mem
            .get(node.mem)
            .map(|block| block.peer_handle())
            .ok_or_else(|| Error::no_entity(format!("mem block of node {id}")))
    }

    /// All links with this node as either endpoint.
    pub(crate) fn links_of(&self, id: NodeId) -> Vec<LinkId> {
        self.links
            .values()
            .filter(|l| l.out_node == id || l.in_node == id)
            .map(|l| l.id)
            .collect()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
