// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the scenario specs.

#![allow(dead_code)]

pub use parking_lot::Mutex;
pub use std::sync::Arc;
use tokio::sync::mpsc;
use weft_backend::info::PortInfo;
pub use weft_backend::{BackendEvent, Command, FakeBackend, FakeHandle, Format};
pub use weft_core::{
    keys, Direction, FakeClock, GraphEvent, LinkId, NodeId, NodeState, PortId, PortState,
    Properties,
};
use weft_graph::Context;
pub use weft_graph::StateTarget;

pub type TestCtx = Context<FakeClock>;

/// A context plus the notify channel its backends write to; specs drain
/// the channel into `dispatch_notify` the way the engine loop would.
pub struct Graph {
    pub ctx: TestCtx,
    rx: mpsc::UnboundedReceiver<(NodeId, weft_backend::BackendMessage)>,
}

impl Graph {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { ctx: Context::new(FakeClock::new(), tx), rx }
    }

    /// Route queued backend notifications into the context.
    pub fn drain(&mut self) {
        while let Ok((node, message)) = self.rx.try_recv() {
            self.ctx.dispatch_notify(node, message);
        }
    }

    /// Drain notifications and wait for the data loop to settle.
    pub fn settle(&mut self) {
        self.drain();
        self.ctx.flush_rt();
    }

    pub fn add_node(&mut self, name: &str, driver: bool) -> (NodeId, FakeHandle) {
        let mut props = Properties::new();
        if driver {
            props.set(keys::NODE_DRIVER, "true");
        }
        let id = self.ctx.create_node(name, props);
        let (backend, handle) = FakeBackend::new();
        self.ctx
            .set_implementation(id, Box::new(backend))
            .unwrap_or_else(|e| panic!("set_implementation: {e}"));
        self.ctx
            .register_node(id)
            .unwrap_or_else(|e| panic!("register_node: {e}"));
        self.drain();
        (id, handle)
    }

    pub fn add_port(
        &mut self,
        node: NodeId,
        handle: &FakeHandle,
        direction: Direction,
        port: u32,
        formats: Vec<Format>,
    ) -> PortId {
        let port_id = PortId::new(port);
        handle.advertise_formats(direction, port_id, formats);
        self.ctx
            .add_port(node, PortInfo::new(direction, port_id))
            .unwrap_or_else(|e| panic!("add_port: {e}"));
        self.drain();
        port_id
    }

    /// Record every global event into a shared vec.
    pub fn record_events(&mut self) -> Arc<Mutex<Vec<GraphEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        self.ctx.hooks().add(0, move |event: &GraphEvent| {
            sink.lock().push(event.clone());
        });
        events
    }
}

pub fn stereo() -> Format {
    Format::audio("raw", 48_000, 2)
}

/// A driver source feeding one sink over one negotiated link.
pub struct SourceSink {
    pub source: NodeId,
    pub source_handle: FakeHandle,
    pub source_port: PortId,
    pub sink: NodeId,
    pub sink_handle: FakeHandle,
    pub sink_port: PortId,
    pub link: LinkId,
}

pub fn source_sink(graph: &mut Graph) -> SourceSink {
    let (source, source_handle) = graph.add_node("source", true);
    let (sink, sink_handle) = graph.add_node("sink", false);
    let source_port = graph.add_port(source, &source_handle, Direction::Output, 0, vec![stereo()]);
    let sink_port = graph.add_port(sink, &sink_handle, Direction::Input, 0, vec![stereo()]);
    let link = graph
        .ctx
        .create_link(source, source_port, sink, sink_port, Properties::new())
        .unwrap_or_else(|e| panic!("create_link: {e}"));
    SourceSink {
        source,
        source_handle,
        source_port,
        sink,
        sink_handle,
        sink_port,
        link,
    }
}

/// Source, sink, everything active with the link flowing.
pub fn running_source_sink(graph: &mut Graph) -> SourceSink {
    let rig = source_sink(graph);
    graph.ctx.node_set_active(rig.source, true).unwrap_or_else(|e| panic!("{e}"));
    graph.ctx.node_set_active(rig.sink, true).unwrap_or_else(|e| panic!("{e}"));
    rig
}
