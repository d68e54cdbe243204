// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node lifecycle specs
//!
//! A single source-sink graph: starting the sink walks suspended -> idle
//! -> running; a source failure errors the link and idles the sink.

use crate::prelude::*;
use weft_core::NodeStateKind;

#[test]
fn starting_the_sink_walks_the_state_machine() {
    let mut graph = Graph::new();
    let rig = running_source_sink(&mut graph);
    let events = graph.record_events();

    graph.ctx.node_set_state(rig.sink, StateTarget::Idle).unwrap();
    graph.ctx.node_set_state(rig.sink, StateTarget::Running).unwrap();

    let transitions: Vec<(NodeStateKind, NodeStateKind)> = events
        .lock()
        .iter()
        .filter_map(|event| match event {
            GraphEvent::NodeStateChanged { id, old, state, .. } if *id == rig.sink => {
                Some((*old, *state))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (NodeStateKind::Suspended, NodeStateKind::Idle),
            (NodeStateKind::Idle, NodeStateKind::Running),
        ]
    );
    assert_eq!(
        rig.sink_handle.commands(),
        vec![Command::Pause, Command::Start]
    );
}

#[test]
fn source_error_fails_the_link_and_idles_the_sink() {
    let mut graph = Graph::new();
    let rig = running_source_sink(&mut graph);
    graph.ctx.node_set_state(rig.sink, StateTarget::Idle).unwrap();
    graph.ctx.node_set_state(rig.sink, StateTarget::Running).unwrap();
    assert_eq!(graph.ctx.node(rig.sink).unwrap().state, NodeState::Running);

    rig.source_handle.emit_event(BackendEvent::Error { message: "device unplugged".into() });
    graph.drain();

    let source = graph.ctx.node(rig.source).unwrap();
    assert_eq!(source.state.kind(), NodeStateKind::Error);
    assert!(source
        .last_error
        .as_deref()
        .unwrap_or("")
        .contains("device unplugged"));

    assert!(graph.ctx.link(rig.link).unwrap().state.is_error());
    assert_eq!(graph.ctx.node(rig.sink).unwrap().state, NodeState::Idle);
}

#[test]
fn suspend_returns_ports_to_configure() {
    let mut graph = Graph::new();
    let rig = running_source_sink(&mut graph);
    graph.ctx.node_set_state(rig.sink, StateTarget::Idle).unwrap();
    graph.ctx.node_set_state(rig.sink, StateTarget::Running).unwrap();

    graph.ctx.node_set_state(rig.sink, StateTarget::Suspended).unwrap();

    let sink = graph.ctx.node(rig.sink).unwrap();
    assert_eq!(sink.state, NodeState::Suspended);
    let port = sink.port(Direction::Input, rig.sink_port).unwrap();
    assert_eq!(port.state, PortState::Configure);
    assert!(port.format.is_none());
    // The active link fell back with the suspension.
    assert_ne!(
        graph.ctx.link(rig.link).unwrap().state,
        weft_core::LinkState::Active
    );
}

#[test]
fn node_without_backend_cannot_leave_creating() {
    let mut graph = Graph::new();
    let id = graph.ctx.create_node("bare", Properties::new());
    graph.ctx.register_node(id).unwrap();

    let err = graph.ctx.node_set_state(id, StateTarget::Idle).unwrap_err();
    assert_eq!(err.kind(), weft_core::ErrorKind::BadState);
    assert_eq!(graph.ctx.node(id).unwrap().state, NodeState::Creating);
}
