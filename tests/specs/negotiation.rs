// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async format negotiation specs
//!
//! A Format set answered asynchronously holds the port (and its link) in
//! the transitional state until the matching sequence result arrives.

use crate::prelude::*;
use weft_backend::{Param, ParamId};
use weft_core::LinkState;

#[test]
fn ok_result_moves_the_port_from_configure_to_ready() {
    let mut graph = Graph::new();
    let (node, handle) = graph.add_node("node", false);
    let port = graph.add_port(node, &handle, Direction::Input, 0, vec![stereo()]);

    handle.set_async(true);
    let completion = graph
        .ctx
        .port_set_param(node, Direction::Input, port, ParamId::Format, 0, Some(Param::Format(stereo())))
        .unwrap();
    let seq = completion.pending_seq().unwrap_or_else(|| panic!("expected pending"));
    assert_eq!(
        graph.ctx.node(node).unwrap().port(Direction::Input, port).unwrap().state,
        PortState::Configure
    );

    handle.complete(seq, Ok(()));
    graph.drain();

    let port = graph.ctx.node(node).unwrap().port(Direction::Input, port).unwrap();
    assert_eq!(port.state, PortState::Ready);
    assert_eq!(port.format.as_ref().map(|f| f.channels), Some(2));
}

#[test]
fn error_result_leaves_the_port_in_configure() {
    let mut graph = Graph::new();
    let (node, handle) = graph.add_node("node", false);
    let port = graph.add_port(node, &handle, Direction::Input, 0, vec![stereo()]);

    handle.set_async(true);
    let completion = graph
        .ctx
        .port_set_param(node, Direction::Input, port, ParamId::Format, 0, Some(Param::Format(stereo())))
        .unwrap();
    let seq = completion.pending_seq().unwrap_or_else(|| panic!("expected pending"));

    handle.complete(seq, Err(weft_core::Error::backend("refused")));
    graph.drain();

    let port = graph.ctx.node(node).unwrap().port(Direction::Input, port).unwrap();
    assert_eq!(port.state, PortState::Configure);
    assert!(port.format.is_none());
}

#[test]
fn link_negotiation_rides_the_async_completions() {
    let mut graph = Graph::new();
    let (source, source_handle) = graph.add_node("source", true);
    let (sink, sink_handle) = graph.add_node("sink", false);
    let out = graph.add_port(source, &source_handle, Direction::Output, 0, vec![stereo()]);
    let input = graph.add_port(sink, &sink_handle, Direction::Input, 0, vec![stereo()]);

    sink_handle.set_async(true);
    let link = graph
        .ctx
        .create_link(source, out, sink, input, Properties::new())
        .unwrap();
    assert_eq!(graph.ctx.link(link).unwrap().state, LinkState::Negotiating);

    // Format, then buffers, each completed by the sink's async results.
    let seq = sink_handle.last_pending().unwrap_or_else(|| panic!("pending format"));
    sink_handle.complete(seq, Ok(()));
    graph.drain();
    assert_eq!(graph.ctx.link(link).unwrap().state, LinkState::Allocating);

    let seq = sink_handle.last_pending().unwrap_or_else(|| panic!("pending buffers"));
    sink_handle.complete(seq, Ok(()));
    graph.drain();
    assert_eq!(graph.ctx.link(link).unwrap().state, LinkState::Paused);

    // No partial activation happened along the way.
    assert_eq!(graph.ctx.node(sink).unwrap().n_ready_input_links, 0);
}

#[test]
fn async_failure_errors_the_link_without_partial_activation() {
    let mut graph = Graph::new();
    let (source, source_handle) = graph.add_node("source", true);
    let (sink, sink_handle) = graph.add_node("sink", false);
    let out = graph.add_port(source, &source_handle, Direction::Output, 0, vec![stereo()]);
    let input = graph.add_port(sink, &sink_handle, Direction::Input, 0, vec![stereo()]);
    graph.ctx.node_set_active(source, true).unwrap();
    graph.ctx.node_set_active(sink, true).unwrap();

    sink_handle.set_async(true);
    let link = graph
        .ctx
        .create_link(source, out, sink, input, Properties::new())
        .unwrap();
    let seq = sink_handle.last_pending().unwrap_or_else(|| panic!("pending format"));
    sink_handle.complete(seq, Err(weft_core::Error::backend("no such format")));
    graph.drain();

    assert!(graph.ctx.link(link).unwrap().state.is_error());
    assert_eq!(graph.ctx.node(sink).unwrap().n_ready_input_links, 0);
    assert_eq!(graph.ctx.node(source).unwrap().n_ready_output_links, 0);
    // Both endpoints kept their previous states.
    assert_eq!(
        graph.ctx.node(sink).unwrap().port(Direction::Input, input).unwrap().state,
        PortState::Configure
    );
}
