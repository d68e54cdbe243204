// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Destruction specs
//!
//! Destroying a node mid-graph while the data loop is cycling must not
//! disturb the running cycle; the removal lands at the next boundary and
//! downstream fan-ins shrink accordingly.

use crate::prelude::*;

fn fan_out(graph: &mut Graph) -> (NodeId, FakeHandle, Vec<(NodeId, FakeHandle)>) {
    let (source, source_handle) = graph.add_node("source", true);
    let mut sinks = Vec::new();
    for index in 0..2u32 {
        let out = graph.add_port(source, &source_handle, Direction::Output, index, vec![stereo()]);
        let (sink, handle) = graph.add_node(&format!("sink-{index}"), false);
        let input = graph.add_port(sink, &handle, Direction::Input, 0, vec![stereo()]);
        graph
            .ctx
            .create_link(source, out, sink, input, Properties::new())
            .unwrap_or_else(|e| panic!("link: {e}"));
        sinks.push((sink, handle));
    }
    graph.ctx.node_set_active(source, true).unwrap();
    for (sink, _) in &sinks {
        graph.ctx.node_set_active(*sink, true).unwrap();
    }
    (source, source_handle, sinks)
}

#[test]
fn destroy_decrements_downstream_required_counts() {
    let mut graph = Graph::new();
    let (source, _source_handle, mut sinks) = fan_out(&mut graph);
    assert_eq!(graph.ctx.node(source).unwrap().activation.state().required(), 3);

    let (gone, _) = sinks.remove(0);
    graph.ctx.destroy_node(gone).unwrap();
    assert_eq!(graph.ctx.node(source).unwrap().activation.state().required(), 2);

    // The next cycle still signals the survivor exactly once.
    graph.ctx.trigger_driver(source);
    graph.ctx.flush_rt();
    let (_, survivor) = &sinks[0];
    assert_eq!(survivor.process_count(), 1);
    assert!(!graph.ctx.node(source).unwrap().activation.is_running());
}

#[test]
fn destroy_under_load_lands_at_a_cycle_boundary() {
    let mut graph = Graph::new();
    let (source, _source_handle, mut sinks) = fan_out(&mut graph);

    // Kick a cycle and immediately race the destruction through the
    // invoke queue, without waiting for the cycle to settle.
    graph.ctx.trigger_driver(source);
    let (gone, _) = sinks.remove(0);
    graph.ctx.destroy_node(gone).unwrap();
    graph.ctx.flush_rt();

    // The graph keeps cycling cleanly afterwards.
    graph.ctx.trigger_driver(source);
    graph.ctx.flush_rt();
    let (_, survivor) = &sinks[0];
    assert_eq!(survivor.process_count(), 2);
    assert!(graph.ctx.node(gone).is_err());
}

#[test]
fn destroying_the_sink_removes_its_link_first() {
    let mut graph = Graph::new();
    let rig = running_source_sink(&mut graph);
    let events = graph.record_events();

    graph.ctx.destroy_node(rig.sink).unwrap();

    let names: Vec<String> = events.lock().iter().map(|e| e.name().to_string()).collect();
    let link_removed = names.iter().position(|n| n == "link:removed").unwrap();
    let node_removed = names.iter().position(|n| n == "node:removed").unwrap();
    assert!(link_removed < node_removed);
    assert!(graph.ctx.link(rig.link).is_err());
    assert_eq!(graph.ctx.node(rig.source).unwrap().n_used_output_links, 0);
}
