// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver reassignment specs
//!
//! Moving a node between drivers takes effect at the invoke-queue drain:
//! no cycle of the old driver signals it afterwards, no cycle of the new
//! driver signals it before.

use crate::prelude::*;

#[test]
fn reassignment_is_exact_at_the_drain_boundary() {
    let mut graph = Graph::new();
    let (d1, d1_handle) = graph.add_node("driver-1", true);
    let (d2, d2_handle) = graph.add_node("driver-2", true);
    let (node, node_handle) = graph.add_node("follower", false);
    for id in [d1, d2, node] {
        graph.ctx.node_set_active(id, true).unwrap();
    }

    graph.ctx.node_set_driver(node, d1).unwrap();
    assert_eq!(graph.ctx.node(node).unwrap().driver, d1);

    // Cycles of D1 signal the node.
    graph.ctx.trigger_driver(d1);
    graph.ctx.flush_rt();
    assert_eq!(node_handle.process_count(), 1);

    // Before the drain the old assignment may still be observed; after
    // the drain the move is absolute.
    graph.ctx.node_set_driver(node, d2).unwrap();
    graph.ctx.flush_rt();
    assert_eq!(graph.ctx.node(node).unwrap().driver, d2);

    for _ in 0..3 {
        graph.ctx.trigger_driver(d1);
    }
    graph.ctx.flush_rt();
    assert_eq!(node_handle.process_count(), 1, "old driver still signals the node");
    assert_eq!(d1_handle.process_count(), 4);

    for _ in 0..2 {
        graph.ctx.trigger_driver(d2);
        graph.ctx.flush_rt();
    }
    assert_eq!(node_handle.process_count(), 3, "new driver misses the node");
    assert_eq!(d2_handle.process_count(), 2);
}

#[test]
fn reassignment_emits_driver_changed() {
    let mut graph = Graph::new();
    let (d1, _) = graph.add_node("driver-1", true);
    let (d2, _) = graph.add_node("driver-2", true);
    let (node, _) = graph.add_node("follower", false);
    for id in [d1, d2, node] {
        graph.ctx.node_set_active(id, true).unwrap();
    }
    graph.ctx.node_set_driver(node, d1).unwrap();

    let events = graph.record_events();
    graph.ctx.node_set_driver(node, d2).unwrap();
    assert!(events.lock().iter().any(|event| matches!(
        event,
        GraphEvent::NodeDriverChanged { id, driver } if *id == node && *driver == d2
    )));
}
