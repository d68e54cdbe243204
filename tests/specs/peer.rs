// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-context peer specs
//!
//! A peer holding a node's activation handle (the stand-in for mapping
//! the shared memory block and receiving the eventfd) participates in the
//! cycle from another thread: its decrement is the one that reaches zero
//! and signals the node.

use crate::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use weft_core::activation::ActivationStatus;

#[test]
fn peer_decrement_signals_the_node_and_closes_the_cycle() {
    let mut graph = Graph::new();
    let rig = running_source_sink(&mut graph);

    // The peer contributes one extra dependency the local wave cannot
    // satisfy.
    let peer = graph.ctx.peer_handle(rig.sink).unwrap();
    peer.activation().state().increment_required();

    graph.ctx.trigger_driver(rig.source);
    graph.ctx.flush_rt();

    // Only the driver's kick arrived: the sink still waits on the peer
    // and the driver's cycle stays open.
    assert_eq!(rig.sink_handle.process_count(), 0);
    assert_eq!(peer.activation().state().pending(), 1);
    assert!(graph.ctx.node(rig.source).unwrap().activation.is_running());

    // The peer's decrement reaches zero on its own thread and signals
    // through the shared handle.
    let worker = std::thread::spawn(move || peer.dec_and_signal(42));
    assert!(worker.join().unwrap_or(false));
    graph.ctx.flush_rt();

    let sink = graph.ctx.node(rig.sink).unwrap();
    assert_eq!(sink.activation.status(), ActivationStatus::Finished);
    assert_eq!(rig.sink_handle.process_count(), 1);
    assert!(!graph.ctx.node(rig.source).unwrap().activation.is_running());
}

#[test]
fn racing_peers_see_exactly_one_zero_transition() {
    let mut graph = Graph::new();
    let rig = running_source_sink(&mut graph);

    let record = std::sync::Arc::clone(&graph.ctx.node(rig.sink).unwrap().activation);
    record.state().set_required(2);
    record.reset();

    let zeros = Arc::new(AtomicUsize::new(0));
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let peer = graph.ctx.peer_handle(rig.sink).unwrap();
            let zeros = Arc::clone(&zeros);
            std::thread::spawn(move || {
                if peer.dec_and_signal(7) {
                    zeros.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap_or(());
    }

    assert_eq!(zeros.load(Ordering::Relaxed), 1);
    assert_eq!(record.state().pending(), 0);
}
