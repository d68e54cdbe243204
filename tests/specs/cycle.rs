// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycle protocol specs
//!
//! One driver source fanning out to two independent sinks: every cycle
//! signals each sink exactly once and the per-node timestamps are ordered.

use crate::prelude::*;
use weft_core::activation::ActivationStatus;

struct FanOut {
    graph: Graph,
    source: NodeId,
    source_handle: FakeHandle,
    sinks: Vec<(NodeId, FakeHandle)>,
}

fn fan_out() -> FanOut {
    let mut graph = Graph::new();
    let (source, source_handle) = graph.add_node("source", true);
    let out_a = graph.add_port(source, &source_handle, Direction::Output, 0, vec![stereo()]);
    let out_b = graph.add_port(source, &source_handle, Direction::Output, 1, vec![stereo()]);

    let mut sinks = Vec::new();
    for (name, out) in [("sink-a", out_a), ("sink-b", out_b)] {
        let (sink, handle) = graph.add_node(name, false);
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
    FanOut { graph, source, source_handle, sinks }
}

#[test]
fn at_cycle_start_pending_equals_required_equals_fan_in() {
    let fan = fan_out();

    // Driver: own kick plus one per follower. Sinks: the driver's kick,
    // deduplicated with the driver-as-upstream edge.
    let driver = fan.graph.ctx.node(fan.source).unwrap();
    assert_eq!(driver.activation.state().required(), 3);
    for (sink, _) in &fan.sinks {
        let activation = &fan.graph.ctx.node(*sink).unwrap().activation;
        assert_eq!(activation.state().required(), 1);
        activation.reset();
        assert_eq!(activation.state().pending(), activation.state().required());
    }
}

#[test]
fn each_cycle_signals_both_sinks_exactly_once() {
    let mut fan = fan_out();

    for cycle in 1..=4u64 {
        fan.graph.ctx.trigger_driver(fan.source);
        fan.graph.ctx.flush_rt();

        assert_eq!(fan.source_handle.process_count(), cycle);
        for (sink, handle) in &fan.sinks {
            assert_eq!(handle.process_count(), cycle, "sink {sink} in cycle {cycle}");
            let activation = &fan.graph.ctx.node(*sink).unwrap().activation;
            assert_eq!(activation.status(), ActivationStatus::Finished);
            assert_eq!(activation.state().pending(), 0);

            let (signal_time, awake_time, finish_time) = activation.times();
            assert!(signal_time <= awake_time, "signal after awake on sink {sink}");
            assert!(awake_time <= finish_time, "awake after finish on sink {sink}");
        }
        // All followers reported back: the driver's cycle closed.
        assert!(!fan.graph.ctx.node(fan.source).unwrap().activation.is_running());
    }
}

#[test]
fn position_advances_once_per_cycle() {
    let mut fan = fan_out();
    fan.graph.ctx.configure_rt(512, 1, 48_000, 512);

    for expected in [512u64, 1024, 1536] {
        fan.graph.ctx.trigger_driver(fan.source);
        fan.graph.ctx.flush_rt();
        let activation = &fan.graph.ctx.node(fan.source).unwrap().activation;
        assert_eq!(activation.position.position(), expected);
        assert_eq!(activation.position.size(), 512);
    }
}
