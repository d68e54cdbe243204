// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use weft_backend::info::PortInfo;
use weft_backend::{FakeBackend, FakeHandle, Format};
use weft_core::{keys, Direction, FakeClock, NodeState, PortId, Properties};
use weft_graph::StateTarget;

fn add_node(engine: &mut Engine<FakeClock>, name: &str, driver: bool) -> (NodeId, FakeHandle) {
    let mut props = Properties::new();
    if driver {
        props.set(keys::NODE_DRIVER, "true");
    }
    let ctx = engine.context();
    let id = ctx.create_node(name, props);
    let (backend, handle) = FakeBackend::new();
    ctx.set_implementation(id, Box::new(backend)).unwrap();
    ctx.register_node(id).unwrap();
    engine.pump();
    (id, handle)
}

#[test]
fn pump_routes_backend_notifications() {
    let mut engine = Engine::with_clock(&Config::default(), FakeClock::new());
    let (id, handle) = add_node(&mut engine, "node", false);
    assert_eq!(engine.context().node(id).unwrap().state, NodeState::Suspended);

    handle.advertise_formats(
        Direction::Output,
        PortId::new(0),
        vec![Format::audio("raw", 48_000, 2)],
    );
    engine
        .context()
        .add_port(id, PortInfo::new(Direction::Output, PortId::new(0)))
        .unwrap();
    engine.pump();

    let formats = engine
        .context()
        .node(id)
        .unwrap()
        .port(Direction::Output, PortId::new(0))
        .unwrap()
        .cached_formats();
    assert_eq!(formats.len(), 1);
}

#[test]
fn engine_applies_config_quantum_to_cycles() {
    let config = Config { quantum: 256, ..Config::default() };
    let mut engine = Engine::with_clock(&config, FakeClock::new());
    let (id, _handle) = add_node(&mut engine, "driver", true);
    engine.context().node_set_active(id, true).unwrap();
    engine.context().trigger_driver(id);
    engine.context().flush_rt();

    let activation = &engine.context().node(id).unwrap().activation;
    assert_eq!(activation.position.size(), 256);
    assert_eq!(activation.position.position(), 256);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_loop_dispatches_commands_and_notifications() {
    let mut engine = Engine::with_clock(&Config::default(), FakeClock::new());
    let (id, handle) = add_node(&mut engine, "driver", true);
    engine.context().node_set_active(id, true).unwrap();
    engine.context().node_set_state(id, StateTarget::Idle).unwrap();
    let engine_handle = engine.handle();

    let join = tokio::spawn(engine.run());
    assert!(engine_handle.trigger_driver(id));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    engine_handle.shutdown();
    join.await.unwrap();

    assert_eq!(handle.process_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn clock_source_drives_cycles() {
    let mut engine = Engine::with_clock(&Config::default(), FakeClock::new());
    let (id, handle) = add_node(&mut engine, "driver", true);
    engine.context().node_set_active(id, true).unwrap();
    let engine_handle = engine.handle();

    let join = tokio::spawn(engine.run());
    let ticker = ClockSource::spawn(
        engine_handle.clone(),
        id,
        std::time::Duration::from_millis(5),
    );
    tokio::time::sleep(std::time::Duration::from_millis(60)).await;
    ticker.abort();
    engine_handle.shutdown();
    join.await.unwrap();

    assert!(handle.process_count() >= 2);
}
