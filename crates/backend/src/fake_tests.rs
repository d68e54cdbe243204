// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::notify::BackendMessage;
use tokio::sync::mpsc;
use weft_core::NodeId;

fn attach(backend: &mut FakeBackend) -> mpsc::UnboundedReceiver<(NodeId, BackendMessage)> {
    let (tx, rx) = mpsc::unbounded_channel();
    backend.add_listener(NotifySink::new(NodeId::new(1), tx));
    rx
}

#[test]
fn sync_command_completes_done() {
    let (mut backend, handle) = FakeBackend::new();
    let completion = backend.send_command(Command::Pause).unwrap();
    assert_eq!(completion, Completion::Done);
    assert_eq!(handle.commands(), vec![Command::Pause]);
}

#[test]
fn async_command_returns_pending_and_completes_via_sink() {
    let (mut backend, handle) = FakeBackend::new();
    let mut rx = attach(&mut backend);
    handle.set_async(true);

    let completion = backend.send_command(Command::Start).unwrap();
    let seq = completion.pending_seq().unwrap();
    assert_eq!(handle.pending(), vec![seq]);

    handle.complete(seq, Ok(()));
    assert!(handle.pending().is_empty());

    let (node, message) = rx.try_recv().unwrap();
    assert_eq!(node, NodeId::new(1));
    match message {
        BackendMessage::Result { seq: got, event: ResultEvent::Done { result } } => {
            assert_eq!(got, seq);
            assert!(result.is_ok());
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn fail_next_errors_synchronously() {
    let (mut backend, handle) = FakeBackend::new();
    handle.fail_next("broken pipe");
    let err = backend.send_command(Command::Start).unwrap_err();
    assert_eq!(err.kind(), weft_core::ErrorKind::Backend);
    // Failure is one-shot
    assert!(backend.send_command(Command::Start).is_ok());
}

#[test]
fn port_enum_params_emits_advertised_formats_then_done() {
    let (mut backend, handle) = FakeBackend::new();
    let mut rx = attach(&mut backend);
    handle.advertise_formats(
        Direction::Output,
        PortId::new(0),
        vec![Format::audio("raw", 48_000, 2), Format::audio("raw", 44_100, 2)],
    );

    let seq = Seq::new(9);
    let completion = backend
        .port_enum_params(seq, Direction::Output, PortId::new(0), ParamId::EnumFormat, 0, 64, None)
        .unwrap();
    assert_eq!(completion, Completion::Done);

    let mut formats = Vec::new();
    let mut done = false;
    while let Ok((_, message)) = rx.try_recv() {
        match message {
            BackendMessage::Result { seq: got, event } => {
                assert_eq!(got, seq);
                match event {
                    ResultEvent::Param { param, .. } => {
                        formats.push(param.as_format().cloned().unwrap())
                    }
                    ResultEvent::Done { result } => {
                        assert!(result.is_ok());
                        done = true;
                    }
                }
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
    assert_eq!(formats.len(), 2);
    assert!(done);
}

#[test]
fn process_counts_and_returns_configured_status() {
    let (mut backend, handle) = FakeBackend::new();
    assert_eq!(backend.process(), ProcessStatus::Ok);
    handle.set_process_status(ProcessStatus::NeedBuffer);
    assert_eq!(backend.process(), ProcessStatus::NeedBuffer);
    assert_eq!(handle.process_count(), 2);
}

#[test]
fn records_params_and_io() {
    let (mut backend, handle) = FakeBackend::new();
    backend
        .set_io(
            IoKind::Position,
            Some(IoArea::new(std::sync::Arc::new(weft_core::ActivationRecord::new()))),
        )
        .unwrap();
    backend
        .port_set_param(
            Direction::Input,
            PortId::new(0),
            ParamId::Format,
            0,
            Some(Param::Format(Format::audio("raw", 48_000, 2))),
        )
        .unwrap();

    assert_eq!(handle.io_kinds(), vec![IoKind::Position]);
    let set = handle.port_params_set();
    assert_eq!(set.len(), 1);
    assert_eq!(set[0].2, ParamId::Format);
}
