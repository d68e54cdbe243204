// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory backend for tests.
//!
//! `FakeBackend::new` returns the backend plus a [`FakeHandle`] sharing its
//! state, so tests can keep steering it after the backend is boxed into a
//! node: switch control calls between sync and async completion, inject
//! failures, advertise formats, and complete pending sequences.

use crate::format::{Format, Param, ParamId};
use crate::info::{BackendInfo, PortInfo};
use crate::notify::{BackendEvent, NotifySink, ResultEvent};
use crate::types::{Command, Completion, IoArea, IoKind, ProcessStatus, RtCallbacks};
use crate::Backend;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use weft_core::{Direction, Error, PortId, Result, Seq};

#[derive(Default)]
struct FakeState {
    sink: Option<NotifySink>,
    callbacks: Option<RtCallbacks>,
    io: Vec<(IoKind, Option<IoArea>)>,
    commands: Vec<Command>,
    params_set: Vec<(ParamId, Option<Param>)>,
    port_params_set: Vec<(Direction, PortId, ParamId, Option<Param>)>,
    formats: HashMap<(Direction, PortId), Vec<Format>>,
    node_params: HashMap<ParamId, Vec<Param>>,
    async_mode: bool,
    fail_next: Option<String>,
    next_seq: u32,
    pending: Vec<Seq>,
    process_status: Option<ProcessStatus>,
    process_count: u64,
}

impl FakeState {
    fn take_failure(&mut self) -> Result<()> {
        match self.fail_next.take() {
            Some(message) => Err(Error::backend(message)),
            None => Ok(()),
        }
    }

    fn completion(&mut self) -> Completion {
        if self.async_mode {
            self.next_seq += 1;
            let seq = Seq::new(self.next_seq);
            self.pending.push(seq);
            Completion::Pending(seq)
        } else {
            Completion::Done
        }
    }
}

/// The boxable backend half.
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

/// The test-side steering half.
#[derive(Clone)]
pub struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> (Self, FakeHandle) {
        let state = Arc::new(Mutex::new(FakeState {
            next_seq: 100,
            ..FakeState::default()
        }));
        (
            Self { state: Arc::clone(&state) },
            FakeHandle { state },
        )
    }
}

impl Backend for FakeBackend {
    fn set_io(&mut self, kind: IoKind, area: Option<IoArea>) -> Result<()> {
        self.state.lock().io.push((kind, area));
        Ok(())
    }

    fn send_command(&mut self, command: Command) -> Result<Completion> {
        let mut state = self.state.lock();
        state.take_failure()?;
        state.commands.push(command);
        Ok(state.completion())
    }

    fn set_callbacks(&mut self, callbacks: RtCallbacks) {
        self.state.lock().callbacks = Some(callbacks);
    }

    fn add_listener(&mut self, sink: NotifySink) {
        self.state.lock().sink = Some(sink);
    }

    fn enum_params(
        &mut self,
        seq: Seq,
        id: ParamId,
        start: u32,
        num: u32,
        _filter: Option<&Param>,
    ) -> Result<Completion> {
        let mut state = self.state.lock();
        state.take_failure()?;
        let params = state.node_params.get(&id).cloned().unwrap_or_default();
        if let Some(sink) = &state.sink {
            for (index, param) in params
                .iter()
                .enumerate()
                .skip(start as usize)
                .take(num as usize)
            {
                sink.result(
                    seq,
                    ResultEvent::Param { id, index: index as u32, param: param.clone() },
                );
            }
            sink.result(seq, ResultEvent::Done { result: Ok(()) });
        }
        Ok(Completion::Done)
    }

    fn set_param(&mut self, id: ParamId, _flags: u32, param: Option<Param>) -> Result<Completion> {
        let mut state = self.state.lock();
        state.take_failure()?;
        state.params_set.push((id, param));
        Ok(state.completion())
    }

    fn port_enum_params(
        &mut self,
        seq: Seq,
        direction: Direction,
        port_id: PortId,
        id: ParamId,
        start: u32,
        num: u32,
        _filter: Option<&Param>,
    ) -> Result<Completion> {
        let mut state = self.state.lock();
        state.take_failure()?;
        if id == ParamId::EnumFormat {
            let formats = state
                .formats
                .get(&(direction, port_id))
                .cloned()
                .unwrap_or_default();
            if let Some(sink) = &state.sink {
                for (index, format) in formats
                    .iter()
                    .enumerate()
                    .skip(start as usize)
                    .take(num as usize)
                {
                    sink.result(
                        seq,
                        ResultEvent::Param {
                            id,
                            index: index as u32,
                            param: Param::Format(format.clone()),
                        },
                    );
                }
            }
        }
        if let Some(sink) = &state.sink {
            sink.result(seq, ResultEvent::Done { result: Ok(()) });
        }
        Ok(Completion::Done)
    }

    fn port_set_param(
        &mut self,
        direction: Direction,
        port_id: PortId,
        id: ParamId,
        _flags: u32,
        param: Option<Param>,
    ) -> Result<Completion> {
        let mut state = self.state.lock();
        state.take_failure()?;
        state.port_params_set.push((direction, port_id, id, param));
        Ok(state.completion())
    }

    fn process(&mut self) -> ProcessStatus {
        let mut state = self.state.lock();
        state.process_count += 1;
        state.process_status.unwrap_or(ProcessStatus::Ok)
    }
}

impl FakeHandle {
    /// Make subsequent control calls return `Pending` completions.
    pub fn set_async(&self, async_mode: bool) {
        self.state.lock().async_mode = async_mode;
    }

    /// Fail the next control call synchronously with a backend error.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().fail_next = Some(message.into());
    }

    /// Formats reported for EnumFormat on the given port.
    pub fn advertise_formats(&self, direction: Direction, port_id: PortId, formats: Vec<Format>) {
        self.state.lock().formats.insert((direction, port_id), formats);
    }

    /// Parameters reported for node-level enum_params.
    pub fn advertise_node_params(&self, id: ParamId, params: Vec<Param>) {
        self.state.lock().node_params.insert(id, params);
    }

    /// Sequences returned as `Pending` and not yet completed.
    pub fn pending(&self) -> Vec<Seq> {
        self.state.lock().pending.clone()
    }

    pub fn last_pending(&self) -> Option<Seq> {
        self.state.lock().pending.last().copied()
    }

    /// Complete a pending sequence through the notify sink.
    pub fn complete(&self, seq: Seq, result: Result<()>) {
        let sink = {
            let mut state = self.state.lock();
            state.pending.retain(|s| *s != seq);
            state.sink.clone()
        };
        if let Some(sink) = sink {
            sink.result(
                seq,
                ResultEvent::Done { result: result.map_err(|e| e.to_string()) },
            );
        }
    }

    /// Emit a node info update.
    pub fn emit_info(&self, info: BackendInfo) {
        if let Some(sink) = self.state.lock().sink.clone() {
            sink.info(info);
        }
    }

    /// Emit a port info update (or removal when `info` is None).
    pub fn emit_port_info(&self, direction: Direction, port_id: PortId, info: Option<PortInfo>) {
        if let Some(sink) = self.state.lock().sink.clone() {
            sink.port_info(direction, port_id, info);
        }
    }

    /// Emit an out-of-band backend event.
    pub fn emit_event(&self, event: BackendEvent) {
        if let Some(sink) = self.state.lock().sink.clone() {
            sink.event(event);
        }
    }

    /// Commands the backend has received, in order.
    pub fn commands(&self) -> Vec<Command> {
        self.state.lock().commands.clone()
    }

    /// Node-level params set, in order.
    pub fn params_set(&self) -> Vec<(ParamId, Option<Param>)> {
        self.state.lock().params_set.clone()
    }

    /// Port-level params set, in order.
    pub fn port_params_set(&self) -> Vec<(Direction, PortId, ParamId, Option<Param>)> {
        self.state.lock().port_params_set.clone()
    }

    /// Io channels the node pointed the backend at.
    pub fn io_kinds(&self) -> Vec<IoKind> {
        self.state.lock().io.iter().map(|(k, _)| *k).collect()
    }

    /// Fix the status `process` returns.
    pub fn set_process_status(&self, status: ProcessStatus) {
        self.state.lock().process_status = Some(status);
    }

    pub fn process_count(&self) -> u64 {
        self.state.lock().process_count
    }

    /// Whether realtime callbacks were installed.
    pub fn has_callbacks(&self) -> bool {
        self.state.lock().callbacks.is_some()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
