// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine event loop and driver clock source.

use crate::config::Config;
use std::time::Duration;
use tokio::sync::mpsc;
use weft_backend::BackendMessage;
use weft_core::{Clock, NodeId, SystemClock};
use weft_graph::Context;

/// Commands addressed to the engine loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCmd {
    TriggerDriver(NodeId),
    Recalc,
    Shutdown,
}

/// Cloneable sender for engine commands.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineCmd>,
}

impl EngineHandle {
    pub fn trigger_driver(&self, driver: NodeId) -> bool {
        self.tx.send(EngineCmd::TriggerDriver(driver)).is_ok()
    }

    pub fn recalc(&self) -> bool {
        self.tx.send(EngineCmd::Recalc).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(EngineCmd::Shutdown);
    }
}

/// The main loop: owns the context, drains backend notifications and
/// engine commands, and feeds realtime feedback back to listeners.
pub struct Engine<C: Clock + 'static> {
    ctx: Context<C>,
    notify_rx: mpsc::UnboundedReceiver<(NodeId, BackendMessage)>,
    cmd_rx: mpsc::UnboundedReceiver<EngineCmd>,
    cmd_tx: mpsc::UnboundedSender<EngineCmd>,
}

impl Engine<SystemClock> {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + 'static> Engine<C> {
    pub fn with_clock(config: &Config, clock: C) -> Self {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let mut ctx = Context::new(clock, notify_tx);
        let quantum = config.quantum_size();
        ctx.configure_rt(quantum as u64, 1, config.clock_rate, quantum);
        Self { ctx, notify_rx, cmd_rx, cmd_tx }
    }

    pub fn context(&mut self) -> &mut Context<C> {
        &mut self.ctx
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle { tx: self.cmd_tx.clone() }
    }

    /// Drain everything currently queued without blocking. The async loop
    /// uses this between awaits; synchronous tests drive it directly.
    pub fn pump(&mut self) {
        while let Ok((node, message)) = self.notify_rx.try_recv() {
            self.ctx.dispatch_notify(node, message);
        }
        self.ctx.drain_rt_events();
    }

    /// Run until shutdown. Single task; the only suspension points are
    /// the channel reads.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                message = self.notify_rx.recv() => match message {
                    Some((node, message)) => {
                        self.ctx.dispatch_notify(node, message);
                        self.ctx.drain_rt_events();
                    }
                    None => break,
                },
                command = self.cmd_rx.recv() => match command {
                    Some(EngineCmd::TriggerDriver(driver)) => {
                        self.ctx.trigger_driver(driver);
                        self.ctx.drain_rt_events();
                    }
                    Some(EngineCmd::Recalc) => self.ctx.recalc_graph(),
                    Some(EngineCmd::Shutdown) | None => break,
                },
            }
        }
        tracing::info!("engine loop stopped");
    }
}

/// Raises a driver's cycle on a fixed interval, standing in for a
/// hardware clock.
pub struct ClockSource;

impl ClockSource {
    /// Spawn a ticker that triggers `driver` every `period` until the
    /// engine goes away.
    pub fn spawn(
        handle: EngineHandle,
        driver: NodeId,
        period: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !handle.trigger_driver(driver) {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
