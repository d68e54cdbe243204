// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The realtime data loop.
//!
//! One dedicated thread per loop runs the per-cycle protocol and nothing
//! else: no allocation on the cycle path, no blocking locks (the backend
//! cell is `try_lock` only), no main-thread calls. The main context talks
//! to the loop through a single-producer invoke queue whose payloads are
//! moved by value, and wakes it through the loop's unparker. Per-node wake
//! signals are raise-from-anywhere counters pointing at the same unparker,
//! the in-process equivalent of an eventfd raised by a peer.

use parking::{Parker, Unparker};
use parking_lot::Mutex;
use ringbuf::storage::Heap;
use ringbuf::traits::{Consumer as _, Producer as _, Split as _};
use ringbuf::wrap::caching::Caching;
use ringbuf::{HeapRb, SharedRb};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use weft_backend::{Backend, Processor, ProcessStatus};
use weft_core::activation::{ActivationRecord, ActivationStatus};
use weft_core::{Clock, NodeId};

/// Depth of the invoke queue. The producer spins (yielding) when full.
const INVOKE_QUEUE_DEPTH: usize = 256;

type InvokeProd = Caching<Arc<SharedRb<Heap<InvokeOp>>>, true, false>;
type InvokeCons = Caching<Arc<SharedRb<Heap<InvokeOp>>>, false, true>;

/// Backend cell shared between the main context and the data loop.
pub type RtBackend = Arc<Mutex<Box<dyn Backend>>>;

/// One-shot cross-thread wake primitive for a node.
///
/// `raise` may be called from any thread (or, in a full deployment, any
/// process holding the peer handle); the loop consumes raises with `take`.
#[derive(Clone)]
pub struct WakeSignal {
    raised: Arc<AtomicU32>,
    unparker: Unparker,
}

impl WakeSignal {
    pub fn new(unparker: Unparker) -> Self {
        Self { raised: Arc::new(AtomicU32::new(0)), unparker }
    }

    pub fn raise(&self) {
        self.raised.fetch_add(1, Ordering::Release);
        self.unparker.unpark();
    }

    /// Consume all outstanding raises.
    pub fn take(&self) -> u32 {
        self.raised.swap(0, Ordering::Acquire)
    }
}

impl std::fmt::Debug for WakeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeSignal")
            .field("raised", &self.raised.load(Ordering::Relaxed))
            .finish()
    }
}

/// One entry in a node's target list: a dependent to decrement when this
/// node completes.
#[derive(Clone)]
pub struct RtTarget {
    pub node: NodeId,
    pub activation: Arc<ActivationRecord>,
    pub signal: WakeSignal,
}

impl std::fmt::Debug for RtTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtTarget").field("node", &self.node).finish()
    }
}

/// Operations marshalled from the main context into the loop.
pub enum InvokeOp {
    AddNode {
        id: NodeId,
        activation: Arc<ActivationRecord>,
        signal: WakeSignal,
        backend: Option<RtBackend>,
        is_driver: bool,
    },
    RemoveNode { id: NodeId },
    SetBackend { id: NodeId, backend: Option<RtBackend> },
    SetDriver { id: NodeId, is_driver: bool },
    SetTargets { id: NodeId, targets: Vec<RtTarget> },
    SetMixes { id: NodeId, mixes: Vec<Box<dyn Processor>> },
    /// Cycle geometry: duration in base-clock ticks, rate, quantum size.
    Configure {
        duration: u64,
        rate_num: u32,
        rate_den: u32,
        size: u32,
    },
    /// Start one cycle of the given driver.
    TriggerDriver { id: NodeId },
    /// Acked once every previously queued op and all resulting local
    /// signal processing finished.
    Fence(oneshot::Sender<()>),
    Shutdown,
}

/// Feedback from the loop to the main context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtEvent {
    CycleOverrun { driver: NodeId },
}

/// Main-context handle to a running data loop.
pub struct LoopHandle {
    producer: InvokeProd,
    unparker: Unparker,
    thread: Option<JoinHandle<()>>,
}

impl LoopHandle {
    /// A fresh wake signal bound to this loop.
    pub fn signal(&self) -> WakeSignal {
        WakeSignal::new(self.unparker.clone())
    }

    /// Queue an op. Spins (yielding) if the queue is momentarily full;
    /// only the main thread produces, so this cannot deadlock.
    pub fn invoke(&mut self, op: InvokeOp) {
        let mut op = op;
        loop {
            match self.producer.try_push(op) {
                Ok(()) => break,
                Err(returned) => {
                    op = returned;
                    self.unparker.unpark();
                    std::thread::yield_now();
                }
            }
        }
        self.unparker.unpark();
    }

    /// Block until the loop has drained everything queued so far.
    pub fn flush(&mut self) {
        let (tx, rx) = oneshot::channel();
        self.invoke(InvokeOp::Fence(tx));
        let _ = rx.blocking_recv();
    }

    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.invoke(InvokeOp::Shutdown);
            let _ = thread.join();
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct RtNode {
    activation: Arc<ActivationRecord>,
    signal: WakeSignal,
    backend: Option<RtBackend>,
    targets: Vec<RtTarget>,
    mixes: Vec<Box<dyn Processor>>,
    is_driver: bool,
    /// Backend returned Async; the next raise resumes at the finish step.
    async_pending: bool,
}

/// The realtime side. Owns the node table and target lists exclusively.
pub struct DataLoop<C: Clock> {
    consumer: InvokeCons,
    parker: Parker,
    clock: C,
    feedback: Option<mpsc::UnboundedSender<RtEvent>>,
    nodes: HashMap<NodeId, RtNode>,
    duration: u64,
    rate: (u32, u32),
    size: u32,
}

impl<C: Clock + 'static> DataLoop<C> {
    /// Spawn the loop thread and return the main-context handle.
    pub fn spawn(clock: C, feedback: Option<mpsc::UnboundedSender<RtEvent>>) -> LoopHandle {
        let (producer, consumer) = HeapRb::<InvokeOp>::new(INVOKE_QUEUE_DEPTH).split();
        let parker = Parker::new();
        let unparker = parker.unparker();

        let mut data_loop = DataLoop {
            consumer,
            parker,
            clock,
            feedback,
            nodes: HashMap::new(),
            duration: 1024,
            rate: (1, 48_000),
            size: 1024,
        };
        let thread = std::thread::Builder::new()
            .name("weft-data-loop".into())
            .spawn(move || data_loop.run());

        match thread {
            Ok(thread) => LoopHandle { producer, unparker, thread: Some(thread) },
            Err(e) => {
                // Leaves a handle whose ops go nowhere; creation of the
                // thread only fails under resource exhaustion.
                tracing::error!(error = %e, "failed to spawn data loop thread");
                LoopHandle { producer, unparker, thread: None }
            }
        }
    }

    fn run(&mut self) {
        loop {
            let mut fences = Vec::new();
            let mut shutdown = false;
            while let Some(op) = self.consumer.try_pop() {
                match op {
                    InvokeOp::Fence(ack) => fences.push(ack),
                    InvokeOp::Shutdown => {
                        shutdown = true;
                        break;
                    }
                    op => self.apply(op),
                }
            }
            self.dispatch_signals();
            for ack in fences {
                let _ = ack.send(());
            }
            if shutdown {
                return;
            }
            self.parker.park();
        }
    }

    fn apply(&mut self, op: InvokeOp) {
        match op {
            InvokeOp::AddNode { id, activation, signal, backend, is_driver } => {
                self.nodes.insert(
                    id,
                    RtNode {
                        activation,
                        signal,
                        backend,
                        targets: Vec::new(),
                        mixes: Vec::new(),
                        is_driver,
                        async_pending: false,
                    },
                );
            }
            InvokeOp::RemoveNode { id } => {
                self.nodes.remove(&id);
            }
            InvokeOp::SetBackend { id, backend } => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.backend = backend;
                }
            }
            InvokeOp::SetDriver { id, is_driver } => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.is_driver = is_driver;
                }
            }
            InvokeOp::SetTargets { id, targets } => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.targets = targets;
                }
            }
            InvokeOp::SetMixes { id, mixes } => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.mixes = mixes;
                }
            }
            InvokeOp::Configure { duration, rate_num, rate_den, size } => {
                self.duration = duration;
                self.rate = (rate_num, rate_den);
                self.size = size;
            }
            InvokeOp::TriggerDriver { id } => self.run_cycle(id),
            // Handled in run()
            InvokeOp::Fence(_) | InvokeOp::Shutdown => {}
        }
    }

    /// Process raised wake signals until none are left.
    fn dispatch_signals(&mut self) {
        loop {
            let raised: Vec<NodeId> = self
                .nodes
                .iter()
                .filter_map(|(id, node)| (node.signal.take() > 0).then_some(*id))
                .collect();
            if raised.is_empty() {
                return;
            }
            for id in raised {
                self.handle_wake(id);
            }
        }
    }

    fn handle_wake(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else { return };
        if node.is_driver {
            // A driver's signal is raised when its own pending hits zero,
            // i.e. every follower completed: the cycle is done.
            if node.activation.is_running() {
                node.activation.set_running(false);
            }
            return;
        }
        if node.async_pending {
            node.async_pending = false;
            self.finish_node(id);
            return;
        }
        self.process_node(id);
    }

    /// Steps 5 of the cycle protocol: wake, mix, process, then decrement
    /// and signal this node's own targets.
    fn process_node(&mut self, id: NodeId) {
        let now = self.clock.now_nanos();
        let Some(node) = self.nodes.get_mut(&id) else { return };

        node.activation.set_status(ActivationStatus::Awake);
        node.activation.stamp_awake(now);

        for mix in &mut node.mixes {
            let _ = mix.process();
        }

        let status = match &node.backend {
            Some(backend) => match backend.try_lock() {
                Some(mut guard) => guard.process(),
                // Contended by a main-thread control call; never block here.
                None => ProcessStatus::Error(16),
            },
            None => ProcessStatus::Ok,
        };
        node.activation
            .state()
            .status
            .store(status.as_raw(), Ordering::Release);

        if matches!(status, ProcessStatus::Async) {
            node.async_pending = true;
            return;
        }
        self.finish_node(id);
    }

    fn finish_node(&mut self, id: NodeId) {
        let now = self.clock.now_nanos();
        let Some(node) = self.nodes.get(&id) else { return };
        node.activation.set_status(ActivationStatus::Finished);
        node.activation.stamp_finish(now);
        for target in &node.targets {
            if target.activation.dec_pending() {
                // A driver entry is already Finished by the time its
                // followers decrement it; only untouched targets move to
                // Triggered.
                if target.activation.status() == ActivationStatus::NotTriggered {
                    target.activation.set_status(ActivationStatus::Triggered);
                    target.activation.stamp_signal(now);
                }
                target.signal.raise();
            }
        }
    }

    /// Steps 1-4 of the cycle protocol, run on the driver's clock wake.
    fn run_cycle(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else { return };
        if !node.is_driver {
            return;
        }

        if node.activation.is_running() {
            // The previous cycle never completed. Dump every target's
            // state for diagnosis, then re-arm anyway.
            tracing::warn!(driver = %id, "cycle overrun, previous cycle incomplete");
            for target in &node.targets {
                let (signal_time, awake_time, finish_time) = target.activation.times();
                tracing::warn!(
                    node = %target.node,
                    status = %target.activation.status(),
                    pending = target.activation.state().pending(),
                    signal_time,
                    awake_time,
                    finish_time,
                    "overrun target"
                );
            }
            if let Some(feedback) = &self.feedback {
                let _ = feedback.send(RtEvent::CycleOverrun { driver: id });
            }
        }

        // Step 2: re-arm every target, including the driver's own entry.
        for target in &node.targets {
            target.activation.reset();
        }
        node.activation.set_running(true);

        // Step 3: the driver fills position and processes first.
        node.activation.position.set_rate(self.rate.0, self.rate.1);
        node.activation.position.set_duration(self.duration);
        node.activation.position.set_size(self.size);
        node.activation.position.advance();

        for mix in &mut node.mixes {
            let _ = mix.process();
        }
        let status = match &node.backend {
            Some(backend) => match backend.try_lock() {
                Some(mut guard) => guard.process(),
                None => ProcessStatus::Error(16),
            },
            None => ProcessStatus::Ok,
        };
        node.activation
            .state()
            .status
            .store(status.as_raw(), Ordering::Release);
        node.activation.set_status(ActivationStatus::Finished);
        node.activation.stamp_finish(self.clock.now_nanos());

        // Step 4: first decrement wave. The driver's own entry is already
        // Finished and only completes the cycle when it reaches zero.
        let now = self.clock.now_nanos();
        for target in &node.targets {
            if target.activation.dec_pending() {
                if target.activation.status() == ActivationStatus::NotTriggered {
                    target.activation.set_status(ActivationStatus::Triggered);
                    target.activation.stamp_signal(now);
                }
                target.signal.raise();
            }
        }
    }
}

#[cfg(test)]
#[path = "rt_tests.rs"]
mod tests;
