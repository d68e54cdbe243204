// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-graph: the node/port/link data model, the per-cycle activation
//! protocol and the realtime data loop.
//!
//! Two contexts cooperate. The main context (single-threaded, cooperative)
//! owns the [`Context`] value: registries, state machines, the work queue
//! and all backend control calls. The realtime context is one dedicated
//! thread per [`rt::DataLoop`] running only the per-cycle protocol; the
//! main context reaches it exclusively through the single-producer invoke
//! queue, and the only object both sides mutate is the activation record,
//! via atomics.

#[cfg(test)]
pub(crate) mod test_support;

pub mod context;
pub mod driver;
pub mod hooks;
pub mod link;
pub mod memory;
pub mod node;
pub mod port;
pub mod rt;
pub mod work;

pub use context::Context;
pub use hooks::{HookToken, Hooks};
pub use link::Link;
pub use memory::{MemBlock, MemPool, PeerHandle};
pub use node::{Node, StateTarget};
pub use port::Port;
pub use rt::{DataLoop, InvokeOp, LoopHandle, RtEvent, RtTarget, WakeSignal};
pub use work::WorkQueue;
