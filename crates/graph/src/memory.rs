// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activation memory blocks and peer handles.
//!
//! Every node's activation record lives in a block registered with the
//! context's mem pool. A peer (another context, another thread, in a full
//! deployment another process) gets a [`PeerHandle`]: the record plus the
//! node's wake signal, enough to decrement counters and signal the owning
//! loop without any other shared state.

use crate::rt::WakeSignal;
use indexmap::IndexMap;
use std::sync::Arc;
use weft_core::activation::{ActivationRecord, ActivationStatus};
use weft_core::{IdGen, MemId};

/// One registered activation allocation.
pub struct MemBlock {
    id: MemId,
    activation: Arc<ActivationRecord>,
    signal: WakeSignal,
}

impl MemBlock {
    pub fn id(&self) -> MemId {
        self.id
    }

    pub fn activation(&self) -> &Arc<ActivationRecord> {
        &self.activation
    }

    /// Hand out the record and wake signal for mapping by a peer.
    pub fn peer_handle(&self) -> PeerHandle {
        PeerHandle {
            activation: Arc::clone(&self.activation),
            signal: self.signal.clone(),
        }
    }
}

/// A peer's view of one activation block.
#[derive(Clone)]
pub struct PeerHandle {
    activation: Arc<ActivationRecord>,
    signal: WakeSignal,
}

impl PeerHandle {
    pub fn activation(&self) -> &ActivationRecord {
        &self.activation
    }

    /// Decrement the record from the peer side, signalling the owner on
    /// the zero transition. Returns true iff this call signalled.
    pub fn dec_and_signal(&self, nanos: u64) -> bool {
        if self.activation.dec_pending() {
            self.activation.set_status(ActivationStatus::Triggered);
            self.activation.stamp_signal(nanos);
            self.signal.raise();
            true
        } else {
            false
        }
    }

    /// Raise the owner's wake signal without touching counters (the peer
    /// finished an asynchronously continuing cycle).
    pub fn raise(&self) {
        self.signal.raise();
    }
}

/// Registry of activation allocations, owned by the context.
#[derive(Default)]
pub struct MemPool {
    blocks: IndexMap<MemId, MemBlock>,
    ids: IdGen,
}

impl MemPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, activation: Arc<ActivationRecord>, signal: WakeSignal) -> MemId {
        let id = MemId::new(self.ids.next());
        self.blocks.insert(id, MemBlock { id, activation, signal });
        id
    }

    pub fn get(&self, id: MemId) -> Option<&MemBlock> {
        self.blocks.get(&id)
    }

    pub fn free(&mut self, id: MemId) -> bool {
        self.blocks.shift_remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
