// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-node activation record: the one structure shared between the main
//! thread, the data loop and (by layout) peer processes.
//!
//! The record is `#[repr(C, align(8))]` with native endianness so that a
//! peer mapping the same memory sees the exact field layout:
//! `state[2] × {i32 pending, i32 required, i32 status}`, three `u64`
//! timestamps, `u32 status`, `u32 running`, then the embedded position
//! block. All mutation goes through atomics; there is no lock.

use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

/// Scheduling status of a node within the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ActivationStatus {
    /// Counters reset, not yet signalled
    NotTriggered = 0,
    /// Pending reached zero; signal raised
    Triggered = 1,
    /// The node woke up and is processing
    Awake = 2,
    /// The node completed and decremented its targets
    Finished = 3,
}

impl ActivationStatus {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => ActivationStatus::Triggered,
            2 => ActivationStatus::Awake,
            3 => ActivationStatus::Finished,
            _ => ActivationStatus::NotTriggered,
        }
    }
}

crate::simple_display! {
    ActivationStatus {
        NotTriggered => "not-triggered",
        Triggered => "triggered",
        Awake => "awake",
        Finished => "finished",
    }
}

/// One generation of cycle counters.
///
/// `required` is the fan-in of the node on the current graph; `pending`
/// counts upstream completions still outstanding this cycle.
#[derive(Debug, Default)]
#[repr(C)]
pub struct CycleState {
    pub pending: AtomicI32,
    pub required: AtomicI32,
    pub status: AtomicI32,
}

impl CycleState {
    /// Re-arm for a new cycle: `pending := required`, status not-triggered.
    pub fn reset(&self) {
        let required = self.required.load(Ordering::Acquire);
        self.pending.store(required, Ordering::Release);
        self.status
            .store(ActivationStatus::NotTriggered as u32 as i32, Ordering::Release);
    }

    pub fn increment_required(&self) {
        self.required.fetch_add(1, Ordering::AcqRel);
    }

    pub fn decrement_required(&self) {
        self.required.fetch_sub(1, Ordering::AcqRel);
    }

    /// Stage a new fan-in; takes effect at the next cycle reset.
    pub fn set_required(&self, required: i32) {
        self.required.store(required, Ordering::Release);
    }

    /// Atomically decrement `pending`.
    ///
    /// Returns true iff this call took the counter to zero: exactly one
    /// concurrent caller per cycle observes the transition and owns the
    /// responsibility of signalling the target. Acquire-release so the
    /// winner sees every field the losers wrote before their decrement.
    pub fn dec_pending(&self) -> bool {
        self.pending.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub fn pending(&self) -> i32 {
        self.pending.load(Ordering::Acquire)
    }

    pub fn required(&self) -> i32 {
        self.required.load(Ordering::Acquire)
    }
}

/// Clock fields of the position block.
#[derive(Debug, Default)]
#[repr(C)]
pub struct ClockFields {
    pub rate_num: AtomicU32,
    pub rate_den: AtomicU32,
    pub position: AtomicU64,
    pub duration: AtomicU64,
    pub id: AtomicU32,
}

/// Position block embedded at the tail of the activation record.
///
/// The driver's backend fills this once per cycle; follower backends read
/// it through their io area.
#[derive(Debug, Default)]
#[repr(C)]
pub struct PositionBlock {
    pub clock: ClockFields,
    pub size: AtomicU32,
}

impl PositionBlock {
    pub fn set_rate(&self, num: u32, den: u32) {
        self.clock.rate_num.store(num, Ordering::Relaxed);
        self.clock.rate_den.store(den, Ordering::Relaxed);
    }

    pub fn set_duration(&self, duration: u64) {
        self.clock.duration.store(duration, Ordering::Relaxed);
    }

    /// Advance the running position by one duration.
    pub fn advance(&self) {
        let duration = self.clock.duration.load(Ordering::Relaxed);
        self.clock.position.fetch_add(duration, Ordering::Relaxed);
    }

    pub fn position(&self) -> u64 {
        self.clock.position.load(Ordering::Relaxed)
    }

    pub fn set_size(&self, size: u32) {
        self.size.store(size, Ordering::Relaxed);
    }

    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Relaxed)
    }
}

/// The shared activation record of one node.
#[derive(Debug, Default)]
#[repr(C, align(8))]
pub struct ActivationRecord {
    /// Two counter generations; generation 0 is the live one.
    pub state: [CycleState; 2],
    pub signal_time: AtomicU64,
    pub awake_time: AtomicU64,
    pub finish_time: AtomicU64,
    pub status: AtomicU32,
    pub running: AtomicU32,
    pub position: PositionBlock,
}

impl ActivationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live counter generation.
    pub fn state(&self) -> &CycleState {
        &self.state[0]
    }

    /// Driver-side re-arm at cycle start.
    pub fn reset(&self) {
        self.state[0].reset();
        self.set_status(ActivationStatus::NotTriggered);
    }

    pub fn dec_pending(&self) -> bool {
        self.state[0].dec_pending()
    }

    pub fn status(&self) -> ActivationStatus {
        ActivationStatus::from_raw(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: ActivationStatus) {
        self.status.store(status as u32, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) != 0
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running as u32, Ordering::Release);
    }

    pub fn stamp_signal(&self, nanos: u64) {
        self.signal_time.store(nanos, Ordering::Relaxed);
    }

    pub fn stamp_awake(&self, nanos: u64) {
        self.awake_time.store(nanos, Ordering::Relaxed);
    }

    pub fn stamp_finish(&self, nanos: u64) {
        self.finish_time.store(nanos, Ordering::Relaxed);
    }

    pub fn times(&self) -> (u64, u64, u64) {
        (
            self.signal_time.load(Ordering::Relaxed),
            self.awake_time.load(Ordering::Relaxed),
            self.finish_time.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
#[path = "activation_tests.rs"]
mod tests;
