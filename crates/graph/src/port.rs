// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ports: a node's connection points.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use weft_backend::info::{port_change, PortInfo};
use weft_backend::{Format, Param, ParamId, ProcessStatus, Processor};
use weft_core::{Direction, Error, LinkId, PortId, PortState, Properties, Result};

/// Mix sub-processor merging multiple links feeding one input port.
///
/// Installed on the data loop when a port becomes multiplexed and invoked
/// there before the owning node's backend processes. The shared cycle
/// counter is observable from the main thread.
pub struct LinkMix {
    cycles: Arc<AtomicU64>,
}

impl LinkMix {
    pub fn new(cycles: Arc<AtomicU64>) -> Self {
        Self { cycles }
    }
}

impl Processor for LinkMix {
    fn process(&mut self) -> ProcessStatus {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        ProcessStatus::Ok
    }
}

/// One port of a node.
///
/// A port belongs to exactly one node for its lifetime. Its links list is
/// mutated only from the main thread; its mix sub-processor (installed when
/// several links share an input port) runs only on the data loop.
#[derive(Debug)]
pub struct Port {
    pub id: PortId,
    pub direction: Direction,
    pub state: PortState,
    pub props: Properties,
    /// Links attached on the opposite side, in attach order.
    pub links: Vec<LinkId>,
    /// Parameters reported by the backend, cached as results arrive.
    pub params: Vec<Param>,
    /// Parameter namespaces the backend supports on this port.
    pub param_ids: Vec<ParamId>,
    pub change_mask: u32,
    /// The negotiated format, if any.
    pub format: Option<Format>,
    /// True when more than one link feeds this (input) port.
    pub multiplex: bool,
    /// Cycle counter of the installed mix, present once multiplexed.
    pub mix_cycles: Option<Arc<AtomicU64>>,
}

impl Port {
    /// Create a port from backend-reported info. Fails when the info's
    /// direction disagrees with the requested one.
    pub fn new(direction: Direction, port_id: PortId, info: PortInfo) -> Result<Self> {
        if info.direction != direction {
            return Err(Error::invalid(format!(
                "port {port_id} info direction {} does not match {direction}",
                info.direction
            )));
        }
        Ok(Self {
            id: port_id,
            direction,
            state: PortState::Init,
            props: info.props,
            links: Vec::new(),
            params: Vec::new(),
            param_ids: info.params,
            change_mask: info.change_mask,
            format: None,
            multiplex: false,
            mix_cycles: None,
        })
    }

    /// Merge a backend info update. Returns the bits that actually
    /// changed; 0 means the update was a no-op.
    pub fn update_info(&mut self, info: PortInfo) -> u32 {
        let mut changed = 0;
        if info.change_mask & port_change::PROPS != 0 && info.props != self.props {
            self.props = info.props;
            changed |= port_change::PROPS;
        }
        if info.change_mask & port_change::PARAMS != 0 && info.params != self.param_ids {
            self.param_ids = info.params;
            changed |= port_change::PARAMS;
        }
        self.change_mask |= changed;
        changed
    }

    /// Cache one enumerated parameter.
    pub fn cache_param(&mut self, param: Param) {
        self.params.push(param);
    }

    /// Drop cached parameters of one namespace (before re-enumeration).
    pub fn clear_params(&mut self, id: ParamId) {
        self.params.retain(|p| p.id() != id);
    }

    /// Formats this port advertised via EnumFormat.
    pub fn cached_formats(&self) -> Vec<Format> {
        self.params
            .iter()
            .filter_map(|p| p.as_format().cloned())
            .collect()
    }

    pub fn attach_link(&mut self, link: LinkId) {
        self.links.push(link);
        self.update_multiplex();
    }

    pub fn detach_link(&mut self, link: LinkId) {
        self.links.retain(|l| *l != link);
        self.update_multiplex();
    }

    fn update_multiplex(&mut self) {
        self.multiplex = self.direction == Direction::Input && self.links.len() > 1;
        if self.multiplex && self.mix_cycles.is_none() {
            self.mix_cycles = Some(Arc::new(AtomicU64::new(0)));
        }
    }

    /// Build the mix processor for the data loop, if this port needs one.
    pub fn make_mix(&self) -> Option<LinkMix> {
        if !self.multiplex {
            return None;
        }
        self.mix_cycles.as_ref().map(|c| LinkMix::new(Arc::clone(c)))
    }

    /// Move to a new state. Returns true when the state actually changed.
    pub fn set_state(&mut self, state: PortState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        true
    }
}

#[cfg(test)]
#[path = "port_tests.rs"]
mod tests;
