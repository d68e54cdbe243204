// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Info structures a backend reports about itself and its ports.

use crate::format::ParamId;
use serde::{Deserialize, Serialize};
use weft_core::{Direction, PortId, Properties};

/// Change-mask bits for node info updates.
pub mod change {
    pub const FLAGS: u32 = 1 << 0;
    pub const PROPS: u32 = 1 << 1;
    pub const PARAMS: u32 = 1 << 2;
    pub const STATE: u32 = 1 << 3;
    pub const ERROR: u32 = 1 << 4;
}

/// Change-mask bits for port info updates.
pub mod port_change {
    pub const FLAGS: u32 = 1 << 0;
    pub const PROPS: u32 = 1 << 1;
    pub const PARAMS: u32 = 1 << 2;
}

/// What a backend announces about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub max_input_ports: u32,
    pub max_output_ports: u32,
    /// Which of the fields below actually changed
    pub change_mask: u32,
    pub props: Properties,
    /// Parameter namespaces the backend understands
    pub params: Vec<ParamId>,
}

/// What a backend announces about one of its ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortInfo {
    pub direction: Direction,
    pub port_id: PortId,
    pub change_mask: u32,
    pub props: Properties,
    pub params: Vec<ParamId>,
}

impl PortInfo {
    pub fn new(direction: Direction, port_id: PortId) -> Self {
        Self {
            direction,
            port_id,
            change_mask: port_change::FLAGS | port_change::PROPS | port_change::PARAMS,
            props: Properties::new(),
            params: vec![ParamId::EnumFormat, ParamId::Format, ParamId::Buffers],
        }
    }
}
