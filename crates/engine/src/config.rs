// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Quantum sizes are expressed in ticks of a fixed 48 kHz base clock,
/// independent of any backend's sample rate; the position block carries
/// the real rate separately.
pub const BASE_CLOCK_RATE: u32 = 48_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Engine settings, loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Nominal graph clock rate distributed in the position block.
    pub clock_rate: u32,
    /// Requested cycle quantum in base-clock ticks.
    pub quantum: u32,
    pub min_quantum: u32,
    pub max_quantum: u32,
    /// Default tracing filter, overridable by the environment.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clock_rate: 48_000,
            quantum: 1024,
            min_quantum: 32,
            max_quantum: 8192,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// The effective quantum, clamped to the configured window.
    pub fn quantum_size(&self) -> u32 {
        self.quantum.clamp(self.min_quantum, self.max_quantum)
    }

    /// Wall-clock length of one cycle at the base clock rate.
    pub fn quantum_duration(&self) -> Duration {
        Duration::from_nanos(
            self.quantum_size() as u64 * 1_000_000_000 / BASE_CLOCK_RATE as u64,
        )
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
