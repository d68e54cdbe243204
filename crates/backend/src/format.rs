// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed parameters and format intersection.
//!
//! The wire-level pod format is out of scope; parameters cross the backend
//! seam as plain typed values, and link negotiation intersects format lists
//! with [`intersect`].

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use weft_core::Properties;

/// Parameter namespaces a backend can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamId {
    /// The formats a port can accept (enumeration only)
    EnumFormat,
    /// The format currently configured on a port
    Format,
    /// Buffer pool requirements
    Buffers,
    /// Free-form runtime properties
    Props,
    /// Reported end-to-end latency
    Latency,
}

impl ParamId {
    /// Stable numeric tag used in events.
    pub fn raw(self) -> u32 {
        match self {
            ParamId::EnumFormat => 1,
            ParamId::Format => 2,
            ParamId::Buffers => 3,
            ParamId::Props => 4,
            ParamId::Latency => 5,
        }
    }
}

weft_core::simple_display! {
    ParamId {
        EnumFormat => "enum-format",
        Format => "format",
        Buffers => "buffers",
        Props => "props",
        Latency => "latency",
    }
}

/// Media type of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
    Midi,
}

weft_core::simple_display! {
    MediaType {
        Audio => "audio",
        Video => "video",
        Midi => "midi",
    }
}

/// A concrete or partially-constrained media format.
///
/// `rate`/`channels` of 0 mean "unconstrained"; intersection resolves them
/// from the other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub media_type: MediaType,
    pub media_subtype: SmolStr,
    #[serde(default)]
    pub rate: u32,
    #[serde(default)]
    pub channels: u32,
}

impl Format {
    pub fn audio(subtype: impl Into<SmolStr>, rate: u32, channels: u32) -> Self {
        Self {
            media_type: MediaType::Audio,
            media_subtype: subtype.into(),
            rate,
            channels,
        }
    }

    /// Whether every field is pinned to a concrete value.
    pub fn is_fixed(&self) -> bool {
        self.rate != 0 && self.channels != 0
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} rate={} channels={}",
            self.media_type, self.media_subtype, self.rate, self.channels
        )
    }
}

/// Buffer pool requirements carried by a `Buffers` param.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSpec {
    pub buffers: u32,
    pub size: u32,
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Param {
    Format(Format),
    Buffers(BufferSpec),
    Props(Properties),
}

impl Param {
    pub fn id(&self) -> ParamId {
        match self {
            Param::Format(_) => ParamId::Format,
            Param::Buffers(_) => ParamId::Buffers,
            Param::Props(_) => ParamId::Props,
        }
    }

    pub fn as_format(&self) -> Option<&Format> {
        match self {
            Param::Format(f) => Some(f),
            _ => None,
        }
    }
}

/// Intersect two single formats. Media type and subtype must match
/// exactly; an unconstrained (0) rate or channel count takes the other
/// side's value.
pub fn intersect_one(a: &Format, b: &Format) -> Option<Format> {
    if a.media_type != b.media_type || a.media_subtype != b.media_subtype {
        return None;
    }
    let rate = match (a.rate, b.rate) {
        (0, r) | (r, 0) => r,
        (x, y) if x == y => x,
        _ => return None,
    };
    let channels = match (a.channels, b.channels) {
        (0, c) | (c, 0) => c,
        (x, y) if x == y => x,
        _ => return None,
    };
    Some(Format {
        media_type: a.media_type,
        media_subtype: a.media_subtype.clone(),
        rate,
        channels,
    })
}

/// Intersect two format lists, preferring earlier entries on the output
/// side. Returns the first compatible combination.
pub fn intersect(output: &[Format], input: &[Format]) -> Option<Format> {
    for a in output {
        for b in input {
            if let Some(fixed) = intersect_one(a, b) {
                return Some(fixed);
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
