// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds shared across the workspace

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the graph core.
///
/// Synchronous failures are returned to the caller; asynchronous backend
/// failures arrive through the work queue and drive the owning entity into
/// its error state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    Invalid(String),

    #[error("no such entity: {0}")]
    NoEntity(String),

    #[error("already exists: {0}")]
    Exists(String),

    #[error("out of memory: {0}")]
    NoMemory(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("bad state: {0}")]
    BadState(String),

    #[error("connection lost: {0}")]
    Connection(String),

    // Reserved; never raised on the cycle path
    #[error("timed out: {0}")]
    Timeout(String),
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::Invalid(msg.into())
    }

    pub fn no_entity(msg: impl Into<String>) -> Self {
        Error::NoEntity(msg.into())
    }

    pub fn exists(msg: impl Into<String>) -> Self {
        Error::Exists(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Error::Backend(msg.into())
    }

    pub fn bad_state(msg: impl Into<String>) -> Self {
        Error::BadState(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Invalid(_) => ErrorKind::Invalid,
            Error::NoEntity(_) => ErrorKind::NoEntity,
            Error::Exists(_) => ErrorKind::Exists,
            Error::NoMemory(_) => ErrorKind::NoMemory,
            Error::Backend(_) => ErrorKind::Backend,
            Error::BadState(_) => ErrorKind::BadState,
            Error::Connection(_) => ErrorKind::Connection,
            Error::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

/// Tag-only error classification for tests and wire DTOs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Invalid,
    NoEntity,
    Exists,
    NoMemory,
    Backend,
    BadState,
    Connection,
    Timeout,
}

crate::simple_display! {
    ErrorKind {
        Invalid => "invalid",
        NoEntity => "no-entity",
        Exists => "exists",
        NoMemory => "no-memory",
        Backend => "backend",
        BadState => "bad-state",
        Connection => "connection",
        Timeout => "timeout",
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
