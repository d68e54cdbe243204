// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed listener lists.
//!
//! Every entity (node, port, link, and the context itself) carries a
//! `Hooks<E>`. Emission dispatches in registration order to every listener
//! whose version covers the event. Removal is legal at any time, including
//! from inside a callback during emission: the entry is marked dead and
//! reaped once the outermost emission finishes.

use parking_lot::Mutex;
use std::sync::Arc;

/// Handle returned by [`Hooks::add`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookToken(u64);

struct Entry<E> {
    token: u64,
    version: u32,
    dead: bool,
    // Taken out while the callback runs so emission holds no lock.
    callback: Option<Box<dyn FnMut(&E) + Send>>,
}

struct Inner<E> {
    entries: Vec<Entry<E>>,
    next_token: u64,
    emitting: u32,
}

/// A versioned listener list. Cheap to clone; clones share the same list.
pub struct Hooks<E> {
    inner: Arc<Mutex<Inner<E>>>,
}

impl<E> Clone for Hooks<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<E> Default for Hooks<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Hooks<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: Vec::new(),
                next_token: 1,
                emitting: 0,
            })),
        }
    }

    /// Subscribe a listener. `version` is the highest event revision the
    /// listener understands.
    pub fn add(&self, version: u32, callback: impl FnMut(&E) + Send + 'static) -> HookToken {
        let mut inner = self.inner.lock();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.entries.push(Entry {
            token,
            version,
            dead: false,
            callback: Some(Box::new(callback)),
        });
        HookToken(token)
    }

    /// Unsubscribe. Safe during emission: the slot is marked dead and
    /// reaped after the iteration that is currently running.
    pub fn remove(&self, token: HookToken) {
        let mut inner = self.inner.lock();
        if inner.emitting > 0 {
            if let Some(entry) = inner.entries.iter_mut().find(|e| e.token == token.0) {
                entry.dead = true;
            }
        } else {
            inner.entries.retain(|e| e.token != token.0);
        }
    }

    /// Emit to every live listener, in registration order.
    pub fn emit(&self, event: &E) {
        self.emit_versioned(event, 0);
    }

    /// Emit to listeners whose version covers `required`.
    pub fn emit_versioned(&self, event: &E, required: u32) {
        let tokens: Vec<u64> = {
            let mut inner = self.inner.lock();
            inner.emitting += 1;
            inner
                .entries
                .iter()
                .filter(|e| !e.dead && e.version >= required)
                .map(|e| e.token)
                .collect()
        };

        for token in tokens {
            let callback = {
                let mut inner = self.inner.lock();
                match inner.entries.iter_mut().find(|e| e.token == token) {
                    Some(entry) if !entry.dead => entry.callback.take(),
                    _ => None,
                }
            };
            if let Some(mut callback) = callback {
                callback(event);
                let mut inner = self.inner.lock();
                if let Some(entry) = inner.entries.iter_mut().find(|e| e.token == token) {
                    entry.callback = Some(callback);
                }
            }
        }

        let mut inner = self.inner.lock();
        inner.emitting -= 1;
        if inner.emitting == 0 {
            inner.entries.retain(|e| !e.dead);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.iter().filter(|e| !e.dead).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
