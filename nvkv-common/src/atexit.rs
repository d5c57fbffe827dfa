// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Teardown callback registry.
//!
//! Stands in for the process-exit hook of the OS abstraction layer. Owners register callbacks while they are alive and
//! the application calls [`AtExit::run`] once on its shutdown path.

use std::{fmt::Debug, sync::Arc};

use parking_lot::Mutex;

/// Identity of a registered callback.
pub type CallbackId = u64;

type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

#[derive(Default)]
struct Inner {
    callbacks: Vec<(CallbackId, Callback)>,
    next: CallbackId,
}

/// Registry of teardown callbacks.
#[derive(Default)]
pub struct AtExit {
    inner: Mutex<Inner>,
}

impl Debug for AtExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AtExit")
            .field("callbacks", &inner.callbacks.iter().map(|(id, _)| *id).collect::<Vec<_>>())
            .finish()
    }
}

impl AtExit {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Callbacks run in registration order.
    pub fn register(&self, callback: impl Fn() + Send + Sync + 'static) -> CallbackId {
        let mut inner = self.inner.lock();
        let id = inner.next;
        inner.next += 1;
        inner.callbacks.push((id, Arc::new(callback)));
        tracing::trace!("[atexit]: register callback {id}");
        id
    }

    /// Unregister a callback. Returns `false` if it is not registered.
    pub fn unregister(&self, id: CallbackId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.callbacks.len();
        inner.callbacks.retain(|(i, _)| *i != id);
        let removed = inner.callbacks.len() != before;
        tracing::trace!("[atexit]: unregister callback {id}, removed: {removed}");
        removed
    }

    /// Count of registered callbacks.
    pub fn len(&self) -> usize {
        self.inner.lock().callbacks.len()
    }

    /// Returns `true` if no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain and invoke every registered callback, returning how many ran.
    ///
    /// The registry lock is released before the callbacks are invoked, so callbacks may register or unregister.
    pub fn run(&self) -> usize {
        let callbacks = std::mem::take(&mut self.inner.lock().callbacks);
        tracing::debug!("[atexit]: run {} callbacks", callbacks.len());
        for (_, callback) in callbacks.iter() {
            callback();
        }
        callbacks.len()
    }
}
