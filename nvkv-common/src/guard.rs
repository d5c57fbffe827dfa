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

//! The concurrency guard of a tier instance.
//!
//! Every public operation of a tier acquires the guard on entry and releases it on every exit path. The guard is
//! reentrant: an operation may call another public operation of the same tier while holding it. The guarded state
//! lives in a [`RefCell`], so a state borrow must be released before such a nested call.

use std::cell::RefCell;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Held guard of a [`Guard`]. Borrow the state with [`RefCell::borrow`] or [`RefCell::borrow_mut`].
pub type GuardLock<'a, T> = ReentrantMutexGuard<'a, RefCell<T>>;

/// Reentrant lock over the state of a tier.
#[derive(Debug, Default)]
pub struct Guard<T> {
    inner: ReentrantMutex<RefCell<T>>,
}

impl<T> Guard<T> {
    /// Create a guard over the given state.
    pub fn new(state: T) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(state)),
        }
    }

    /// Acquire the guard, blocking the current thread until it is available.
    ///
    /// Returns immediately if the current thread already holds it.
    pub fn lock(&self) -> GuardLock<'_, T> {
        self.inner.lock()
    }

    /// Run `f` with the state borrowed mutably under the guard.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let lock = self.inner.lock();
        let mut state = lock.borrow_mut();
        f(&mut state)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_guard_reentrant() {
        let guard = Guard::new(0usize);
        let outer = guard.lock();
        *outer.borrow_mut() += 1;
        {
            let inner = guard.lock();
            *inner.borrow_mut() += 1;
        }
        drop(outer);
        assert_eq!(guard.with(|v| *v), 2);
    }

    #[test]
    fn test_guard_serializes_threads() {
        let guard = Arc::new(Guard::new(Vec::new()));
        std::thread::scope(|s| {
            for t in 0..8 {
                let guard = guard.clone();
                s.spawn(move || {
                    for i in 0..100 {
                        guard.with(|v| {
                            v.push(t * 1000 + i);
                            v.push(t * 1000 + i + 1_000_000);
                        });
                    }
                });
            }
        });
        let v = guard.with(|v| v.clone());
        assert_eq!(v.len(), 8 * 100 * 2);
        // Pairs are never interleaved.
        for pair in v.chunks(2) {
            assert_eq!(pair[0] + 1_000_000, pair[1]);
        }
    }
}
