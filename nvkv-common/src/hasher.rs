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

//! Derive [`HashKey`]s from names or arbitrary byte buffers.

use twox_hash::XxHash32;

/// Integer identity of a stored value.
pub type HashKey = u32;

/// Reserved key meaning "no key". Never a valid application key.
pub const INVALID_HASH_KEY: HashKey = HashKey::MAX;

const SEED: u32 = 0;

/// Hash an arbitrary byte buffer into a [`HashKey`].
///
/// The hash is deterministic across runs and processes, which is required because the derived keys are persisted.
/// It is not cryptographic and collisions are tolerated: callers that register colliding names will see `insert`
/// reject the second node.
///
/// [`INVALID_HASH_KEY`] is never returned.
pub fn hash(bytes: &[u8]) -> HashKey {
    let key = XxHash32::oneshot(SEED, bytes);
    if key == INVALID_HASH_KEY {
        INVALID_HASH_KEY - 1
    } else {
        key
    }
}

/// Hash a human-readable name into a [`HashKey`].
pub fn hash_str(name: &str) -> HashKey {
    hash(name.as_bytes())
}
