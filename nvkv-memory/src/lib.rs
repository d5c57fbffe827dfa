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


//! RAM tier of nvkv.
//!
//! A [`RamKvdb`](crate::ram::RamKvdb) keeps typed values in caller-provided byte buffers. Each value is described by a
//! node: its key, its cache, the delegates that move bytes in and out of the cache, an optional serialization
//! descriptor, and its policy flags.

/// Stock delegates.
pub mod delegate;
/// Configuration errors.
pub mod error;
/// Node policy flags.
pub mod flags;
/// Nodes and their descriptors.
pub mod node;
/// The RAM tier.
pub mod ram;
/// Compile-time sized tier storage.
pub mod storage;
/// Node storage and the ordered node table.
pub mod table;

/// Re-exports of the commonly used types.
pub mod prelude;
