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

//! Shared components for the RAM and NVM tiers of nvkv.

/// Strict assertion helpers.
pub mod assert;
/// Teardown callback registry.
pub mod atexit;
/// Varint helpers over [`bytes::Buf`] and [`bytes::BufMut`].
pub mod buf;
/// Serialization descriptors.
pub mod code;
/// Collaborator error type.
pub mod error;
/// Reentrant concurrency guard.
pub mod guard;
/// Key hashing utility.
pub mod hasher;
