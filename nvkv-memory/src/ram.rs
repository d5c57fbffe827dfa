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

use std::{fmt::Debug, sync::Arc};

use nvkv_common::{guard::Guard, hasher::HashKey, strict_assert};

use crate::{
    error::{DbError, DbResult},
    flags::NodeFlags,
    node::{Node, NodeDescriptor},
    table::{NodeStorage, NodeTable},
};

/// Configuration of a [`RamKvdb`].
#[derive(Debug, Default)]
pub struct RamKvdbConfig {
    /// Storage for the node descriptors, possibly pre-populated.
    pub node_storage: Option<NodeStorage>,
    /// Scratch buffer shared by all transcoding operations.
    pub transcode_buffer: Option<Box<[u8]>>,
}

struct State {
    table: NodeTable,
    scratch: Box<[u8]>,
}

impl Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("table", &self.table)
            .field("scratch", &self.scratch.len())
            .finish()
    }
}

/// The volatile tier: a RAM cache of typed values described by nodes.
///
/// All operations serialize on one reentrant guard. The scratch buffer is reused by every transcoding operation, so
/// the bytes handed to the closures of [`RamKvdb::with_encoded`], [`RamKvdb::load_with`] and
/// [`RamKvdb::fetch_with`] must not be retained past the call. Delegates may call back into the tier, but a
/// transcoding operation nested in another one fails.
#[derive(Debug, Default)]
pub struct RamKvdb {
    guard: Guard<Option<State>>,
}

impl RamKvdb {
    /// Create an unconfigured tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the tier. Succeeds once.
    ///
    /// Every pre-populated descriptor is validated and ordered into the node table.
    pub fn configure(&self, config: RamKvdbConfig) -> DbResult<()> {
        let lock = self.guard.lock();
        let mut state = lock.borrow_mut();

        if state.is_some() {
            tracing::warn!("[ram kvdb]: already configured");
            return Err(DbError::NotAvailable);
        }

        let Some(storage) = config.node_storage.filter(|storage| storage.capacity() > 0) else {
            tracing::warn!("[ram kvdb]: missing node storage");
            return Err(DbError::BadArg);
        };
        let Some(scratch) = config.transcode_buffer.filter(|buffer| !buffer.is_empty()) else {
            tracing::warn!("[ram kvdb]: missing transcode buffer");
            return Err(DbError::BadArg);
        };

        let mut table = NodeTable::with_capacity(storage.capacity());
        for desc in storage.into_descriptors() {
            let key = desc.key;
            let Some(node) = Node::from_descriptor(desc) else {
                tracing::warn!("[ram kvdb]: invalid node {key}");
                return Err(DbError::BadArg);
            };
            if node.scratch_len() > scratch.len() {
                tracing::warn!(
                    "[ram kvdb]: node {key} needs {} transcode bytes, buffer has {}",
                    node.scratch_len(),
                    scratch.len()
                );
                return Err(DbError::TranscodeBufferTooSmall);
            }
            if !table.insert(node) {
                tracing::warn!("[ram kvdb]: duplicate node {key}");
                return Err(DbError::BadArg);
            }
        }

        tracing::debug!(
            "[ram kvdb]: configured with {} nodes, capacity {}, transcode buffer {} bytes",
            table.len(),
            table.capacity(),
            scratch.len()
        );
        *state = Some(State { table, scratch });
        Ok(())
    }

    /// Returns `true` if the tier has been configured.
    pub fn is_configured(&self) -> bool {
        self.guard.with(|state| state.is_some())
    }

    /// Insert a node.
    ///
    /// Returns `false` if the tier is not configured, the node is invalid, its key already exists, the table is full,
    /// or the transcode buffer cannot serve the node.
    pub fn insert(&self, desc: NodeDescriptor) -> bool {
        let lock = self.guard.lock();
        let mut state = lock.borrow_mut();
        let Some(state) = state.as_mut() else {
            tracing::debug!("[ram kvdb]: insert before configure");
            return false;
        };
        let Some(node) = Node::from_descriptor(desc) else {
            return false;
        };
        if node.scratch_len() > state.scratch.len() {
            tracing::debug!(
                "[ram kvdb]: reject node {}: needs {} transcode bytes, buffer has {}",
                node.key(),
                node.scratch_len(),
                state.scratch.len()
            );
            return false;
        }
        state.table.insert(node)
    }

    /// Remove the node of `key`. Returns `false` if it does not exist.
    pub fn remove(&self, key: HashKey) -> bool {
        self.guard
            .with(|state| state.as_mut().and_then(|state| state.table.remove(key)))
            .is_some()
    }

    /// Returns `true` if a node of `key` exists.
    pub fn exists(&self, key: HashKey) -> bool {
        self.find(key).is_some()
    }

    /// Find the node of `key`.
    pub fn find(&self, key: HashKey) -> Option<Arc<Node>> {
        self.guard
            .with(|state| state.as_ref().and_then(|state| state.table.find(key).cloned()))
    }

    /// Node at `index` in key order.
    pub fn nth(&self, index: usize) -> Option<Arc<Node>> {
        self.guard
            .with(|state| state.as_ref().and_then(|state| state.table.get(index).cloned()))
    }

    /// Count of nodes.
    pub fn len(&self) -> usize {
        self.guard
            .with(|state| state.as_ref().map(|state| state.table.len()).unwrap_or(0))
    }

    /// Returns `true` if there is no node.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the node of `key` holds a value accepted by its validator.
    pub fn is_valid(&self, key: HashKey) -> bool {
        self.find(key).is_some_and(|node| node.contains(NodeFlags::VALID))
    }

    fn node(&self, key: HashKey) -> Option<Arc<Node>> {
        let node = self.find(key);
        if node.is_none() {
            tracing::debug!("[ram kvdb]: node {key} not found");
        }
        node
    }

    /// Copy the cached value of `key` into `out` through the node's reader.
    pub fn read(&self, key: HashKey, out: &mut [u8]) -> Option<usize> {
        let _lock = self.guard.lock();
        let node = self.node(key)?;
        let read = node.read(out);
        if read.is_none() {
            tracing::debug!("[ram kvdb]: reader of node {key} failed, out len: {}", out.len());
        }
        read
    }

    /// Commit `data` into the cache of `key` through the node's writer. Returns `data.len()` on success.
    pub fn write(&self, key: HashKey, data: &[u8]) -> Option<usize> {
        let _lock = self.guard.lock();
        let node = self.node(key)?;
        if !node.write(data) {
            tracing::debug!("[ram kvdb]: writer of node {key} rejected {} bytes", data.len());
            return None;
        }
        Some(data.len())
    }

    /// Serialize the cached value of `key` into `out` through the node's serialization descriptor.
    ///
    /// Returns the encoded length.
    pub fn encode(&self, key: HashKey, out: &mut [u8]) -> Option<usize> {
        if out.is_empty() {
            return None;
        }
        self.with_state(key, true, |node, scratch| {
            let transcoder = node.transcoder()?;
            let raw = &mut scratch[..node.data_size()];
            raw.fill(0);
            node.read(raw)?;
            transcoder
                .encode(raw, out)
                .inspect_err(|e| tracing::debug!("[ram kvdb]: encode node {} failed: {e}", node.key()))
                .ok()
        })
    }

    /// Deserialize `wire` into the cache of `key` through the node's serialization descriptor.
    ///
    /// Returns the size of the value committed into the cache.
    pub fn decode(&self, key: HashKey, wire: &[u8]) -> Option<usize> {
        if wire.is_empty() {
            return None;
        }
        self.with_state(key, true, |node, scratch| {
            let transcoder = node.transcoder()?;
            let raw = &mut scratch[..node.data_size()];
            let len = transcoder
                .decode(wire, raw)
                .inspect_err(|e| tracing::debug!("[ram kvdb]: decode node {} failed: {e}", node.key()))
                .ok()?;
            node.write(&raw[..len]).then_some(len)
        })
    }

    /// Serialize the cached value of `key` into the scratch buffer and hand the stored form to `f`.
    ///
    /// Nodes with a serialization descriptor hand over their encoded form, the others a raw copy of their value.
    pub fn with_encoded<R>(&self, key: HashKey, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        self.with_state(key, false, |node, scratch| {
            let (raw, wire) = scratch.split_at_mut(node.data_size());
            match node.transcoder() {
                Some(transcoder) => {
                    raw.fill(0);
                    node.read(raw)?;
                    let len = transcoder
                        .encode(raw, wire)
                        .inspect_err(|e| tracing::debug!("[ram kvdb]: encode node {} failed: {e}", node.key()))
                        .ok()?;
                    Some(f(&wire[..len]))
                }
                None => {
                    let len = node.read(raw)?;
                    Some(f(&raw[..len]))
                }
            }
        })
    }

    /// Fill the scratch buffer with the stored form of `key` through `fill` and commit it into the cache.
    ///
    /// `fill` returns the count of bytes it wrote. Returns the size committed into the cache.
    pub fn load_with(&self, key: HashKey, fill: impl FnOnce(&mut [u8]) -> Option<usize>) -> Option<usize> {
        self.with_state(key, false, |node, scratch| {
            let (raw, wire) = scratch.split_at_mut(node.data_size());
            match node.transcoder() {
                Some(transcoder) => {
                    let filled = fill(wire)?;
                    let len = transcoder
                        .decode(&wire[..filled], raw)
                        .inspect_err(|e| tracing::debug!("[ram kvdb]: decode node {} failed: {e}", node.key()))
                        .ok()?;
                    node.write(&raw[..len]).then_some(len)
                }
                None => {
                    let filled = fill(raw)?;
                    node.write(&raw[..filled]).then_some(filled)
                }
            }
        })
    }

    /// Fill the scratch buffer with the stored form of `key` through `fill` and copy the value into `out` through
    /// the node's reader. The cache is not touched.
    pub fn fetch_with(
        &self,
        key: HashKey,
        out: &mut [u8],
        fill: impl FnOnce(&mut [u8]) -> Option<usize>,
    ) -> Option<usize> {
        self.with_state(key, false, |node, scratch| {
            let (raw, wire) = scratch.split_at_mut(node.data_size());
            match node.transcoder() {
                Some(transcoder) => {
                    let filled = fill(wire)?;
                    let len = transcoder
                        .decode(&wire[..filled], raw)
                        .inspect_err(|e| tracing::debug!("[ram kvdb]: decode node {} failed: {e}", node.key()))
                        .ok()?;
                    node.read_from(&raw[..len], out)
                }
                None => {
                    let filled = fill(raw)?;
                    node.read_from(&raw[..filled], out)
                }
            }
        })
    }

    /// Resolve the node of `key` and run `f` with it and the scratch buffer under the guard.
    ///
    /// With `require_transcoder`, nodes without a serialization descriptor are rejected. A descriptor generated for a
    /// layout of another size than the node is always rejected.
    ///
    /// The scratch buffer is taken out of the state while `f` runs, so the delegates `f` invokes may call back into
    /// the tier. A nested transcoding operation finds the buffer in use and fails.
    fn with_state<R>(
        &self,
        key: HashKey,
        require_transcoder: bool,
        f: impl FnOnce(&Node, &mut [u8]) -> Option<R>,
    ) -> Option<R> {
        let lock = self.guard.lock();
        let (node, mut scratch) = {
            let mut state = lock.borrow_mut();
            let Some(state) = state.as_mut() else {
                tracing::debug!("[ram kvdb]: access node {key} before configure");
                return None;
            };
            let Some(node) = state.table.find(key).cloned() else {
                tracing::debug!("[ram kvdb]: node {key} not found");
                return None;
            };
            match node.transcoder() {
                None if require_transcoder => {
                    tracing::debug!("[ram kvdb]: node {key} has no serialization descriptor");
                    return None;
                }
                Some(transcoder) if transcoder.raw_len() != node.data_size() => {
                    tracing::debug!(
                        "[ram kvdb]: node {key} descriptor mismatch, layout: {}, data size: {}",
                        transcoder.raw_len(),
                        node.data_size()
                    );
                    return None;
                }
                _ => {}
            }
            if state.scratch.is_empty() {
                tracing::debug!("[ram kvdb]: transcode buffer in use, reject node {key}");
                return None;
            }
            (node, std::mem::take(&mut state.scratch))
        };

        strict_assert!(node.scratch_len() <= scratch.len());
        let res = f(&node, &mut scratch[..]);

        if let Some(state) = lock.borrow_mut().as_mut() {
            state.scratch = scratch;
        }
        res
    }

    /// No-op. The RAM tier has no backing store.
    pub fn sync(&self) {}

    /// No-op. The RAM tier has no backing store.
    pub fn flush(&self) {}

    /// No-op. The RAM tier has no backing store.
    pub fn deinit(&self) {}
}
