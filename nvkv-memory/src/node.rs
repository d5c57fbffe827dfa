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

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use nvkv_common::{
    code::Transcode,
    hasher::{HashKey, INVALID_HASH_KEY},
};
use parking_lot::Mutex;

use crate::{
    delegate::{memcpy_reader, memcpy_writer},
    flags::NodeFlags,
};

/// Copies `data` into the node's RAM storage (first argument). Returns `false` to reject the data.
pub type WriteFn = Arc<dyn Fn(&mut [u8], &[u8]) -> bool + Send + Sync + 'static>;
/// Copies a value out of `src` (first argument) into `dest`. Returns the copied length, or `None` on failure.
///
/// `src` is the node's RAM storage, or a transient buffer holding a value fetched from the NVM store.
pub type ReadFn = Arc<dyn Fn(&[u8], &mut [u8]) -> Option<usize> + Send + Sync + 'static>;
/// Reports whether the node's RAM storage holds a valid value.
pub type ValidateFn = Arc<dyn Fn(&[u8]) -> bool + Send + Sync + 'static>;
/// Scrubs a value in place.
pub type SanitizeFn = Arc<dyn Fn(&mut [u8]) + Send + Sync + 'static>;

/// Handle to the RAM storage of a node.
///
/// The handle is cheap to clone. The application keeps a clone to inspect the cached value, the tiers only touch the
/// bytes through the node's delegates.
#[derive(Clone)]
pub struct Datacache {
    inner: Arc<Mutex<Box<[u8]>>>,
}

impl Debug for Datacache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datacache").field("len", &self.len()).finish()
    }
}

impl Datacache {
    /// Create a zeroed storage of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self::from_bytes(&vec![0; size])
    }

    /// Create a storage initialized with `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            inner: Arc::new(Mutex::new(bytes.into())),
        }
    }

    /// Size of the storage in bytes.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if the storage has no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the current bytes out.
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().to_vec()
    }

    /// Run `f` over the current bytes.
    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Run `f` over the current bytes mutably.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

/// Static description of one logical key, supplied by the application.
///
/// [`NodeDescriptor::default`] is an invalid descriptor: it carries [`INVALID_HASH_KEY`] and no storage.
#[derive(Clone)]
pub struct NodeDescriptor {
    /// Identity of the value.
    pub key: HashKey,
    /// RAM storage of the value.
    pub datacache: Option<Datacache>,
    /// Serialization descriptor. Values without one are persisted as raw byte copies.
    pub transcoder: Option<Arc<dyn Transcode>>,
    /// Copies data into the RAM storage.
    pub writer: Option<WriteFn>,
    /// Copies data out of the RAM storage.
    pub reader: Option<ReadFn>,
    /// Reports whether the cached value is valid.
    pub validator: Option<ValidateFn>,
    /// Scrubs values on the read or write path, see [`NodeFlags::SANITIZE_ON_WRITE`] and
    /// [`NodeFlags::SANITIZE_ON_READ`].
    pub sanitizer: Option<SanitizeFn>,
    /// Size of the value in the RAM storage.
    pub data_size: usize,
    /// Policy flags.
    pub flags: NodeFlags,
}

impl Default for NodeDescriptor {
    fn default() -> Self {
        Self {
            key: INVALID_HASH_KEY,
            datacache: None,
            transcoder: None,
            writer: None,
            reader: None,
            validator: None,
            sanitizer: None,
            data_size: 0,
            flags: NodeFlags::VOLATILE,
        }
    }
}

impl Debug for NodeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("key", &self.key)
            .field("datacache", &self.datacache)
            .field("transcoder", &self.transcoder)
            .field("writer", &self.writer.is_some())
            .field("reader", &self.reader.is_some())
            .field("validator", &self.validator.is_some())
            .field("sanitizer", &self.sanitizer.is_some())
            .field("data_size", &self.data_size)
            .field("flags", &self.flags)
            .finish()
    }
}

impl NodeDescriptor {
    /// Describe a volatile raw value stored in `datacache`, copied in and out with the memcpy delegates.
    pub fn new(key: HashKey, datacache: Datacache) -> Self {
        Self {
            key,
            data_size: datacache.len(),
            datacache: Some(datacache),
            writer: Some(Arc::new(memcpy_writer)),
            reader: Some(Arc::new(memcpy_reader)),
            flags: NodeFlags::DEFAULT_VOLATILE,
            ..Default::default()
        }
    }

    /// Set the policy flags.
    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the size of the value. Defaults to the size of the storage.
    pub fn with_data_size(mut self, data_size: usize) -> Self {
        self.data_size = data_size;
        self
    }

    /// Set the serialization descriptor.
    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcode>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Set the writer delegate.
    pub fn with_writer(mut self, writer: impl Fn(&mut [u8], &[u8]) -> bool + Send + Sync + 'static) -> Self {
        self.writer = Some(Arc::new(writer));
        self
    }

    /// Set the reader delegate.
    pub fn with_reader(mut self, reader: impl Fn(&[u8], &mut [u8]) -> Option<usize> + Send + Sync + 'static) -> Self {
        self.reader = Some(Arc::new(reader));
        self
    }

    /// Set the validator delegate.
    pub fn with_validator(mut self, validator: impl Fn(&[u8]) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Set the sanitizer delegate.
    pub fn with_sanitizer(mut self, sanitizer: impl Fn(&mut [u8]) + Send + Sync + 'static) -> Self {
        self.sanitizer = Some(Arc::new(sanitizer));
        self
    }

    /// Returns `true` if the descriptor can be accepted by a tier.
    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    fn check(&self) -> Result<(), &'static str> {
        if self.key == INVALID_HASH_KEY {
            return Err("invalid key");
        }
        let Some(datacache) = self.datacache.as_ref() else {
            return Err("no datacache");
        };
        if self.data_size == 0 {
            return Err("zero data size");
        }
        if self.data_size > datacache.len() {
            return Err("data size exceeds datacache");
        }
        if self.writer.is_none() || self.reader.is_none() {
            return Err("missing writer or reader");
        }
        if let Some(transcoder) = self.transcoder.as_ref() {
            if self.data_size.checked_add(transcoder.max_encoded_len()).is_none() {
                return Err("transcode size overflow");
            }
        }
        Ok(())
    }
}

/// A node accepted into a node table.
///
/// All fields except the flags are immutable. The flags are updated by the tiers while they hold their guard; a
/// [`Node`] handle returned by `find` observes later updates.
pub struct Node {
    key: HashKey,
    datacache: Datacache,
    transcoder: Option<Arc<dyn Transcode>>,
    writer: WriteFn,
    reader: ReadFn,
    validator: Option<ValidateFn>,
    sanitizer: Option<SanitizeFn>,
    data_size: usize,
    flags: AtomicU32,
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("data_size", &self.data_size)
            .field("transcoder", &self.transcoder)
            .field("flags", &self.flags())
            .finish()
    }
}

impl Node {
    /// Validate a descriptor and turn it into a node. Runtime flags of the descriptor are dropped.
    pub fn from_descriptor(desc: NodeDescriptor) -> Option<Self> {
        if let Err(reason) = desc.check() {
            tracing::debug!("[node]: reject node {}: {reason}", desc.key);
            return None;
        }
        let NodeDescriptor {
            key,
            datacache,
            transcoder,
            writer,
            reader,
            validator,
            sanitizer,
            data_size,
            flags,
        } = desc;
        Some(Self {
            key,
            datacache: datacache?,
            transcoder,
            writer: writer?,
            reader: reader?,
            validator,
            sanitizer,
            data_size,
            flags: AtomicU32::new(flags.difference(NodeFlags::RUNTIME).bits()),
        })
    }

    /// Identity of the value.
    pub fn key(&self) -> HashKey {
        self.key
    }

    /// Size of the value in the RAM storage.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// RAM storage of the value.
    pub fn datacache(&self) -> &Datacache {
        &self.datacache
    }

    /// Serialization descriptor of the value.
    pub fn transcoder(&self) -> Option<&Arc<dyn Transcode>> {
        self.transcoder.as_ref()
    }

    /// Current flags.
    pub fn flags(&self) -> NodeFlags {
        NodeFlags::from_bits_retain(self.flags.load(Ordering::Acquire))
    }

    /// Returns `true` if all of `flags` are set.
    pub fn contains(&self, flags: NodeFlags) -> bool {
        self.flags().contains(flags)
    }

    /// Set runtime flags.
    pub fn set_flags(&self, flags: NodeFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Clear runtime flags.
    pub fn clear_flags(&self, flags: NodeFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Scratch bytes needed to hold the raw form and the serialized form side by side.
    ///
    /// Descriptors whose sum overflows `usize` are rejected, so this never overflows.
    pub fn scratch_len(&self) -> usize {
        match self.transcoder.as_ref() {
            Some(transcoder) => self.data_size + transcoder.max_encoded_len(),
            None => self.data_size,
        }
    }

    /// Run the sanitizer over `buf`. Returns `false` if the node has no sanitizer.
    pub fn sanitize(&self, buf: &mut [u8]) -> bool {
        match self.sanitizer.as_ref() {
            Some(sanitizer) => {
                sanitizer(buf);
                true
            }
            None => false,
        }
    }

    /// Commit `data` into the RAM storage through the writer and refresh [`NodeFlags::VALID`].
    pub(crate) fn write(&self, data: &[u8]) -> bool {
        let (written, valid) = self.datacache.with_mut(|cache| {
            let cache = &mut cache[..self.data_size];
            if !(self.writer)(cache, data) {
                return (false, false);
            }
            let valid = self.validator.as_ref().map(|validate| validate(cache)).unwrap_or(true);
            (true, valid)
        });
        if written {
            if valid {
                self.set_flags(NodeFlags::VALID);
            } else {
                self.clear_flags(NodeFlags::VALID);
            }
        }
        written
    }

    /// Copy the cached value into `out` through the reader.
    pub(crate) fn read(&self, out: &mut [u8]) -> Option<usize> {
        self.datacache.with(|cache| (self.reader)(&cache[..self.data_size], out))
    }

    /// Copy a value held in `src` into `out` through the reader, without touching the RAM storage.
    pub(crate) fn read_from(&self, src: &[u8], out: &mut [u8]) -> Option<usize> {
        (self.reader)(src, out)
    }
}
