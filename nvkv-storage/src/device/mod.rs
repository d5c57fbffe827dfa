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


//! Non-volatile key-value device contract.
//!
//! A device exposes named partitions. A mounted partition stores one opaque blob per [`HashKey`].

pub mod fs;
pub mod mem;

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use nvkv_common::{
    error::{Error, ErrorKind, Result},
    hasher::HashKey,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Layout of a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Partition name.
    pub name: String,
    /// Maximum count of stored bytes.
    pub capacity: usize,
}

impl PartitionConfig {
    /// Create a partition layout.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

/// Layout of a device: its name and the partitions it exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name.
    pub name: String,
    /// Partitions of the device.
    #[serde(default)]
    pub partitions: Vec<PartitionConfig>,
}

impl DeviceConfig {
    /// Create a device layout without partitions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: vec![],
        }
    }

    /// Add a partition.
    pub fn with_partition(mut self, partition: PartitionConfig) -> Self {
        self.partitions.push(partition);
        self
    }

    /// Find the layout of the partition named `name`.
    pub fn partition(&self, name: &str) -> Option<&PartitionConfig> {
        self.partitions.iter().find(|p| p.name == name)
    }

    pub(crate) fn verify(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::new(ErrorKind::Config, "empty device name"));
        }
        for (i, partition) in self.partitions.iter().enumerate() {
            if partition.name.is_empty() {
                return Err(Error::new(ErrorKind::Config, "empty partition name").with_context("device", &self.name));
            }
            if self.partitions[..i].iter().any(|p| p.name == partition.name) {
                return Err(Error::new(ErrorKind::Config, "duplicate partition")
                    .with_context("device", &self.name)
                    .with_context("partition", &partition.name));
            }
        }
        Ok(())
    }
}

/// A mounted partition of a [`Device`].
pub trait Partition: Send + Sync + Debug + 'static {
    /// Partition name.
    fn name(&self) -> &str;

    /// Store `value` under `key`, replacing the previous blob.
    fn put(&self, key: HashKey, value: &[u8]) -> Result<()>;

    /// Copy the blob of `key` into `buf`. Returns the blob length.
    ///
    /// Fails with [`ErrorKind::NotFound`] if the key is absent and [`ErrorKind::BufferSizeLimit`] if `buf` is too
    /// small.
    fn get(&self, key: HashKey, buf: &mut [u8]) -> Result<usize>;

    /// Delete the blob of `key`.
    fn delete(&self, key: HashKey) -> Result<()>;
}

/// A non-volatile key-value device.
pub trait Device: Send + Sync + Debug + 'static {
    /// Device name.
    fn name(&self) -> &str;

    /// Mount the partition named `partition`.
    ///
    /// Mounting is counted. A partition stays usable until every mount is released.
    fn mount(&self, partition: &str) -> Result<Arc<dyn Partition>>;

    /// Release one mount of the partition named `partition`.
    fn unmount(&self, partition: &str) -> Result<()>;
}

/// Devices registered by name.
#[derive(Debug, Default)]
pub struct DeviceTable {
    devices: RwLock<HashMap<String, Arc<dyn Device>>>,
}

impl DeviceTable {
    /// Create an empty device table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device under its name.
    pub fn register(&self, device: Arc<dyn Device>) -> Result<()> {
        let mut devices = self.devices.write();
        let name = device.name().to_string();
        if devices.contains_key(&name) {
            return Err(Error::new(ErrorKind::Config, "device already registered").with_context("device", name));
        }
        tracing::debug!("[device table]: register device {name}");
        devices.insert(name, device);
        Ok(())
    }

    /// Get the device named `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Device>> {
        self.devices.read().get(name).cloned()
    }

    /// Count of registered devices.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// Returns `true` if no device is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the device named `device` and mount its partition named `partition`.
    pub fn mount(&self, device: &str, partition: &str) -> Result<(Arc<dyn Device>, Arc<dyn Partition>)> {
        let dev = self
            .get(device)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "unknown device").with_context("device", device))?;
        let part = dev.mount(partition)?;
        Ok((dev, part))
    }
}

/// Mount bookkeeping shared by the stock devices.
#[derive(Debug, Default)]
pub(crate) struct MountCount {
    count: parking_lot::Mutex<usize>,
}

impl MountCount {
    pub(crate) fn acquire(&self) -> usize {
        let mut count = self.count.lock();
        *count += 1;
        *count
    }

    pub(crate) fn release(&self) -> Result<usize> {
        let mut count = self.count.lock();
        if *count == 0 {
            return Err(Error::new(ErrorKind::Closed, "partition not mounted"));
        }
        *count -= 1;
        Ok(*count)
    }

    pub(crate) fn check(&self, partition: &str) -> Result<()> {
        if *self.count.lock() == 0 {
            return Err(Error::new(ErrorKind::Closed, "partition not mounted").with_context("partition", partition));
        }
        Ok(())
    }
}
