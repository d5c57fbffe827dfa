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


//! Device keeping its blobs in memory.

use std::{collections::HashMap, sync::Arc};

use nvkv_common::{
    error::{Error, ErrorKind, Result},
    hasher::HashKey,
};
use parking_lot::Mutex;

use super::{Device, DeviceConfig, MountCount, Partition};

#[derive(Debug, Default)]
struct Blobs {
    map: HashMap<HashKey, Box<[u8]>>,
    used: usize,
}

/// A partition of a [`MemDevice`].
#[derive(Debug)]
pub struct MemPartition {
    name: String,
    capacity: usize,
    mounts: MountCount,
    blobs: Mutex<Blobs>,
}

impl MemPartition {
    /// Count of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.lock().map.len()
    }

    /// Returns `true` if no blob is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn used(&self) -> usize {
        self.blobs.lock().used
    }
}

impl Partition for MemPartition {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, key: HashKey, value: &[u8]) -> Result<()> {
        self.mounts.check(&self.name)?;
        let mut blobs = self.blobs.lock();
        let replaced = blobs.map.get(&key).map(|blob| blob.len()).unwrap_or(0);
        let allocated = blobs.used - replaced;
        if allocated + value.len() > self.capacity {
            return Err(Error::no_space(self.capacity, allocated, value.len()).with_context("partition", &self.name));
        }
        blobs.map.insert(key, value.into());
        blobs.used = allocated + value.len();
        tracing::trace!("[mem device]: put {key} ({} bytes) into {}", value.len(), self.name);
        Ok(())
    }

    fn get(&self, key: HashKey, buf: &mut [u8]) -> Result<usize> {
        self.mounts.check(&self.name)?;
        let blobs = self.blobs.lock();
        let Some(blob) = blobs.map.get(&key) else {
            return Err(Error::new(ErrorKind::NotFound, "key not found")
                .with_context("partition", &self.name)
                .with_context("key", key));
        };
        if buf.len() < blob.len() {
            return Err(Error::buffer_size_limit(buf.len(), blob.len()).with_context("key", key));
        }
        buf[..blob.len()].copy_from_slice(blob);
        Ok(blob.len())
    }

    fn delete(&self, key: HashKey) -> Result<()> {
        self.mounts.check(&self.name)?;
        let mut blobs = self.blobs.lock();
        match blobs.map.remove(&key) {
            Some(blob) => {
                blobs.used -= blob.len();
                Ok(())
            }
            None => Err(Error::new(ErrorKind::NotFound, "key not found")
                .with_context("partition", &self.name)
                .with_context("key", key)),
        }
    }
}

/// Device simulating a key-value flash store in memory.
///
/// Blobs survive unmounting, so a partition can be remounted with its content intact.
#[derive(Debug)]
pub struct MemDevice {
    name: String,
    partitions: HashMap<String, Arc<MemPartition>>,
}

impl MemDevice {
    /// Open a device with the given layout.
    pub fn open(config: DeviceConfig) -> Result<Self> {
        config.verify()?;
        let partitions = config
            .partitions
            .iter()
            .map(|p| {
                let partition = MemPartition {
                    name: p.name.clone(),
                    capacity: p.capacity,
                    mounts: MountCount::default(),
                    blobs: Mutex::new(Blobs::default()),
                };
                (p.name.clone(), Arc::new(partition))
            })
            .collect();
        tracing::debug!("[mem device]: open {} with {:?}", config.name, config.partitions);
        Ok(Self {
            name: config.name,
            partitions,
        })
    }

    /// Get the partition named `name`, mounted or not.
    pub fn partition(&self, name: &str) -> Option<Arc<MemPartition>> {
        self.partitions.get(name).cloned()
    }

    fn require(&self, name: &str) -> Result<&Arc<MemPartition>> {
        self.partitions.get(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, "unknown partition")
                .with_context("device", &self.name)
                .with_context("partition", name)
        })
    }
}

impl Device for MemDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn mount(&self, partition: &str) -> Result<Arc<dyn Partition>> {
        let part = self.require(partition)?;
        let mounts = part.mounts.acquire();
        tracing::debug!("[mem device]: mount {}/{partition}, mounts: {mounts}", self.name);
        Ok(part.clone())
    }

    fn unmount(&self, partition: &str) -> Result<()> {
        let mounts = self.require(partition)?.mounts.release()?;
        tracing::debug!("[mem device]: unmount {}/{partition}, mounts: {mounts}", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::PartitionConfig;

    fn device() -> MemDevice {
        MemDevice::open(DeviceConfig::new("flash").with_partition(PartitionConfig::new("kv", 16))).unwrap()
    }

    #[test_log::test]
    fn test_put_get_delete() {
        let dev = device();
        let part = dev.mount("kv").unwrap();

        part.put(1, b"hello").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(part.get(1, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");

        assert_eq!(part.get(1, &mut [0u8; 2]).unwrap_err().kind(), ErrorKind::BufferSizeLimit);
        assert_eq!(part.get(2, &mut buf).unwrap_err().kind(), ErrorKind::NotFound);

        part.delete(1).unwrap();
        assert_eq!(part.delete(1).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(dev.partition("kv").unwrap().is_empty());
    }

    #[test]
    fn test_capacity() {
        let dev = device();
        let part = dev.mount("kv").unwrap();
        part.put(1, &[0; 10]).unwrap();
        assert_eq!(part.put(2, &[0; 7]).unwrap_err().kind(), ErrorKind::NoSpace);
        // Replacing a blob reuses its space.
        part.put(1, &[0; 16]).unwrap();
        assert_eq!(dev.partition("kv").unwrap().used(), 16);
        part.put(1, &[0; 4]).unwrap();
        part.put(2, &[0; 12]).unwrap();
        assert_eq!(dev.partition("kv").unwrap().used(), 16);
    }

    #[test]
    fn test_mount_lifecycle() {
        let dev = device();
        assert_eq!(dev.mount("other").unwrap_err().kind(), ErrorKind::NotFound);

        let part = dev.mount("kv").unwrap();
        part.put(7, b"kept").unwrap();
        dev.unmount("kv").unwrap();
        assert_eq!(part.put(8, b"x").unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(dev.unmount("kv").unwrap_err().kind(), ErrorKind::Closed);

        let part = dev.mount("kv").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(part.get(7, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"kept");
    }
}
