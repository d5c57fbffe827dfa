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


//! Device keeping one file per key on a filesystem.

use std::{
    collections::HashMap,
    fs::{create_dir_all, read_dir, remove_file, rename, File},
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use nvkv_common::{
    error::{Error, ErrorKind, Result},
    hasher::HashKey,
};
use parking_lot::Mutex;

use super::{Device, DeviceConfig, MountCount, Partition};

const TMP_SUFFIX: &str = "tmp";

/// Sizes of the stored blobs, indexed once when the device is opened.
#[derive(Debug, Default)]
struct Usage {
    sizes: HashMap<HashKey, usize>,
    used: usize,
}

/// A partition of an [`FsDevice`], stored as a directory.
#[derive(Debug)]
pub struct FsPartition {
    name: String,
    dir: PathBuf,
    capacity: usize,
    mounts: MountCount,
    usage: Mutex<Usage>,
}

impl FsPartition {
    fn path(&self, key: HashKey) -> PathBuf {
        self.dir.join(format!("{key:08x}"))
    }

    fn tmp_path(&self, key: HashKey) -> PathBuf {
        self.dir.join(format!("{key:08x}.{TMP_SUFFIX}"))
    }

    fn open(name: &str, dir: PathBuf, capacity: usize) -> Result<Self> {
        create_dir_all(&dir)?;
        let mut usage = Usage::default();
        for entry in read_dir(&dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            // Leftover temp files do not parse.
            let Some(key) = file_name.to_str().and_then(|n| HashKey::from_str_radix(n, 16).ok()) else {
                continue;
            };
            let size = entry.metadata()?.len() as usize;
            usage.sizes.insert(key, size);
            usage.used += size;
        }
        tracing::debug!(
            "[fs device]: index {dir:?}, blobs: {}, used: {}",
            usage.sizes.len(),
            usage.used
        );
        Ok(Self {
            name: name.to_string(),
            dir,
            capacity,
            mounts: MountCount::default(),
            usage: Mutex::new(usage),
        })
    }
}

impl Partition for FsPartition {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, key: HashKey, value: &[u8]) -> Result<()> {
        self.mounts.check(&self.name)?;
        let mut usage = self.usage.lock();
        let replaced = usage.sizes.get(&key).copied().unwrap_or(0);
        let allocated = usage.used - replaced;
        if allocated + value.len() > self.capacity {
            return Err(Error::no_space(self.capacity, allocated, value.len()).with_context("partition", &self.name));
        }

        let tmp = self.tmp_path(key);
        let mut file = File::create(&tmp)?;
        file.write_all(value)?;
        file.sync_data()?;
        drop(file);
        rename(&tmp, self.path(key))?;
        usage.sizes.insert(key, value.len());
        usage.used = allocated + value.len();

        tracing::trace!(
            "[fs device]: put {key} ({} bytes) into {:?}, used: {}",
            value.len(),
            self.dir,
            usage.used
        );
        Ok(())
    }

    fn get(&self, key: HashKey, buf: &mut [u8]) -> Result<usize> {
        self.mounts.check(&self.name)?;
        let mut file = File::open(self.path(key)).map_err(|e| Error::io_error(e).with_context("key", key))?;
        let len = file.metadata()?.len() as usize;
        if buf.len() < len {
            return Err(Error::buffer_size_limit(buf.len(), len).with_context("key", key));
        }
        file.read_exact(&mut buf[..len])?;
        Ok(len)
    }

    fn delete(&self, key: HashKey) -> Result<()> {
        self.mounts.check(&self.name)?;
        let mut usage = self.usage.lock();
        remove_file(self.path(key)).map_err(|e| Error::io_error(e).with_context("key", key))?;
        if let Some(size) = usage.sizes.remove(&key) {
            usage.used -= size;
        }
        Ok(())
    }
}

/// Device storing each partition as a directory under a root path.
#[derive(Debug)]
pub struct FsDevice {
    name: String,
    root: PathBuf,
    partitions: HashMap<String, Arc<FsPartition>>,
}

impl FsDevice {
    /// Open a device rooted at `root` with the given layout.
    pub fn open(root: impl AsRef<Path>, config: DeviceConfig) -> Result<Self> {
        config.verify()?;
        let root = root.as_ref().to_path_buf();
        create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(Error::new(ErrorKind::Config, "device root is not a directory")
                .with_source(anyhow::anyhow!("{}", root.display())));
        }

        let mut partitions = HashMap::with_capacity(config.partitions.len());
        for p in config.partitions.iter() {
            let partition = FsPartition::open(&p.name, root.join(&p.name), p.capacity)?;
            partitions.insert(p.name.clone(), Arc::new(partition));
        }

        tracing::debug!("[fs device]: open {} at {root:?}", config.name);
        Ok(Self {
            name: config.name,
            root,
            partitions,
        })
    }

    /// Root directory of the device.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn require(&self, name: &str) -> Result<&Arc<FsPartition>> {
        self.partitions.get(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, "unknown partition")
                .with_context("device", &self.name)
                .with_context("partition", name)
        })
    }
}

impl Device for FsDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn mount(&self, partition: &str) -> Result<Arc<dyn Partition>> {
        let part = self.require(partition)?;
        let mounts = part.mounts.acquire();
        tracing::debug!("[fs device]: mount {:?}, mounts: {mounts}", part.dir);
        Ok(part.clone())
    }

    fn unmount(&self, partition: &str) -> Result<()> {
        let part = self.require(partition)?;
        let mounts = part.mounts.release()?;
        tracing::debug!("[fs device]: unmount {:?}, mounts: {mounts}", part.dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::PartitionConfig;

    fn config() -> DeviceConfig {
        DeviceConfig::new("disk").with_partition(PartitionConfig::new("kv", 32))
    }

    #[test_log::test]
    fn test_fs_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let dev = FsDevice::open(dir.path(), config()).unwrap();
        let part = dev.mount("kv").unwrap();

        part.put(0xabc, b"persisted").unwrap();
        assert!(dir.path().join("kv").join("00000abc").is_file());

        let mut buf = [0u8; 16];
        assert_eq!(part.get(0xabc, &mut buf).unwrap(), 9);
        assert_eq!(&buf[..9], b"persisted");
        assert_eq!(part.get(0xabc, &mut [0u8; 4]).unwrap_err().kind(), ErrorKind::BufferSizeLimit);

        part.delete(0xabc).unwrap();
        assert_eq!(part.get(0xabc, &mut buf).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(part.delete(0xabc).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_fs_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let dev = FsDevice::open(dir.path(), config()).unwrap();
        let part = dev.mount("kv").unwrap();
        part.put(1, &[1; 20]).unwrap();
        assert_eq!(part.put(2, &[2; 13]).unwrap_err().kind(), ErrorKind::NoSpace);
        part.put(1, &[1; 32]).unwrap();
    }

    #[test]
    fn test_fs_usage_indexed_on_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let dev = FsDevice::open(dir.path(), config()).unwrap();
            let part = dev.mount("kv").unwrap();
            part.put(1, &[1; 12]).unwrap();
            part.put(2, &[2; 8]).unwrap();
            part.put(2, &[2; 4]).unwrap();
        }
        // Leftover of an interrupted put.
        std::fs::write(dir.path().join("kv").join("00000003.tmp"), [3; 30]).unwrap();

        let dev = FsDevice::open(dir.path(), config()).unwrap();
        let part = dev.require("kv").unwrap().clone();
        assert_eq!(part.usage.lock().sizes.len(), 2);
        assert_eq!(part.usage.lock().used, 16);

        dev.mount("kv").unwrap();
        assert_eq!(part.put(3, &[3; 17]).unwrap_err().kind(), ErrorKind::NoSpace);
        part.put(3, &[3; 16]).unwrap();
        assert_eq!(part.usage.lock().used, 32);
        part.delete(1).unwrap();
        assert_eq!(part.usage.lock().used, 20);
        assert!(part.delete(1).is_err());
        assert_eq!(part.usage.lock().used, 20);
    }

    #[test]
    fn test_fs_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let dev = FsDevice::open(dir.path(), config()).unwrap();
            let part = dev.mount("kv").unwrap();
            part.put(5, &42u32.to_le_bytes()).unwrap();
            dev.unmount("kv").unwrap();
            assert_eq!(part.put(6, b"x").unwrap_err().kind(), ErrorKind::Closed);
        }

        let dev = FsDevice::open(dir.path(), config()).unwrap();
        assert_eq!(dev.root(), dir.path());
        assert_eq!(dev.mount("missing").unwrap_err().kind(), ErrorKind::NotFound);
        let part = dev.mount("kv").unwrap();
        let mut buf = [0u8; 4];
        part.get(5, &mut buf).unwrap();
        assert_eq!(u32::from_le_bytes(buf), 42);
    }
}
