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

use std::sync::{Arc, Weak};

use nvkv_common::{
    atexit::{AtExit, CallbackId},
    error::ErrorKind,
    guard::Guard,
    hasher::HashKey,
};
use nvkv_memory::{
    error::{DbError, DbResult},
    flags::{NodeFlags, ReadPolicy, WritePolicy},
    node::{Node, NodeDescriptor},
    ram::{RamKvdb, RamKvdbConfig},
    storage::Storage,
    table::NodeStorage,
};

use crate::device::{Device, DeviceTable, Partition};

/// Configuration of an [`NvmKvdb`].
#[derive(Debug, Default)]
pub struct NvmKvdbConfig {
    /// Name of the device holding the partition.
    pub dev_name: String,
    /// Name of the partition the persistent nodes are stored in.
    pub part_name: String,
    /// Storage for the node descriptors, possibly pre-populated.
    pub node_storage: Option<NodeStorage>,
    /// Scratch buffer shared by all transcoding operations.
    pub transcode_buffer: Option<Box<[u8]>>,
    /// Devices the partition is resolved from on [`NvmKvdb::init`].
    pub devices: Arc<DeviceTable>,
    /// Registry the teardown flush is registered to on [`NvmKvdb::init`].
    pub atexit: Arc<AtExit>,
}

impl NvmKvdbConfig {
    /// Create a configuration targeting `part_name` of `dev_name`, without storage.
    pub fn new(
        dev_name: impl Into<String>,
        part_name: impl Into<String>,
        devices: Arc<DeviceTable>,
        atexit: Arc<AtExit>,
    ) -> Self {
        Self {
            dev_name: dev_name.into(),
            part_name: part_name.into(),
            node_storage: None,
            transcode_buffer: None,
            devices,
            atexit,
        }
    }

    /// Use `storage` as node storage and scratch buffer.
    pub fn with_storage<const NODES: usize, const TRANSCODE: usize>(
        mut self,
        storage: Storage<NODES, TRANSCODE>,
    ) -> Self {
        let RamKvdbConfig {
            node_storage,
            transcode_buffer,
        } = storage.into_ram_config();
        self.node_storage = node_storage;
        self.transcode_buffer = transcode_buffer;
        self
    }
}

#[derive(Debug)]
struct Target {
    dev_name: String,
    part_name: String,
    devices: Arc<DeviceTable>,
    atexit: Arc<AtExit>,
}

#[derive(Debug)]
struct Mount {
    device: Arc<dyn Device>,
    partition: Arc<dyn Partition>,
    atexit_id: CallbackId,
}

#[derive(Debug, Default)]
struct NvmState {
    target: Option<Target>,
    mount: Option<Mount>,
}

impl NvmState {
    fn release(&mut self) {
        let Some(mount) = self.mount.take() else {
            return;
        };
        if let Some(target) = self.target.as_ref() {
            target.atexit.unregister(mount.atexit_id);
        }
        if let Err(e) = mount.device.unmount(mount.partition.name()) {
            tracing::warn!("[nvm kvdb]: unmount {} failed: {e}", mount.partition.name());
        }
        tracing::debug!("[nvm kvdb]: deinit {}/{}", mount.device.name(), mount.partition.name());
    }
}

#[derive(Debug, Default)]
struct Inner {
    ram: RamKvdb,
    guard: Guard<NvmState>,
}

impl Inner {
    fn partition(&self) -> Option<Arc<dyn Partition>> {
        let partition = self
            .guard
            .with(|state| state.mount.as_ref().map(|mount| mount.partition.clone()));
        if partition.is_none() {
            tracing::debug!("[nvm kvdb]: access partition before init");
        }
        partition
    }

    /// Store the cached value of `node` into the partition.
    fn commit(&self, node: &Node) -> bool {
        let key = node.key();
        let Some(partition) = self.partition() else {
            return false;
        };
        match self.ram.with_encoded(key, |bytes| partition.put(key, bytes)) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::debug!("[nvm kvdb]: put node {key} failed: {e}");
                false
            }
            None => false,
        }
    }

    fn flush(&self) -> usize {
        let _lock = self.guard.lock();

        let mut flushed = 0;
        let mut index = 0;
        while let Some(node) = self.ram.nth(index) {
            index += 1;
            let flags = node.flags();
            if !flags.is_persistent() || !flags.contains(NodeFlags::DIRTY) {
                continue;
            }
            if self.commit(&node) {
                node.clear_flags(NodeFlags::DIRTY);
                flushed += 1;
            } else {
                tracing::debug!("[nvm kvdb]: flush node {} failed, keep dirty", node.key());
            }
        }
        if flushed > 0 {
            tracing::debug!("[nvm kvdb]: flushed {flushed} nodes");
        }
        flushed
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.guard.with(|state| state.mount.is_none()) {
            return;
        }
        let flushed = self.flush();
        tracing::debug!("[nvm kvdb]: drop flushed {flushed} nodes");
        self.guard.with(|state| state.release());
    }
}

/// The persistent tier: a [`RamKvdb`] mirrored into a partition of a non-volatile key-value device.
///
/// Every node carries its own read and write policies. Volatile nodes behave as in the RAM tier. Persistent nodes
/// are committed to the partition and fetched from it as their policies require.
///
/// The tier is a cheap handle. Clones share the same state and may be used from any thread. All operations serialize
/// on one reentrant guard, which is held across nested operations such as the commit performed by
/// [`NvmKvdb::insert`]. Dropping the last handle of an initialized tier flushes the dirty nodes and releases the
/// partition.
#[derive(Debug, Clone, Default)]
pub struct NvmKvdb {
    inner: Arc<Inner>,
}

impl NvmKvdb {
    /// Create an unconfigured tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the tier. Succeeds once.
    pub fn configure(&self, config: NvmKvdbConfig) -> DbResult<()> {
        let lock = self.inner.guard.lock();

        if lock.borrow().target.is_some() || self.inner.ram.is_configured() {
            tracing::warn!("[nvm kvdb]: already configured");
            return Err(DbError::NotAvailable);
        }
        if config.dev_name.is_empty() || config.part_name.is_empty() {
            tracing::warn!(
                "[nvm kvdb]: empty device or partition name, device: {:?}, partition: {:?}",
                config.dev_name,
                config.part_name
            );
            return Err(DbError::BadArg);
        }

        self.inner.ram.configure(RamKvdbConfig {
            node_storage: config.node_storage,
            transcode_buffer: config.transcode_buffer,
        })?;

        tracing::debug!("[nvm kvdb]: configured for {}/{}", config.dev_name, config.part_name);
        lock.borrow_mut().target = Some(Target {
            dev_name: config.dev_name,
            part_name: config.part_name,
            devices: config.devices,
            atexit: config.atexit,
        });
        Ok(())
    }

    /// Mount the configured partition and register the teardown flush.
    ///
    /// Returns `true` if the tier is initialized, including when it already was.
    pub fn init(&self) -> bool {
        let lock = self.inner.guard.lock();
        let mut state = lock.borrow_mut();

        if state.mount.is_some() {
            return true;
        }
        let Some(target) = state.target.as_ref() else {
            tracing::warn!("[nvm kvdb]: init before configure");
            return false;
        };

        let (device, partition) = match target.devices.mount(&target.dev_name, &target.part_name) {
            Ok(mounted) => mounted,
            Err(e) => {
                tracing::warn!(
                    "[nvm kvdb]: mount {}/{} failed: {e}",
                    target.dev_name,
                    target.part_name
                );
                return false;
            }
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let atexit_id = target.atexit.register(move || {
            if let Some(inner) = weak.upgrade() {
                let flushed = inner.flush();
                tracing::debug!("[nvm kvdb]: teardown flushed {flushed} nodes");
            }
        });

        tracing::debug!("[nvm kvdb]: init {}/{}", target.dev_name, target.part_name);
        state.mount = Some(Mount {
            device,
            partition,
            atexit_id,
        });
        true
    }

    /// Unregister the teardown flush and release the partition. Dirty nodes are not flushed.
    ///
    /// No-op if the tier is not initialized.
    pub fn deinit(&self) {
        self.inner.guard.with(|state| state.release());
    }

    /// Returns `true` if the partition is mounted.
    pub fn is_initialized(&self) -> bool {
        self.inner.guard.with(|state| state.mount.is_some())
    }

    /// Insert a node.
    ///
    /// A persistent node is committed once according to its write policy. If that commit fails, including when the
    /// node has no write policy, the node is not inserted.
    pub fn insert(&self, desc: NodeDescriptor) -> bool {
        let _lock = self.inner.guard.lock();

        let key = desc.key;
        if !self.inner.ram.insert(desc) {
            return false;
        }
        let Some(node) = self.inner.ram.find(key) else {
            return false;
        };
        if !node.flags().is_persistent() {
            return true;
        }
        if self.write_path(&node, None).is_none() {
            tracing::debug!("[nvm kvdb]: initial commit of node {key} failed, reject");
            self.inner.ram.remove(key);
            return false;
        }
        true
    }

    /// Remove the node of `key`. The partition entry of a persistent node is deleted on a best-effort basis.
    pub fn remove(&self, key: HashKey) -> bool {
        let _lock = self.inner.guard.lock();

        let Some(node) = self.inner.ram.find(key) else {
            return false;
        };
        if !self.inner.ram.remove(key) {
            return false;
        }
        if node.flags().is_persistent() {
            if let Some(partition) = self.inner.partition() {
                if let Err(e) = partition.delete(key) {
                    tracing::debug!("[nvm kvdb]: delete node {key} from partition failed: {e}");
                }
            }
        }
        true
    }

    /// Returns `true` if a node of `key` exists.
    pub fn exists(&self, key: HashKey) -> bool {
        let _lock = self.inner.guard.lock();
        self.inner.ram.exists(key)
    }

    /// Find the node of `key`.
    ///
    /// The handle stays live: its flags reflect later transitions.
    pub fn find(&self, key: HashKey) -> Option<Arc<Node>> {
        let _lock = self.inner.guard.lock();
        self.inner.ram.find(key)
    }

    /// Flags of the node of `key`.
    pub fn flags(&self, key: HashKey) -> Option<NodeFlags> {
        self.find(key).map(|node| node.flags())
    }

    /// Returns `true` if the node of `key` has a cached value not yet committed to the partition.
    pub fn is_dirty(&self, key: HashKey) -> bool {
        self.flags(key).is_some_and(|flags| flags.contains(NodeFlags::DIRTY))
    }

    /// Returns `true` if the node of `key` holds a value accepted by its validator.
    pub fn is_valid(&self, key: HashKey) -> bool {
        let _lock = self.inner.guard.lock();
        self.inner.ram.is_valid(key)
    }

    /// Count of nodes.
    pub fn len(&self) -> usize {
        let _lock = self.inner.guard.lock();
        self.inner.ram.len()
    }

    /// Returns `true` if there is no node.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the value of `key` into `out` according to the node's read policy.
    ///
    /// Returns the count of bytes copied into `out`.
    pub fn read(&self, key: HashKey, out: &mut [u8]) -> Option<usize> {
        let _lock = self.inner.guard.lock();

        let Some(node) = self.inner.ram.find(key) else {
            tracing::debug!("[nvm kvdb]: read node {key} not found");
            return None;
        };
        let flags = node.flags();

        let len = if !flags.is_persistent() {
            self.inner.ram.read(key, out)?
        } else {
            let Some(policy) = flags.read_policy() else {
                tracing::debug!("[nvm kvdb]: node {key} has a conflicting or missing read policy: {flags:?}");
                return None;
            };
            match policy {
                ReadPolicy::Sync => {
                    let partition = self.inner.partition()?;
                    self.inner.ram.load_with(key, |buf| fetch(&*partition, key, buf))?;
                    self.inner.ram.read(key, out)?
                }
                ReadPolicy::Through => {
                    let partition = self.inner.partition()?;
                    self.inner
                        .ram
                        .fetch_with(key, out, |buf| fetch(&*partition, key, buf))?
                }
                ReadPolicy::Cache => self.inner.ram.read(key, out)?,
            }
        };

        if len > out.len() {
            tracing::debug!("[nvm kvdb]: reader of node {key} reported {len} bytes into {}", out.len());
            return None;
        }
        if flags.contains(NodeFlags::SANITIZE_ON_READ) {
            node.sanitize(&mut out[..len]);
        }
        Some(len)
    }

    /// Write `data` as the value of `key` according to the node's write policy.
    ///
    /// With [`NodeFlags::SANITIZE_ON_WRITE`], `data` is sanitized in place before it is committed anywhere. Returns
    /// `data.len()` on success. A failed write-through commit fails the write but keeps the cached value, which is
    /// then marked dirty.
    pub fn write(&self, key: HashKey, data: &mut [u8]) -> Option<usize> {
        let _lock = self.inner.guard.lock();

        let Some(node) = self.inner.ram.find(key) else {
            tracing::debug!("[nvm kvdb]: write node {key} not found");
            return None;
        };
        self.write_path(&node, Some(data))
    }

    /// Commit `data` into the cache of `node`, or keep its cached value if `data` is `None`, then propagate the cache
    /// to the partition according to the write policy.
    fn write_path(&self, node: &Node, data: Option<&mut [u8]>) -> Option<usize> {
        let key = node.key();
        let flags = node.flags();

        let policy = flags.write_policy();
        if flags.is_persistent() && policy.is_none() {
            tracing::debug!("[nvm kvdb]: persistent node {key} has no write policy: {flags:?}");
            return None;
        }

        let len = match data {
            Some(data) => {
                if flags.contains(NodeFlags::SANITIZE_ON_WRITE) {
                    node.sanitize(data);
                }
                self.inner.ram.write(key, data)?
            }
            None => node.data_size(),
        };

        match policy {
            _ if !flags.is_persistent() => {}
            Some(WritePolicy::Back) => node.set_flags(NodeFlags::DIRTY),
            Some(WritePolicy::Through) => {
                if !self.inner.commit(node) {
                    node.set_flags(NodeFlags::DIRTY);
                    return None;
                }
                node.clear_flags(NodeFlags::DIRTY);
            }
            None => return None,
        }
        Some(len)
    }

    /// Serialize the cached value of `key` into `out`. Read and write policies do not apply.
    pub fn encode(&self, key: HashKey, out: &mut [u8]) -> Option<usize> {
        let _lock = self.inner.guard.lock();
        self.inner.ram.encode(key, out)
    }

    /// Deserialize `wire` into the cache of `key`. Read and write policies do not apply.
    pub fn decode(&self, key: HashKey, wire: &[u8]) -> Option<usize> {
        let _lock = self.inner.guard.lock();
        self.inner.ram.decode(key, wire)
    }

    /// Overwrite the cache of every persistent node with its value in the partition and clear
    /// [`NodeFlags::DIRTY`].
    ///
    /// Nodes absent from the partition keep their cache. Returns the count of refreshed nodes.
    pub fn sync(&self) -> usize {
        let _lock = self.inner.guard.lock();

        let Some(partition) = self.inner.partition() else {
            return 0;
        };

        let mut synced = 0;
        let mut index = 0;
        while let Some(node) = self.inner.ram.nth(index) {
            index += 1;
            if !node.flags().is_persistent() {
                continue;
            }
            let key = node.key();
            let mut missing = false;
            let loaded = self.inner.ram.load_with(key, |buf| match partition.get(key, buf) {
                Ok(len) => Some(len),
                Err(e) => {
                    missing = e.kind() == ErrorKind::NotFound;
                    if !missing {
                        tracing::debug!("[nvm kvdb]: sync get node {key} failed: {e}");
                    }
                    None
                }
            });
            match loaded {
                Some(_) => {
                    node.clear_flags(NodeFlags::DIRTY);
                    synced += 1;
                }
                None if missing => tracing::debug!("[nvm kvdb]: sync skip node {key}, absent from partition"),
                None => tracing::debug!("[nvm kvdb]: sync node {key} failed"),
            }
        }
        tracing::debug!("[nvm kvdb]: synced {synced} nodes");
        synced
    }

    /// Commit every dirty persistent node to the partition.
    ///
    /// A failing node stays dirty and does not stop the others. Returns the count of committed nodes.
    pub fn flush(&self) -> usize {
        self.inner.flush()
    }
}

fn fetch(partition: &dyn Partition, key: HashKey, buf: &mut [u8]) -> Option<usize> {
    partition
        .get(key, buf)
        .inspect_err(|e| tracing::debug!("[nvm kvdb]: get node {key} failed: {e}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nvkv_memory::{delegate::memcpy_reader, node::Datacache};
    use parking_lot::Mutex;

    use super::*;
    use crate::device::{mem::MemDevice, DeviceConfig, PartitionConfig};

    const DEV: &str = "nor_flash0";
    const PART: &str = "kvdb";

    struct Fixture {
        devices: Arc<DeviceTable>,
        atexit: Arc<AtExit>,
        device: Arc<MemDevice>,
    }

    impl Fixture {
        fn new() -> Self {
            let device = Arc::new(
                MemDevice::open(DeviceConfig::new(DEV).with_partition(PartitionConfig::new(PART, 1024))).unwrap(),
            );
            let devices = Arc::new(DeviceTable::new());
            devices.register(device.clone()).unwrap();
            Self {
                devices,
                atexit: Arc::new(AtExit::new()),
                device,
            }
        }

        fn config(&self) -> NvmKvdbConfig {
            NvmKvdbConfig::new(DEV, PART, self.devices.clone(), self.atexit.clone())
                .with_storage(Storage::<16, 256>::new())
        }

        fn db(&self) -> NvmKvdb {
            let db = NvmKvdb::new();
            db.configure(self.config()).unwrap();
            assert!(db.init());
            db
        }

        fn stored(&self, key: HashKey) -> Option<Vec<u8>> {
            let part = self.device.mount(PART).unwrap();
            let mut buf = [0u8; 64];
            let res = part.get(key, &mut buf).ok().map(|len| buf[..len].to_vec());
            self.device.unmount(PART).unwrap();
            res
        }

        fn store(&self, key: HashKey, value: &[u8]) {
            let part = self.device.mount(PART).unwrap();
            part.put(key, value).unwrap();
            self.device.unmount(PART).unwrap();
        }
    }

    fn u32_node(key: HashKey, flags: NodeFlags) -> NodeDescriptor {
        NodeDescriptor::new(key, Datacache::new(4)).with_flags(flags)
    }

    #[test_log::test]
    fn test_configure() {
        let fixture = Fixture::new();
        let db = NvmKvdb::new();
        assert!(!db.init());

        let mut config = fixture.config();
        config.part_name.clear();
        assert_eq!(db.configure(config), Err(DbError::BadArg));
        assert_eq!(db.configure(NvmKvdbConfig::default()), Err(DbError::BadArg));

        let mut config = fixture.config();
        config.node_storage = None;
        assert_eq!(db.configure(config), Err(DbError::BadArg));

        db.configure(fixture.config()).unwrap();
        assert_eq!(db.configure(fixture.config()), Err(DbError::NotAvailable));
    }

    #[test]
    fn test_init_deinit() {
        let fixture = Fixture::new();
        let db = NvmKvdb::new();
        db.deinit();

        let config = NvmKvdbConfig::new(DEV, "missing", fixture.devices.clone(), fixture.atexit.clone())
            .with_storage(Storage::<4, 64>::new());
        db.configure(config).unwrap();
        assert!(!db.init());
        assert!(!db.is_initialized());

        let db = fixture.db();
        assert!(db.is_initialized());
        assert!(db.init());
        assert_eq!(fixture.atexit.len(), 1);

        db.deinit();
        assert!(!db.is_initialized());
        assert!(fixture.atexit.is_empty());
        db.deinit();

        assert!(db.init());
        drop(db);
        assert!(fixture.atexit.is_empty());
    }

    #[test]
    fn test_volatile_nodes_before_init() {
        let fixture = Fixture::new();
        let db = NvmKvdb::new();
        db.configure(fixture.config()).unwrap();

        assert!(db.insert(u32_node(1, NodeFlags::DEFAULT_VOLATILE)));
        assert_eq!(db.write(1, &mut 5u32.to_le_bytes()), Some(4));
        let mut out = [0u8; 4];
        assert_eq!(db.read(1, &mut out), Some(4));
        assert_eq!(u32::from_le_bytes(out), 5);

        // Write-through seeding needs the partition.
        assert!(!db.insert(u32_node(2, NodeFlags::DEFAULT_PERSISTENT)));
        assert!(!db.exists(2));
        // Write-back seeding does not.
        assert!(db.insert(u32_node(3, NodeFlags::PERSISTENT | NodeFlags::WRITE_BACK | NodeFlags::READ_CACHE)));
        assert!(db.is_dirty(3));
        assert_eq!(db.flush(), 0);
        assert!(db.is_dirty(3));
        assert_eq!(db.sync(), 0);
    }

    #[test]
    fn test_insert_seeds_partition() {
        let fixture = Fixture::new();
        let db = fixture.db();

        let cache = Datacache::from_bytes(&7u32.to_le_bytes());
        assert!(db.insert(NodeDescriptor::new(10, cache).with_flags(NodeFlags::DEFAULT_PERSISTENT)));
        assert!(!db.is_dirty(10));
        assert_eq!(fixture.stored(10), Some(7u32.to_le_bytes().to_vec()));

        // Runtime flags are not taken from the descriptor.
        assert!(db.insert(u32_node(11, NodeFlags::DEFAULT_PERSISTENT | NodeFlags::DIRTY)));
        assert!(!db.is_dirty(11));

        // No write policy.
        assert!(!db.insert(u32_node(12, NodeFlags::PERSISTENT | NodeFlags::READ_CACHE)));
        assert!(!db.exists(12));
        assert!(fixture.stored(12).is_none());

        // Duplicate.
        assert!(!db.insert(u32_node(10, NodeFlags::DEFAULT_PERSISTENT)));
    }

    #[test]
    fn test_remove_deletes_from_partition() {
        let fixture = Fixture::new();
        let db = fixture.db();
        assert!(db.insert(u32_node(1, NodeFlags::DEFAULT_PERSISTENT)));
        assert!(db.insert(u32_node(2, NodeFlags::DEFAULT_VOLATILE)));
        assert!(fixture.stored(1).is_some());

        assert!(db.remove(1));
        assert!(fixture.stored(1).is_none());
        assert!(db.remove(2));
        assert!(!db.remove(2));
        assert!(db.is_empty());
    }

    #[test]
    fn test_read_sync() {
        let fixture = Fixture::new();
        let db = fixture.db();
        let flags = NodeFlags::PERSISTENT | NodeFlags::WRITE_BACK | NodeFlags::READ_SYNC;
        assert!(db.insert(u32_node(1, flags)));

        // Absent from the partition.
        assert_eq!(db.read(1, &mut [0u8; 4]), None);

        fixture.store(1, &99u32.to_le_bytes());
        let mut out = [0u8; 4];
        assert_eq!(db.read(1, &mut out), Some(4));
        assert_eq!(u32::from_le_bytes(out), 99);
        assert_eq!(db.find(1).unwrap().datacache().snapshot(), 99u32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_write_through_failure_keeps_cache() {
        let fixture = Fixture::new();
        let db = fixture.db();
        assert!(db.insert(u32_node(1, NodeFlags::DEFAULT_PERSISTENT)));

        db.deinit();
        assert_eq!(db.write(1, &mut 3u32.to_le_bytes()), None);
        assert!(db.is_dirty(1));
        assert_eq!(db.find(1).unwrap().datacache().snapshot(), 3u32.to_le_bytes().to_vec());

        assert!(db.init());
        assert_eq!(db.flush(), 1);
        assert!(!db.is_dirty(1));
        assert_eq!(fixture.stored(1), Some(3u32.to_le_bytes().to_vec()));
    }

    #[test]
    fn test_sync() {
        let fixture = Fixture::new();
        let db = fixture.db();
        let flags = NodeFlags::PERSISTENT | NodeFlags::WRITE_BACK | NodeFlags::READ_CACHE;
        assert!(db.insert(u32_node(1, flags)));
        assert!(db.insert(u32_node(2, flags)));
        assert!(db.insert(u32_node(3, NodeFlags::DEFAULT_VOLATILE)));

        db.write(1, &mut 1u32.to_le_bytes()).unwrap();
        db.write(2, &mut 2u32.to_le_bytes()).unwrap();
        db.write(3, &mut 3u32.to_le_bytes()).unwrap();
        fixture.store(1, &10u32.to_le_bytes());

        assert_eq!(db.sync(), 1);
        let mut out = [0u8; 4];
        db.read(1, &mut out).unwrap();
        assert_eq!(u32::from_le_bytes(out), 10);
        assert!(!db.is_dirty(1));
        // Absent from the partition: skipped.
        db.read(2, &mut out).unwrap();
        assert_eq!(u32::from_le_bytes(out), 2);
        assert!(db.is_dirty(2));
        db.read(3, &mut out).unwrap();
        assert_eq!(u32::from_le_bytes(out), 3);
    }

    #[test]
    fn test_atexit_flush() {
        let fixture = Fixture::new();
        let db = fixture.db();
        let flags = NodeFlags::PERSISTENT | NodeFlags::WRITE_BACK | NodeFlags::READ_CACHE;
        assert!(db.insert(u32_node(1, flags)));
        db.write(1, &mut 8u32.to_le_bytes()).unwrap();
        assert!(fixture.stored(1).is_none());

        assert_eq!(fixture.atexit.run(), 1);
        assert!(!db.is_dirty(1));
        assert_eq!(fixture.stored(1), Some(8u32.to_le_bytes().to_vec()));
    }

    #[test_log::test]
    fn test_drop_flushes_dirty_nodes() {
        let fixture = Fixture::new();
        let db = fixture.db();
        let flags = NodeFlags::PERSISTENT | NodeFlags::WRITE_BACK | NodeFlags::READ_CACHE;
        assert!(db.insert(u32_node(1, flags)));
        db.write(1, &mut 7u32.to_le_bytes()).unwrap();

        let clone = db.clone();
        drop(db);
        assert!(clone.is_dirty(1));
        assert_eq!(fixture.atexit.len(), 1);

        drop(clone);
        assert!(fixture.atexit.is_empty());
        assert_eq!(fixture.atexit.run(), 0);
        assert_eq!(fixture.stored(1), Some(7u32.to_le_bytes().to_vec()));
    }

    #[test_log::test]
    fn test_delegates_call_back_into_tier() {
        let fixture = Fixture::new();
        let db = fixture.db();
        let slot: Arc<Mutex<Option<NvmKvdb>>> = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let reader = {
            let slot = slot.clone();
            let calls = calls.clone();
            move |cache: &[u8], out: &mut [u8]| {
                let db = slot.lock().clone();
                if let Some(db) = db {
                    if db.exists(2) && db.len() == 2 {
                        calls.fetch_add(1, Ordering::Relaxed);
                    }
                }
                memcpy_reader(cache, out)
            }
        };
        let cached = NodeFlags::PERSISTENT | NodeFlags::WRITE_BACK | NodeFlags::READ_CACHE;
        let through = NodeFlags::PERSISTENT | NodeFlags::WRITE_BACK | NodeFlags::READ_THROUGH;
        assert!(db.insert(u32_node(1, cached).with_reader(reader.clone())));
        assert!(db.insert(u32_node(2, through).with_reader(reader)));
        *slot.lock() = Some(db.clone());

        db.write(1, &mut 5u32.to_le_bytes()).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(db.read(1, &mut out), Some(4));
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        assert_eq!(db.flush(), 2);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(fixture.stored(1), Some(5u32.to_le_bytes().to_vec()));

        assert_eq!(db.read(2, &mut out), Some(4));
        assert_eq!(u32::from_le_bytes(out), 0);
        assert_eq!(calls.load(Ordering::Relaxed), 4);

        slot.lock().take();
    }
}
