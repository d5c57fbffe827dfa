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


//! nvkv - RAM cache over non-volatile key-value storage.
//!
//! Values live in caller-provided RAM caches described by nodes. A [`RamKvdb`] serves purely volatile values. An
//! [`NvmKvdb`] layers per-node read and write policies on top of it and mirrors persistent nodes into a partition of
//! a non-volatile key-value [`Device`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use nvkv::{
//!     hash_str, AtExit, Datacache, DeviceConfig, DeviceTable, MemDevice, NodeDescriptor, NodeFlags, NvmKvdb,
//!     NvmKvdbConfig, PartitionConfig, Storage,
//! };
//!
//! let devices = Arc::new(DeviceTable::new());
//! let device = MemDevice::open(DeviceConfig::new("flash").with_partition(PartitionConfig::new("kvdb", 4096))).unwrap();
//! devices.register(Arc::new(device)).unwrap();
//! let atexit = Arc::new(AtExit::new());
//!
//! let db = NvmKvdb::new();
//! db.configure(NvmKvdbConfig::new("flash", "kvdb", devices, atexit.clone()).with_storage(Storage::<16, 256>::new()))
//!     .unwrap();
//! assert!(db.init());
//!
//! let key = hash_str("boot_count");
//! let flags = NodeFlags::PERSISTENT | NodeFlags::WRITE_BACK | NodeFlags::READ_CACHE;
//! assert!(db.insert(NodeDescriptor::new(key, Datacache::new(4)).with_flags(flags)));
//!
//! db.write(key, &mut 1u32.to_le_bytes()).unwrap();
//! assert!(db.is_dirty(key));
//!
//! // Shutdown path.
//! atexit.run();
//! assert!(!db.is_dirty(key));
//! ```

mod prelude;

pub use prelude::*;
