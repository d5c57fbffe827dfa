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


pub use nvkv_common as common;
pub use nvkv_common::{
    atexit::{AtExit, CallbackId},
    code::{Field, FieldKind, FieldTable, Transcode},
    error::{Error, ErrorKind, Result},
    guard::Guard,
    hasher::{hash, hash_str, HashKey, INVALID_HASH_KEY},
};
pub use nvkv_memory as memory;
pub use nvkv_memory::{
    delegate::{memcpy_reader, memcpy_writer, string_reader, string_writer},
    error::{DbError, DbResult},
    flags::{NodeFlags, ReadPolicy, WritePolicy},
    node::{Datacache, Node, NodeDescriptor},
    ram::{RamKvdb, RamKvdbConfig},
    storage::Storage,
    table::{NodeStorage, NodeTable},
};
pub use nvkv_storage as storage;
pub use nvkv_storage::{
    device::{
        fs::{FsDevice, FsPartition},
        mem::{MemDevice, MemPartition},
        Device, DeviceConfig, DeviceTable, Partition, PartitionConfig,
    },
    nvm::{NvmKvdb, NvmKvdbConfig},
};
