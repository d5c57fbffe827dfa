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


//! Concurrent access to one tier from many threads.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use nvkv::{
    hash_str, AtExit, Datacache, DeviceConfig, DeviceTable, MemDevice, NodeDescriptor, NodeFlags, NvmKvdb,
    NvmKvdbConfig, PartitionConfig, RamKvdb, Storage,
};
use rand::{rng, Rng};

const WORDS: usize = 8;
const VALUE_LEN: usize = WORDS * 4;

/// A value made of `WORDS` copies of a stamp. A torn write mixes stamps.
fn value(stamp: u32) -> [u8; VALUE_LEN] {
    let mut buf = [0u8; VALUE_LEN];
    for chunk in buf.chunks_exact_mut(4) {
        chunk.copy_from_slice(&stamp.to_le_bytes());
    }
    buf
}

fn stamp(buf: &[u8]) -> Option<u32> {
    let mut words = buf.chunks_exact(4).map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    let first = words.next()?;
    words.all(|w| w == first).then_some(first)
}

fn stamp_of(writer: usize, i: usize) -> u32 {
    ((writer as u32 + 1) << 16) | i as u32
}

#[test_log::test]
fn test_concurrent_write_back_read_cache() {
    let device =
        Arc::new(MemDevice::open(DeviceConfig::new("flash").with_partition(PartitionConfig::new("kv", 4096))).unwrap());
    let devices = Arc::new(DeviceTable::new());
    devices.register(device).unwrap();
    let db = NvmKvdb::new();
    db.configure(
        NvmKvdbConfig::new("flash", "kv", devices, Arc::new(AtExit::new())).with_storage(Storage::<4, 128>::new()),
    )
    .unwrap();
    assert!(db.init());

    let key = hash_str("shared");
    let flags = NodeFlags::PERSISTENT | NodeFlags::WRITE_BACK | NodeFlags::READ_CACHE;
    assert!(db.insert(NodeDescriptor::new(key, Datacache::new(VALUE_LEN)).with_flags(flags)));

    let mut rng = rng();
    let writers = rng.random_range(2..6);
    let readers = rng.random_range(2..6);
    let iterations = rng.random_range(200..500);
    let reads = AtomicUsize::new(0);

    thread::scope(|s| {
        for w in 0..writers {
            let db = db.clone();
            s.spawn(move || {
                for i in 0..iterations {
                    let mut buf = value(stamp_of(w, i));
                    assert_eq!(db.write(key, &mut buf), Some(VALUE_LEN));
                    if i % 64 == 0 {
                        db.flush();
                    }
                }
            });
        }
        for _ in 0..readers {
            let db = db.clone();
            let reads = &reads;
            s.spawn(move || {
                for _ in 0..iterations {
                    let mut out = [0u8; VALUE_LEN];
                    if db.read(key, &mut out).is_some() {
                        let stamp = stamp(&out).expect("torn value");
                        // Either the initial zeroed cache or a value some writer wrote.
                        if stamp != 0 {
                            let writer = (stamp >> 16) as usize - 1;
                            let i = (stamp & 0xffff) as usize;
                            assert!(writer < writers && i < iterations);
                        }
                        reads.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(reads.load(Ordering::Relaxed), readers * iterations);
    db.flush();
    assert!(!db.is_dirty(key));
    let mut out = [0u8; VALUE_LEN];
    db.read(key, &mut out).unwrap();
    let last = stamp(&out).unwrap();
    assert_eq!((last & 0xffff) as usize, iterations - 1);
}

#[test_log::test]
fn test_concurrent_ram_insert_remove() {
    let db = RamKvdb::new();
    db.configure(Storage::<64, 64>::new().into_ram_config()).unwrap();

    let threads = rng().random_range(2..8);
    thread::scope(|s| {
        for t in 0..threads {
            let db = &db;
            s.spawn(move || {
                for i in 0..32u32 {
                    let key = ((t as u32) << 8) | i;
                    if db.insert(NodeDescriptor::new(key, Datacache::new(4))) {
                        assert_eq!(db.write(key, &key.to_le_bytes()), Some(4));
                        let mut out = [0u8; 4];
                        assert_eq!(db.read(key, &mut out), Some(4));
                        assert_eq!(u32::from_le_bytes(out), key);
                        assert!(db.remove(key));
                    }
                }
            });
        }
    });

    assert!(db.is_empty());
}
