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

use crate::{ram::RamKvdbConfig, table::NodeStorage};

/// Backing storage of a tier, sized at compile time.
///
/// `NODES` is the node capacity and `TRANSCODE` the size of the scratch buffer in bytes.
#[derive(Debug)]
pub struct Storage<const NODES: usize, const TRANSCODE: usize> {
    /// Node descriptors. May be pre-populated before configuring.
    pub node_dsc: NodeStorage,
    /// Scratch buffer for transcoding.
    pub transcode_buffer: Box<[u8]>,
}

impl<const NODES: usize, const TRANSCODE: usize> Default for Storage<NODES, TRANSCODE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const NODES: usize, const TRANSCODE: usize> Storage<NODES, TRANSCODE> {
    /// Allocate empty storage.
    pub fn new() -> Self {
        Self {
            node_dsc: NodeStorage::with_capacity(NODES),
            transcode_buffer: vec![0; TRANSCODE].into_boxed_slice(),
        }
    }

    /// Hand the storage over to a RAM tier configuration.
    pub fn into_ram_config(self) -> RamKvdbConfig {
        RamKvdbConfig {
            node_storage: Some(self.node_dsc),
            transcode_buffer: Some(self.transcode_buffer),
        }
    }
}
