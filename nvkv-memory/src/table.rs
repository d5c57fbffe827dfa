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

use std::sync::Arc;

use nvkv_common::{hasher::HashKey, strict_assert};

use crate::node::{Node, NodeDescriptor};

/// Caller supplied, fixed capacity storage for node descriptors.
///
/// Descriptors pushed before configuration are validated and ordered when the tier is configured. The capacity also
/// bounds the nodes the tier can hold afterwards.
#[derive(Debug)]
pub struct NodeStorage {
    descriptors: Vec<NodeDescriptor>,
    capacity: usize,
}

impl NodeStorage {
    /// Create an empty storage for at most `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            descriptors: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a descriptor. Returns `false` if the storage is full.
    pub fn push(&mut self, desc: NodeDescriptor) -> bool {
        if self.descriptors.len() >= self.capacity {
            return false;
        }
        self.descriptors.push(desc);
        true
    }

    /// Count of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if there is no descriptor.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Max count of nodes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn into_descriptors(self) -> Vec<NodeDescriptor> {
        self.descriptors
    }
}

/// Fixed capacity collection of nodes, unique by key and ordered by key.
#[derive(Debug)]
pub struct NodeTable {
    nodes: Vec<Arc<Node>>,
    capacity: usize,
}

impl NodeTable {
    /// Create an empty table for at most `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Count of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if there is no node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Max count of nodes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if no more node fits.
    pub fn is_full(&self) -> bool {
        self.nodes.len() >= self.capacity
    }

    fn position(&self, key: HashKey) -> Result<usize, usize> {
        self.nodes.binary_search_by_key(&key, |node| node.key())
    }

    /// Find the node of `key`.
    pub fn find(&self, key: HashKey) -> Option<&Arc<Node>> {
        self.position(key).ok().map(|index| &self.nodes[index])
    }

    /// Node at `index` in key order.
    pub fn get(&self, index: usize) -> Option<&Arc<Node>> {
        self.nodes.get(index)
    }

    /// Insert a node at its ordered position.
    ///
    /// Returns `false` if the table is full or the key already exists.
    pub fn insert(&mut self, node: Node) -> bool {
        if self.is_full() {
            tracing::debug!("[node table]: reject node {}: table full", node.key());
            return false;
        }
        match self.position(node.key()) {
            Ok(_) => {
                tracing::debug!("[node table]: reject node {}: key exists", node.key());
                false
            }
            Err(index) => {
                self.nodes.insert(index, Arc::new(node));
                strict_assert!(self.nodes.windows(2).all(|w| w[0].key() < w[1].key()));
                true
            }
        }
    }

    /// Remove the node of `key`.
    pub fn remove(&mut self, key: HashKey) -> Option<Arc<Node>> {
        self.position(key).ok().map(|index| self.nodes.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Datacache;

    fn node(key: HashKey) -> Node {
        Node::from_descriptor(NodeDescriptor::new(key, Datacache::new(4))).unwrap()
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut table = NodeTable::with_capacity(8);
        for key in [5, 1, 7, 3, 0, 6] {
            assert!(table.insert(node(key)));
        }
        let keys: Vec<_> = (0..table.len()).map(|i| table.get(i).unwrap().key()).collect();
        assert_eq!(keys, vec![0, 1, 3, 5, 6, 7]);
        assert_eq!(table.find(3).unwrap().key(), 3);
        assert!(table.find(4).is_none());
    }

    #[test]
    fn test_insert_rejects_duplicate_and_overflow() {
        let mut table = NodeTable::with_capacity(2);
        assert!(table.insert(node(1)));
        assert!(!table.insert(node(1)));
        assert!(table.insert(node(2)));
        assert!(table.is_full());
        assert!(!table.insert(node(3)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut table = NodeTable::with_capacity(4);
        for key in [3, 1, 2] {
            table.insert(node(key));
        }
        assert_eq!(table.remove(2).unwrap().key(), 2);
        assert!(table.remove(2).is_none());
        assert_eq!(table.get(1).unwrap().key(), 3);
        assert!(table.insert(node(2)));
        assert_eq!(table.get(1).unwrap().key(), 2);
    }

    #[test]
    fn test_node_storage_capacity() {
        let mut storage = NodeStorage::with_capacity(1);
        assert!(storage.push(NodeDescriptor::default()));
        assert!(!storage.push(NodeDescriptor::default()));
        assert_eq!(storage.len(), 1);
        assert!(!storage.is_empty());
    }
}
