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

use bitflags::bitflags;

bitflags! {
    /// Policy and state flags of a node.
    ///
    /// A node without [`NodeFlags::PERSISTENT`] is volatile and ignores the read and write policies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct NodeFlags: u32 {
        /// The value is mirrored into the NVM store.
        const PERSISTENT = 1 << 0;
        /// Commit writes to the RAM cache only and mark the node dirty.
        const WRITE_BACK = 1 << 1;
        /// Commit writes to the RAM cache and the NVM store synchronously.
        const WRITE_THROUGH = 1 << 2;
        /// Serve reads from the RAM cache.
        const READ_CACHE = 1 << 3;
        /// Serve reads from the NVM store, bypassing the RAM cache.
        const READ_THROUGH = 1 << 4;
        /// Refresh the RAM cache from the NVM store, then serve from the RAM cache.
        const READ_SYNC = 1 << 5;
        /// Sanitize incoming data before it is committed anywhere.
        const SANITIZE_ON_WRITE = 1 << 6;
        /// Sanitize outgoing data without persisting the mutation.
        const SANITIZE_ON_READ = 1 << 7;
        /// The RAM cache holds a value not yet committed to the NVM store.
        const DIRTY = 1 << 8;
        /// The RAM cache has been populated by a successful write.
        const VALID = 1 << 9;
    }
}

/// How a persistent node serves reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicy {
    /// [`NodeFlags::READ_CACHE`]
    Cache,
    /// [`NodeFlags::READ_THROUGH`]
    Through,
    /// [`NodeFlags::READ_SYNC`]
    Sync,
}

/// How a persistent node commits writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// [`NodeFlags::WRITE_BACK`]
    Back,
    /// [`NodeFlags::WRITE_THROUGH`]
    Through,
}

impl NodeFlags {
    /// Absence of [`NodeFlags::PERSISTENT`].
    pub const VOLATILE: Self = Self::empty();

    /// Flags maintained by the tiers at runtime.
    pub const RUNTIME: Self = Self::DIRTY.union(Self::VALID);

    /// Default flags of a volatile node.
    pub const DEFAULT_VOLATILE: Self = Self::VOLATILE.union(Self::READ_CACHE);

    /// Default flags of a persistent node.
    pub const DEFAULT_PERSISTENT: Self = Self::PERSISTENT.union(Self::WRITE_THROUGH).union(Self::READ_CACHE);

    /// Returns `true` if the node is mirrored into the NVM store.
    pub fn is_persistent(&self) -> bool {
        self.contains(Self::PERSISTENT)
    }

    /// Resolve the read policy.
    ///
    /// Returns `None` if the policy is missing, or if [`NodeFlags::READ_CACHE`] and [`NodeFlags::READ_THROUGH`] are
    /// both set. [`NodeFlags::READ_SYNC`] takes precedence over the other two.
    pub fn read_policy(&self) -> Option<ReadPolicy> {
        if self.contains(Self::READ_CACHE | Self::READ_THROUGH) {
            return None;
        }
        if self.contains(Self::READ_SYNC) {
            Some(ReadPolicy::Sync)
        } else if self.contains(Self::READ_THROUGH) {
            Some(ReadPolicy::Through)
        } else if self.contains(Self::READ_CACHE) {
            Some(ReadPolicy::Cache)
        } else {
            None
        }
    }

    /// Resolve the write policy.
    ///
    /// Returns `None` if neither [`NodeFlags::WRITE_BACK`] nor [`NodeFlags::WRITE_THROUGH`] is set. Write-through wins
    /// if both are set.
    pub fn write_policy(&self) -> Option<WritePolicy> {
        if self.contains(Self::WRITE_THROUGH) {
            Some(WritePolicy::Through)
        } else if self.contains(Self::WRITE_BACK) {
            Some(WritePolicy::Back)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_policy() {
        let p = NodeFlags::PERSISTENT;
        assert_eq!(p.read_policy(), None);
        assert_eq!((p | NodeFlags::READ_CACHE).read_policy(), Some(ReadPolicy::Cache));
        assert_eq!((p | NodeFlags::READ_THROUGH).read_policy(), Some(ReadPolicy::Through));
        assert_eq!((p | NodeFlags::READ_SYNC).read_policy(), Some(ReadPolicy::Sync));
        assert_eq!(
            (p | NodeFlags::READ_SYNC | NodeFlags::READ_CACHE).read_policy(),
            Some(ReadPolicy::Sync)
        );
        assert_eq!((p | NodeFlags::READ_CACHE | NodeFlags::READ_THROUGH).read_policy(), None);
        assert_eq!(
            (p | NodeFlags::READ_CACHE | NodeFlags::READ_THROUGH | NodeFlags::READ_SYNC).read_policy(),
            None
        );
    }

    #[test]
    fn test_write_policy() {
        assert_eq!(NodeFlags::PERSISTENT.write_policy(), None);
        assert_eq!(NodeFlags::WRITE_BACK.write_policy(), Some(WritePolicy::Back));
        assert_eq!(
            (NodeFlags::WRITE_BACK | NodeFlags::WRITE_THROUGH).write_policy(),
            Some(WritePolicy::Through)
        );
    }

    #[test]
    fn test_presets() {
        assert!(!NodeFlags::DEFAULT_VOLATILE.is_persistent());
        assert!(NodeFlags::DEFAULT_PERSISTENT.is_persistent());
        assert_eq!(NodeFlags::DEFAULT_PERSISTENT.write_policy(), Some(WritePolicy::Through));
        assert!(NodeFlags::RUNTIME.contains(NodeFlags::DIRTY));
    }

    #[test]
    fn test_flags_serde() {
        let flags: NodeFlags = serde_json::from_str("\"PERSISTENT | WRITE_BACK | READ_THROUGH\"").unwrap();
        assert_eq!(
            flags,
            NodeFlags::PERSISTENT | NodeFlags::WRITE_BACK | NodeFlags::READ_THROUGH
        );
        let s = serde_json::to_string(&NodeFlags::DEFAULT_PERSISTENT).unwrap();
        assert_eq!(serde_json::from_str::<NodeFlags>(&s).unwrap(), NodeFlags::DEFAULT_PERSISTENT);
    }
}
