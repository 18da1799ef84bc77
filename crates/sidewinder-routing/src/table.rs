//! The snake routing table.
//!
//! Maps `(public key, path id)` to a path entry. The table holds only
//! what handlers put in it; expiry does not auto-evict. Handlers check
//! [`SnakeEntry::valid`] and issue teardowns for anything stale.

use std::collections::HashMap;

use sidewinder_core::{PathId, PublicKey, RootSequence};

use crate::env::PeerId;

/// How long a path entry stays valid without a refresh, in seconds.
pub const EXPIRY_SECS: u64 = 60 * 60;

/// Routing-table key: the path's originating key and its path id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct SnakeIndex {
    pub public_key: PublicKey,
    pub path_id: PathId,
}

/// One installed snake path crossing (or terminating at) this node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct SnakeEntry {
    /// The `(key, path id)` the entry is stored under.
    pub index: SnakeIndex,
    /// Key of the node that originated the path.
    pub origin: PublicKey,
    /// Peer that frames on this path arrive from, going up the ring.
    pub source: PeerId,
    /// Peer that frames on this path leave to, going up the ring; the
    /// local pseudo-peer when the path terminates here.
    pub destination: PeerId,
    /// Monotonic install/refresh timestamp, seconds.
    pub last_seen: u64,
    /// Root key observed when the entry was installed.
    pub root_public_key: PublicKey,
    /// Root sequence observed when the entry was installed.
    pub root_sequence: RootSequence,
}

impl SnakeEntry {
    /// Whether the entry is still within its expiry window at `now`.
    #[must_use]
    pub fn valid(&self, now: u64) -> bool {
        now.saturating_sub(self.last_seen) < EXPIRY_SECS
    }
}

/// The routing table: unique `(key, path id)` entries, unordered.
#[must_use]
pub struct SnakeTable {
    entries: HashMap<SnakeIndex, SnakeEntry>,
}

impl SnakeTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, index: &SnakeIndex) -> Option<&SnakeEntry> {
        self.entries.get(index)
    }

    /// Insert an entry under its own index.
    ///
    /// Callers replace an existing index only deliberately, after tearing
    /// the old path down.
    pub fn insert(&mut self, entry: SnakeEntry) {
        self.entries.insert(entry.index, entry);
    }

    /// Remove an entry. Returns it if present.
    pub fn remove(&mut self, index: &SnakeIndex) -> Option<SnakeEntry> {
        self.entries.remove(index)
    }

    #[must_use]
    pub fn contains(&self, index: &SnakeIndex) -> bool {
        self.entries.contains_key(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SnakeIndex, &SnakeEntry)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SnakeTable {
    fn default() -> Self {
        Self::new()
    }
}
