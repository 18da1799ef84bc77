//! The snake state machine.
//!
//! [`SnekRouter`] owns the routing table plus the two neighbour
//! references. The neighbours are stored as table indices: the table is
//! the arena, so `ascending` being set always implies the entry exists,
//! and entry access goes through [`SnakeTable`].

use sidewinder_core::PublicKey;

use crate::table::{SnakeEntry, SnakeIndex, SnakeTable};

/// Per-node snake state, owned and driven by a single event loop.
pub struct SnekRouter {
    pub(crate) public_key: PublicKey,
    pub(crate) table: SnakeTable,
    /// Index of the path to the next-higher-key neighbour. Always keyed
    /// under our own public key.
    pub(crate) ascending: Option<SnakeIndex>,
    /// Index of the path from the next-lower-key neighbour, keyed under
    /// that neighbour's public key.
    pub(crate) descending: Option<SnakeIndex>,
}

impl SnekRouter {
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            table: SnakeTable::new(),
            ascending: None,
            descending: None,
        }
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    #[must_use]
    pub fn table(&self) -> &SnakeTable {
        &self.table
    }

    /// The installed ascending path, resolved through the table.
    #[must_use]
    pub fn ascending_entry(&self) -> Option<&SnakeEntry> {
        let index = self.ascending.as_ref()?;
        let entry = self.table.get(index);
        debug_assert!(entry.is_some(), "ascending index missing from table");
        entry
    }

    /// The installed descending path, resolved through the table.
    #[must_use]
    pub fn descending_entry(&self) -> Option<&SnakeEntry> {
        let index = self.descending.as_ref()?;
        let entry = self.table.get(index);
        debug_assert!(entry.is_some(), "descending index missing from table");
        entry
    }
}
