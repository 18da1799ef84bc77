//! Setup handling.
//!
//! A setup frame walks tree space from the bootstrapping node to the node
//! that ACKed it, installing one table entry per hop. Intermediate nodes
//! install only if they manage to forward; the terminus installs the
//! descending reference instead and the frame stops there. Any refusal
//! bounces a teardown back the way the setup came, which is the
//! protocol's one recovery mechanism.

use sidewinder_core::proto::Setup;
use sidewinder_core::{dht_ordered, less_than, Frame};

use crate::env::{PeerId, SnekDriver};
use crate::error::SnekError;
use crate::router::SnekRouter;
use crate::table::{SnakeEntry, SnakeIndex};

impl SnekRouter {
    /// Handle an incoming setup frame.
    ///
    /// `next_hop` is the tree-space next hop for `rx`, precomputed by the
    /// caller; it is only consulted on the transit path.
    pub fn handle_setup<D: SnekDriver>(
        &mut self,
        driver: &mut D,
        from: PeerId,
        rx: &Frame,
        next_hop: Option<PeerId>,
        now: u64,
    ) -> Result<(), SnekError> {
        let setup = Setup::decode(&rx.payload)?;
        let root = driver.root_announcement();

        if setup.root_public_key != root.root_public_key
            || setup.root_sequence != root.root_sequence
        {
            tracing::trace!(origin = %rx.source_key, "rejecting setup under a different root");
            self.send_teardown_for_rejected_path(driver, rx.source_key, setup.path_id, from);
            return Ok(());
        }

        let index = SnakeIndex {
            public_key: rx.source_key,
            path_id: setup.path_id,
        };
        if self.table.contains(&index) {
            // First teardown repairs the table in both directions, the
            // second tells the origin its setup was refused.
            let local = driver.local();
            self.send_teardown_for_existing_path(
                driver,
                local,
                rx.source_key,
                setup.path_id,
                now,
            );
            debug_assert!(
                !self.table.contains(&index),
                "duplicate path should have been cleaned up"
            );
            self.send_teardown_for_rejected_path(driver, rx.source_key, setup.path_id, from);
            return Ok(());
        }

        // At the destination of the setup, this path becomes the new
        // descending reference.
        if rx.destination_key == self.public_key {
            let update = if !less_than(&rx.source_key, &self.public_key) {
                // The bootstrapping key should be below ours but is not.
                false
            } else if let Some(desc) = self.descending_entry().filter(|entry| entry.valid(now)) {
                if desc.index.public_key == rx.source_key && setup.path_id != desc.index.path_id {
                    // Fresh path from the current descending node: accept.
                    true
                } else {
                    // Accept only a node strictly closer than the current one.
                    dht_ordered(&desc.index.public_key, &rx.source_key, &self.public_key)
                }
            } else {
                // No descending, or it expired: any lower key will do.
                less_than(&rx.source_key, &self.public_key)
            };
            if !update {
                tracing::trace!(origin = %rx.source_key, "rejecting setup as descending candidate");
                self.send_teardown_for_rejected_path(driver, rx.source_key, setup.path_id, from);
                return Ok(());
            }

            if let Some(previous) = self.descending {
                let local = driver.local();
                self.send_teardown_for_existing_path(
                    driver,
                    local,
                    previous.public_key,
                    previous.path_id,
                    now,
                );
                debug_assert!(
                    self.descending.is_none(),
                    "descending should have been cleaned up"
                );
                debug_assert!(
                    !self.table.contains(&previous),
                    "descending entry should have left the routing table"
                );
            }

            let entry = SnakeEntry {
                index,
                origin: rx.source_key,
                source: from,
                destination: driver.local(),
                last_seen: now,
                root_public_key: setup.root_public_key,
                root_sequence: setup.root_sequence,
            };
            tracing::debug!(descending = %entry.origin, path = %index.path_id, "installing descending path");
            self.table.insert(entry);
            self.descending = Some(index);
            return Ok(());
        }

        // In transit: forward first, and only then install. A path the far
        // end will never hear about must not exist here.
        let local = driver.local();
        let forwarded = match next_hop {
            Some(next) if next != local => driver.push(next, rx.clone()).then_some(next),
            _ => None,
        };
        let Some(next) = forwarded else {
            tracing::trace!(origin = %rx.source_key, "rejecting setup, no usable next hop");
            self.send_teardown_for_rejected_path(driver, rx.source_key, setup.path_id, from);
            return Ok(());
        };

        self.table.insert(SnakeEntry {
            index,
            origin: rx.source_key,
            source: from,        // holder of the lower key
            destination: next,   // holder of the higher key
            last_seen: now,
            root_public_key: setup.root_public_key,
            root_sequence: setup.root_sequence,
        });
        Ok(())
    }
}
