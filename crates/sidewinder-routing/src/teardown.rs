//! Teardown engine.
//!
//! A teardown removes a path's entries node by node, travelling away from
//! whichever side triggered it. For a locally-detected duplicate it
//! propagates in both directions at once. Clearing the ascending path
//! immediately re-bootstraps so the snake heals without waiting for the
//! next maintenance tick.

use sidewinder_core::proto::Teardown;
use sidewinder_core::{Frame, PathId, PublicKey};

use crate::env::{PeerId, SnekDriver};
use crate::error::SnekError;
use crate::router::SnekRouter;
use crate::table::SnakeIndex;

impl SnekRouter {
    /// Handle an incoming teardown frame.
    ///
    /// Returns the peers the frame must be forwarded to next; the caller
    /// pushes the frame onto each. An unknown path yields an empty list,
    /// which is what makes repeated teardowns a no-op.
    pub fn handle_teardown<D: SnekDriver>(
        &mut self,
        driver: &mut D,
        from: PeerId,
        rx: &Frame,
        now: u64,
    ) -> Result<Vec<PeerId>, SnekError> {
        if rx.payload.len() < PathId::SIZE {
            return Err(SnekError::TeardownTooShort(rx.payload.len()));
        }
        let teardown = Teardown::decode(&rx.payload[..PathId::SIZE])?;
        Ok(self.teardown_path(driver, from, rx.destination_key, teardown.path_id, now))
    }

    /// Tear down `(path_key, path_id)` and compute where the teardown
    /// travels next.
    ///
    /// `from` is the peer the teardown arrived on, or the local
    /// pseudo-peer for teardowns this node originates.
    pub(crate) fn teardown_path<D: SnekDriver>(
        &mut self,
        driver: &mut D,
        from: PeerId,
        path_key: PublicKey,
        path_id: PathId,
        now: u64,
    ) -> Vec<PeerId> {
        let local = driver.local();

        if let Some(asc) = self.ascending {
            if asc.public_key == path_key && asc.path_id == path_id {
                let destination = self.table.get(&asc).map(|entry| entry.destination);
                debug_assert!(destination.is_some(), "ascending index missing from table");
                match destination {
                    // Accepted from the local side or from the path's far
                    // end; a teardown from anywhere else does not touch
                    // ascending.
                    Some(destination) if from == local || from == destination => {
                        tracing::debug!(path = %path_id, "tearing down ascending path");
                        self.ascending = None;
                        self.table.remove(&asc);
                        self.bootstrap_now(driver, now);
                        return vec![destination];
                    }
                    Some(_) => {}
                    None => self.ascending = None,
                }
            }
        }

        if let Some(desc) = self.descending {
            if desc.public_key == path_key && desc.path_id == path_id {
                let source = self.table.get(&desc).map(|entry| entry.source);
                debug_assert!(source.is_some(), "descending index missing from table");
                match source {
                    Some(source) if from == source || from == local => {
                        tracing::debug!(path = %path_id, "tearing down descending path");
                        self.descending = None;
                        self.table.remove(&desc);
                        return vec![source];
                    }
                    Some(_) => {}
                    None => self.descending = None,
                }
            }
        }

        let index = SnakeIndex {
            public_key: path_key,
            path_id,
        };
        if let Some(entry) = self.table.get(&index) {
            let (source, destination) = (entry.source, entry.destination);
            if from == local {
                // Locally-detected duplicate: notify both directions.
                self.table.remove(&index);
                return vec![destination, source];
            } else if from == source {
                self.table.remove(&index);
                return vec![destination];
            } else if from == destination {
                self.table.remove(&index);
                return vec![source];
            }
        }

        Vec::new()
    }

    /// Tear down an installed path and push the teardown frame to every
    /// peer it propagates to.
    pub fn send_teardown_for_existing_path<D: SnekDriver>(
        &mut self,
        driver: &mut D,
        from: PeerId,
        path_key: PublicKey,
        path_id: PathId,
        now: u64,
    ) {
        let frame = Frame::teardown(path_key, path_id);
        for next in self.teardown_path(driver, from, path_key, path_id, now) {
            let _ = driver.push(next, frame.clone());
        }
    }

    /// Bounce a teardown for a path this node refused to install.
    ///
    /// The path was never entered into the table, so nothing propagates
    /// beyond `via`, the peer the rejected frame arrived on.
    pub fn send_teardown_for_rejected_path<D: SnekDriver>(
        &mut self,
        driver: &mut D,
        path_key: PublicKey,
        path_id: PathId,
        via: PeerId,
    ) {
        debug_assert!(
            !self.table.contains(&SnakeIndex {
                public_key: path_key,
                path_id,
            }),
            "rejected path must not be in the routing table"
        );
        let _ = driver.push(via, Frame::teardown(path_key, path_id));
    }
}
