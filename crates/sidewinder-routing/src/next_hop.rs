//! Key-space next-hop selection.
//!
//! Forwarding walks down the ring toward the destination key: a candidate
//! replaces the current best only if it sits strictly between the
//! destination and the best so far. Candidates come from the parent's
//! path to the root (the long jump for destinations above us), tree
//! ancestries, direct peers, and valid table entries.

use sidewinder_core::{dht_ordered, Frame, PublicKey};

use crate::env::{PeerId, SnekDriver};
use crate::router::SnekRouter;

struct Best {
    key: PublicKey,
    peer: Option<PeerId>,
}

impl SnekRouter {
    /// Pick the outbound peer for `rx` by destination key.
    ///
    /// In bootstrap mode the local pseudo-peer is never a valid result;
    /// `None` means the probe dead-ends here and should be handled. In
    /// normal mode the local pseudo-peer is returned for frames that have
    /// arrived.
    pub fn next_hop_snek<D: SnekDriver>(
        &self,
        driver: &D,
        _from: PeerId,
        rx: &Frame,
        bootstrap: bool,
        now: u64,
    ) -> Option<PeerId> {
        let dest_key = rx.destination_key;
        let local = driver.local();
        if !bootstrap && self.public_key == dest_key {
            return Some(local);
        }

        let root = driver.root_announcement();
        let mut best = Best {
            key: self.public_key,
            peer: if bootstrap { None } else { Some(local) },
        };

        let consider = |best: &mut Best, candidate: PublicKey, peer: PeerId| {
            if bootstrap && candidate == self.public_key {
                // A bootstrap must never route back to its own key.
            } else if !bootstrap && candidate == dest_key && best.key != dest_key {
                *best = Best {
                    key: candidate,
                    peer: Some(peer),
                };
            } else if dht_ordered(&dest_key, &candidate, &best.key) {
                // Strictly closer to the destination in ring order.
                *best = Best {
                    key: candidate,
                    peer: Some(peer),
                };
            }
        };

        // The path to the root is the opening move for destinations above
        // us, and the unconditional one for bootstraps still at home.
        if let Some(parent) = driver.parent().filter(|&p| driver.is_started(p)) {
            if (bootstrap && best.key == dest_key)
                || dht_ordered(&best.key, &dest_key, &root.root_public_key)
            {
                best = Best {
                    key: root.root_public_key,
                    peer: Some(parent),
                };
            }
            for ancestor in driver.ancestry(parent) {
                consider(&mut best, ancestor.public_key, parent);
            }
        }

        // Ancestries of every started peer.
        for peer in driver.peers() {
            if !driver.is_started(peer) {
                continue;
            }
            for hop in driver.ancestry(peer) {
                consider(&mut best, hop.public_key, peer);
            }
        }

        // If the best key belongs to a node we peer with directly, take
        // the direct link over the path through an ancestry.
        for peer in driver.peers() {
            if !driver.is_started(peer) {
                continue;
            }
            if driver.peer_key(peer) == Some(best.key) {
                best.peer = Some(peer);
            }
        }

        // Learned snake paths through this node.
        for (index, entry) in self.table.iter() {
            if entry.source == local || !entry.valid(now) || !driver.is_started(entry.source) {
                continue;
            }
            consider(&mut best, index.public_key, entry.source);
        }

        best.peer
    }
}
