//! A scriptable in-memory [`SnekDriver`] for tests.
//!
//! Holds the whole collaborator surface as plain data: parent, root
//! announcement, per-peer keys / started flags / ancestries, a scripted
//! tree next hop, and an outbox recording every pushed frame. Unit tests
//! in this crate and integration harnesses build on it.

use std::collections::{BTreeMap, BTreeSet};

use sidewinder_core::{Coordinates, Frame, PublicKey, RootSequence};

use crate::env::{AncestrySignature, PeerId, RootAnnouncement, SnekDriver};

/// Reserved handle for the local pseudo-peer.
pub const LOCAL: PeerId = PeerId(0);

struct MockPeer {
    public_key: PublicKey,
    started: bool,
    ancestry: Vec<AncestrySignature>,
}

/// In-memory driver with a recorded outbox.
pub struct MockDriver {
    parent: Option<PeerId>,
    coordinates: Coordinates,
    root: RootAnnouncement,
    peers: BTreeMap<PeerId, MockPeer>,
    tree_hop: Option<PeerId>,
    failing: BTreeSet<PeerId>,
    next_id: u64,
    /// Every successfully pushed frame, in push order.
    pub outbox: Vec<(PeerId, Frame)>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            parent: None,
            coordinates: Coordinates::default(),
            root: RootAnnouncement::default(),
            peers: BTreeMap::new(),
            tree_hop: None,
            failing: BTreeSet::new(),
            next_id: 1,
            outbox: Vec::new(),
        }
    }

    /// The local pseudo-peer handle this driver hands out.
    pub fn local_id(&self) -> PeerId {
        LOCAL
    }

    /// Register a started peer with the given key. Returns its handle.
    pub fn add_peer(&mut self, public_key: PublicKey) -> PeerId {
        let id = PeerId(self.next_id);
        self.next_id += 1;
        self.peers.insert(
            id,
            MockPeer {
                public_key,
                started: true,
                ancestry: Vec::new(),
            },
        );
        id
    }

    pub fn set_parent(&mut self, parent: PeerId) {
        self.parent = Some(parent);
    }

    pub fn clear_parent(&mut self) {
        self.parent = None;
    }

    pub fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.coordinates = coordinates;
    }

    /// Set the root announcement to `(key, sequence)` with no signatures.
    pub fn set_root(&mut self, root_public_key: PublicKey, sequence: u64) {
        self.root = RootAnnouncement {
            root_public_key,
            root_sequence: RootSequence(sequence),
            signatures: Vec::new(),
        };
    }

    pub fn set_started(&mut self, peer: PeerId, started: bool) {
        if let Some(p) = self.peers.get_mut(&peer) {
            p.started = started;
        }
    }

    /// Script the peer's announcement signature chain, root first.
    pub fn set_ancestry(&mut self, peer: PeerId, chain: &[PublicKey]) {
        if let Some(p) = self.peers.get_mut(&peer) {
            p.ancestry = chain
                .iter()
                .enumerate()
                .map(|(hop, &public_key)| AncestrySignature {
                    public_key,
                    destination_port: hop as u64 + 1,
                })
                .collect();
        }
    }

    /// Script what `tree_next_hop` returns for every frame.
    pub fn set_tree_hop(&mut self, hop: Option<PeerId>) {
        self.tree_hop = hop;
    }

    /// Make pushes to `peer` fail, as a full or closed queue would.
    pub fn fail_pushes_to(&mut self, peer: PeerId) {
        self.failing.insert(peer);
    }

    /// Drain and return the recorded outbox.
    pub fn take_outbox(&mut self) -> Vec<(PeerId, Frame)> {
        std::mem::take(&mut self.outbox)
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SnekDriver for MockDriver {
    fn local(&self) -> PeerId {
        LOCAL
    }

    fn parent(&self) -> Option<PeerId> {
        self.parent
    }

    fn root_announcement(&self) -> RootAnnouncement {
        self.root.clone()
    }

    fn coordinates(&self) -> Coordinates {
        self.coordinates.clone()
    }

    fn peers(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    fn is_started(&self, peer: PeerId) -> bool {
        if peer == LOCAL {
            return true;
        }
        self.peers.get(&peer).is_some_and(|p| p.started)
    }

    fn peer_key(&self, peer: PeerId) -> Option<PublicKey> {
        self.peers.get(&peer).map(|p| p.public_key)
    }

    fn ancestry(&self, peer: PeerId) -> Vec<AncestrySignature> {
        self.peers
            .get(&peer)
            .map(|p| p.ancestry.clone())
            .unwrap_or_default()
    }

    fn tree_next_hop(&mut self, _from: PeerId, _frame: &Frame) -> Option<PeerId> {
        self.tree_hop
    }

    fn push(&mut self, peer: PeerId, frame: Frame) -> bool {
        if self.failing.contains(&peer) || (peer != LOCAL && !self.peers.contains_key(&peer)) {
            return false;
        }
        self.outbox.push((peer, frame));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: u8) -> PublicKey {
        let mut bytes = [0u8; 32];
        bytes[0] = seed;
        PublicKey::new(bytes)
    }

    #[test]
    fn peers_are_listed_in_registration_order() {
        let mut driver = MockDriver::new();
        let a = driver.add_peer(key(1));
        let b = driver.add_peer(key(2));
        assert_eq!(driver.peers(), vec![a, b]);
    }

    #[test]
    fn local_is_always_started() {
        let driver = MockDriver::new();
        assert!(driver.is_started(LOCAL));
        assert!(!driver.is_started(PeerId(99)));
    }

    #[test]
    fn failing_peer_drops_frames() {
        let mut driver = MockDriver::new();
        let a = driver.add_peer(key(1));
        driver.fail_pushes_to(a);
        assert!(!driver.push(a, Frame::new(sidewinder_core::FrameType::Traffic)));
        assert!(driver.outbox.is_empty());
    }

    #[test]
    fn unknown_peer_drops_frames() {
        let mut driver = MockDriver::new();
        assert!(!driver.push(PeerId(42), Frame::new(sidewinder_core::FrameType::Traffic)));
    }

    #[test]
    fn ancestry_ports_count_from_one() {
        let mut driver = MockDriver::new();
        let a = driver.add_peer(key(1));
        driver.set_ancestry(a, &[key(9), key(1)]);
        let chain = driver.ancestry(a);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].public_key, key(9));
        assert_eq!(chain[0].destination_port, 1);
        assert_eq!(chain[1].destination_port, 2);
    }
}
