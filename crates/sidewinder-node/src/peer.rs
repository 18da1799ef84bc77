//! Peer handles and the registry that resolves them.
//!
//! Peers are long-lived and shared: the actor pushes frames onto their
//! queues while each peer's writer task drains them. Routing-table
//! entries never hold a peer reference, only a [`PeerId`]; this registry
//! resolves ids on every use, and an id that no longer resolves simply
//! drops the frame.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sidewinder_core::PublicKey;
use sidewinder_routing::PeerId;

use crate::queue::ProtoQueue;

/// The reserved handle for the local pseudo-peer.
pub const LOCAL_PEER: PeerId = PeerId(0);

/// One peer link: identity, liveness flag, and the outbound queue.
pub struct Peer {
    id: PeerId,
    public_key: PublicKey,
    started: AtomicBool,
    proto: ProtoQueue,
}

impl Peer {
    #[must_use]
    pub fn id(&self) -> PeerId {
        self.id
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Whether the link is up and past its handshake. Set by the link
    /// lifecycle outside this crate.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::Release);
    }

    /// The peer's outbound protocol queue.
    #[must_use]
    pub fn proto(&self) -> &ProtoQueue {
        &self.proto
    }
}

/// Registry of live peers, owned by the node actor.
pub struct PeerRegistry {
    peers: HashMap<PeerId, Arc<Peer>>,
    next_id: u64,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
            // Zero is the local pseudo-peer.
            next_id: 1,
        }
    }

    /// Add a peer with a fresh handle. The peer starts stopped.
    pub fn register(&mut self, public_key: PublicKey, queue_capacity: usize) -> Arc<Peer> {
        let id = PeerId(self.next_id);
        self.next_id += 1;
        let peer = Arc::new(Peer {
            id,
            public_key,
            started: AtomicBool::new(false),
            proto: ProtoQueue::new(queue_capacity),
        });
        self.peers.insert(id, Arc::clone(&peer));
        peer
    }

    /// Drop a peer. Its queue is reset so the writer task unparks and
    /// held frames are released.
    pub fn remove(&mut self, id: PeerId) -> Option<Arc<Peer>> {
        let peer = self.peers.remove(&id)?;
        peer.proto.reset();
        Some(peer)
    }

    #[must_use]
    pub fn get(&self, id: PeerId) -> Option<&Arc<Peer>> {
        self.peers.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Peer>> {
        self.peers.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidewinder_core::{Frame, FrameType};

    fn key(seed: u8) -> PublicKey {
        let mut bytes = [0u8; 32];
        bytes[0] = seed;
        PublicKey::new(bytes)
    }

    #[test]
    fn register_assigns_distinct_nonlocal_ids() {
        let mut registry = PeerRegistry::new();
        let a = registry.register(key(1), 8);
        let b = registry.register(key(2), 8);
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), LOCAL_PEER);
        assert_ne!(b.id(), LOCAL_PEER);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn peers_start_stopped() {
        let mut registry = PeerRegistry::new();
        let peer = registry.register(key(1), 8);
        assert!(!peer.is_started());
        peer.set_started(true);
        assert!(peer.is_started());
    }

    #[test]
    fn remove_resets_queue() {
        let mut registry = PeerRegistry::new();
        let peer = registry.register(key(1), 8);
        let id = peer.id();
        peer.proto().push(Frame::new(FrameType::Traffic));
        assert_eq!(peer.proto().len(), 1);

        let removed = registry.remove(id).unwrap();
        assert!(removed.proto().is_empty());
        assert!(registry.get(id).is_none());
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn get_resolves_registered_handles_only() {
        let mut registry = PeerRegistry::new();
        let peer = registry.register(key(1), 8);
        assert!(registry.get(peer.id()).is_some());
        assert!(registry.get(PeerId(99)).is_none());
        assert!(registry.get(LOCAL_PEER).is_none());
    }
}
